// SPDX-License-Identifier: MPL-2.0

//! Socket scenarios beyond the in-module unit tests in
//! `src/socket/mod.rs`. Sockets don't depend on a bound "current
//! process," so these drive the `socket` module directly rather than
//! going through a `Process::exec`'d task.

use std::thread;
use std::time::Duration;

use tinykernel_core::constants::NOPORT;
use tinykernel_core::fcb::StreamOps;
use tinykernel_core::socket::{Socket, ShutdownHow};

#[test]
fn shutdown_write_delivers_eof_to_peer() {
    let listener = Socket::new_unbound(100).unwrap();
    listener.listen().unwrap();

    let listener_clone = listener.clone();
    let server_handle = thread::spawn(move || listener_clone.accept().unwrap());

    let connector = Socket::new_unbound(NOPORT).unwrap();
    connector.connect(100, Duration::from_millis(500)).unwrap();
    let server = server_handle.join().unwrap();

    connector.shutdown(ShutdownHow::WRITE).unwrap();

    let mut buf = [0u8; 8];
    assert_eq!(server.read(&mut buf).unwrap(), 0);

    server.shutdown(ShutdownHow::BOTH).unwrap();
    connector.shutdown(ShutdownHow::READ).unwrap();
}

#[test]
fn accept_on_closed_listener_fails() {
    let listener = Socket::new_unbound(101).unwrap();
    listener.listen().unwrap();
    listener.close().unwrap();

    let err = listener.accept().unwrap_err();
    assert_eq!(err.error(), tinykernel_core::error::Errno::EBADF);
}

#[test]
fn connect_to_unbound_port_refuses() {
    let connector = Socket::new_unbound(NOPORT).unwrap();
    let err = connector
        .connect(102, Duration::from_millis(50))
        .unwrap_err();
    assert_eq!(err.error(), tinykernel_core::error::Errno::ECONNREFUSED);
}

#[test]
fn second_listen_on_same_port_fails() {
    let first = Socket::new_unbound(103).unwrap();
    first.listen().unwrap();

    let second = Socket::new_unbound(103).unwrap();
    let err = second.listen().unwrap_err();
    assert!(matches!(
        err.error(),
        tinykernel_core::error::Errno::EINVAL | tinykernel_core::error::Errno::EADDRINUSE
    ));

    first.close().unwrap();
}
