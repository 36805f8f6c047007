// SPDX-License-Identifier: MPL-2.0

//! External interface surface: one function per syscall, translating
//! this crate's `Result`-returning internals into a sentinel-int ABI
//! (`NOFILE`, `NOPROC`, `-1`) a C-style caller can check directly
//! without unwrapping a `Result`.

use std::time::Duration;

use crate::constants::{NOFILE, NOPROC};
use crate::fcb::Fid;
use crate::pipe::new_pipe;
use crate::prelude::*;
use crate::process::{self, Pid, Process};
use crate::procinfo;
use crate::socket::{Socket, ShutdownHow};
use crate::thread::{self, Task, Tid, NOTID};

/// The two fids `Pipe()` hands back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipeT {
    pub read_fid: Fid,
    pub write_fid: Fid,
}

fn current_file_table() -> Arc<Process> {
    process::current()
}

/// Recovers the `Socket` behind `fid`, for the socket-specific calls
/// (`Listen`/`Accept`/`Connect`/`ShutDown`) that need more than the
/// `StreamOps` vtable exposes.
fn socket_at(fid: Fid) -> Result<Arc<Socket>> {
    let stream = current_file_table().file_table().get(fid)?;
    stream
        .as_socket()
        .ok_or_else(|| Error::with_message(Errno::EBADF, "fid is not a socket"))
}

/// Runs `task` as a new process's main thread; returns its pid, or
/// `NOPROC` if the process table is full.
pub fn exec(task: Task, args: Vec<u8>) -> Pid {
    Process::exec(task, args).map(|p| p.pid()).unwrap_or(NOPROC)
}

/// Terminates the calling process with `status`. Never returns.
pub fn exit(status: i32) -> ! {
    let _ = process::current().exit(status);
    // `Process::exit` finishes the calling thread's `Ptcb` and returns;
    // the real "never returns" is enforced the same way `ThreadExit`
    // enforces it for a non-main thread.
    thread::thread_exit(status)
}

/// Reaps a child (a specific `cpid`, or any with `NOPROC`), writing
/// its exit status into `*status`.
pub fn wait_child(cpid: Pid, status: &mut i32) -> Pid {
    process::current()
        .wait_child(cpid, status)
        .unwrap_or(NOPROC)
}

/// Returns the calling process's pid.
pub fn get_pid() -> Pid {
    process::get_pid()
}

/// Returns the calling process's parent pid, or `NOPROC` if it has
/// none.
pub fn get_ppid() -> Pid {
    process::get_ppid()
}

/// Spawns `task` as a new thread of the calling process; returns its
/// tid, or `NOTID` on failure.
pub fn create_thread(task: Task, args: Vec<u8>) -> Tid {
    thread::create_thread(task, args).unwrap_or(NOTID)
}

/// Returns the calling thread's own tid.
pub fn thread_self() -> Tid {
    thread::thread_self()
}

/// Blocks until `tid` exits, copying its exit value into `*exit_value`.
pub fn thread_join(tid: Tid, exit_value: &mut i32) -> i32 {
    match thread::join(tid, Some(exit_value)) {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Marks `tid` as no longer joinable, so it cleans itself up on exit.
pub fn thread_detach(tid: Tid) -> i32 {
    match thread::detach(tid) {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Terminates the calling thread with `status`. Never returns.
pub fn thread_exit(status: i32) -> ! {
    thread::thread_exit(status)
}

/// Allocates a connected pipe pair. Returns `-1` on file table
/// exhaustion, `0` with `*out` filled in otherwise.
pub fn pipe(out: &mut PipeT) -> i32 {
    let (reader, writer) = new_pipe();
    let table = current_file_table();
    match table.file_table().reserve_pair(reader, writer) {
        Ok((read_fid, write_fid)) => {
            *out = PipeT { read_fid, write_fid };
            0
        }
        Err(_) => -1,
    }
}

/// Allocates a socket bound to `port` (or unbound, with `NOPORT`).
pub fn socket(port: i32) -> Fid {
    let result = (|| -> Result<Fid> {
        let sock = Socket::new_unbound(port)?;
        current_file_table().file_table().reserve(sock)
    })();
    result.unwrap_or(NOFILE)
}

/// Puts the socket at `fid` into the listening state.
pub fn listen(fid: Fid) -> i32 {
    match socket_at(fid).and_then(|s| s.listen()) {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Blocks until a connection arrives on the listening socket at
/// `fid`, returning the new peer socket's fid.
pub fn accept(fid: Fid) -> Fid {
    let result = (|| -> Result<Fid> {
        let listener = socket_at(fid)?;
        let server = listener.accept()?;
        current_file_table().file_table().reserve(server)
    })();
    result.unwrap_or(NOFILE)
}

/// Connects the socket at `fid` to a listener on `port`, bounded by
/// `timeout`.
pub fn connect(fid: Fid, port: i32, timeout: Duration) -> i32 {
    match socket_at(fid).and_then(|s| s.connect(port, timeout)) {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Half- or fully closes the socket at `fid`'s data flow without
/// releasing its fid.
pub fn shutdown(fid: Fid, how: ShutdownHow) -> i32 {
    match socket_at(fid).and_then(|s| s.shutdown(how)) {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Opens a stream over process-table snapshots.
pub fn open_info() -> Fid {
    current_file_table()
        .file_table()
        .reserve(procinfo::open_info())
        .unwrap_or(NOFILE)
}

/// Reads from `fid` through the stream vtable, the part of the
/// surface every fid shares regardless of stream kind.
pub fn read(fid: Fid, buf: &mut [u8]) -> i32 {
    match current_file_table().file_table().get(fid).and_then(|s| s.read(buf)) {
        Ok(n) => n as i32,
        Err(_) => -1,
    }
}

/// Generic `Write` over the FCB stream vtable.
pub fn write(fid: Fid, buf: &[u8]) -> i32 {
    match current_file_table().file_table().get(fid).and_then(|s| s.write(buf)) {
        Ok(n) => n as i32,
        Err(_) => -1,
    }
}

/// Generic `Close` over the FCB stream vtable.
pub fn close(fid: Fid) -> i32 {
    match current_file_table().file_table().close(fid) {
        Ok(()) => 0,
        Err(_) => -1,
    }
}
