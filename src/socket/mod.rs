// SPDX-License-Identifier: MPL-2.0

//! Socket: a state machine over `{Unbound, Listening, Peer, Closed}`,
//! realized as two back-to-back pipes once a connection is
//! established. `state.rs` carries the tagged per-state payload and
//! `request.rs` carries the connection handshake object; this module
//! holds the `Socket` type itself and its transition operations.

mod port_table;
mod request;
mod state;

use std::sync::Condvar;
use std::time::Duration;

use bitflags::bitflags;

use crate::constants::{MAX_PORT, NOPORT};
use crate::fcb::StreamOps;
use crate::pipe::new_pipe;
use crate::prelude::*;
use request::ConnRequest;
use state::{ListenerState, PeerState, SocketState};

bitflags! {
    /// Half-close direction(s) for `shutdown(how)`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ShutdownHow: u8 {
        const READ = 0b01;
        const WRITE = 0b10;
        const BOTH = Self::READ.bits() | Self::WRITE.bits();
    }
}

/// Socket Control Block.
pub struct Socket {
    port: i32,
    state: Mutex<SocketState>,
    incoming: Condvar,
}

impl Socket {
    /// `socket(port)`'s SCB allocation half (the FCB half is handled by
    /// the caller, which owns a `FileTable`): validates the port and
    /// returns a fresh Unbound socket.
    pub fn new_unbound(port: i32) -> Result<Arc<Socket>> {
        if port != NOPORT && !(0..=MAX_PORT).contains(&port) {
            return_errno_with_message!(Errno::EINVAL, "port out of range");
        }
        Ok(Arc::new(Socket {
            port,
            state: Mutex::new(SocketState::Unbound),
            incoming: Condvar::new(),
        }))
    }

    pub fn port(&self) -> i32 {
        self.port
    }

    /// `listen(fid)`: requires Unbound with a valid, currently-free
    /// port; installs the listener in the port table and in the socket
    /// itself. `port_table::bind` is the single atomic check-and-install
    /// step, so there is no separate free-check preceding it.
    pub fn listen(self: &Arc<Socket>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !matches!(*state, SocketState::Unbound) {
            return_errno_with_message!(Errno::EINVAL, "listen requires an unbound socket");
        }
        if self.port == NOPORT {
            return_errno_with_message!(Errno::EINVAL, "listen requires a bound port");
        }
        port_table::bind(self.port, self)?;
        *state = SocketState::Listening(ListenerState::new());
        info!("socket bound to port {} now listening", self.port);
        Ok(())
    }

    /// `accept(listener_fid)`: waits for a pending request, builds the
    /// two pipes, and promotes both the new server socket and the
    /// connector's socket to `Peer`.
    pub fn accept(self: &Arc<Socket>) -> Result<Arc<Socket>> {
        let request = {
            let mut state = self.state.lock().unwrap();
            loop {
                match &mut *state {
                    SocketState::Listening(listener) => {
                        if let Some(req) = listener.queue.pop_front() {
                            break req;
                        }
                    }
                    SocketState::Closed => {
                        return_errno_with_message!(Errno::EBADF, "listener was closed")
                    }
                    _ => {
                        return_errno_with_message!(Errno::EINVAL, "accept on non-listening socket")
                    }
                }
                state = self.incoming.wait(state).unwrap();
            }
        };

        // Two fresh pipes, cross-wired: p1 carries server -> client,
        // p2 carries client -> server.
        let (p1_reader, p1_writer) = new_pipe();
        let (p2_reader, p2_writer) = new_pipe();

        // Server side reuses the ordinary socket-allocation path rather
        // than building a bare `Socket` by hand.
        let server = Socket::new_unbound(self.port)?;

        {
            let mut server_state = server.state.lock().unwrap();
            *server_state = SocketState::Peer(PeerState {
                send: p1_writer,
                recv: p2_reader,
                peer: Arc::downgrade(&request.connector),
                can_read: true,
                can_write: true,
            });
        }
        {
            let mut client_state = request.connector.state.lock().unwrap();
            *client_state = SocketState::Peer(PeerState {
                send: p2_writer,
                recv: p1_reader,
                peer: Arc::downgrade(&server),
                can_read: true,
                can_write: true,
            });
        }

        request.mark_accepted();
        debug!("accept on port {} produced a new peer socket", self.port);
        Ok(server)
    }

    /// `connect(fid, port, timeout)`: enqueues a request on the
    /// listener bound to `port` and waits, bounded by `timeout`, for an
    /// `accept` to claim it.
    pub fn connect(self: &Arc<Socket>, port: i32, timeout: Duration) -> Result<()> {
        {
            let state = self.state.lock().unwrap();
            if !matches!(*state, SocketState::Unbound) {
                return_errno_with_message!(Errno::EINVAL, "connect requires an unbound socket");
            }
        }
        if !(0..=MAX_PORT).contains(&port) {
            return_errno_with_message!(Errno::EINVAL, "invalid port");
        }
        let listener = port_table::lookup(port)
            .ok_or_else(|| Error::with_message(Errno::ECONNREFUSED, "no listener on port"))?;

        let request = ConnRequest::new(self.clone());
        {
            let mut listener_state = listener.state.lock().unwrap();
            match &mut *listener_state {
                SocketState::Listening(l) => l.queue.push_back(request.clone()),
                _ => return_errno_with_message!(Errno::ECONNREFUSED, "listener is gone"),
            }
        }
        listener.incoming.notify_all();

        let accepted = request.wait_timeout(timeout);
        if !accepted {
            // Remove our own request from the listener's queue before
            // reporting failure, so a later accept can never dequeue
            // and dereference a request we're about to drop.
            let mut listener_state = listener.state.lock().unwrap();
            if let SocketState::Listening(l) = &mut *listener_state {
                l.queue.retain(|queued| !Arc::ptr_eq(queued, &request));
            }
            return_errno_with_message!(Errno::ETIMEDOUT, "connect timed out");
        }
        Ok(())
    }

    /// `shutdown(how)`: no-op outside `Peer`. Clones whatever pipe
    /// handles and peer reference it needs while holding only its own
    /// `state` lock, then releases that lock before touching the
    /// peer's `state` lock, so two sockets never hold each other's
    /// lock at once.
    pub fn shutdown(&self, how: ShutdownHow) -> Result<()> {
        let (peer_weak, send, recv) = {
            let mut state = self.state.lock().unwrap();
            match &mut *state {
                SocketState::Peer(p) => {
                    if how.contains(ShutdownHow::READ) {
                        p.can_read = false;
                    }
                    if how.contains(ShutdownHow::WRITE) {
                        p.can_write = false;
                    }
                    (p.peer.clone(), p.send.clone(), p.recv.clone())
                }
                _ => return Ok(()),
            }
        };

        if how.contains(ShutdownHow::WRITE) {
            // Force my send pipe's writer endpoint CLOSED so the
            // peer's blocked reader observes EOF.
            send.force_close();
        }

        if how.contains(ShutdownHow::READ) {
            if let Some(peer) = peer_weak.upgrade() {
                let mut peer_state = peer.state.lock().unwrap();
                if let SocketState::Peer(pp) = &mut *peer_state {
                    pp.can_write = false;
                }
            }
            // Wake any peer writer already blocked on this pipe
            // without forcing my reader endpoint closed, so it can
            // observe the peer's `can_write` flag on its next attempt.
            recv.wake_blocked_writers();
        }
        Ok(())
    }
}

impl StreamOps for Socket {
    fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let recv = {
            let state = self.state.lock().unwrap();
            match &*state {
                SocketState::Peer(p) if p.can_read => p.recv.clone(),
                SocketState::Peer(_) => {
                    return_errno_with_message!(Errno::ENOTCONN, "read half is shut down")
                }
                _ => return_errno_with_message!(Errno::ENOTCONN, "read on non-peer socket"),
            }
        };
        recv.read(buf)
    }

    fn write(&self, buf: &[u8]) -> Result<usize> {
        let send = {
            let state = self.state.lock().unwrap();
            match &*state {
                SocketState::Peer(p) if p.can_write => p.send.clone(),
                SocketState::Peer(_) => {
                    return_errno_with_message!(Errno::ENOTCONN, "write half is shut down")
                }
                _ => return_errno_with_message!(Errno::ENOTCONN, "write on non-peer socket"),
            }
        };
        send.write(buf)
    }

    /// `close`: transitions to `Closed`. A former listener is unbound
    /// from the port table and its waiters woken; a former peer has
    /// both of its pipe endpoints closed.
    fn close(&self) -> Result<()> {
        let old_state = {
            let mut state = self.state.lock().unwrap();
            std::mem::replace(&mut *state, SocketState::Closed)
        };
        match old_state {
            SocketState::Listening(listener) => {
                port_table::unbind(self.port, self);
                self.incoming.notify_all();
                for request in listener.queue {
                    request.wake_unaccepted();
                }
            }
            SocketState::Peer(peer) => {
                peer.recv.close()?;
                peer.send.close()?;
            }
            SocketState::Unbound | SocketState::Closed => {}
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_socket(self: Arc<Self>) -> Option<Arc<Socket>> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_round_trip_between_connected_peers() {
        use std::thread;

        let listener = Socket::new_unbound(42).unwrap();
        listener.listen().unwrap();

        let listener_clone = listener.clone();
        let server_handle = thread::spawn(move || {
            let server = listener_clone.accept().unwrap();
            server.write(b"ping").unwrap();
            let mut buf = [0u8; 4];
            server.read(&mut buf).unwrap();
            assert_eq!(&buf, b"pong");
            server.shutdown(ShutdownHow::BOTH).unwrap();
        });

        let connector = Socket::new_unbound(NOPORT).unwrap();
        connector.connect(42, Duration::from_millis(1000)).unwrap();
        let mut buf = [0u8; 4];
        connector.read(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
        connector.write(b"pong").unwrap();

        server_handle.join().unwrap();
        connector.shutdown(ShutdownHow::BOTH).unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(connector.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn connect_without_accept_times_out() {
        let listener = Socket::new_unbound(7).unwrap();
        listener.listen().unwrap();

        let connector = Socket::new_unbound(NOPORT).unwrap();
        let err = connector
            .connect(7, Duration::from_millis(10))
            .unwrap_err();
        assert_eq!(err.error(), Errno::ETIMEDOUT);
    }
}
