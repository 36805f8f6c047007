// SPDX-License-Identifier: MPL-2.0

//! Pipe Control Block: a fixed-capacity circular byte buffer with two
//! endpoints, blocking on empty/full via two condition variables, and
//! EOF signalled by endpoint state rather than a flag.
//!
//! The reader and writer halves are distinct types rather than one
//! type with a direction flag, so a wrong-direction call is caught by
//! the type system at every call site that bothers to check, and is
//! otherwise reported as an error by the shared `StreamOps` vtable.

use std::sync::Condvar;

use crate::constants::CAP;
use crate::fcb::StreamOps;
use crate::prelude::*;

/// Which endpoints of a pipe are still open. A plain bool *is* the
/// "open or closed" state of a single endpoint, without a sentinel
/// integer to track alongside it.
struct Endpoints {
    reader_open: bool,
    writer_open: bool,
}

struct PipeInner {
    buffer: Box<[u8; CAP]>,
    read_index: usize,
    write_index: usize,
    buffer_size: usize,
    endpoints: Endpoints,
}

impl PipeInner {
    fn new() -> Self {
        PipeInner {
            buffer: Box::new([0u8; CAP]),
            read_index: 0,
            write_index: 0,
            buffer_size: 0,
            endpoints: Endpoints {
                reader_open: true,
                writer_open: true,
            },
        }
    }
}

/// The pipe's shared state. Lives as long as either endpoint wrapper
/// (`PipeReader`/`PipeWriter`) holds an `Arc` to it, and is freed
/// automatically once both are dropped.
struct Pipe {
    inner: Mutex<PipeInner>,
    has_data: Condvar,
    has_space: Condvar,
}

impl Pipe {
    fn new() -> Arc<Pipe> {
        Arc::new(Pipe {
            inner: Mutex::new(PipeInner::new()),
            has_data: Condvar::new(),
            has_space: Condvar::new(),
        })
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut inner = self.inner.lock().unwrap();
        loop {
            if inner.buffer_size > 0 {
                break;
            }
            if !inner.endpoints.writer_open {
                return Ok(0); // EOF
            }
            inner = self.has_data.wait(inner).unwrap();
        }

        let n = buf.len().min(inner.buffer_size);
        for slot in buf.iter_mut().take(n) {
            let idx = inner.read_index;
            *slot = inner.buffer[idx];
            inner.read_index = (idx + 1) % CAP;
            inner.buffer_size -= 1;
        }
        self.has_space.notify_all();
        Ok(n)
    }

    fn write(&self, buf: &[u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut inner = self.inner.lock().unwrap();
        loop {
            if inner.buffer_size < CAP {
                break;
            }
            if !inner.endpoints.reader_open {
                return_errno_with_message!(Errno::EPIPE, "reader endpoint closed");
            }
            inner = self.has_space.wait(inner).unwrap();
        }
        // Re-check after waking: the reader may have closed while we
        // were asleep waiting for space.
        if !inner.endpoints.reader_open {
            return_errno_with_message!(Errno::EPIPE, "reader endpoint closed");
        }

        let n = buf.len().min(CAP - inner.buffer_size);
        for byte in buf.iter().take(n) {
            let idx = inner.write_index;
            inner.buffer[idx] = *byte;
            inner.write_index = (idx + 1) % CAP;
            inner.buffer_size += 1;
        }
        self.has_data.notify_all();
        Ok(n)
    }

    fn close_reader(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.endpoints.reader_open = false;
        self.has_space.notify_all();
    }

    fn close_writer(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.endpoints.writer_open = false;
        self.has_data.notify_all();
    }

    /// Wakes any writer blocked on `has_space` without closing the
    /// reader endpoint. Used by a peer socket's `shutdown(READ)`:
    /// clearing the peer's `can_write` flag alone wouldn't wake a
    /// writer that's already asleep on this pipe, so this wakes it
    /// explicitly and lets it observe the flag on its next attempt.
    fn wake_writers(&self) {
        self.has_space.notify_all();
    }
}

/// The read half of a pipe. `write` always fails with an error, so a
/// wrong-direction call is reported at the vtable boundary rather than
/// simply not compiling, but the type itself still documents which
/// direction is intended.
pub struct PipeReader {
    pipe: Arc<Pipe>,
}

/// The write half of a pipe.
pub struct PipeWriter {
    pipe: Arc<Pipe>,
}

impl StreamOps for PipeReader {
    fn read(&self, buf: &mut [u8]) -> Result<usize> {
        self.pipe.read(buf)
    }

    fn write(&self, _buf: &[u8]) -> Result<usize> {
        return_errno_with_message!(Errno::EINVAL, "write on a pipe's read endpoint")
    }

    fn close(&self) -> Result<()> {
        self.pipe.close_reader();
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl StreamOps for PipeWriter {
    fn read(&self, _buf: &mut [u8]) -> Result<usize> {
        return_errno_with_message!(Errno::EINVAL, "read on a pipe's write endpoint")
    }

    fn write(&self, buf: &[u8]) -> Result<usize> {
        self.pipe.write(buf)
    }

    fn close(&self) -> Result<()> {
        self.pipe.close_writer();
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl PipeWriter {
    /// Used by a peer socket's `shutdown(WRITE)`: forces this writer's
    /// endpoint `CLOSED` so the peer's blocked reader observes EOF,
    /// without going through the normal `close` path (the FCB entry
    /// for this writer is still open; only the pipe side is torn down).
    pub(crate) fn force_close(&self) {
        self.pipe.close_writer();
    }
}

impl PipeReader {
    /// Used by a peer socket's `shutdown(READ)` acting on the *peer's*
    /// send pipe: wakes any blocked writer without tearing down this
    /// reader's own endpoint.
    pub(crate) fn wake_blocked_writers(&self) {
        self.pipe.wake_writers();
    }
}

/// Creates a connected pipe pair: one reader endpoint and one writer
/// endpoint sharing the same underlying buffer. Used directly by the
/// `Pipe()` syscall and internally by `accept` to build the two pipes
/// behind a freshly connected socket pair.
pub fn new_pipe() -> (Arc<PipeReader>, Arc<PipeWriter>) {
    let pipe = Pipe::new();
    (
        Arc::new(PipeReader {
            pipe: pipe.clone(),
        }),
        Arc::new(PipeWriter { pipe }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_returns_exact_bytes_written() {
        let (reader, writer) = new_pipe();
        let n = writer.write(b"hello").unwrap();
        assert_eq!(n, 5);
        let mut buf = [0u8; 100];
        let n = reader.read(&mut buf).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buf[..5], b"hello");
    }

    #[test]
    fn eof_after_writer_closed() {
        let (reader, writer) = new_pipe();
        writer.write(b"hello").unwrap();
        writer.close().unwrap();
        let mut buf = [0u8; 100];
        assert_eq!(reader.read(&mut buf).unwrap(), 5);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn broken_pipe_after_reader_closed() {
        let (reader, writer) = new_pipe();
        reader.close().unwrap();
        let err = writer.write(&[0u8; 10]).unwrap_err();
        assert_eq!(err.error(), Errno::EPIPE);
    }

    #[test]
    fn zero_size_request_does_not_block() {
        let (reader, writer) = new_pipe();
        assert_eq!(writer.write(&[]).unwrap(), 0);
        assert_eq!(reader.read(&mut []).unwrap(), 0);
    }

    #[test]
    fn back_pressure_blocks_writer_at_capacity() {
        use std::thread;

        let (reader, writer) = new_pipe();
        let pattern: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();

        // A single `write` call permits short writes, so draining the
        // whole pattern loops over `write` the way a syscall-level
        // caller would.
        let writer_pattern = pattern.clone();
        let writer_handle = thread::spawn(move || {
            let mut sent = 0usize;
            while sent < writer_pattern.len() {
                sent += writer.write(&writer_pattern[sent..]).unwrap();
            }
            sent
        });

        let mut first = vec![0u8; 1000];
        let n1 = reader.read(&mut first).unwrap();
        assert_eq!(n1, 1000);
        assert_eq!(&first[..n1], &pattern[..1000]);

        let mut second = vec![0u8; 4000];
        let n2 = reader.read(&mut second).unwrap();
        assert_eq!(&second[..n2], &pattern[1000..1000 + n2]);

        let written = writer_handle.join().unwrap();
        assert_eq!(written, 5000);
    }
}
