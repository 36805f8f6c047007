// SPDX-License-Identifier: MPL-2.0

//! File Control Block table: a per-process `FileTable` of fixed
//! capacity mapping small integer file ids to a shared stream object.
//!
//! Reference counting across a file descriptor table fork (as happens
//! on `exec`) and a close is realized with `Arc` clone/drop: Rust's
//! reference count already *is* the refcount a table slot needs.

use std::any::Any;

use crate::constants::{MAX_FILEID, NOFILE};
use crate::prelude::*;

/// A file id, as handed back to callers. `NOFILE` (`-1`) is the
/// sentinel for "no such fid."
pub type Fid = i32;

/// The stream vtable every FCB's opaque object implements: `{Open,
/// Read, Write, Close}`. `Open` is folded into each
/// stream type's constructor (`Pipe::reader()`, `Socket::new_unbound()`,
/// …) rather than kept as a vtable entry, since Rust constructs the
/// concrete type directly; `Read`/`Write`/`Close` remain dynamic
/// dispatch so the FCB layer never needs to know which stream kind it
/// holds. `Any` lets the syscall surface recover a concrete type (e.g.
/// `Socket`) when a call like `Accept` needs more than the vtable
/// exposes.
pub trait StreamOps: Send + Sync + Any {
    /// Reads up to `buf.len()` bytes. Returns the number of bytes read,
    /// or an error for a wrong-direction call on a half-duplex stream.
    fn read(&self, buf: &mut [u8]) -> Result<usize>;

    /// Writes up to `buf.len()` bytes. Returns the number of bytes
    /// written.
    fn write(&self, buf: &[u8]) -> Result<usize>;

    /// Narrows back to the concrete stream type.
    fn as_any(&self) -> &dyn Any;

    /// Releases this endpoint. Idempotent: closing twice is a no-op.
    fn close(&self) -> Result<()>;

    /// Recovers the underlying `Socket` when this stream object is one,
    /// for the socket-specific calls (`Listen`/`Accept`/`Connect`/
    /// `ShutDown`) that need the real type rather than the vtable.
    /// `Socket` overrides this to hand back `self`; every other stream
    /// kind uses the default `None`.
    fn as_socket(self: Arc<Self>) -> Option<Arc<crate::socket::Socket>> {
        None
    }
}

/// A single FCB slot: the stream vtable object, shared by `Arc` so that
/// `exec`'s fd inheritance is a clone (`fcb_incref`) and a table slot
/// going out of scope is a drop (`fcb_decref`).
type Slot = Option<Arc<dyn StreamOps>>;

/// Per-process file descriptor table, fixed at `MAX_FILEID` slots, as
/// a process's file descriptor table.
pub struct FileTable {
    slots: Mutex<Vec<Slot>>,
}

impl FileTable {
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(MAX_FILEID);
        slots.resize_with(MAX_FILEID, || None);
        FileTable {
            slots: Mutex::new(slots),
        }
    }

    /// `fcb_reserve(1)`: finds a free slot, installs `stream`, and
    /// returns its fid. Fails with `ENFILE` if the table is full.
    pub fn reserve(&self, stream: Arc<dyn StreamOps>) -> Result<Fid> {
        let mut slots = self.slots.lock().unwrap();
        match slots.iter().position(|s| s.is_none()) {
            Some(idx) => {
                slots[idx] = Some(stream);
                Ok(idx as Fid)
            }
            None => {
                warn!("file table exhausted at {} entries", MAX_FILEID);
                return_errno_with_message!(Errno::ENFILE, "file table full")
            }
        }
    }

    /// `fcb_reserve(2)`: reserves two adjacent-in-spirit (not
    /// necessarily contiguous) fids in one locked section, for
    /// `Pipe()`'s `{read_fid, write_fid}` pair.
    pub fn reserve_pair(
        &self,
        a: Arc<dyn StreamOps>,
        b: Arc<dyn StreamOps>,
    ) -> Result<(Fid, Fid)> {
        let mut slots = self.slots.lock().unwrap();
        let free: Vec<usize> = slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_none())
            .map(|(i, _)| i)
            .take(2)
            .collect();
        if free.len() < 2 {
            warn!("file table exhausted reserving a pipe pair");
            return_errno_with_message!(Errno::ENFILE, "file table full");
        }
        slots[free[0]] = Some(a);
        slots[free[1]] = Some(b);
        Ok((free[0] as Fid, free[1] as Fid))
    }

    /// `fcb_get(fid)`: returns the stream object installed at `fid`, or
    /// `EBADF` if the fid is out of range or the slot is empty.
    pub fn get(&self, fid: Fid) -> Result<Arc<dyn StreamOps>> {
        let slots = self.slots.lock().unwrap();
        slots
            .get(fid as usize)
            .and_then(|s| s.clone())
            .ok_or(Error::new(Errno::EBADF))
    }

    /// Installs `stream` at an explicit fid, overwriting whatever was
    /// there (used when cloning a parent's table on `exec`).
    pub fn install_at(&self, fid: Fid, stream: Arc<dyn StreamOps>) {
        let mut slots = self.slots.lock().unwrap();
        if let Some(slot) = slots.get_mut(fid as usize) {
            *slot = Some(stream);
        }
    }

    /// `fcb_decref`, surfaced as `close`: calls the stream's `close`,
    /// then drops the table's `Arc`. Returns `EBADF` for an unknown
    /// fid; dropping the table's reference is what actually frees the
    /// stream once every other clone is also gone (the FCB layer never
    /// hand-counts references itself).
    pub fn close(&self, fid: Fid) -> Result<()> {
        let stream = {
            let mut slots = self.slots.lock().unwrap();
            slots
                .get_mut(fid as usize)
                .and_then(|s| s.take())
                .ok_or(Error::new(Errno::EBADF))?
        };
        stream.close()
    }

    /// Shallow-copies every occupied slot of `self` into a fresh table,
    /// `Arc`-cloning each stream object: `exec`'s fd inheritance.
    pub fn fork(&self) -> FileTable {
        let slots = self.slots.lock().unwrap();
        FileTable {
            slots: Mutex::new(slots.clone()),
        }
    }

    /// Closes every occupied slot, used when a process exits.
    pub fn close_all(&self) {
        let streams: Vec<Arc<dyn StreamOps>> = {
            let mut slots = self.slots.lock().unwrap();
            slots.iter_mut().filter_map(|s| s.take()).collect()
        };
        for stream in streams {
            if let Err(e) = stream.close() {
                debug!("close on exit failed: {e}");
            }
        }
    }
}

impl Default for FileTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Sentinel conversion helper shared by the syscall surface: turns an
/// internal `Result<Fid>` into the legacy `Fid`/`NOFILE` pair.
pub(crate) fn fid_or_nofile(result: Result<Fid>) -> Fid {
    result.unwrap_or(NOFILE)
}
