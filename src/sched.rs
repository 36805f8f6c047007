// SPDX-License-Identifier: MPL-2.0

//! Stand-in for a scheduler: binds each kernel thread to its owning
//! process and thread handle, and wakes/parks threads through ordinary
//! condition variables.
//!
//! This crate is hosted, not bare-metal, so those primitives are
//! realized directly on top of `std::sync::{Mutex, Condvar}` and
//! `std::thread`, following an enqueue-then-recheck-then-sleep shape
//! rather than reinventing a scheduler of its own.

use std::cell::RefCell;
use std::sync::Arc;

use crate::process::Process;
use crate::thread::Ptcb;

thread_local! {
    static CURRENT: RefCell<Option<(Arc<Process>, Arc<Ptcb>)>> = RefCell::new(None);
}

/// Binds the calling OS thread to a `(Process, Ptcb)` pair. Called once
/// at the start of every kernel thread body.
pub(crate) fn bind_current(process: Arc<Process>, ptcb: Arc<Ptcb>) {
    CURRENT.with(|cell| *cell.borrow_mut() = Some((process, ptcb)));
}

/// Returns the `Process` owning the calling OS thread, if bound.
pub fn current_process() -> Option<Arc<Process>> {
    CURRENT.with(|cell| cell.borrow().as_ref().map(|(p, _)| p.clone()))
}

/// Returns the `Ptcb` of the calling OS thread, if bound.
pub fn current_thread() -> Option<Arc<Ptcb>> {
    CURRENT.with(|cell| cell.borrow().as_ref().map(|(_, t)| t.clone()))
}

/// Binds the calling (test) thread to `process` with a throwaway
/// `Ptcb` identity, so `exec`/`create_thread` calls made directly from
/// a `#[test]` body see a `current_process()` to inherit from. Real
/// kernel threads are always bound via [`bind_current`] from inside a
/// spawned thread body instead.
#[cfg(test)]
pub(crate) fn bind_current_for_test(process: Arc<Process>) {
    let ptcb = crate::thread::test_handle(&process);
    bind_current(process, ptcb);
}

/// Spawns a kernel thread: a real OS thread running `body`, which is
/// expected to call [`bind_current`] before doing any work.
///
/// This realizes the scheduler's `spawn_thread(pcb, entry)` contract.
pub(crate) fn spawn_thread<F>(body: F)
where
    F: FnOnce() + Send + 'static,
{
    std::thread::spawn(body);
}
