// SPDX-License-Identifier: MPL-2.0

//! Thread Control Block pair: the scheduler-visible TCB, stood in for
//! by a real OS thread, and the user-visible, joinable `Ptcb` this
//! module defines. `Tid` allocation is a simple atomic counter; the
//! global tid lookup table lives in `table.rs`. The join/detach/
//! ref-count protocol is built directly on a `Condvar`, the same
//! monitor-style wait every other blocking point in this crate uses.

pub mod table;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Condvar;

use crate::process::Process;
use crate::prelude::*;

/// Thread id, opaque to callers. `NOTID` joins the crate's other
/// sentinels (`NOPROC`/`NOFILE`/`NOPORT`) so call sites have an
/// explicit "no such thread" value to compare against instead of an
/// arbitrary `-1` written ad hoc.
pub type Tid = i64;
pub const NOTID: Tid = -1;

/// A kernel task entry point: given the process's argument bytes,
/// returns its exit status. Used both as the `procinfo.main_task`
/// function pointer and as the `task` parameter of `Exec`/
/// `CreateThread`.
pub type Task = fn(args: &[u8]) -> i32;

static TID_ALLOCATOR: AtomicI64 = AtomicI64::new(1);

fn allocate_tid() -> Tid {
    TID_ALLOCATOR.fetch_add(1, Ordering::SeqCst)
}

struct PtcbState {
    exit_value: i32,
    exited: bool,
    detached: bool,
    /// Number of callers currently inside `join` for this PTCB.
    ref_cnt: usize,
}

/// Signal thrown by an explicit `thread_exit` call so the spawned OS
/// thread unwinds out of the user task immediately, enforcing
/// `ThreadExit`'s "never returns" contract. The thread-body wrapper
/// catches it and treats it exactly like a normal return of `status`.
struct ThreadExitSignal(i32);

/// Thread Control Block, the user-visible joinable handle.
pub struct Ptcb {
    tid: Tid,
    pcb: Weak<Process>,
    task: Task,
    args: Vec<u8>,
    is_main: bool,
    state: Mutex<PtcbState>,
    join_cv: Condvar,
}

impl Ptcb {
    pub fn tid(&self) -> Tid {
        self.tid
    }

    pub fn is_main(&self) -> bool {
        self.is_main
    }

    fn has_active_joiner(&self) -> bool {
        self.state.lock().unwrap().ref_cnt > 0
    }
}

fn new_ptcb(pcb: &Arc<Process>, task: Task, args: Vec<u8>, is_main: bool) -> Arc<Ptcb> {
    Arc::new(Ptcb {
        tid: allocate_tid(),
        pcb: Arc::downgrade(pcb),
        task,
        args,
        is_main,
        state: Mutex::new(PtcbState {
            exit_value: 0,
            exited: false,
            detached: false,
            ref_cnt: 0,
        }),
        join_cv: Condvar::new(),
    })
}

/// Bookkeeping shared by every exit path: explicit `thread_exit`, a
/// task returning normally, and `Process::exit` finishing off the
/// calling thread. Idempotent, since both a normal return *and* an
/// explicit `thread_exit` call can reach it for the same `Ptcb` (the
/// latter unwinds through the former's wrapper).
fn exit_bookkeeping(ptcb: &Arc<Ptcb>, status: i32) {
    let already_exited = {
        let mut state = ptcb.state.lock().unwrap();
        if state.exited {
            true
        } else {
            state.exit_value = status;
            state.exited = true;
            false
        }
    };
    if already_exited {
        return;
    }
    ptcb.join_cv.notify_all();

    if let Some(pcb) = ptcb.pcb.upgrade() {
        if ptcb.is_main {
            pcb.set_exitval(status);
        }
        if pcb.dec_num_threads() == 0 {
            pcb.free_unjoined_ptcbs();
        }
    }
}

/// Called by `Process::exit` for the thread that invoked it, finishing
/// off that thread's `Ptcb` the same way `ThreadExit` would.
pub(crate) fn finish_current(ptcb: &Arc<Ptcb>, status: i32) {
    exit_bookkeeping(ptcb, status);
}

fn run_task_body(
    process: Arc<Process>,
    ptcb: Arc<Ptcb>,
    on_finish: impl FnOnce(Arc<Process>, Arc<Ptcb>, i32),
) {
    crate::sched::bind_current(process.clone(), ptcb.clone());
    let task = ptcb.task;
    let args = ptcb.args.clone();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| task(&args)));
    let status = match outcome {
        Ok(status) => status,
        Err(payload) => match payload.downcast::<ThreadExitSignal>() {
            Ok(signal) => signal.0,
            Err(payload) => {
                error!("thread {} of pid {} panicked", ptcb.tid(), process.pid());
                panic::resume_unwind(payload)
            }
        },
    };
    on_finish(process, ptcb, status);
}

/// Spawns a process's main thread. Used only by `Process::exec`.
pub(crate) fn spawn_main(process: Arc<Process>) -> Arc<Ptcb> {
    let ptcb = new_ptcb(&process, process.main_task(), process.args().to_vec(), true);
    table::add_thread(ptcb.clone());
    process.add_ptcb(ptcb.clone());

    let proc_for_body = process.clone();
    let ptcb_for_body = ptcb.clone();
    crate::sched::spawn_thread(move || {
        run_task_body(proc_for_body, ptcb_for_body, |process, _ptcb, status| {
            let _ = process.exit(status);
        });
    });
    ptcb
}

/// `create_thread(task, argl, args) → tid`.
pub fn create_thread(task: Task, args: Vec<u8>) -> Result<Tid> {
    let process = crate::process::current();
    let ptcb = new_ptcb(&process, task, args, false);
    table::add_thread(ptcb.clone());
    process.add_ptcb(ptcb.clone());

    let proc_for_body = process.clone();
    let ptcb_for_body = ptcb.clone();
    crate::sched::spawn_thread(move || {
        run_task_body(proc_for_body, ptcb_for_body, |_process, ptcb, status| {
            exit_bookkeeping(&ptcb, status);
        });
    });
    Ok(ptcb.tid())
}

/// `self() → tid`.
pub fn current() -> Arc<Ptcb> {
    crate::sched::current_thread().expect("no current thread bound to this OS thread")
}

pub fn thread_self() -> Tid {
    crate::sched::current_thread().map(|t| t.tid()).unwrap_or(NOTID)
}

/// `join(tid, &exitval)`.
pub fn join(tid: Tid, exit_value: Option<&mut i32>) -> Result<()> {
    let target = table::get_thread(tid).ok_or_else(|| Error::new(Errno::ESRCH))?;
    let current_pid = crate::process::current().pid();
    let target_pid = target
        .pcb
        .upgrade()
        .map(|p| p.pid())
        .ok_or_else(|| Error::new(Errno::ESRCH))?;
    if target_pid != current_pid {
        return_errno_with_message!(Errno::EINVAL, "cannot join a thread of another process");
    }

    let mut state = target.state.lock().unwrap();
    if state.detached {
        return_errno_with_message!(Errno::EINVAL, "thread is detached");
    }
    if state.exited {
        if let Some(ev) = exit_value {
            *ev = state.exit_value;
        }
        drop(state);
        table::remove_thread(tid);
        if let Some(pcb) = target.pcb.upgrade() {
            pcb.remove_ptcb(tid);
        }
        return Ok(());
    }

    state.ref_cnt += 1;
    let mut state = target
        .join_cv
        .wait_while(state, |s| !s.exited && !s.detached)
        .unwrap();
    if state.detached {
        state.ref_cnt -= 1;
        return_errno_with_message!(Errno::EINVAL, "thread was detached while joining");
    }
    if let Some(ev) = exit_value {
        *ev = state.exit_value;
    }
    state.ref_cnt -= 1;
    let should_free = state.ref_cnt == 0;
    drop(state);
    if should_free {
        table::remove_thread(tid);
        if let Some(pcb) = target.pcb.upgrade() {
            pcb.remove_ptcb(tid);
        }
    }
    Ok(())
}

/// `detach(tid)`.
pub fn detach(tid: Tid) -> Result<()> {
    let target = table::get_thread(tid).ok_or_else(|| Error::new(Errno::ESRCH))?;
    let current_pid = crate::process::current().pid();
    let target_pid = target
        .pcb
        .upgrade()
        .map(|p| p.pid())
        .ok_or_else(|| Error::new(Errno::ESRCH))?;
    if target_pid != current_pid {
        return_errno_with_message!(Errno::EINVAL, "cannot detach a thread of another process");
    }

    let mut state = target.state.lock().unwrap();
    if state.exited {
        return_errno_with_message!(Errno::EINVAL, "thread has already exited");
    }
    state.detached = true;
    drop(state);
    target.join_cv.notify_all();
    Ok(())
}

/// Test-only identity handle, used by `sched::bind_current_for_test` so
/// a `#[test]` body can stand in as a bound kernel thread without
/// actually spawning one.
#[cfg(test)]
pub(crate) fn test_handle(pcb: &Arc<Process>) -> Arc<Ptcb> {
    new_ptcb(pcb, pcb.main_task(), Vec::new(), false)
}

/// `thread_exit(status)`. Never returns: unwinds the
/// spawned OS thread out of the running task.
pub fn thread_exit(status: i32) -> ! {
    if let Some(ptcb) = crate::sched::current_thread() {
        if ptcb.is_main {
            if let Some(pcb) = ptcb.pcb.upgrade() {
                let _ = pcb.exit(status);
            }
        } else {
            exit_bookkeeping(&ptcb, status);
        }
    }
    panic::panic_any(ThreadExitSignal(status))
}
