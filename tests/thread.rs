// SPDX-License-Identifier: MPL-2.0

//! Thread lifecycle scenarios, including detach letting a thread clean
//! up without a joiner, driven from inside a single process's main
//! task since `create_thread`/`thread_join` require a bound current
//! process.

mod common;

use std::time::Duration;

use tinykernel_core::process::Process;
use tinykernel_core::syscall;
use tinykernel_core::thread::NOTID;

fn worker_returns_99(_args: &[u8]) -> i32 {
    99
}

fn join_scenario(_args: &[u8]) -> i32 {
    let tid = syscall::create_thread(worker_returns_99, Vec::new());
    if tid == NOTID {
        return 1;
    }

    let mut exit_value = 0;
    if syscall::thread_join(tid, &mut exit_value) != 0 {
        return 2;
    }
    if exit_value != 99 {
        return 3;
    }

    // Joining the same tid again must fail: the PTCB was freed once
    // the joiner's ref count dropped to zero.
    let mut discard = 0;
    if syscall::thread_join(tid, &mut discard) == 0 {
        return 4;
    }
    0
}

#[test]
fn create_thread_then_join_observes_exit_status() {
    let harness = Process::exec(join_scenario, Vec::new()).unwrap();
    let status = common::wait_until_exited(&harness, Duration::from_secs(2));
    assert_eq!(status, 0);
}

fn worker_sleeps(_args: &[u8]) -> i32 {
    std::thread::sleep(Duration::from_millis(30));
    5
}

/// A detached thread exits on its own; nothing joins it, and the
/// owning process's thread count still drops to zero so the process
/// can exit normally once its main task returns.
fn detach_scenario(_args: &[u8]) -> i32 {
    let tid = syscall::create_thread(worker_sleeps, Vec::new());
    if tid == NOTID {
        return 1;
    }
    if syscall::thread_detach(tid) != 0 {
        return 2;
    }
    // Give the detached thread time to finish before this task
    // returns and the process starts tearing down.
    std::thread::sleep(Duration::from_millis(80));
    0
}

#[test]
fn detach_allows_thread_to_clean_up_unjoined() {
    let harness = Process::exec(detach_scenario, Vec::new()).unwrap();
    let status = common::wait_until_exited(&harness, Duration::from_secs(2));
    assert_eq!(status, 0);
}

fn worker_reports_thread_self(_args: &[u8]) -> i32 {
    syscall::thread_self() as i32
}

/// The spawned thread's own `thread_self()` differs from its creator's
/// and from `NOTID`.
fn thread_self_scenario(_args: &[u8]) -> i32 {
    let own_tid = syscall::thread_self();
    if own_tid == NOTID {
        return 1;
    }
    let child_tid = syscall::create_thread(worker_reports_thread_self, Vec::new());
    if child_tid == NOTID || child_tid == own_tid {
        return 2;
    }

    let mut reported = 0;
    if syscall::thread_join(child_tid, &mut reported) != 0 {
        return 3;
    }
    if reported as i64 != child_tid {
        return 4;
    }
    0
}

#[test]
fn thread_self_identifies_the_calling_thread() {
    let harness = Process::exec(thread_self_scenario, Vec::new()).unwrap();
    let status = common::wait_until_exited(&harness, Duration::from_secs(2));
    assert_eq!(status, 0);
}
