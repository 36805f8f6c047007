// SPDX-License-Identifier: MPL-2.0

//! Process lifecycle scenarios: exec, reaping via `WaitChild`, and
//! parentage of processes execed from an unbound thread.

mod common;

use std::time::Duration;

use tinykernel_core::constants::NOPROC;
use tinykernel_core::process::Process;

fn child_exits_with_42(_args: &[u8]) -> i32 {
    42
}

/// Spawns a child, reaps it via `WaitChild`, and folds the whole
/// scenario into its own exit status so the outer test can observe it
/// without needing a process of its own to park on `child_exit`.
fn reaping_scenario(_args: &[u8]) -> i32 {
    let child_pid = tinykernel_core::syscall::exec(child_exits_with_42, Vec::new());
    if child_pid == NOPROC {
        return 1;
    }

    let mut status = 0;
    let reaped = tinykernel_core::syscall::wait_child(NOPROC, &mut status);
    if reaped != child_pid || status != 42 {
        return 2;
    }

    // A second WaitChild(NOPROC) must fail now: no children remain.
    let mut discard = 0;
    let second = tinykernel_core::syscall::wait_child(NOPROC, &mut discard);
    if second != NOPROC {
        return 3;
    }
    0
}

#[test]
fn waitchild_reaps_exited_child_exactly_once() {
    let harness = Process::exec(reaping_scenario, Vec::new()).unwrap();
    let status = common::wait_until_exited(&harness, Duration::from_secs(2));
    assert_eq!(status, 0);
}

fn sleepy_child(_args: &[u8]) -> i32 {
    std::thread::sleep(Duration::from_millis(30));
    7
}

/// `WaitChild` on a specific, already-exited child returns immediately
/// with its status rather than blocking.
fn wait_specific_child(_args: &[u8]) -> i32 {
    let child_pid = tinykernel_core::syscall::exec(sleepy_child, Vec::new());
    std::thread::sleep(Duration::from_millis(60));

    let mut status = 0;
    let reaped = tinykernel_core::syscall::wait_child(child_pid, &mut status);
    if reaped == child_pid && status == 7 {
        0
    } else {
        1
    }
}

#[test]
fn waitchild_on_specific_pid() {
    let harness = Process::exec(wait_specific_child, Vec::new()).unwrap();
    let status = common::wait_until_exited(&harness, Duration::from_secs(2));
    assert_eq!(status, 0);
}

#[test]
fn exec_from_an_unbound_thread_has_no_parent() {
    // The test harness thread itself isn't bound to any process, so a
    // process execed directly from a `#[test]` body always comes up
    // parentless regardless of the pid the table hands it.
    let process = Process::exec(|_| 0, Vec::new()).unwrap();
    assert_eq!(process.ppid(), NOPROC);
    common::wait_until_exited(&process, Duration::from_secs(1));
}
