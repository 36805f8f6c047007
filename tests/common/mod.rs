// SPDX-License-Identifier: MPL-2.0

//! Shared helpers for the integration tests below. These drive the
//! crate the way an external caller would: through `Process::exec` and
//! the `syscall` surface, never by reaching into crate internals.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tinykernel_core::process::Process;

/// Polls `process` until it leaves `ALIVE`, or panics after `timeout`.
/// Stands in for the condition-variable wait a real parent would do
/// through `wait_child`; used here for a process with no parent of its
/// own (the test harness itself isn't a kernel process).
pub fn wait_until_exited(process: &Arc<Process>, timeout: Duration) -> i32 {
    let deadline = Instant::now() + timeout;
    while process.is_alive() {
        if Instant::now() > deadline {
            panic!("process {} did not exit within {:?}", process.pid(), timeout);
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    process.exitval()
}
