// SPDX-License-Identifier: MPL-2.0

//! Process-info stream: a readable stream iterating snapshots of the
//! process table, one `procinfo` record per `read` call. The wire
//! layout is hand-serialized (`to_le_bytes` field by field) since it's
//! a single fixed-layout struct with no other consumer that would
//! justify a derive-macro dependency.

use getset::Getters;

use crate::constants::MAX_PROC;
use crate::fcb::StreamOps;
use crate::prelude::*;
use crate::process::{self, Pid};

/// `procinfo` record: one process table snapshot.
#[derive(Debug, Clone, Getters)]
#[getset(get = "pub")]
pub struct ProcInfo {
    pid: Pid,
    ppid: Pid,
    alive: bool,
    thread_count: u32,
    main_task: usize,
    argl: i32,
    args: Vec<u8>,
}

impl ProcInfo {
    /// Fixed-size header portion, followed by `argl` bytes of `args`.
    const HEADER_LEN: usize = 4 + 4 + 1 + 4 + 8 + 4;

    fn from_process(p: &Arc<process::Process>) -> ProcInfo {
        ProcInfo {
            pid: p.pid(),
            ppid: p.ppid(),
            alive: p.is_alive(),
            thread_count: p.num_threads() as u32,
            main_task: p.main_task() as usize,
            argl: p.argl(),
            args: p.args().to_vec(),
        }
    }

    fn encoded_len(&self) -> usize {
        Self::HEADER_LEN + self.args.len()
    }

    fn encode_into(&self, buf: &mut [u8]) -> usize {
        let len = self.encoded_len();
        if buf.len() < len {
            return 0;
        }
        let mut at = 0;
        buf[at..at + 4].copy_from_slice(&self.pid.to_le_bytes());
        at += 4;
        buf[at..at + 4].copy_from_slice(&self.ppid.to_le_bytes());
        at += 4;
        buf[at] = self.alive as u8;
        at += 1;
        buf[at..at + 4].copy_from_slice(&self.thread_count.to_le_bytes());
        at += 4;
        buf[at..at + 8].copy_from_slice(&(self.main_task as u64).to_le_bytes());
        at += 8;
        buf[at..at + 4].copy_from_slice(&self.argl.to_le_bytes());
        at += 4;
        buf[at..at + self.args.len()].copy_from_slice(&self.args);
        at + self.args.len()
    }
}

/// `open_info()`'s opaque object: just a cursor over `[0, MAX_PROC)`.
pub struct ProcInfoStream {
    next_pid: Mutex<Pid>,
}

impl ProcInfoStream {
    pub fn new() -> Arc<ProcInfoStream> {
        Arc::new(ProcInfoStream {
            next_pid: Mutex::new(0),
        })
    }
}

impl StreamOps for ProcInfoStream {
    /// Copies one `procinfo` record into `buf`, advancing `next_pid`.
    /// Returns `0` (not an error) at the first `FREE` slot or once
    /// `next_pid >= MAX_PROC` — enumeration stops at the first gap
    /// rather than skipping over it.
    fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let mut next = self.next_pid.lock().unwrap();
        if *next >= MAX_PROC as Pid {
            return Ok(0);
        }
        let Some(process) = process::table::get(*next) else {
            return Ok(0);
        };
        let info = ProcInfo::from_process(&process);
        let written = info.encode_into(buf);
        if written == 0 {
            return_errno_with_message!(Errno::EINVAL, "buffer too small for a procinfo record");
        }
        *next += 1;
        Ok(written)
    }

    fn write(&self, _buf: &[u8]) -> Result<usize> {
        return_errno_with_message!(Errno::EINVAL, "process-info stream is read-only")
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// `OpenInfo() → Fid`'s object-allocation half.
pub fn open_info() -> Arc<ProcInfoStream> {
    ProcInfoStream::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_yields_a_record_for_the_current_process() {
        let me = process::Process::exec(|_| 0, b"hi".to_vec()).unwrap();
        crate::sched::bind_current_for_test(me.clone());

        let stream = ProcInfoStream::new();
        // Point the cursor directly at this process's own slot rather
        // than scanning from 0: other tests sharing the global process
        // table may have left earlier slots `FREE`, which legitimately
        // stops a from-the-start scan short.
        *stream.next_pid.lock().unwrap() = me.pid();

        let mut buf = [0u8; 256];
        let n = stream.read(&mut buf).unwrap();
        assert!(n > 0);
        let pid = i32::from_le_bytes(buf[0..4].try_into().unwrap());
        let argl = i32::from_le_bytes(buf[21..25].try_into().unwrap());
        assert_eq!(pid, me.pid());
        assert_eq!(argl, 2);
        assert_eq!(&buf[25..25 + 2], b"hi");

        // The next read advances past this process and (absent other
        // concurrently-executing tests at that exact slot) eventually
        // hits the end of the table or a free slot; either way it must
        // not return this same record again.
        let n2 = stream.read(&mut buf).unwrap();
        if n2 > 0 {
            let pid2 = i32::from_le_bytes(buf[0..4].try_into().unwrap());
            assert_ne!(pid2, me.pid());
        }
    }
}
