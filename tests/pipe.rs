// SPDX-License-Identifier: MPL-2.0

//! Pipe scenarios exercised through the public `syscall` surface (as an
//! external caller drives the crate), beyond the in-module unit tests
//! in `src/pipe.rs`.

mod common;

use std::time::Duration;

use tinykernel_core::process::Process;
use tinykernel_core::syscall::{self, PipeT};

/// A single process opens a pipe to itself, writes, then reads back;
/// folds pass/fail into its own exit status.
fn self_pipe_round_trip(_args: &[u8]) -> i32 {
    let mut ends = PipeT::default();
    if syscall::pipe(&mut ends) != 0 {
        return 1;
    }

    if syscall::write(ends.write_fid, b"hello") != 5 {
        return 2;
    }

    let mut buf = [0u8; 5];
    if syscall::read(ends.read_fid, &mut buf) != 5 || &buf != b"hello" {
        return 3;
    }

    if syscall::close(ends.write_fid) != 0 {
        return 4;
    }

    // Reader sees EOF (0 bytes) once the writer side is closed and the
    // buffer has been drained.
    let mut eof = [0u8; 1];
    if syscall::read(ends.read_fid, &mut eof) != 0 {
        return 5;
    }

    if syscall::close(ends.read_fid) != 0 {
        return 6;
    }
    0
}

#[test]
fn pipe_round_trip_via_syscalls() {
    let harness = Process::exec(self_pipe_round_trip, Vec::new()).unwrap();
    let status = common::wait_until_exited(&harness, Duration::from_secs(2));
    assert_eq!(status, 0);
}

/// Writing past a closed read end reports failure rather than blocking
/// forever.
fn write_after_reader_closed(_args: &[u8]) -> i32 {
    let mut ends = PipeT::default();
    if syscall::pipe(&mut ends) != 0 {
        return 1;
    }
    if syscall::close(ends.read_fid) != 0 {
        return 2;
    }
    if syscall::write(ends.write_fid, b"x") != -1 {
        return 3;
    }
    0
}

#[test]
fn write_after_reader_closed_fails() {
    let harness = Process::exec(write_after_reader_closed, Vec::new()).unwrap();
    let status = common::wait_until_exited(&harness, Duration::from_secs(2));
    assert_eq!(status, 0);
}
