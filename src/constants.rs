// SPDX-License-Identifier: MPL-2.0

//! Kernel-wide tunables and sentinel values.

/// Number of entries in the process table.
pub const MAX_PROC: usize = 64;

/// Number of file descriptor slots in a process's file table.
pub const MAX_FILEID: usize = 64;

/// Highest legal port number; valid ports are `0..=MAX_PORT`.
pub const MAX_PORT: i32 = 1023;

/// Capacity, in bytes, of a pipe's circular buffer.
pub const CAP: usize = 4096;

/// Sentinel returned in place of a `Pid` when there is no such process.
pub const NOPROC: i32 = -1;

/// Sentinel returned in place of a `Fid` when there is no such file.
pub const NOFILE: i32 = -1;

/// Sentinel meaning "this socket is not bound to any port."
pub const NOPORT: i32 = -1;

/// Sentinel value for a closed pipe endpoint.
pub const CLOSED: i32 = -1;

/// Pid of the init process. Pids `0` and `1` have no parent.
pub const INIT_PID: i32 = 1;
