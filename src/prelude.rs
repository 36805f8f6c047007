// SPDX-License-Identifier: MPL-2.0

//! Common imports shared by every module in this crate.

pub(crate) use std::sync::{Arc, Mutex, Weak};

pub(crate) use log::{debug, error, info, warn};

pub(crate) use crate::error::{Errno, Error};
pub(crate) use crate::{return_errno, return_errno_with_message};

pub(crate) type Result<T> = core::result::Result<T, Error>;

/// Returns the `Process` running on the calling OS thread.
#[macro_export]
macro_rules! current {
    () => {
        $crate::process::current()
    };
}

/// Returns the `Ptcb` (thread handle) running on the calling OS thread.
#[macro_export]
macro_rules! current_thread {
    () => {
        $crate::thread::current()
    };
}

pub(crate) use crate::{current, current_thread};
