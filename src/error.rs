// SPDX-License-Identifier: MPL-2.0

//! Error number and error type used throughout this crate.
//!
//! A C-errno-flavored enum plus a small error struct carrying an
//! optional static message.

/// Error number, a small subset of the POSIX errno space that this
/// core actually returns.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Errno {
    EPERM = 1,   /* Operation not permitted */
    ESRCH = 3,   /* No such process */
    EBADF = 9,   /* Bad file number */
    ECHILD = 10, /* No child processes */
    EAGAIN = 11, /* Try again */
    EINVAL = 22, /* Invalid argument */
    ENFILE = 23, /* File table overflow */
    EMFILE = 24, /* Too many open files */
    EPIPE = 32,  /* Broken pipe */
    ENOSYS = 38, /* Invalid system call number */

    ENOTCONN = 107,    /* Transport endpoint is not connected */
    EISCONN = 106,     /* Transport endpoint is already connected */
    EADDRINUSE = 98,   /* Address already in use */
    ECONNREFUSED = 111, /* Connection refused */
    ETIMEDOUT = 110,   /* Connection timed out */
}

/// Error used in this crate.
#[derive(Debug, Clone, Copy)]
pub struct Error {
    errno: Errno,
    msg: Option<&'static str>,
}

impl Error {
    pub const fn new(errno: Errno) -> Self {
        Error { errno, msg: None }
    }

    pub const fn with_message(errno: Errno, msg: &'static str) -> Self {
        Error {
            errno,
            msg: Some(msg),
        }
    }

    pub const fn error(&self) -> Errno {
        self.errno
    }

    pub fn message(&self) -> Option<&'static str> {
        self.msg
    }
}

impl From<Errno> for Error {
    fn from(errno: Errno) -> Self {
        Error::new(errno)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.msg {
            Some(msg) => write!(f, "{:?}: {}", self.errno, msg),
            None => write!(f, "{:?}", self.errno),
        }
    }
}

impl std::error::Error for Error {}

#[macro_export]
macro_rules! return_errno {
    ($errno:expr) => {
        return Err($crate::error::Error::new($errno))
    };
}

#[macro_export]
macro_rules! return_errno_with_message {
    ($errno:expr, $message:expr) => {
        return Err($crate::error::Error::with_message($errno, $message))
    };
}
