// SPDX-License-Identifier: MPL-2.0

//! Port table: a fixed array of length `MAX_PORT + 1`, each slot
//! either empty or pointing at the listening socket currently bound to
//! that port. Process-global, since ports are a system-wide rendezvous
//! namespace rather than per-process.

use std::sync::Weak;

use lazy_static::lazy_static;

use crate::constants::MAX_PORT;
use crate::prelude::*;
use crate::socket::Socket;

lazy_static! {
    static ref PORT_TABLE: Mutex<Vec<Option<Weak<Socket>>>> = {
        let mut slots = Vec::with_capacity(MAX_PORT as usize + 1);
        slots.resize_with(MAX_PORT as usize + 1, || None);
        Mutex::new(slots)
    };
}

/// Binds `port` to `listener`. Fails with `EADDRINUSE` if another live
/// listener already occupies the slot (a `Weak` that has lost its
/// referent is treated as free, since that listener's `close` should
/// have cleared the slot but a defensive check costs nothing).
pub(crate) fn bind(port: i32, listener: &Arc<Socket>) -> Result<()> {
    let mut slots = PORT_TABLE.lock().unwrap();
    let slot = &mut slots[port as usize];
    if let Some(existing) = slot {
        if existing.upgrade().is_some() {
            return_errno_with_message!(Errno::EADDRINUSE, "port already bound");
        }
    }
    *slot = Some(Arc::downgrade(listener));
    Ok(())
}

/// Clears `port`'s binding, if it still points at `listener`. Takes a
/// bare reference rather than an `Arc` since `close` runs from a
/// `StreamOps` method that only has `&self`.
pub(crate) fn unbind(port: i32, listener: &Socket) {
    let mut slots = PORT_TABLE.lock().unwrap();
    if let Some(slot) = slots.get_mut(port as usize) {
        let still_us = slot
            .as_ref()
            .and_then(|w| w.upgrade())
            .map(|s| std::ptr::eq(Arc::as_ptr(&s), listener as *const Socket))
            .unwrap_or(false);
        if still_us {
            *slot = None;
        }
    }
}

/// Looks up the listening socket bound to `port`, if any is still
/// alive.
pub(crate) fn lookup(port: i32) -> Option<Arc<Socket>> {
    let slots = PORT_TABLE.lock().unwrap();
    slots
        .get(port as usize)
        .and_then(|s| s.as_ref())
        .and_then(|w| w.upgrade())
}
