// SPDX-License-Identifier: MPL-2.0

//! Connection request: the handshake object a connector enqueues on a
//! listener's queue while waiting for `accept` to claim it.
//!
//! The connector is the sole owner of its request: the listener only
//! ever links and unlinks the shared `Arc<ConnRequest>`, it never
//! allocates or is responsible for freeing one.

use std::sync::Condvar;

use crate::prelude::*;
use crate::socket::Socket;

pub(crate) struct ConnRequest {
    /// The connecting (client-side) socket. Kept alive for the
    /// duration of the handshake by this `Arc`; the connector itself
    /// also holds a clone on its stack, so the request never outlives
    /// the `connect()` call that owns it.
    pub(crate) connector: Arc<Socket>,
    accepted: Mutex<bool>,
    conn_cv: Condvar,
}

impl ConnRequest {
    pub(crate) fn new(connector: Arc<Socket>) -> Arc<ConnRequest> {
        Arc::new(ConnRequest {
            connector,
            accepted: Mutex::new(false),
            conn_cv: Condvar::new(),
        })
    }

    /// Marks the request accepted and wakes the connector. Called by
    /// `accept` while holding no other socket's state lock.
    pub(crate) fn mark_accepted(&self) {
        *self.accepted.lock().unwrap() = true;
        self.conn_cv.notify_all();
    }

    /// Wakes any connector waiting on this request without marking it
    /// accepted, used when a listener closes with requests still
    /// queued: the connector wakes, observes `accepted == false`, and
    /// reports failure.
    pub(crate) fn wake_unaccepted(&self) {
        self.conn_cv.notify_all();
    }

    /// Blocks the connector until either the request is accepted or
    /// `timeout` elapses. Returns `true` iff accepted.
    pub(crate) fn wait_timeout(&self, timeout: std::time::Duration) -> bool {
        let guard = self.accepted.lock().unwrap();
        let (guard, _) = self
            .conn_cv
            .wait_timeout_while(guard, timeout, |accepted| !*accepted)
            .unwrap();
        *guard
    }
}
