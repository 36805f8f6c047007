// SPDX-License-Identifier: MPL-2.0

//! Socket state sum type: `{Unbound, Listening, Peer, Closed}` modeled
//! so that each variant only carries the fields that actually apply to
//! it, rather than a separate tag plus a union of payloads.

use std::collections::VecDeque;
use std::sync::Weak;

use crate::pipe::{PipeReader, PipeWriter};
use crate::prelude::*;
use crate::socket::request::ConnRequest;
use crate::socket::Socket;

pub(crate) enum SocketState {
    Unbound,
    Listening(ListenerState),
    Peer(PeerState),
    Closed,
}

pub(crate) struct ListenerState {
    pub(crate) queue: VecDeque<Arc<ConnRequest>>,
}

impl ListenerState {
    pub(crate) fn new() -> Self {
        ListenerState {
            queue: VecDeque::new(),
        }
    }
}

pub(crate) struct PeerState {
    pub(crate) send: Arc<PipeWriter>,
    pub(crate) recv: Arc<PipeReader>,
    pub(crate) peer: Weak<Socket>,
    pub(crate) can_read: bool,
    pub(crate) can_write: bool,
}
