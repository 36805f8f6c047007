// SPDX-License-Identifier: MPL-2.0

//! Global tid -> Ptcb lookup table, backing `join`/`detach`'s lookup
//! of a thread handle by its opaque `Tid`.

use std::collections::BTreeMap;

use lazy_static::lazy_static;

use crate::prelude::*;
use crate::thread::{Ptcb, Tid};

lazy_static! {
    static ref THREAD_TABLE: Mutex<BTreeMap<Tid, Arc<Ptcb>>> = Mutex::new(BTreeMap::new());
}

pub(crate) fn add_thread(ptcb: Arc<Ptcb>) {
    THREAD_TABLE.lock().unwrap().insert(ptcb.tid(), ptcb);
}

pub(crate) fn remove_thread(tid: Tid) {
    THREAD_TABLE.lock().unwrap().remove(&tid);
}

pub(crate) fn get_thread(tid: Tid) -> Option<Arc<Ptcb>> {
    THREAD_TABLE.lock().unwrap().get(&tid).cloned()
}
