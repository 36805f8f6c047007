// SPDX-License-Identifier: MPL-2.0

//! Process table: a fixed-capacity slot array of PCBs with an explicit
//! free list of available indices, drawn from on `exec` and returned
//! to the list once a parent reaps a zombie child.

use lazy_static::lazy_static;

use crate::constants::MAX_PROC;
use crate::prelude::*;
use crate::process::{Pid, Process};

struct Table {
    slots: Vec<Option<Arc<Process>>>,
    free: Vec<usize>,
}

impl Table {
    fn new() -> Self {
        let mut slots = Vec::with_capacity(MAX_PROC);
        slots.resize_with(MAX_PROC, || None);
        // Popped in ascending order, so the first processes created
        // (the scheduler and init, pid 0 and 1) land
        // on the low end of the table.
        let free = (0..MAX_PROC).rev().collect();
        Table { slots, free }
    }
}

lazy_static! {
    static ref PROCESS_TABLE: Mutex<Table> = Mutex::new(Table::new());
}

/// Draws a free slot and installs whatever `Process` `build` produces
/// for that `Pid`. Fails with `EAGAIN` if the table is saturated.
pub(crate) fn allocate(build: impl FnOnce(Pid) -> Arc<Process>) -> Result<Arc<Process>> {
    let mut table = PROCESS_TABLE.lock().unwrap();
    let idx = table.free.pop().ok_or_else(|| {
        warn!("process table full at {} entries", MAX_PROC);
        Error::with_message(Errno::EAGAIN, "process table full")
    })?;
    let process = build(idx as Pid);
    table.slots[idx] = Some(process.clone());
    Ok(process)
}

pub(crate) fn get(pid: Pid) -> Option<Arc<Process>> {
    let table = PROCESS_TABLE.lock().unwrap();
    table.slots.get(pid as usize).and_then(|slot| slot.clone())
}

/// Returns a reaped PCB's slot to the free list.
pub(crate) fn free(pid: Pid) {
    let mut table = PROCESS_TABLE.lock().unwrap();
    if let Some(slot) = table.slots.get_mut(pid as usize) {
        *slot = None;
    }
    table.free.push(pid as usize);
}
