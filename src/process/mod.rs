// SPDX-License-Identifier: MPL-2.0

//! Process Control Block and process lifecycle: immutable identity
//! (pid, parent) plus `Mutex`-guarded mutable parts (children, exit
//! status, open files, threads). `Process::exit` drains init's
//! children, reparents orphans to init, and notifies whichever parent
//! is waiting via the `child_exit` condition variable.

pub mod table;

use std::sync::Condvar;

use crate::constants::{INIT_PID, MAX_PROC, NOPROC};
use crate::fcb::FileTable;
use crate::prelude::*;
use crate::thread::{self, Ptcb, Task, Tid};

/// Process id: an index into the process table.
pub type Pid = i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcState {
    Alive,
    Zombie,
}

/// The two lists a PCB keeps track of for its children:
/// `children_list` (still-running children) and `exited_list`
/// (children that have exited but not yet been reaped). Kept together
/// under one lock so `wait_child`'s condition variable has a single
/// predicate to watch.
struct Children {
    alive: Vec<Arc<Process>>,
    zombies: Vec<Arc<Process>>,
}

/// Process Control Block.
pub struct Process {
    pid: Pid,
    parent: Mutex<Option<Weak<Process>>>,
    children: Mutex<Children>,
    child_exit: Condvar,
    state: Mutex<ProcState>,
    exitval: Mutex<i32>,
    file_table: FileTable,
    main_task: Task,
    argl: i32,
    args: Vec<u8>,
    ptcbs: Mutex<Vec<Arc<Ptcb>>>,
    num_threads: Mutex<usize>,
    main_thread: Mutex<Option<Arc<Ptcb>>>,
}

impl Process {
    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn ppid(&self) -> Pid {
        self.parent
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|p| p.upgrade())
            .map(|p| p.pid())
            .unwrap_or(NOPROC)
    }

    pub fn is_alive(&self) -> bool {
        *self.state.lock().unwrap() == ProcState::Alive
    }

    pub fn exitval(&self) -> i32 {
        *self.exitval.lock().unwrap()
    }

    pub fn num_threads(&self) -> usize {
        *self.num_threads.lock().unwrap()
    }

    pub fn main_task(&self) -> Task {
        self.main_task
    }

    pub fn argl(&self) -> i32 {
        self.argl
    }

    pub fn args(&self) -> &[u8] {
        &self.args
    }

    pub fn file_table(&self) -> &FileTable {
        &self.file_table
    }

    pub(crate) fn add_ptcb(&self, ptcb: Arc<Ptcb>) {
        self.ptcbs.lock().unwrap().push(ptcb);
        *self.num_threads.lock().unwrap() += 1;
    }

    pub(crate) fn set_main_thread(&self, ptcb: Arc<Ptcb>) {
        *self.main_thread.lock().unwrap() = Some(ptcb);
    }

    pub(crate) fn set_exitval(&self, status: i32) {
        *self.exitval.lock().unwrap() = status;
    }

    /// Decrements `num_threads`, returning the count left afterwards.
    /// Called once per `thread_exit`.
    pub(crate) fn dec_num_threads(&self) -> usize {
        let mut n = self.num_threads.lock().unwrap();
        *n = n.saturating_sub(1);
        *n
    }

    /// Called once a process's last thread exits: frees every PTCB
    /// still linked to the PCB. A PTCB with an active joiner
    /// (`ref_cnt > 0`) is left alone; that joiner's own cleanup removes
    /// it once it wakes.
    pub(crate) fn free_unjoined_ptcbs(&self) {
        let mut list = self.ptcbs.lock().unwrap();
        let (keep, freed): (Vec<_>, Vec<_>) =
            list.drain(..).partition(|ptcb| ptcb.has_active_joiner());
        *list = keep;
        for ptcb in freed {
            thread::table::remove_thread(ptcb.tid());
        }
    }

    pub(crate) fn remove_ptcb(&self, tid: Tid) {
        self.ptcbs.lock().unwrap().retain(|p| p.tid() != tid);
    }

    /// Allocates a fresh process running `task` as its main thread,
    /// inheriting the calling process's file table.
    pub fn exec(task: Task, args: Vec<u8>) -> Result<Arc<Process>> {
        let parent = crate::sched::current_process();
        let process = table::allocate(|pid| {
            let inherited_parent = if pid > INIT_PID { parent.clone() } else { None };
            let file_table = inherited_parent
                .as_ref()
                .map(|p| p.file_table.fork())
                .unwrap_or_default();
            Arc::new(Process {
                pid,
                parent: Mutex::new(inherited_parent.as_ref().map(Arc::downgrade)),
                children: Mutex::new(Children {
                    alive: Vec::new(),
                    zombies: Vec::new(),
                }),
                child_exit: Condvar::new(),
                state: Mutex::new(ProcState::Alive),
                exitval: Mutex::new(0),
                file_table,
                main_task: task,
                argl: args.len() as i32,
                args,
                ptcbs: Mutex::new(Vec::new()),
                num_threads: Mutex::new(0),
                main_thread: Mutex::new(None),
            })
        })?;

        if let Some(parent) = &parent {
            parent.children.lock().unwrap().alive.push(process.clone());
        }

        let main_thread = thread::spawn_main(process.clone());
        process.set_main_thread(main_thread);
        info!("exec: pid {} spawned (parent {})", process.pid, process.ppid());
        Ok(process)
    }

    /// Reaps a child (a specific `cpid`, or any child with `NOPROC`),
    /// blocking until one is available to reap.
    pub fn wait_child(self: &Arc<Process>, cpid: Pid, status: &mut i32) -> Result<Pid> {
        if cpid != NOPROC {
            if !(0..MAX_PROC as Pid).contains(&cpid) {
                return_errno_with_message!(Errno::ESRCH, "invalid child pid");
            }
            let mut children = self.children.lock().unwrap();
            loop {
                if let Some(idx) = children.zombies.iter().position(|c| c.pid() == cpid) {
                    let child = children.zombies.remove(idx);
                    *status = child.exitval();
                    table::free(cpid);
                    return Ok(cpid);
                }
                if !children.alive.iter().any(|c| c.pid() == cpid) {
                    return_errno_with_message!(Errno::ESRCH, "not a child of this process");
                }
                children = self.child_exit.wait(children).unwrap();
            }
        } else {
            let mut children = self.children.lock().unwrap();
            loop {
                if children.alive.is_empty() && children.zombies.is_empty() {
                    return_errno_with_message!(Errno::ECHILD, "no children");
                }
                if !children.zombies.is_empty() {
                    let child = children.zombies.remove(0);
                    let pid = child.pid();
                    *status = child.exitval();
                    table::free(pid);
                    return Ok(pid);
                }
                children = self.child_exit.wait(children).unwrap();
            }
        }
    }

    /// Terminates the process with `status`. Idempotent: a process
    /// that exits more than once (or whose main thread returns after
    /// an explicit exit) only tears down once.
    pub fn exit(self: &Arc<Process>, status: i32) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            if *state == ProcState::Zombie {
                return Ok(());
            }
            *state = ProcState::Zombie;
        }

        if self.pid == INIT_PID {
            let mut discard = 0;
            while self.wait_child(NOPROC, &mut discard).is_ok() {}
        }

        self.file_table.close_all();
        *self.exitval.lock().unwrap() = status;

        let (orphaned_alive, orphaned_zombies) = {
            let mut children = self.children.lock().unwrap();
            (
                std::mem::take(&mut children.alive),
                std::mem::take(&mut children.zombies),
            )
        };
        if self.pid != INIT_PID && (!orphaned_alive.is_empty() || !orphaned_zombies.is_empty()) {
            if let Some(init) = table::get(INIT_PID) {
                let mut init_children = init.children.lock().unwrap();
                for child in orphaned_alive {
                    *child.parent.lock().unwrap() = Some(Arc::downgrade(&init));
                    init_children.alive.push(child);
                }
                for child in orphaned_zombies {
                    *child.parent.lock().unwrap() = Some(Arc::downgrade(&init));
                    init_children.zombies.push(child);
                }
                drop(init_children);
                init.child_exit.notify_all();
            }
        }

        let parent = self.parent.lock().unwrap().clone().and_then(|p| p.upgrade());
        if let Some(parent) = parent {
            let mut parent_children = parent.children.lock().unwrap();
            parent_children.alive.retain(|c| c.pid() != self.pid);
            parent_children.zombies.push(self.clone());
            drop(parent_children);
            parent.child_exit.notify_all();
        }

        *self.main_thread.lock().unwrap() = None;
        debug!("exit: pid {} exited with status {}", self.pid, status);

        if let Some(current) = crate::sched::current_thread() {
            thread::finish_current(&current, status);
        }
        Ok(())
    }
}

/// Returns the calling kernel thread's `Process`. Panics if no process
/// is bound (only ever called from inside a spawned kernel thread).
pub fn current() -> Arc<Process> {
    crate::sched::current_process().expect("no current process bound to this OS thread")
}

/// Returns the calling OS thread's process id, or `NOPROC` if unbound.
pub fn get_pid() -> Pid {
    crate::sched::current_process().map(|p| p.pid()).unwrap_or(NOPROC)
}

/// Returns the calling OS thread's parent process id, or `NOPROC`.
pub fn get_ppid() -> Pid {
    crate::sched::current_process().map(|p| p.ppid()).unwrap_or(NOPROC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn child_task(_args: &[u8]) -> i32 {
        std::thread::sleep(Duration::from_millis(20));
        42
    }

    #[test]
    fn wait_child_returns_exit_status() {
        let parent = Process::exec(|_| 0, Vec::new()).unwrap();
        crate::sched::bind_current_for_test(parent.clone());

        let child = Process::exec(child_task, Vec::new()).unwrap();
        assert_eq!(child.ppid(), parent.pid());

        let mut status = 0;
        let pid = parent.wait_child(NOPROC, &mut status).unwrap();
        assert_eq!(pid, child.pid());
        assert_eq!(status, 42);

        let err = parent.wait_child(NOPROC, &mut status).unwrap_err();
        assert_eq!(err.error(), Errno::ECHILD);
    }
}
