#![forbid(unsafe_code)]

//! Deterministic program simulator for testing.
//!
//! `ProgramSimulator` runs a [`Model`] against a virtual clock. Timers fire
//! only when the test calls [`advance`](ProgramSimulator::advance); tasks run
//! either inline ([`TaskMode::Immediate`]) or wait in a queue until the test
//! completes them ([`TaskMode::Deferred`]), in any order it likes.
//!
//! # Example
//!
//! ```ignore
//! use quill_runtime::simulator::{ProgramSimulator, TaskMode};
//!
//! let mut sim = ProgramSimulator::new(model).task_mode(TaskMode::Deferred);
//! sim.send(Msg::Input("ann".into()));
//! sim.advance(Duration::from_millis(300));
//! assert_eq!(sim.pending_task_names(), vec![Some("lookup")]);
//! sim.run_task(0);
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use crate::program::{Cmd, Model, TaskSpec};

/// How the simulator treats `Cmd::Task`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskMode {
    /// Run the closure as soon as the command is executed.
    #[default]
    Immediate,
    /// Queue the closure until the test runs it.
    Deferred,
}

/// Record of a command that was executed during simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CmdRecord {
    None,
    Msg,
    Batch(usize),
    /// Timer armed with this delay.
    After(Duration),
    /// Task executed or queued, by name.
    Task(Option<String>),
}

struct ScheduledMsg<T> {
    deadline: Duration,
    seq: u64,
    msg: T,
}

struct DeferredTask<T> {
    spec: TaskSpec,
    f: Box<dyn FnOnce() -> T + Send>,
}

/// Deterministic simulator for [`Model`] testing.
pub struct ProgramSimulator<M: Model> {
    model: M,
    now: Duration,
    timers: Vec<ScheduledMsg<M::Message>>,
    next_seq: u64,
    task_mode: TaskMode,
    deferred: VecDeque<DeferredTask<M::Message>>,
    command_log: Vec<CmdRecord>,
}

impl<M: Model> ProgramSimulator<M> {
    /// Create a simulator at virtual time zero.
    pub fn new(model: M) -> Self {
        Self {
            model,
            now: Duration::ZERO,
            timers: Vec::new(),
            next_seq: 0,
            task_mode: TaskMode::Immediate,
            deferred: VecDeque::new(),
            command_log: Vec::new(),
        }
    }

    #[must_use]
    pub fn task_mode(mut self, mode: TaskMode) -> Self {
        self.task_mode = mode;
        self
    }

    /// Dispatch a message at the current virtual time.
    pub fn send(&mut self, msg: M::Message) {
        let cmd = self.model.update(msg);
        self.execute_cmd(cmd);
    }

    /// Move the virtual clock forward, firing due timers in deadline order.
    ///
    /// Timers armed while firing are honored if they fall inside the window.
    pub fn advance(&mut self, by: Duration) {
        let target = self.now + by;
        while let Some(index) = self.next_due(target) {
            let timer = self.timers.remove(index);
            self.now = timer.deadline;
            self.send(timer.msg);
        }
        self.now = target;
    }

    fn next_due(&self, target: Duration) -> Option<usize> {
        self.timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.deadline <= target)
            .min_by_key(|(_, t)| (t.deadline, t.seq))
            .map(|(i, _)| i)
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn pending_tasks(&self) -> usize {
        self.deferred.len()
    }

    /// Names of queued tasks, oldest first.
    pub fn pending_task_names(&self) -> Vec<Option<&str>> {
        self.deferred
            .iter()
            .map(|t| t.spec.name.as_deref())
            .collect()
    }

    /// Run the queued task at `index` and feed its result to the model.
    ///
    /// Returns `false` if there is no such task.
    pub fn run_task(&mut self, index: usize) -> bool {
        let Some(task) = self.deferred.remove(index) else {
            return false;
        };
        let msg = (task.f)();
        self.send(msg);
        true
    }

    /// Run queued tasks oldest first until none are left, including tasks
    /// queued by the results of earlier ones.
    pub fn run_all_tasks(&mut self) -> usize {
        let mut ran = 0;
        while self.run_task(0) {
            ran += 1;
        }
        ran
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn command_log(&self) -> &[CmdRecord] {
        &self.command_log
    }

    fn execute_cmd(&mut self, cmd: Cmd<M::Message>) {
        match cmd {
            Cmd::None => self.command_log.push(CmdRecord::None),
            Cmd::Msg(m) => {
                self.command_log.push(CmdRecord::Msg);
                self.send(m);
            }
            Cmd::Batch(cmds) => {
                self.command_log.push(CmdRecord::Batch(cmds.len()));
                for c in cmds {
                    self.execute_cmd(c);
                }
            }
            Cmd::After(delay, msg) => {
                self.command_log.push(CmdRecord::After(delay));
                self.timers.push(ScheduledMsg {
                    deadline: self.now + delay,
                    seq: self.next_seq,
                    msg,
                });
                self.next_seq += 1;
            }
            Cmd::Task(spec, f) => {
                self.command_log.push(CmdRecord::Task(spec.name.clone()));
                match self.task_mode {
                    TaskMode::Immediate => {
                        let msg = f();
                        self.send(msg);
                    }
                    TaskMode::Deferred => self.deferred.push_back(DeferredTask { spec, f }),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Probe {
        fired: Vec<u32>,
        fetched: Vec<u32>,
        outstanding: u32,
    }

    #[derive(Debug)]
    enum Msg {
        Schedule(u32, Duration),
        Fired(u32),
        Fetch(u32),
        Fetched(u32),
    }

    impl Model for Probe {
        type Message = Msg;

        fn update(&mut self, msg: Msg) -> Cmd<Msg> {
            match msg {
                Msg::Schedule(id, d) => Cmd::after(d, Msg::Fired(id)),
                Msg::Fired(id) => {
                    self.fired.push(id);
                    Cmd::none()
                }
                Msg::Fetch(id) => {
                    self.outstanding += 1;
                    Cmd::task_named(format!("fetch-{id}"), move || Msg::Fetched(id))
                }
                Msg::Fetched(id) => {
                    self.outstanding -= 1;
                    self.fetched.push(id);
                    Cmd::none()
                }
            }
        }
    }

    #[test]
    fn timers_wait_for_advance() {
        let mut sim = ProgramSimulator::new(Probe::default());
        sim.send(Msg::Schedule(1, Duration::from_millis(300)));
        sim.advance(Duration::from_millis(299));
        assert!(sim.model().fired.is_empty());
        sim.advance(Duration::from_millis(1));
        assert_eq!(sim.model().fired, vec![1]);
        assert_eq!(sim.now(), Duration::from_millis(300));
        assert_eq!(sim.pending_timers(), 0);
    }

    #[test]
    fn timers_fire_by_deadline_then_seq() {
        let mut sim = ProgramSimulator::new(Probe::default());
        sim.send(Msg::Schedule(1, Duration::from_millis(50)));
        sim.send(Msg::Schedule(2, Duration::from_millis(10)));
        sim.send(Msg::Schedule(3, Duration::from_millis(10)));
        sim.advance(Duration::from_secs(1));
        assert_eq!(sim.model().fired, vec![2, 3, 1]);
    }

    #[test]
    fn immediate_tasks_run_inline() {
        let mut sim = ProgramSimulator::new(Probe::default());
        sim.send(Msg::Fetch(7));
        assert_eq!(sim.model().fetched, vec![7]);
        assert!(
            sim.command_log()
                .contains(&CmdRecord::Task(Some("fetch-7".into())))
        );
    }

    #[test]
    fn deferred_tasks_complete_out_of_order() {
        let mut sim = ProgramSimulator::new(Probe::default()).task_mode(TaskMode::Deferred);
        sim.send(Msg::Fetch(1));
        sim.send(Msg::Fetch(2));
        assert_eq!(
            sim.pending_task_names(),
            vec![Some("fetch-1"), Some("fetch-2")]
        );

        assert!(sim.run_task(1));
        assert_eq!(sim.model().fetched, vec![2]);
        assert_eq!(sim.run_all_tasks(), 1);
        assert_eq!(sim.model().fetched, vec![2, 1]);
        assert!(!sim.run_task(0));
        assert_eq!(sim.model().outstanding, 0);
    }
}
