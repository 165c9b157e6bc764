#![forbid(unsafe_code)]

//! Elm-style program runtime.
//!
//! A screen implements [`Model`]: all state changes happen in
//! [`Model::update`], which returns a [`Cmd`] describing side effects. The
//! runtime executes commands and routes their results back as messages, so
//! the model itself never blocks and never shares mutable state.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use quill_runtime::{Cmd, Model, Program};
//!
//! struct Echo {
//!     heard: Vec<u32>,
//! }
//!
//! enum Msg {
//!     Ask(u32),
//!     Heard(u32),
//! }
//!
//! impl Model for Echo {
//!     type Message = Msg;
//!
//!     fn update(&mut self, msg: Msg) -> Cmd<Msg> {
//!         match msg {
//!             Msg::Ask(n) => Cmd::task(move || Msg::Heard(n * 2)),
//!             Msg::Heard(n) => {
//!                 self.heard.push(n);
//!                 Cmd::none()
//!             }
//!         }
//!     }
//! }
//!
//! let mut program = Program::new(Echo { heard: Vec::new() });
//! program.send(Msg::Ask(21));
//! program.run_until_idle().unwrap();
//! assert_eq!(program.model().heard, vec![42]);
//! ```

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use web_time::Instant;

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Application state and its transition function.
pub trait Model: Sized {
    /// Messages the model reacts to. Results of background tasks arrive as
    /// messages too, so they must be sendable across threads.
    type Message: Send + 'static;

    /// The state transition function.
    fn update(&mut self, msg: Self::Message) -> Cmd<Self::Message>;
}

// ---------------------------------------------------------------------------
// Cmd
// ---------------------------------------------------------------------------

/// Scheduling metadata for background tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskSpec {
    /// Optional task name for logs and simulator inspection.
    pub name: Option<String>,
}

impl TaskSpec {
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Side effects returned from [`Model::update`].
#[derive(Default)]
pub enum Cmd<M> {
    /// No operation.
    #[default]
    None,
    /// Execute several commands, in order.
    Batch(Vec<Cmd<M>>),
    /// Feed a message straight back into `update`.
    Msg(M),
    /// Deliver a message once the delay has elapsed.
    After(Duration, M),
    /// Run a blocking closure off the update loop; its return value is sent
    /// back to `update`.
    Task(TaskSpec, Box<dyn FnOnce() -> M + Send>),
}

impl<M: fmt::Debug> fmt::Debug for Cmd<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Batch(cmds) => f.debug_tuple("Batch").field(cmds).finish(),
            Self::Msg(m) => f.debug_tuple("Msg").field(m).finish(),
            Self::After(d, m) => f.debug_tuple("After").field(d).field(m).finish(),
            Self::Task(spec, _) => f.debug_struct("Task").field("spec", spec).finish(),
        }
    }
}

impl<M> Cmd<M> {
    #[inline]
    pub fn none() -> Self {
        Self::None
    }

    #[inline]
    pub fn msg(m: M) -> Self {
        Self::Msg(m)
    }

    /// Deliver `m` after `delay`.
    #[inline]
    pub fn after(delay: Duration, m: M) -> Self {
        Self::After(delay, m)
    }

    /// Batch commands, collapsing empty and single-element batches.
    pub fn batch(cmds: Vec<Self>) -> Self {
        let mut cmds: Vec<Self> = cmds
            .into_iter()
            .filter(|c| !matches!(c, Self::None))
            .collect();
        match cmds.len() {
            0 => Self::None,
            1 => cmds.pop().unwrap_or(Self::None),
            _ => Self::Batch(cmds),
        }
    }

    /// Background task.
    pub fn task<F>(f: F) -> Self
    where
        F: FnOnce() -> M + Send + 'static,
    {
        Self::Task(TaskSpec::default(), Box::new(f))
    }

    /// Named background task.
    pub fn task_named<F>(name: impl Into<String>, f: F) -> Self
    where
        F: FnOnce() -> M + Send + 'static,
    {
        Self::Task(TaskSpec::default().with_name(name), Box::new(f))
    }

    /// Stable variant name for tracing.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Batch(_) => "Batch",
            Self::Msg(_) => "Msg",
            Self::After(..) => "After",
            Self::Task(..) => "Task",
        }
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

// ---------------------------------------------------------------------------
// ProgramConfig / ProgramError
// ---------------------------------------------------------------------------

/// Runtime tuning.
#[derive(Debug, Clone)]
pub struct ProgramConfig {
    /// Longest wait for a running task before [`Program::run_until_idle`]
    /// gives up with [`ProgramError::Stalled`].
    pub task_timeout: Duration,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            task_timeout: Duration::from_secs(30),
        }
    }
}

impl ProgramConfig {
    #[must_use]
    pub fn task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }
}

/// Failure of the runtime loop itself (never of the model).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramError {
    /// Tasks were still running when the timeout elapsed.
    Stalled { tasks_in_flight: usize },
}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stalled { tasks_in_flight } => {
                write!(f, "runtime stalled with {tasks_in_flight} task(s) in flight")
            }
        }
    }
}

impl std::error::Error for ProgramError {}

// ---------------------------------------------------------------------------
// Program
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct TimerKey {
    deadline: Instant,
    seq: u64,
}

/// What a task thread reports back.
enum Delivery<T> {
    Message(T),
    /// The closure panicked; the task is over but produced nothing.
    Panicked { task: Option<String> },
}

/// Production executor.
///
/// Tasks run on spawned threads and report back over a channel; timers sit
/// in a deadline heap. Messages are processed one at a time on the thread
/// that drives the program.
pub struct Program<M: Model> {
    model: M,
    config: ProgramConfig,
    sender: mpsc::Sender<Delivery<M::Message>>,
    receiver: mpsc::Receiver<Delivery<M::Message>>,
    timers: BinaryHeap<Reverse<TimerKey>>,
    timer_messages: HashMap<u64, M::Message>,
    next_timer_seq: u64,
    tasks_in_flight: usize,
}

impl<M: Model> Program<M> {
    pub fn new(model: M) -> Self {
        Self::with_config(model, ProgramConfig::default())
    }

    pub fn with_config(model: M, config: ProgramConfig) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            model,
            config,
            sender,
            receiver,
            timers: BinaryHeap::new(),
            timer_messages: HashMap::new(),
            next_timer_seq: 0,
            tasks_in_flight: 0,
        }
    }

    /// Dispatch a message through `update`.
    pub fn send(&mut self, msg: M::Message) {
        let cmd = self.model.update(msg);
        self.execute_cmd(cmd);
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    /// Whether no timers are armed and no tasks are running.
    pub fn is_idle(&self) -> bool {
        self.timers.is_empty() && self.tasks_in_flight == 0
    }

    pub fn tasks_in_flight(&self) -> usize {
        self.tasks_in_flight
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Process timers and task results until the program is idle.
    pub fn run_until_idle(&mut self) -> Result<(), ProgramError> {
        while !self.is_idle() {
            self.fire_due_timers();
            if self.is_idle() {
                break;
            }

            let wait = self.next_wait();
            match self.receiver.recv_timeout(wait) {
                Ok(Delivery::Message(msg)) => {
                    self.tasks_in_flight = self.tasks_in_flight.saturating_sub(1);
                    self.send(msg);
                }
                Ok(Delivery::Panicked { task }) => {
                    self.tasks_in_flight = self.tasks_in_flight.saturating_sub(1);
                    tracing::warn!(
                        task = task.as_deref().unwrap_or("anonymous"),
                        "task panicked; no message delivered"
                    );
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if self.timers.is_empty() {
                        tracing::warn!(
                            tasks_in_flight = self.tasks_in_flight,
                            "timed out waiting for background tasks"
                        );
                        return Err(ProgramError::Stalled {
                            tasks_in_flight: self.tasks_in_flight,
                        });
                    }
                }
                // Not expected while the program holds a sender.
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(ProgramError::Stalled {
                        tasks_in_flight: self.tasks_in_flight,
                    });
                }
            }
        }
        Ok(())
    }

    /// Time to block: until the next timer, capped by the task timeout.
    fn next_wait(&self) -> Duration {
        let until_timer = self
            .timers
            .peek()
            .map(|Reverse(key)| key.deadline.saturating_duration_since(Instant::now()));
        until_timer.map_or(self.config.task_timeout, |d| d.min(self.config.task_timeout))
    }

    fn fire_due_timers(&mut self) {
        let now = Instant::now();
        while let Some(Reverse(key)) = self.timers.peek().copied() {
            if key.deadline > now {
                break;
            }
            self.timers.pop();
            if let Some(msg) = self.timer_messages.remove(&key.seq) {
                self.send(msg);
            }
        }
    }

    fn execute_cmd(&mut self, cmd: Cmd<M::Message>) {
        match cmd {
            Cmd::None => {}
            Cmd::Batch(cmds) => {
                for c in cmds {
                    self.execute_cmd(c);
                }
            }
            Cmd::Msg(m) => self.send(m),
            Cmd::After(delay, m) => {
                let seq = self.next_timer_seq;
                self.next_timer_seq += 1;
                self.timers.push(Reverse(TimerKey {
                    deadline: Instant::now() + delay,
                    seq,
                }));
                self.timer_messages.insert(seq, m);
            }
            Cmd::Task(spec, f) => {
                tracing::trace!(
                    task = spec.name.as_deref().unwrap_or("anonymous"),
                    "spawning task"
                );
                self.tasks_in_flight += 1;
                let sender = self.sender.clone();
                thread::spawn(move || {
                    let delivery = match panic::catch_unwind(AssertUnwindSafe(f)) {
                        Ok(msg) => Delivery::Message(msg),
                        Err(_) => Delivery::Panicked { task: spec.name },
                    };
                    if sender.send(delivery).is_err() {
                        tracing::trace!("program dropped before task finished");
                    }
                });
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
