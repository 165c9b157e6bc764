#![forbid(unsafe_code)]

//! Quill Runtime
//!
//! Elm-style update loop shared by the Quill screens.
//!
//! # Key Components
//!
//! - [`Model`] - trait for screen state and its `update` function
//! - [`Cmd`] - side effects: messages, timers, background tasks
//! - [`Program`] - production executor (threads + deadline heap)
//! - [`ProgramSimulator`] - deterministic executor with a virtual clock
//!
//! # Role in Quill
//! Screens never block and never share mutable state: a slow call is a
//! [`Cmd::Task`] whose result comes back as a message, a debounce is a
//! [`Cmd::After`]. Whatever drives the screen (a browser event loop, a test)
//! only has to execute commands.

pub mod program;
pub mod simulator;

pub use program::{Cmd, Model, Program, ProgramConfig, ProgramError, TaskSpec};
pub use simulator::{CmdRecord, ProgramSimulator, TaskMode};
