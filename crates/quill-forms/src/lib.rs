#![forbid(unsafe_code)]

//! Quill Forms
//!
//! Headless reactive-form model used by the Quill screens.
//!
//! # Key Components
//!
//! - [`FormControl`] - one text input: value, sync rules, optional async rule
//! - [`FormGroup`] - named tree of controls with group-level rules
//! - [`Status`] / [`Interaction`] - validity and dirty/touched state
//! - [`validation`] - rule traits, built-in rules, async coordination
//!
//! Nothing here renders or performs IO. Async rules hand back an
//! [`AsyncRequest`] (schedule it after its debounce delay) and later a
//! [`PendingLookup`] (run it off the update loop); the owning screen feeds
//! the [`LookupOutcome`] back in.
//!
//! # Example
//!
//! ```rust
//! use quill_forms::validation::{MinLength, Required};
//! use quill_forms::{FormControl, FormGroup};
//!
//! let mut form = FormGroup::new().control(
//!     "password",
//!     FormControl::new("")
//!         .validator(Required::new())
//!         .validator(MinLength::new(6)),
//! );
//!
//! form.input("password", "ab");
//! let password = form.get_control("password").unwrap();
//! assert!(password.invalid() && password.dirty());
//! assert!(password.has_error("minlength"));
//! ```

pub mod control;
pub mod group;
pub mod state;
pub mod validation;

pub use control::{AsyncRequest, FormControl, LookupOutcome, PendingLookup};
pub use group::{FormGroup, FormNode, GroupValidator};
pub use state::{Interaction, Status};
