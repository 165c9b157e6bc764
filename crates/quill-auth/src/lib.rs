#![forbid(unsafe_code)]

//! Quill Auth
//!
//! The account registration screen of the Quill blog client.
//!
//! # Key Components
//!
//! - [`RegistrationForm`] - form tree, error predicates and signup flow,
//!   implemented as a `quill_runtime::Model`
//! - [`RegistrationConfig`] - limits, debounce and texts (serde-loadable)
//! - [`ProfileService`] / [`AuthenticationService`] - remote collaborators
//! - [`InMemoryAccounts`] - in-process implementation of both services
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use quill_alert::AlertStore;
//! use quill_auth::{Field, InMemoryAccounts, Msg, RegistrationConfig, RegistrationForm};
//! use quill_runtime::Program;
//!
//! let accounts = Arc::new(InMemoryAccounts::new());
//! let alerts = AlertStore::new();
//! let form = RegistrationForm::new(
//!     RegistrationConfig::default(),
//!     accounts.clone(),
//!     accounts,
//!     alerts.clone(),
//! );
//!
//! let mut program = Program::new(form);
//! program.send(Msg::Input { field: Field::Password, value: "ab".into() });
//! assert!(program.model().is_password_too_short());
//!
//! program.send(Msg::Submit);
//! program.run_until_idle().unwrap();
//! assert_eq!(alerts.len(), 1);
//! ```

pub mod config;
pub mod registration;
pub mod service;
pub mod validators;

pub use config::{ConfigError, RegistrationConfig};
pub use registration::{
    Field, Msg, PasswordPair, RegistrationForm, RegistrationValue, SIGNUP_TASK,
    USERNAME_LOOKUP_TASK,
};
pub use service::{
    AuthenticationService, InMemoryAccounts, ProfileService, ServiceError, ServiceErrorKind,
    SignupRequest,
};
pub use validators::{
    ERROR_CODE_CONFIRMATION, ERROR_CODE_TAKEN, PasswordConfirmation, UniqueUsername,
    unique_username,
};
