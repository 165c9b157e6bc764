#![forbid(unsafe_code)]

//! Account-specific validation rules.
//!
//! Generic rules (required, lengths, email format) live in
//! `quill_forms::validation`; this module adds the two that need account
//! knowledge: password confirmation over the `password` group and the
//! remote username uniqueness check.

use std::sync::Arc;
use std::time::Duration;

use quill_forms::validation::{AsyncValidator, ValidationError, ValidationResult};
use quill_forms::{FormGroup, GroupValidator};

use crate::service::ProfileService;

/// Error code: the username already belongs to an account.
pub const ERROR_CODE_TAKEN: &str = "taken";
/// Error code: the two password entries differ.
pub const ERROR_CODE_CONFIRMATION: &str = "confirmation";

/// Group rule: the `password` and `password2` children hold the same value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordConfirmation {
    first: String,
    second: String,
}

impl PasswordConfirmation {
    /// Compare the children named `first` and `second`.
    #[must_use]
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
        }
    }
}

impl Default for PasswordConfirmation {
    fn default() -> Self {
        Self::new("password", "password2")
    }
}

impl GroupValidator for PasswordConfirmation {
    fn validate(&self, group: &FormGroup) -> ValidationResult {
        let first = group.value_at(&self.first).unwrap_or_default();
        let second = group.value_at(&self.second).unwrap_or_default();
        if first == second {
            ValidationResult::Valid
        } else {
            ValidationResult::invalid(ERROR_CODE_CONFIRMATION, "Passwords do not match")
        }
    }
}

/// Async rule: the username is not registered yet.
///
/// A transport failure resolves the check as valid; signup reports the
/// duplicate if there is one.
pub struct UniqueUsername {
    profiles: Arc<dyn ProfileService>,
    debounce: Duration,
}

impl UniqueUsername {
    #[must_use]
    pub fn new(profiles: Arc<dyn ProfileService>, debounce: Duration) -> Self {
        Self { profiles, debounce }
    }
}

impl std::fmt::Debug for UniqueUsername {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UniqueUsername")
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

impl AsyncValidator<str> for UniqueUsername {
    fn validate(&self, username: &str) -> ValidationResult {
        match self.profiles.is_username_taken(username) {
            Ok(false) => ValidationResult::Valid,
            Ok(true) => ValidationResult::Invalid(
                ValidationError::new(ERROR_CODE_TAKEN, "Username is already taken")
                    .with_param("username", username),
            ),
            Err(err) => {
                tracing::warn!(
                    username,
                    error = %err,
                    "username lookup failed; treating as available"
                );
                ValidationResult::Valid
            }
        }
    }

    fn debounce(&self) -> Duration {
        self.debounce
    }

    fn name(&self) -> &str {
        "unique-username"
    }
}

/// Shared [`UniqueUsername`] ready to attach to a control.
#[must_use]
pub fn unique_username(
    profiles: Arc<dyn ProfileService>,
    debounce: Duration,
) -> Arc<dyn AsyncValidator<str>> {
    Arc::new(UniqueUsername::new(profiles, debounce))
}
