#![forbid(unsafe_code)]

//! A single text control with sync rules and an optional async rule.
//!
//! State transitions:
//!
//! | Event | Value | Interaction | Validation |
//! |-------|-------|-------------|------------|
//! | [`input`](FormControl::input) | replaced | `dirty = true` | re-run |
//! | [`set_value`](FormControl::set_value) | replaced | unchanged | re-run |
//! | [`blur`](FormControl::blur) | unchanged | `touched = true` | unchanged |
//! | [`reset`](FormControl::reset) | initial | pristine | re-run |
//!
//! Re-running validation evaluates every sync rule. If any fails the control
//! is `Invalid` and any outstanding async check is cancelled. Otherwise, when
//! an async rule is attached, the control turns `Pending` and the caller gets
//! an [`AsyncRequest`] to schedule.

use std::sync::Arc;
use std::time::Duration;

use web_time::Instant;

use crate::state::{Interaction, Status};
use crate::validation::{
    AsyncValidationCoordinator, AsyncValidator, ValidationErrors, ValidationResult,
    ValidationToken, ValidationTrace, Validator,
};

// ---------------------------------------------------------------------------
// Async plumbing
// ---------------------------------------------------------------------------

/// An async check the caller must schedule after `delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsyncRequest {
    pub token: ValidationToken,
    /// Debounce delay of the async rule.
    pub delay: Duration,
}

/// A lookup ready to run off the update loop.
pub struct PendingLookup {
    token: ValidationToken,
    value: String,
    validator: Arc<dyn AsyncValidator<str>>,
}

impl std::fmt::Debug for PendingLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingLookup")
            .field("token", &self.token)
            .field("value", &self.value)
            .field("validator", &self.validator.name())
            .finish()
    }
}

impl PendingLookup {
    #[must_use]
    pub fn token(&self) -> ValidationToken {
        self.token
    }

    /// The value captured when the lookup was dispatched.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Run the (blocking) lookup.
    #[must_use]
    pub fn run(self) -> LookupOutcome {
        let started = Instant::now();
        let result = self.validator.validate(&self.value);
        LookupOutcome {
            token: self.token,
            result,
            duration: started.elapsed(),
        }
    }
}

/// The result of a [`PendingLookup`], to be fed back with
/// [`FormControl::complete_async`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupOutcome {
    pub token: ValidationToken,
    pub result: ValidationResult,
    pub duration: Duration,
}

struct AsyncRule {
    validator: Arc<dyn AsyncValidator<str>>,
    coordinator: AsyncValidationCoordinator,
}

// ---------------------------------------------------------------------------
// FormControl
// ---------------------------------------------------------------------------

/// A text input slot: value, rules, validity and interaction flags.
pub struct FormControl {
    value: String,
    initial: String,
    validators: Vec<Box<dyn Validator<str>>>,
    async_rule: Option<AsyncRule>,
    errors: ValidationErrors,
    status: Status,
    interaction: Interaction,
}

impl std::fmt::Debug for FormControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormControl")
            .field("value", &self.value)
            .field("status", &self.status)
            .field("errors", &self.errors)
            .field("interaction", &self.interaction)
            .field("validators", &self.validators.len())
            .field(
                "async_rule",
                &self.async_rule.as_ref().map(|r| r.validator.name()),
            )
            .finish()
    }
}

impl FormControl {
    /// Create a control holding `initial`, with no rules.
    #[must_use]
    pub fn new(initial: impl Into<String>) -> Self {
        let initial = initial.into();
        Self {
            value: initial.clone(),
            initial,
            validators: Vec::new(),
            async_rule: None,
            errors: ValidationErrors::new(),
            status: Status::Valid,
            interaction: Interaction::PRISTINE,
        }
    }

    /// Attach a sync rule.
    ///
    /// The initial value is checked immediately. Async rules are not run at
    /// construction; the first remote check happens on the first change.
    #[must_use]
    pub fn validator(mut self, validator: impl Validator<str> + 'static) -> Self {
        self.validators.push(Box::new(validator));
        self.run_sync();
        self
    }

    /// Attach the async rule, replacing any previous one.
    #[must_use]
    pub fn async_validator(mut self, validator: Arc<dyn AsyncValidator<str>>) -> Self {
        self.async_rule = Some(AsyncRule {
            validator,
            coordinator: AsyncValidationCoordinator::new(),
        });
        self
    }

    // -- accessors --

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    #[must_use]
    pub fn has_error(&self, code: &str) -> bool {
        self.errors.contains(code)
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.status
    }

    #[must_use]
    pub fn valid(&self) -> bool {
        self.status == Status::Valid
    }

    #[must_use]
    pub fn invalid(&self) -> bool {
        self.status == Status::Invalid
    }

    #[must_use]
    pub fn pending(&self) -> bool {
        self.status == Status::Pending
    }

    #[must_use]
    pub fn interaction(&self) -> Interaction {
        self.interaction
    }

    #[must_use]
    pub fn dirty(&self) -> bool {
        self.interaction.dirty
    }

    #[must_use]
    pub fn touched(&self) -> bool {
        self.interaction.touched
    }

    #[must_use]
    pub fn pristine(&self) -> bool {
        !self.interaction.dirty
    }

    /// Lifecycle trace of the async rule, if one is attached.
    #[must_use]
    pub fn validation_trace(&self) -> Option<&ValidationTrace> {
        self.async_rule.as_ref().map(|r| r.coordinator.trace())
    }

    // -- transitions --

    /// A value typed by the user.
    pub fn input(&mut self, value: impl Into<String>) -> Option<AsyncRequest> {
        self.interaction.dirty = true;
        self.set_value(value)
    }

    /// A value set programmatically; interaction flags are left alone.
    pub fn set_value(&mut self, value: impl Into<String>) -> Option<AsyncRequest> {
        self.value = value.into();
        self.update_validity()
    }

    /// The control lost focus.
    pub fn blur(&mut self) {
        self.interaction.touched = true;
    }

    /// Mark the control touched without a focus change.
    pub fn mark_as_touched(&mut self) {
        self.interaction.touched = true;
    }

    /// Back to the initial value, pristine and untouched.
    pub fn reset(&mut self) -> Option<AsyncRequest> {
        self.interaction = Interaction::PRISTINE;
        self.value = self.initial.clone();
        self.update_validity()
    }

    /// Re-run every rule against the current value.
    pub fn update_validity(&mut self) -> Option<AsyncRequest> {
        self.run_sync();
        if !self.errors.is_empty() {
            if let Some(rule) = self.async_rule.as_mut() {
                rule.coordinator.cancel();
            }
            return None;
        }

        let rule = self.async_rule.as_mut()?;
        let token = rule.coordinator.start_validation();
        self.status = Status::Pending;
        tracing::debug!(
            validator = rule.validator.name(),
            %token,
            "async check scheduled"
        );
        Some(AsyncRequest {
            token,
            delay: rule.validator.debounce(),
        })
    }

    /// The debounce window for `token` closed: hand out the lookup if the
    /// token is still the current one.
    pub fn begin_async(&mut self, token: ValidationToken) -> Option<PendingLookup> {
        let rule = self.async_rule.as_mut()?;
        if !rule.coordinator.dispatch(token) {
            tracing::trace!(%token, "superseded async check dropped before lookup");
            return None;
        }
        Some(PendingLookup {
            token,
            value: self.value.clone(),
            validator: Arc::clone(&rule.validator),
        })
    }

    /// Feed back a finished lookup. Returns `true` if it was applied.
    pub fn complete_async(&mut self, outcome: LookupOutcome) -> bool {
        let Some(rule) = self.async_rule.as_mut() else {
            return false;
        };
        let LookupOutcome {
            token,
            result,
            duration,
        } = outcome;
        if !rule.coordinator.try_apply_result(token, &result, duration) {
            tracing::debug!(%token, "stale async result discarded");
            return false;
        }

        self.errors.record(result);
        self.status = if self.errors.is_empty() {
            Status::Valid
        } else {
            Status::Invalid
        };
        tracing::debug!(%token, status = %self.status, "async result applied");
        true
    }

    fn run_sync(&mut self) {
        self.errors = self
            .validators
            .iter()
            .filter_map(|v| v.validate(&self.value).into_error())
            .collect();
        self.status = if self.errors.is_empty() {
            Status::Valid
        } else {
            Status::Invalid
        };
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
