#![forbid(unsafe_code)]

//! Core validation types and the built-in string validators.

use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Error Codes
// ---------------------------------------------------------------------------

/// Error code for an empty required value.
pub const ERROR_CODE_REQUIRED: &str = "required";
/// Error code for a value shorter than the minimum length.
pub const ERROR_CODE_MIN_LENGTH: &str = "minlength";
/// Error code for a value longer than the maximum length.
pub const ERROR_CODE_MAX_LENGTH: &str = "maxlength";
/// Error code for a malformed email address.
pub const ERROR_CODE_EMAIL: &str = "email";

// ---------------------------------------------------------------------------
// ValidationError
// ---------------------------------------------------------------------------

/// A validation error with code, message, and interpolation parameters.
///
/// The `code` is the stable key under which the error is stored in a
/// [`ValidationErrors`] set; views branch on it to pick a message.
///
/// # Example
///
/// ```rust
/// use quill_forms::validation::ValidationError;
///
/// let error = ValidationError::new("minlength", "Must be at least {requiredLength} characters")
///     .with_param("requiredLength", 6);
///
/// assert_eq!(error.format_message(), "Must be at least 6 characters");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Stable error code.
    pub code: &'static str,
    /// Human-readable message template.
    pub message: String,
    /// Parameters for message interpolation.
    pub params: BTreeMap<String, String>,
}

impl ValidationError {
    /// Create a new validation error with the given code and message.
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            params: BTreeMap::new(),
        }
    }

    /// Add a parameter for message interpolation (`{key}` in the message).
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(key.into(), value.to_string());
        self
    }

    /// Look up an interpolation parameter.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Format the message with parameter substitution.
    #[must_use]
    pub fn format_message(&self) -> String {
        self.params
            .iter()
            .fold(self.message.clone(), |message, (key, value)| {
                message.replace(&format!("{{{key}}}"), value)
            })
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_message())
    }
}

impl std::error::Error for ValidationError {}

// ---------------------------------------------------------------------------
// ValidationResult
// ---------------------------------------------------------------------------

/// The result of a single validation rule.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ValidationResult {
    /// The value passed the rule.
    #[default]
    Valid,
    /// The value failed the rule.
    Invalid(ValidationError),
}

impl ValidationResult {
    /// Shorthand for `Invalid(ValidationError::new(code, message))`.
    #[must_use]
    pub fn invalid(code: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid(ValidationError::new(code, message))
    }

    /// Returns `true` if the result is `Valid`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Returns `true` if the result is `Invalid`.
    #[must_use]
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }

    /// Returns the error if the result is `Invalid`.
    #[must_use]
    pub fn error(&self) -> Option<&ValidationError> {
        match self {
            Self::Valid => None,
            Self::Invalid(e) => Some(e),
        }
    }

    /// Consume the result, returning the error if any.
    #[must_use]
    pub fn into_error(self) -> Option<ValidationError> {
        match self {
            Self::Valid => None,
            Self::Invalid(e) => Some(e),
        }
    }
}

// ---------------------------------------------------------------------------
// ValidationErrors
// ---------------------------------------------------------------------------

/// The set of failed rules for one control or group, keyed by error code.
///
/// Every rule of a node runs and contributes its error, so a value can be
/// both `required`-failing on one node and `confirmation`-failing on its
/// parent group at the same time. A code is present only while its rule
/// fails for the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    entries: BTreeMap<&'static str, ValidationError>,
}

impl ValidationErrors {
    /// Create an empty error set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error, replacing any earlier error with the same code.
    pub fn insert(&mut self, error: ValidationError) {
        self.entries.insert(error.code, error);
    }

    /// Record the error carried by `result`, if any.
    pub fn record(&mut self, result: ValidationResult) {
        if let Some(error) = result.into_error() {
            self.insert(error);
        }
    }

    /// Whether a rule with this code failed.
    #[must_use]
    pub fn contains(&self, code: &str) -> bool {
        self.entries.contains_key(code)
    }

    /// Get the error recorded under `code`.
    #[must_use]
    pub fn get(&self, code: &str) -> Option<&ValidationError> {
        self.entries.get(code)
    }

    /// Iterate over the failing codes in sorted order.
    pub fn codes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    /// Iterate over the recorded errors in code order.
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.entries.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl FromIterator<ValidationError> for ValidationErrors {
    fn from_iter<I: IntoIterator<Item = ValidationError>>(iter: I) -> Self {
        let mut errors = Self::new();
        for error in iter {
            errors.insert(error);
        }
        errors
    }
}

// ---------------------------------------------------------------------------
// Validator Trait
// ---------------------------------------------------------------------------

/// A synchronous rule over values of type `T`.
///
/// # Implementing a Custom Validator
///
/// ```rust
/// use quill_forms::validation::{Validator, ValidationResult};
///
/// struct NoSpaces;
///
/// impl Validator<str> for NoSpaces {
///     fn validate(&self, value: &str) -> ValidationResult {
///         if value.contains(' ') {
///             ValidationResult::invalid("no_spaces", "Value must not contain spaces")
///         } else {
///             ValidationResult::Valid
///         }
///     }
/// }
/// ```
pub trait Validator<T: ?Sized>: Send + Sync {
    /// Validate the given value.
    fn validate(&self, value: &T) -> ValidationResult;
}

// ---------------------------------------------------------------------------
// Built-in Validators
// ---------------------------------------------------------------------------

/// Fails on the empty string. Whitespace counts as content.
#[derive(Debug, Clone, Copy, Default)]
pub struct Required;

impl Required {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Validator<str> for Required {
    fn validate(&self, value: &str) -> ValidationResult {
        if value.is_empty() {
            ValidationResult::invalid(ERROR_CODE_REQUIRED, "This field is required")
        } else {
            ValidationResult::Valid
        }
    }
}

/// Fails when a non-empty string has fewer than `min` characters.
///
/// Empty values pass; pair with [`Required`] to reject them.
#[derive(Debug, Clone, Copy)]
pub struct MinLength {
    pub min: usize,
}

impl MinLength {
    #[must_use]
    pub fn new(min: usize) -> Self {
        Self { min }
    }
}

impl Validator<str> for MinLength {
    fn validate(&self, value: &str) -> ValidationResult {
        let len = value.chars().count();
        if len == 0 || len >= self.min {
            return ValidationResult::Valid;
        }
        ValidationResult::Invalid(
            ValidationError::new(
                ERROR_CODE_MIN_LENGTH,
                "Must be at least {requiredLength} characters",
            )
            .with_param("requiredLength", self.min)
            .with_param("actualLength", len),
        )
    }
}

/// Fails when a string has more than `max` characters.
#[derive(Debug, Clone, Copy)]
pub struct MaxLength {
    pub max: usize,
}

impl MaxLength {
    #[must_use]
    pub fn new(max: usize) -> Self {
        Self { max }
    }
}

impl Validator<str> for MaxLength {
    fn validate(&self, value: &str) -> ValidationResult {
        let len = value.chars().count();
        if len <= self.max {
            return ValidationResult::Valid;
        }
        ValidationResult::Invalid(
            ValidationError::new(
                ERROR_CODE_MAX_LENGTH,
                "Must be at most {requiredLength} characters",
            )
            .with_param("requiredLength", self.max)
            .with_param("actualLength", len),
        )
    }
}

/// Checks the shape of an email address: `local@domain.tld`.
///
/// Heuristic only: exactly one `@`, no whitespace, a dotted domain with
/// non-empty labels and a TLD of at least two characters. Empty values pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct Email;

impl Email {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn is_well_formed(value: &str) -> bool {
        if value.chars().any(char::is_whitespace) {
            return false;
        }
        let Some((local, domain)) = value.split_once('@') else {
            return false;
        };
        if local.is_empty() || domain.contains('@') {
            return false;
        }
        let labels: Vec<&str> = domain.split('.').collect();
        if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
            return false;
        }
        labels.last().is_some_and(|tld| tld.chars().count() >= 2)
    }
}

impl Validator<str> for Email {
    fn validate(&self, value: &str) -> ValidationResult {
        if value.is_empty() || Self::is_well_formed(value) {
            ValidationResult::Valid
        } else {
            ValidationResult::invalid(ERROR_CODE_EMAIL, "Invalid email address")
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
