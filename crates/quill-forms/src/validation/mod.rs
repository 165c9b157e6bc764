#![forbid(unsafe_code)]

//! Validation rules for form controls.
//!
//! - [`Validator`]: synchronous rule over a value, producing a [`ValidationResult`]
//! - Built-in rules: [`Required`], [`MinLength`], [`MaxLength`], [`Email`]
//! - [`ValidationErrors`]: the per-node error set, keyed by error code
//! - [`AsyncValidator`] and [`AsyncValidationCoordinator`]: remote checks
//!   with token-based staleness prevention
//!
//! # Example
//!
//! ```rust
//! use quill_forms::validation::{MinLength, Required, Validator};
//!
//! assert!(Required::new().validate("").is_invalid());
//! assert!(MinLength::new(6).validate("ab").is_invalid());
//! assert!(MinLength::new(6).validate("").is_valid());
//! ```

pub mod async_validation;
mod validators;

pub use async_validation::{
    AsyncValidationCoordinator, AsyncValidator, ValidationEvent, ValidationToken, ValidationTrace,
};
pub use validators::{
    ERROR_CODE_EMAIL, ERROR_CODE_MAX_LENGTH, ERROR_CODE_MIN_LENGTH, ERROR_CODE_REQUIRED, Email,
    MaxLength, MinLength, Required, ValidationError, ValidationErrors, ValidationResult,
    Validator,
};
