#![forbid(unsafe_code)]

//! Registration screen configuration.
//!
//! Every field has a default, so a partial JSON document is enough:
//!
//! ```json
//! { "username_debounce_ms": 500, "password_min_length": 8 }
//! ```

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

/// Limits and texts used by [`RegistrationForm`](crate::RegistrationForm).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistrationConfig {
    pub email_max_length: usize,
    pub username_max_length: usize,
    pub password_min_length: usize,
    /// Quiet period before the username lookup, in milliseconds.
    pub username_debounce_ms: u64,
    /// Alert text shown after a successful signup.
    pub success_message: String,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            email_max_length: 128,
            username_max_length: 32,
            password_min_length: 6,
            username_debounce_ms: 300,
            success_message: "Your account has been created, you can now log in.".into(),
        }
    }
}

impl RegistrationConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject limits that would make the form unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.password_min_length == 0 {
            return Err(ConfigError::Invalid(
                "password_min_length must be at least 1".into(),
            ));
        }
        if self.email_max_length == 0 {
            return Err(ConfigError::Invalid(
                "email_max_length must be at least 1".into(),
            ));
        }
        if self.username_max_length == 0 {
            return Err(ConfigError::Invalid(
                "username_max_length must be at least 1".into(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn username_debounce(&self) -> Duration {
        Duration::from_millis(self.username_debounce_ms)
    }

    #[must_use]
    pub fn with_email_max_length(mut self, len: usize) -> Self {
        self.email_max_length = len;
        self
    }

    #[must_use]
    pub fn with_username_max_length(mut self, len: usize) -> Self {
        self.username_max_length = len;
        self
    }

    #[must_use]
    pub fn with_password_min_length(mut self, len: usize) -> Self {
        self.password_min_length = len;
        self
    }

    #[must_use]
    pub fn with_username_debounce(mut self, debounce: Duration) -> Self {
        self.username_debounce_ms = u64::try_from(debounce.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn with_success_message(mut self, message: impl Into<String>) -> Self {
        self.success_message = message.into();
        self
    }
}

/// Errors from loading a [`RegistrationConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The document is not valid JSON or has unexpected fields.
    Parse(String),
    /// The document parsed but a limit is out of range.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse(msg) => write!(f, "config parse error: {msg}"),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_screen_limits() {
        let config = RegistrationConfig::default();
        assert_eq!(config.email_max_length, 128);
        assert_eq!(config.username_max_length, 32);
        assert_eq!(config.password_min_length, 6);
        assert_eq!(config.username_debounce(), Duration::from_millis(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            RegistrationConfig::from_json(r#"{ "username_debounce_ms": 500 }"#).unwrap();
        assert_eq!(config.username_debounce(), Duration::from_millis(500));
        assert_eq!(config.password_min_length, 6);
    }

    #[test]
    fn unknown_field_is_a_parse_error() {
        let err = RegistrationConfig::from_json(r#"{ "colour": "red" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn zero_limits_rejected() {
        let err = RegistrationConfig::from_json(r#"{ "password_min_length": 0 }"#).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid config: password_min_length must be at least 1"
        );
        assert!(
            RegistrationConfig::default()
                .with_username_max_length(0)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn builders_chain() {
        let config = RegistrationConfig::default()
            .with_password_min_length(8)
            .with_username_debounce(Duration::from_millis(120))
            .with_success_message("Welcome!");
        assert_eq!(config.password_min_length, 8);
        assert_eq!(config.username_debounce_ms, 120);
        assert_eq!(config.success_message, "Welcome!");
    }
}
