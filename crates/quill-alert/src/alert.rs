#![forbid(unsafe_code)]

//! Leveled user-facing notifications.

use std::fmt;

/// Severity of an [`Alert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertLevel {
    Success,
    Error,
}

impl AlertLevel {
    /// Lowercase name, as used in log fields and CSS classes.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    /// Glyph shown in front of the message.
    #[must_use]
    pub const fn icon(self) -> char {
        match self {
            Self::Success => '\u{2713}',
            Self::Error => '\u{2717}',
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A notification for the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub level: AlertLevel,
    pub message: String,
}

impl Alert {
    #[must_use]
    pub fn new(level: AlertLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(AlertLevel::Success, message)
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(AlertLevel::Error, message)
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.level == AlertLevel::Error
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.level.icon(), self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_level() {
        assert_eq!(Alert::success("ok").level, AlertLevel::Success);
        assert!(Alert::error("no").is_error());
        assert!(!Alert::success("ok").is_error());
    }

    #[test]
    fn display_prefixes_icon() {
        assert_eq!(
            Alert::error("Username already exists").to_string(),
            "\u{2717} Username already exists"
        );
        assert_eq!(AlertLevel::Success.to_string(), "success");
    }
}
