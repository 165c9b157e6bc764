#![forbid(unsafe_code)]

//! Validity and interaction state shared by controls and groups.

use std::fmt;

/// Validity of a control or group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    /// Every rule passes.
    #[default]
    Valid,
    /// At least one rule fails.
    Invalid,
    /// Sync rules pass and an async check is outstanding.
    Pending,
}

impl Status {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "VALID",
            Self::Invalid => "INVALID",
            Self::Pending => "PENDING",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the user has done to a control since load (or the last reset).
///
/// Both flags are sticky: typing a value back to its initial text keeps the
/// control dirty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Interaction {
    /// The user changed the value.
    pub dirty: bool,
    /// The control lost focus at least once.
    pub touched: bool,
}

impl Interaction {
    /// Neither dirty nor touched.
    pub const PRISTINE: Self = Self {
        dirty: false,
        touched: false,
    };

    /// Whether the user has interacted with the control at all.
    #[must_use]
    pub fn interacted(self) -> bool {
        self.dirty || self.touched
    }

    /// Combine the interaction of two siblings (any-of).
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            dirty: self.dirty || other.dirty,
            touched: self.touched || other.touched,
        }
    }
}
