#![forbid(unsafe_code)]

//! Async validation with token-based staleness prevention.
//!
//! Every value change that needs a remote check is issued a fresh
//! [`ValidationToken`]. Tokens are strictly increasing, so "is this result
//! still wanted?" reduces to "is its token the current one?". A check moves
//! through the lifecycle below; each step is recorded in a
//! [`ValidationTrace`].
//!
//! ```text
//! input ──► Started ──(debounce elapsed)──► Dispatched ──► Completed ──► Applied
//!              │                                              │
//!              └──(newer input / sync failure)──► Cancelled   └──► StaleDiscarded
//! ```
//!
//! The coordinator does no IO and owns no timers: the caller schedules the
//! debounce and runs the lookup, then feeds the outcome back.

use std::collections::VecDeque;
use std::time::Duration;

use web_time::Instant;

use super::ValidationResult;

// ---------------------------------------------------------------------------
// ValidationToken
// ---------------------------------------------------------------------------

/// Generation number of one async check.
///
/// # Invariants
///
/// - Tokens issued by one coordinator are strictly monotonic.
/// - Token 0 is reserved for "no check issued yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ValidationToken(u64);

impl ValidationToken {
    /// The null token.
    pub const NONE: Self = Self(0);

    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

}

impl std::fmt::Display for ValidationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Token({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// ValidationEvent
// ---------------------------------------------------------------------------

/// One step in the lifecycle of an async check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationEvent {
    /// A check was issued for new input; its debounce window is open.
    Started { token: ValidationToken, elapsed_ns: u64 },
    /// The debounce window closed and the lookup was handed to a worker.
    Dispatched { token: ValidationToken, elapsed_ns: u64 },
    /// The check was abandoned before its result arrived.
    Cancelled {
        token: ValidationToken,
        /// The token that replaced it.
        superseded_by: ValidationToken,
        elapsed_ns: u64,
    },
    /// A lookup result arrived (it may still be discarded).
    Completed {
        token: ValidationToken,
        is_valid: bool,
        duration_ns: u64,
        elapsed_ns: u64,
    },
    /// The result was written into the control state.
    Applied {
        token: ValidationToken,
        is_valid: bool,
        elapsed_ns: u64,
    },
    /// The result arrived for a superseded token and was dropped.
    StaleDiscarded {
        token: ValidationToken,
        current_token: ValidationToken,
        elapsed_ns: u64,
    },
}

impl ValidationEvent {
    #[must_use]
    pub fn token(&self) -> ValidationToken {
        match self {
            Self::Started { token, .. }
            | Self::Dispatched { token, .. }
            | Self::Cancelled { token, .. }
            | Self::Completed { token, .. }
            | Self::Applied { token, .. }
            | Self::StaleDiscarded { token, .. } => *token,
        }
    }

    /// Stable event name for logs and trace queries.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::Dispatched { .. } => "dispatched",
            Self::Cancelled { .. } => "cancelled",
            Self::Completed { .. } => "completed",
            Self::Applied { .. } => "applied",
            Self::StaleDiscarded { .. } => "stale_discarded",
        }
    }
}

// ---------------------------------------------------------------------------
// ValidationTrace
// ---------------------------------------------------------------------------

/// Ordered record of [`ValidationEvent`]s.
#[derive(Debug, Clone, Default)]
pub struct ValidationTrace {
    events: Vec<ValidationEvent>,
}

impl ValidationTrace {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: ValidationEvent) {
        self.events.push(event);
    }

    /// Whether an event of `event_type` was recorded for `token`.
    #[must_use]
    pub fn contains_event_type(&self, token: ValidationToken, event_type: &str) -> bool {
        self.events
            .iter()
            .any(|e| e.token() == token && e.event_type() == event_type)
    }

    /// Number of events of the given type.
    #[must_use]
    pub fn count(&self, event_type: &str) -> usize {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .count()
    }

    /// Check the lifecycle invariants, returning one line per violation.
    ///
    /// 1. `Started` tokens are strictly increasing.
    /// 2. `StaleDiscarded` only for tokens older than the current one.
    /// 3. `Applied` is never recorded for a token that was cancelled.
    #[must_use]
    pub fn verify_invariants(&self) -> Vec<String> {
        let mut violations = Vec::new();

        let mut last_started = ValidationToken::NONE;
        for event in &self.events {
            if let ValidationEvent::Started { token, .. } = event {
                if *token <= last_started {
                    violations.push(format!(
                        "Non-monotonic start token: {token} after {last_started}"
                    ));
                }
                last_started = *token;
            }
        }

        for event in &self.events {
            match event {
                ValidationEvent::StaleDiscarded {
                    token,
                    current_token,
                    ..
                } if token >= current_token => {
                    violations.push(format!(
                        "StaleDiscarded with non-stale token: {token} >= {current_token}"
                    ));
                }
                ValidationEvent::Applied { token, .. }
                    if self.contains_event_type(*token, "cancelled") =>
                {
                    violations.push(format!("Applied result of cancelled {token}"));
                }
                _ => {}
            }
        }

        violations
    }
}

// ---------------------------------------------------------------------------
// AsyncValidationCoordinator
// ---------------------------------------------------------------------------

/// Issues tokens and decides which async results may be applied.
///
/// Single-threaded: it lives inside the control it guards and is only touched
/// from the update loop. Lookups themselves run elsewhere and come back as
/// `(token, result)` pairs.
pub struct AsyncValidationCoordinator {
    next_token: u64,
    current_token: ValidationToken,
    /// Issued and not yet resolved, oldest first.
    in_flight: VecDeque<ValidationToken>,
    trace: ValidationTrace,
    created_at: Instant,
}

impl std::fmt::Debug for AsyncValidationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncValidationCoordinator")
            .field("current_token", &self.current_token)
            .field("in_flight_count", &self.in_flight.len())
            .field("trace_events", &self.trace.events.len())
            .finish()
    }
}

impl Default for AsyncValidationCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncValidationCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_token: 1,
            current_token: ValidationToken::NONE,
            in_flight: VecDeque::new(),
            trace: ValidationTrace::new(),
            created_at: Instant::now(),
        }
    }

    fn elapsed_ns(&self) -> u64 {
        saturating_nanos(self.created_at.elapsed())
    }

    fn issue_token(&mut self) -> ValidationToken {
        let token = ValidationToken(self.next_token);
        self.next_token += 1;
        token
    }

    fn cancel_in_flight(&mut self, superseded_by: ValidationToken, elapsed_ns: u64) {
        for token in self.in_flight.drain(..) {
            tracing::trace!(%token, %superseded_by, "async check cancelled");
            self.trace.push(ValidationEvent::Cancelled {
                token,
                superseded_by,
                elapsed_ns,
            });
        }
    }

    /// Issue a token for new input, cancelling every older check.
    pub fn start_validation(&mut self) -> ValidationToken {
        let token = self.issue_token();
        let elapsed_ns = self.elapsed_ns();
        self.cancel_in_flight(token, elapsed_ns);

        self.in_flight.push_back(token);
        self.current_token = token;
        self.trace.push(ValidationEvent::Started { token, elapsed_ns });
        token
    }

    /// Cancel every outstanding check without starting a new one.
    ///
    /// Advances the current token so results still on their way are treated
    /// as stale when they arrive.
    pub fn cancel(&mut self) {
        if self.in_flight.is_empty() {
            return;
        }
        let token = self.issue_token();
        let elapsed_ns = self.elapsed_ns();
        self.cancel_in_flight(token, elapsed_ns);
        self.current_token = token;
    }

    /// Whether `token` is the newest issued and still unresolved.
    #[must_use]
    pub fn is_current(&self, token: ValidationToken) -> bool {
        token == self.current_token && self.in_flight.contains(&token)
    }

    /// Record that the lookup for `token` is being performed.
    ///
    /// Returns `false` (and records nothing) if the token was superseded
    /// while its debounce window was open.
    pub fn dispatch(&mut self, token: ValidationToken) -> bool {
        if !self.is_current(token) {
            return false;
        }
        let elapsed_ns = self.elapsed_ns();
        self.trace
            .push(ValidationEvent::Dispatched { token, elapsed_ns });
        true
    }

    #[must_use]
    pub fn current_token(&self) -> ValidationToken {
        self.current_token
    }

    /// Offer a lookup result.
    ///
    /// Returns `true` if the result was applied, `false` if it was stale.
    pub fn try_apply_result(
        &mut self,
        token: ValidationToken,
        result: &ValidationResult,
        duration: Duration,
    ) -> bool {
        let elapsed_ns = self.elapsed_ns();
        let is_valid = result.is_valid();

        self.trace.push(ValidationEvent::Completed {
            token,
            is_valid,
            duration_ns: saturating_nanos(duration),
            elapsed_ns,
        });

        if !self.is_current(token) {
            self.trace.push(ValidationEvent::StaleDiscarded {
                token,
                current_token: self.current_token,
                elapsed_ns,
            });
            return false;
        }

        self.in_flight.retain(|t| *t != token);
        self.trace.push(ValidationEvent::Applied {
            token,
            is_valid,
            elapsed_ns,
        });
        true
    }

    #[must_use]
    pub fn trace(&self) -> &ValidationTrace {
        &self.trace
    }

    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    #[must_use]
    pub fn has_in_flight(&self) -> bool {
        !self.in_flight.is_empty()
    }
}

fn saturating_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// AsyncValidator Trait
// ---------------------------------------------------------------------------

/// A rule that needs a slow or remote lookup.
///
/// `validate` blocks and is called off the update loop; it must not touch
/// form state. Staleness is handled by the coordinator, so implementations
/// stay stateless.
pub trait AsyncValidator<T: ?Sized>: Send + Sync {
    /// Perform the lookup for `value`.
    fn validate(&self, value: &T) -> ValidationResult;

    /// Quiet period after the last change before the lookup runs.
    fn debounce(&self) -> Duration {
        Duration::ZERO
    }

    /// Short name used in logs and task labels.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
