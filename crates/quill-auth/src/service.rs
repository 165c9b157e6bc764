#![forbid(unsafe_code)]

//! Remote collaborators of the registration screen.
//!
//! Both traits are blocking; the screen calls them from runtime tasks, never
//! from `update`. [`InMemoryAccounts`] implements both against an in-process
//! account table.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a service call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    /// The server refused the request (duplicate account, bad input).
    Rejected,
    /// The request never got a usable answer.
    Transport,
}

/// Error returned by a service call. `message` is user-facing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    pub kind: ServiceErrorKind,
    message: String,
}

impl ServiceError {
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            kind: ServiceErrorKind::Rejected,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: ServiceErrorKind::Transport,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ServiceError {}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Payload of a signup call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

/// Profile lookups.
pub trait ProfileService: Send + Sync {
    /// Whether `username` already belongs to an account.
    fn is_username_taken(&self, username: &str) -> Result<bool, ServiceError>;
}

/// Account creation.
pub trait AuthenticationService: Send + Sync {
    fn signup(&self, request: &SignupRequest) -> Result<(), ServiceError>;
}

// ---------------------------------------------------------------------------
// InMemoryAccounts
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Accounts {
    usernames: HashSet<String>,
    emails: HashSet<String>,
    offline: bool,
}

/// In-process account table implementing both service traits.
#[derive(Debug, Default)]
pub struct InMemoryAccounts {
    accounts: Mutex<Accounts>,
}

impl InMemoryAccounts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-register an account.
    #[must_use]
    pub fn with_account(self, username: &str, email: &str) -> Self {
        {
            let mut accounts = self.lock();
            accounts.usernames.insert(username.to_string());
            accounts.emails.insert(email.to_string());
        }
        self
    }

    /// Make every call fail with a transport error while `offline` is set.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    #[must_use]
    pub fn account_count(&self) -> usize {
        self.lock().usernames.len()
    }

    #[must_use]
    pub fn has_username(&self, username: &str) -> bool {
        self.lock().usernames.contains(username)
    }

    fn lock(&self) -> MutexGuard<'_, Accounts> {
        self.accounts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn unreachable_error() -> ServiceError {
    ServiceError::transport("Unable to reach the server")
}

impl ProfileService for InMemoryAccounts {
    fn is_username_taken(&self, username: &str) -> Result<bool, ServiceError> {
        let accounts = self.lock();
        if accounts.offline {
            return Err(unreachable_error());
        }
        Ok(accounts.usernames.contains(username))
    }
}

impl AuthenticationService for InMemoryAccounts {
    fn signup(&self, request: &SignupRequest) -> Result<(), ServiceError> {
        let mut accounts = self.lock();
        if accounts.offline {
            return Err(unreachable_error());
        }
        if accounts.usernames.contains(&request.username) {
            return Err(ServiceError::rejected("Username already exists"));
        }
        if accounts.emails.contains(&request.email) {
            return Err(ServiceError::rejected("Email already exists"));
        }
        accounts.usernames.insert(request.username.clone());
        accounts.emails.insert(request.email.clone());
        tracing::info!(username = %request.username, "account created");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(username: &str, email: &str) -> SignupRequest {
        SignupRequest {
            email: email.into(),
            username: username.into(),
            password: "secret".into(),
        }
    }

    #[test]
    fn signup_registers_account() {
        let accounts = InMemoryAccounts::new();
        accounts.signup(&request("anna", "anna@x.io")).unwrap();
        assert!(accounts.has_username("anna"));
        assert_eq!(accounts.is_username_taken("anna"), Ok(true));
        assert_eq!(accounts.is_username_taken("bob"), Ok(false));
    }

    #[test]
    fn duplicate_username_rejected() {
        let accounts = InMemoryAccounts::new().with_account("anna", "anna@x.io");
        let err = accounts.signup(&request("anna", "other@x.io")).unwrap_err();
        assert_eq!(err.kind, ServiceErrorKind::Rejected);
        assert_eq!(err.message(), "Username already exists");
    }

    #[test]
    fn duplicate_email_rejected() {
        let accounts = InMemoryAccounts::new().with_account("anna", "anna@x.io");
        let err = accounts.signup(&request("bob", "anna@x.io")).unwrap_err();
        assert_eq!(err.to_string(), "Email already exists");
        assert_eq!(accounts.account_count(), 1);
    }

    #[test]
    fn offline_fails_with_transport_error() {
        let accounts = InMemoryAccounts::new();
        accounts.set_offline(true);
        assert_eq!(
            accounts.is_username_taken("anna").unwrap_err().kind,
            ServiceErrorKind::Transport
        );
        assert!(accounts.signup(&request("anna", "a@x.io")).is_err());
        accounts.set_offline(false);
        assert!(accounts.signup(&request("anna", "a@x.io")).is_ok());
    }
}
