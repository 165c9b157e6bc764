#![forbid(unsafe_code)]

//! The account registration screen.
//!
//! [`RegistrationForm`] owns the form tree:
//!
//! ```text
//! email               required, maxlength, email
//! username            required, maxlength, async unique-username
//! password            group rule: confirmation
//! ├── password        required, minlength
//! └── password2       required, minlength
//! ```
//!
//! and is driven through [`Msg`] by a `quill_runtime` executor. The view
//! reads the `is_*` predicates to decide which error hints to show; none of
//! them fire for a field the user has neither typed into nor left.
//!
//! # Username check
//!
//! Each change of `username` that passes the sync rules issues a new token
//! and arms a debounce timer carrying it. When the timer fires, the lookup
//! only starts if no later change has superseded the token. Lookup results
//! for superseded tokens are discarded on arrival.
//!
//! # Submission
//!
//! [`Msg::Submit`] sends the current values to the
//! [`AuthenticationService`] as a background task. The outcome becomes
//! exactly one alert on the shared [`AlertStore`].

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use quill_alert::{Alert, AlertAction, AlertStore};
use quill_forms::validation::{
    ERROR_CODE_MIN_LENGTH, ERROR_CODE_REQUIRED, Email, MaxLength, MinLength, Required,
    ValidationResult, ValidationToken,
};
use quill_forms::{AsyncRequest, FormControl, FormGroup, LookupOutcome};
use quill_runtime::{Cmd, Model};

use crate::config::RegistrationConfig;
use crate::service::{AuthenticationService, ProfileService, ServiceError, SignupRequest};
use crate::validators::{ERROR_CODE_CONFIRMATION, PasswordConfirmation, unique_username};

const EMAIL: &str = "email";
const USERNAME: &str = "username";
const PASSWORD_GROUP: &str = "password";
const PASSWORD: &str = "password.password";
const PASSWORD_CONFIRMATION: &str = "password.password2";

/// Task label of the username lookup.
pub const USERNAME_LOOKUP_TASK: &str = "username-lookup";
/// Task label of the signup call.
pub const SIGNUP_TASK: &str = "signup";

/// Alert text when the signup call dies without an answer.
const SIGNUP_CRASHED: &str = "Registration failed, please try again later.";

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// An input of the registration screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Email,
    Username,
    Password,
    PasswordConfirmation,
}

impl Field {
    pub const ALL: [Field; 4] = [
        Field::Email,
        Field::Username,
        Field::Password,
        Field::PasswordConfirmation,
    ];

    /// Path of the control in the form tree.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Field::Email => EMAIL,
            Field::Username => USERNAME,
            Field::Password => PASSWORD,
            Field::PasswordConfirmation => PASSWORD_CONFIRMATION,
        }
    }
}

#[derive(Debug)]
pub enum Msg {
    /// The user typed into `field`.
    Input { field: Field, value: String },
    /// `field` lost focus.
    Blur(Field),
    /// The debounce window of a username check closed.
    UsernameDebounced(ValidationToken),
    /// A username lookup finished.
    UsernameChecked(LookupOutcome),
    /// Mark every field touched so all error hints show.
    TouchAll,
    Submit,
    SignupCompleted(Result<(), ServiceError>),
    /// Back to an empty, pristine form.
    Reset,
}

// ---------------------------------------------------------------------------
// Form value
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PasswordPair {
    pub password: String,
    pub password2: String,
}

/// Snapshot of every value in the form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationValue {
    pub email: String,
    pub username: String,
    pub password: PasswordPair,
}

impl RegistrationValue {
    /// The signup payload; the confirmation entry is not sent.
    #[must_use]
    pub fn signup_request(&self) -> SignupRequest {
        SignupRequest {
            email: self.email.clone(),
            username: self.username.clone(),
            password: self.password.password.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// RegistrationForm
// ---------------------------------------------------------------------------

/// State of the registration screen.
pub struct RegistrationForm {
    config: RegistrationConfig,
    form: FormGroup,
    auth: Arc<dyn AuthenticationService>,
    alerts: AlertStore,
    signups_in_flight: usize,
}

impl std::fmt::Debug for RegistrationForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationForm")
            .field("config", &self.config)
            .field("form", &self.form)
            .field("signups_in_flight", &self.signups_in_flight)
            .finish_non_exhaustive()
    }
}

impl RegistrationForm {
    /// Build the form tree. No remote check runs until the first change.
    #[must_use]
    pub fn new(
        config: RegistrationConfig,
        profiles: Arc<dyn ProfileService>,
        auth: Arc<dyn AuthenticationService>,
        alerts: AlertStore,
    ) -> Self {
        let form = build_schema(&config, profiles);
        Self {
            config,
            form,
            auth,
            alerts,
            signups_in_flight: 0,
        }
    }

    // -- read access --

    #[must_use]
    pub fn form(&self) -> &FormGroup {
        &self.form
    }

    #[must_use]
    pub fn field(&self, field: Field) -> Option<&FormControl> {
        self.form.get_control(field.path())
    }

    #[must_use]
    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    #[must_use]
    pub fn value(&self) -> RegistrationValue {
        let read = |path: &str| self.form.value_at(path).unwrap_or_default().to_string();
        RegistrationValue {
            email: read(EMAIL),
            username: read(USERNAME),
            password: PasswordPair {
                password: read(PASSWORD),
                password2: read(PASSWORD_CONFIRMATION),
            },
        }
    }

    /// Whether a signup call is outstanding.
    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.signups_in_flight > 0
    }

    // -- error predicates --

    #[must_use]
    pub fn is_username_invalid(&self) -> bool {
        self.shows_error(USERNAME)
    }

    #[must_use]
    pub fn is_password_invalid(&self) -> bool {
        self.shows_error(PASSWORD)
    }

    /// The group-level mismatch hint. Suppressed while the password itself
    /// shows an error, and until the confirmation entry was interacted with.
    #[must_use]
    pub fn is_password_confirmation_invalid(&self) -> bool {
        let group_invalid = self
            .form
            .get(PASSWORD_GROUP)
            .is_some_and(|node| node.invalid());
        let confirmation_interacted = self
            .form
            .get(PASSWORD_CONFIRMATION)
            .is_some_and(|node| node.interaction().interacted());
        group_invalid && !self.is_password_invalid() && confirmation_interacted
    }

    #[must_use]
    pub fn is_email_invalid(&self) -> bool {
        self.shows_error(EMAIL)
    }

    #[must_use]
    pub fn is_password_too_short(&self) -> bool {
        self.form.get(PASSWORD).is_some_and(|node| {
            let errors = node.errors();
            errors.contains(ERROR_CODE_REQUIRED) || errors.contains(ERROR_CODE_MIN_LENGTH)
        })
    }

    #[must_use]
    pub fn is_password_not_confirmed(&self) -> bool {
        self.form
            .get_group(PASSWORD_GROUP)
            .is_some_and(|group| group.has_error(ERROR_CODE_CONFIRMATION))
    }

    /// Every rule passed and no check is outstanding.
    #[must_use]
    pub fn is_submittable(&self) -> bool {
        self.form.valid()
    }

    fn shows_error(&self, path: &str) -> bool {
        self.form
            .get(path)
            .is_some_and(|node| node.invalid() && node.interaction().interacted())
    }

    // -- effects --

    fn schedule_check(path: &str, request: AsyncRequest) -> Cmd<Msg> {
        if path != USERNAME {
            return Cmd::none();
        }
        let msg = Msg::UsernameDebounced(request.token);
        if request.delay.is_zero() {
            Cmd::msg(msg)
        } else {
            Cmd::after(request.delay, msg)
        }
    }

    fn submit(&mut self) -> Cmd<Msg> {
        let request = self.value().signup_request();
        self.signups_in_flight += 1;
        tracing::info!(
            username = %request.username,
            status = %self.form.status(),
            "submitting registration"
        );
        let auth = Arc::clone(&self.auth);
        Cmd::task_named(SIGNUP_TASK, move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| auth.signup(&request)))
                .unwrap_or_else(|_| Err(ServiceError::transport(SIGNUP_CRASHED)));
            Msg::SignupCompleted(result)
        })
    }

    fn finish_signup(&mut self, result: Result<(), ServiceError>) {
        self.signups_in_flight = self.signups_in_flight.saturating_sub(1);
        let alert = match result {
            Ok(()) => {
                tracing::info!("registration succeeded");
                Alert::success(self.config.success_message.clone())
            }
            Err(err) => {
                tracing::warn!(kind = ?err.kind, error = %err, "registration failed");
                Alert::error(err.message())
            }
        };
        self.alerts.dispatch(AlertAction::AlertSent(alert));
    }
}

impl Model for RegistrationForm {
    type Message = Msg;

    fn update(&mut self, msg: Msg) -> Cmd<Msg> {
        match msg {
            Msg::Input { field, value } => {
                let path = field.path();
                tracing::trace!(field = path, "input");
                match self.form.input(path, value) {
                    Some(request) => Self::schedule_check(path, request),
                    None => Cmd::none(),
                }
            }
            Msg::Blur(field) => {
                self.form.blur(field.path());
                Cmd::none()
            }
            Msg::UsernameDebounced(token) => match self.form.begin_async(USERNAME, token) {
                Some(lookup) => {
                    tracing::debug!(%token, "username lookup started");
                    Cmd::task_named(USERNAME_LOOKUP_TASK, move || {
                        // A crashed lookup resolves like an unreachable server.
                        let outcome = panic::catch_unwind(AssertUnwindSafe(|| lookup.run()))
                            .unwrap_or_else(|_| LookupOutcome {
                                token,
                                result: ValidationResult::Valid,
                                duration: Duration::ZERO,
                            });
                        Msg::UsernameChecked(outcome)
                    })
                }
                None => Cmd::none(),
            },
            Msg::UsernameChecked(outcome) => {
                self.form.complete_async(USERNAME, outcome);
                Cmd::none()
            }
            Msg::TouchAll => {
                self.form.mark_all_as_touched();
                Cmd::none()
            }
            Msg::Submit => self.submit(),
            Msg::SignupCompleted(result) => {
                self.finish_signup(result);
                Cmd::none()
            }
            Msg::Reset => {
                let cmds = self
                    .form
                    .reset()
                    .into_iter()
                    .map(|(path, request)| Self::schedule_check(&path, request))
                    .collect();
                Cmd::batch(cmds)
            }
        }
    }
}

fn build_schema(config: &RegistrationConfig, profiles: Arc<dyn ProfileService>) -> FormGroup {
    let password = || {
        FormControl::new("")
            .validator(Required::new())
            .validator(MinLength::new(config.password_min_length))
    };

    FormGroup::new()
        .control(
            EMAIL,
            FormControl::new("")
                .validator(Required::new())
                .validator(MaxLength::new(config.email_max_length))
                .validator(Email::new()),
        )
        .control(
            USERNAME,
            FormControl::new("")
                .validator(Required::new())
                .validator(MaxLength::new(config.username_max_length))
                .async_validator(unique_username(profiles, config.username_debounce())),
        )
        .group(
            PASSWORD_GROUP,
            FormGroup::new()
                .control("password", password())
                .control("password2", password())
                .validator(PasswordConfirmation::default()),
        )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::InMemoryAccounts;
    use quill_alert::AlertLevel;
    use quill_forms::Status;
    use quill_forms::validation::ERROR_CODE_MAX_LENGTH;

    fn screen() -> (RegistrationForm, AlertStore) {
        let accounts = Arc::new(InMemoryAccounts::new().with_account("taken", "t@x.io"));
        let alerts = AlertStore::new();
        let form = RegistrationForm::new(
            RegistrationConfig::default(),
            accounts.clone(),
            accounts,
            alerts.clone(),
        );
        (form, alerts)
    }

    fn input(form: &mut RegistrationForm, field: Field, value: &str) -> Cmd<Msg> {
        form.update(Msg::Input {
            field,
            value: value.into(),
        })
    }

    #[test]
    fn fresh_form_shows_no_errors() {
        let (form, alerts) = screen();
        assert!(form.form().invalid());
        assert!(!form.is_email_invalid());
        assert!(!form.is_username_invalid());
        assert!(!form.is_password_invalid());
        assert!(!form.is_password_confirmation_invalid());
        assert!(form.is_password_too_short());
        assert!(!form.is_password_not_confirmed());
        assert!(!form.is_submittable());
        assert!(alerts.is_empty());
    }

    #[test]
    fn blur_reveals_required_error() {
        let (mut form, _) = screen();
        form.update(Msg::Blur(Field::Email));
        assert!(form.is_email_invalid());
        assert!(form.field(Field::Email).unwrap().has_error(ERROR_CODE_REQUIRED));
    }

    #[test]
    fn email_rules() {
        let (mut form, _) = screen();
        input(&mut form, Field::Email, "not-an-email");
        assert!(form.is_email_invalid());
        input(&mut form, Field::Email, &format!("{}@x.io", "a".repeat(130)));
        assert!(form.field(Field::Email).unwrap().has_error(ERROR_CODE_MAX_LENGTH));
        input(&mut form, Field::Email, "anna@example.com");
        assert!(!form.is_email_invalid());
    }

    #[test]
    fn mismatched_passwords() {
        let (mut form, _) = screen();
        input(&mut form, Field::Password, "abcdef");
        input(&mut form, Field::PasswordConfirmation, "abcxyz");
        assert!(form.is_password_not_confirmed());
        assert!(!form.is_password_too_short());
        assert!(!form.is_password_invalid());
        assert!(form.is_password_confirmation_invalid());
    }

    #[test]
    fn short_password() {
        let (mut form, _) = screen();
        input(&mut form, Field::Password, "ab");
        let control = form.field(Field::Password).unwrap();
        let error = control.errors().get(ERROR_CODE_MIN_LENGTH).unwrap();
        assert_eq!(error.param("requiredLength"), Some("6"));
        assert_eq!(error.param("actualLength"), Some("2"));
        assert!(form.is_password_too_short());
        assert!(form.is_password_invalid());
    }

    #[test]
    fn confirmation_hint_waits_for_second_entry() {
        let (mut form, _) = screen();
        input(&mut form, Field::Password, "abcdef");
        assert!(form.is_password_not_confirmed());
        assert!(!form.is_password_confirmation_invalid());
        form.update(Msg::Blur(Field::PasswordConfirmation));
        assert!(form.is_password_confirmation_invalid());
    }

    #[test]
    fn username_input_arms_debounce_timer() {
        let (mut form, _) = screen();
        let cmd = input(&mut form, Field::Username, "anna");
        assert!(matches!(
            cmd,
            Cmd::After(d, Msg::UsernameDebounced(_)) if d == Duration::from_millis(300)
        ));
        assert_eq!(form.field(Field::Username).unwrap().status(), Status::Pending);
        assert!(form.form().pending());
    }

    #[test]
    fn username_length_limit() {
        let (mut form, _) = screen();
        let at_limit = input(&mut form, Field::Username, &"a".repeat(32));
        assert!(matches!(at_limit, Cmd::After(_, Msg::UsernameDebounced(_))));
        assert!(!form.field(Field::Username).unwrap().has_error(ERROR_CODE_MAX_LENGTH));

        let over = input(&mut form, Field::Username, &"a".repeat(33));
        assert!(over.is_none());
        let username = form.field(Field::Username).unwrap();
        assert!(username.has_error(ERROR_CODE_MAX_LENGTH));
        assert!(username.invalid());
        assert!(form.is_username_invalid());
    }

    #[test]
    fn zero_debounce_checks_immediately() {
        let accounts = Arc::new(InMemoryAccounts::new());
        let mut form = RegistrationForm::new(
            RegistrationConfig::default().with_username_debounce(Duration::ZERO),
            accounts.clone(),
            accounts,
            AlertStore::new(),
        );
        let cmd = input(&mut form, Field::Username, "anna");
        let Cmd::Msg(debounced @ Msg::UsernameDebounced(_)) = cmd else {
            panic!("expected an immediate check");
        };
        assert!(matches!(form.update(debounced), Cmd::Task(..)));
    }

    #[test]
    fn sync_failure_skips_lookup() {
        let (mut form, _) = screen();
        let cmd = input(&mut form, Field::Username, "");
        assert!(cmd.is_none());
        assert!(form.is_username_invalid());
    }

    #[test]
    fn superseded_debounce_does_not_start_lookup() {
        let (mut form, _) = screen();
        let Cmd::After(_, first) = input(&mut form, Field::Username, "ann") else {
            panic!("expected debounce timer");
        };
        input(&mut form, Field::Username, "anna");
        assert!(form.update(first).is_none());
    }

    #[test]
    fn taken_username_is_reported() {
        let (mut form, _) = screen();
        let Cmd::After(_, debounced) = input(&mut form, Field::Username, "taken") else {
            panic!("expected debounce timer");
        };
        let Cmd::Task(spec, run) = form.update(debounced) else {
            panic!("expected lookup task");
        };
        assert_eq!(spec.name.as_deref(), Some(USERNAME_LOOKUP_TASK));
        form.update(run());
        assert!(form.is_username_invalid());
        assert!(form.field(Field::Username).unwrap().has_error("taken"));
    }

    #[test]
    fn submit_sends_password_not_confirmation() {
        let (mut form, _) = screen();
        input(&mut form, Field::Email, "anna@example.com");
        input(&mut form, Field::Username, "anna");
        input(&mut form, Field::Password, "abcdef");
        input(&mut form, Field::PasswordConfirmation, "abcdeg");
        let request = form.value().signup_request();
        assert_eq!(request.password, "abcdef");
        assert_eq!(form.value().password.password2, "abcdeg");
    }

    #[test]
    fn signup_outcome_becomes_one_alert() {
        let (mut form, alerts) = screen();
        form.update(Msg::SignupCompleted(Ok(())));
        form.update(Msg::SignupCompleted(Err(ServiceError::rejected(
            "Username already exists",
        ))));
        let log = alerts.alerts();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].level, AlertLevel::Success);
        assert_eq!(
            log[0].message,
            "Your account has been created, you can now log in."
        );
        assert_eq!(log[1], Alert::error("Username already exists"));
    }

    #[test]
    fn touch_all_reveals_every_error() {
        let (mut form, _) = screen();
        form.update(Msg::TouchAll);
        assert!(form.is_email_invalid());
        assert!(form.is_username_invalid());
        assert!(form.is_password_invalid());
        let summary = form.form().errors_summary();
        assert!(summary.contains(&("email".to_string(), ERROR_CODE_REQUIRED)));
        assert!(summary.contains(&("password.password2".to_string(), ERROR_CODE_REQUIRED)));
    }

    #[test]
    fn reset_returns_to_pristine() {
        let (mut form, _) = screen();
        input(&mut form, Field::Email, "x");
        form.update(Msg::Blur(Field::Email));
        assert!(form.is_email_invalid());
        let cmd = form.update(Msg::Reset);
        assert!(cmd.is_none());
        assert!(!form.is_email_invalid());
        assert_eq!(form.value(), RegistrationValue::default());
        assert!(!form.form().dirty());
    }
}
