#![forbid(unsafe_code)]

//! End-to-end registration flows on the deterministic simulator.
//!
//! Time only moves when a test calls `advance`, and in deferred mode lookups
//! and signups stay queued until the test completes them, in any order. This
//! makes the debounce window and out-of-order responses reproducible.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use quill_alert::{Alert, AlertLevel, AlertStore};
use quill_auth::{
    AuthenticationService, ERROR_CODE_TAKEN, Field, InMemoryAccounts, Msg, ProfileService,
    RegistrationConfig, RegistrationForm, SIGNUP_TASK, ServiceError, SignupRequest,
    USERNAME_LOOKUP_TASK,
};
use quill_forms::Status;
use quill_runtime::{CmdRecord, Program, ProgramSimulator, TaskMode};

const DEBOUNCE: Duration = Duration::from_millis(300);

/// Profile service that records every username it was asked about.
struct RecordingProfiles {
    accounts: Arc<InMemoryAccounts>,
    queries: Mutex<Vec<String>>,
}

impl RecordingProfiles {
    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

impl ProfileService for RecordingProfiles {
    fn is_username_taken(&self, username: &str) -> Result<bool, ServiceError> {
        self.queries.lock().unwrap().push(username.to_string());
        self.accounts.is_username_taken(username)
    }
}

/// Backend whose every call panics.
struct Crashing;

impl ProfileService for Crashing {
    fn is_username_taken(&self, _username: &str) -> Result<bool, ServiceError> {
        panic!("profile backend crashed");
    }
}

impl AuthenticationService for Crashing {
    fn signup(&self, _request: &SignupRequest) -> Result<(), ServiceError> {
        panic!("auth backend crashed");
    }
}

struct Harness {
    sim: ProgramSimulator<RegistrationForm>,
    profiles: Arc<RecordingProfiles>,
    accounts: Arc<InMemoryAccounts>,
    alerts: AlertStore,
}

fn harness(mode: TaskMode) -> Harness {
    let accounts = Arc::new(InMemoryAccounts::new().with_account("ann", "ann@example.com"));
    let profiles = Arc::new(RecordingProfiles {
        accounts: Arc::clone(&accounts),
        queries: Mutex::new(Vec::new()),
    });
    let alerts = AlertStore::new();
    let form = RegistrationForm::new(
        RegistrationConfig::default(),
        profiles.clone(),
        accounts.clone(),
        alerts.clone(),
    );
    let sim = ProgramSimulator::new(form).task_mode(mode);
    Harness {
        sim,
        profiles,
        accounts,
        alerts,
    }
}

impl Harness {
    fn type_into(&mut self, field: Field, value: &str) {
        self.sim.send(Msg::Input {
            field,
            value: value.to_string(),
        });
    }

    fn fill(&mut self, email: &str, username: &str, password: &str) {
        self.type_into(Field::Email, email);
        self.type_into(Field::Username, username);
        self.type_into(Field::Password, password);
        self.type_into(Field::PasswordConfirmation, password);
        for field in Field::ALL {
            self.sim.send(Msg::Blur(field));
        }
    }

    fn form(&self) -> &RegistrationForm {
        self.sim.model()
    }
}

#[test]
fn no_lookup_before_first_change() {
    let mut h = harness(TaskMode::Deferred);
    h.sim.advance(Duration::from_secs(5));
    assert_eq!(h.sim.pending_tasks(), 0);
    assert!(h.profiles.queries().is_empty());
}

#[test]
fn rapid_typing_coalesces_into_one_lookup() {
    let mut h = harness(TaskMode::Deferred);
    h.type_into(Field::Username, "ann");
    h.sim.advance(Duration::from_millis(150));
    h.type_into(Field::Username, "anna");
    h.sim.advance(Duration::from_millis(299));
    assert_eq!(h.sim.pending_tasks(), 0);
    assert!(h.form().form().pending());

    h.sim.advance(Duration::from_millis(1));
    assert_eq!(h.sim.pending_task_names(), vec![Some(USERNAME_LOOKUP_TASK)]);

    h.sim.run_all_tasks();
    assert_eq!(h.profiles.queries(), vec!["anna".to_string()]);
    let username = h.form().field(Field::Username).unwrap();
    assert_eq!(username.status(), Status::Valid);

    let lookups = h
        .sim
        .command_log()
        .iter()
        .filter(|record| **record == CmdRecord::Task(Some(USERNAME_LOOKUP_TASK.to_string())))
        .count();
    assert_eq!(lookups, 1);
}

#[test]
fn late_result_for_superseded_value_is_discarded() {
    let mut h = harness(TaskMode::Deferred);
    h.type_into(Field::Username, "ann");
    h.sim.advance(DEBOUNCE);
    h.type_into(Field::Username, "anna");
    h.sim.advance(DEBOUNCE);
    assert_eq!(h.sim.pending_tasks(), 2);

    // "anna" answers first, then the stale "ann" lookup arrives.
    assert!(h.sim.run_task(1));
    assert!(h.sim.run_task(0));
    assert_eq!(h.profiles.queries(), vec!["anna".to_string(), "ann".to_string()]);

    let username = h.form().field(Field::Username).unwrap();
    assert_eq!(username.value(), "anna");
    assert!(!username.has_error(ERROR_CODE_TAKEN));
    assert_eq!(username.status(), Status::Valid);

    let trace = username.validation_trace().unwrap();
    assert_eq!(trace.count("applied"), 1);
    assert_eq!(trace.count("stale_discarded"), 1);
    assert!(trace.verify_invariants().is_empty());
}

#[test]
fn taken_username_shows_after_lookup() {
    let mut h = harness(TaskMode::Immediate);
    h.type_into(Field::Username, "ann");
    assert!(!h.form().is_username_invalid());
    h.sim.advance(DEBOUNCE);
    assert!(h.form().is_username_invalid());
    assert!(
        h.form()
            .field(Field::Username)
            .unwrap()
            .has_error(ERROR_CODE_TAKEN)
    );
}

#[test]
fn editing_during_lookup_keeps_field_pending() {
    let mut h = harness(TaskMode::Deferred);
    h.type_into(Field::Username, "ann");
    h.sim.advance(DEBOUNCE);
    h.type_into(Field::Username, "bob");
    h.sim.run_all_tasks();
    // The "ann" answer was stale; "bob" is still inside its debounce window.
    assert!(h.form().field(Field::Username).unwrap().pending());
    assert!(!h.form().is_username_invalid());
}

#[test]
fn successful_signup_dispatches_one_success_alert() {
    let mut h = harness(TaskMode::Immediate);
    let alerts_rx = h.alerts.subscribe();
    h.fill("anna@example.com", "anna", "abcdef");
    h.sim.advance(DEBOUNCE);
    assert!(h.form().is_submittable());

    h.sim.send(Msg::Submit);
    assert_eq!(
        h.alerts.alerts(),
        vec![Alert::success(
            "Your account has been created, you can now log in."
        )]
    );
    assert_eq!(alerts_rx.drain().len(), 1);
    assert!(h.accounts.has_username("anna"));
    assert!(!h.form().is_submitting());
}

#[test]
fn rejected_signup_dispatches_service_message() {
    let mut h = harness(TaskMode::Deferred);
    h.fill("other@example.com", "ann", "abcdef");
    h.sim.send(Msg::Submit);
    assert!(h.form().is_submitting());
    assert_eq!(h.sim.pending_task_names(), vec![Some(SIGNUP_TASK)]);
    assert!(h.alerts.is_empty());

    h.sim.run_all_tasks();
    let alerts = h.alerts.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].level, AlertLevel::Error);
    assert_eq!(alerts[0].message, "Username already exists");
    assert!(!h.form().is_submitting());
}

#[test]
fn transport_failure_alert_carries_message() {
    let mut h = harness(TaskMode::Immediate);
    h.fill("anna@example.com", "anna", "abcdef");
    h.accounts.set_offline(true);
    h.sim.send(Msg::Submit);
    assert_eq!(
        h.alerts.last(),
        Some(Alert::error("Unable to reach the server"))
    );
    assert_eq!(h.alerts.len(), 1);
}

#[test]
fn offline_lookup_does_not_block_the_form() {
    let mut h = harness(TaskMode::Immediate);
    h.accounts.set_offline(true);
    h.fill("anna@example.com", "ann", "abcdef");
    h.sim.advance(DEBOUNCE);
    assert!(!h.form().is_username_invalid());
    assert!(h.form().is_submittable());
}

#[test]
fn reset_cancels_pending_lookup() {
    let mut h = harness(TaskMode::Deferred);
    h.type_into(Field::Username, "anna");
    h.sim.advance(DEBOUNCE);
    assert_eq!(h.sim.pending_tasks(), 1);
    h.sim.send(Msg::Reset);
    h.sim.run_all_tasks();

    let username = h.form().field(Field::Username).unwrap();
    assert_eq!(username.value(), "");
    assert!(username.pristine());
    assert!(!username.pending());
    assert!(!h.form().is_username_invalid());
}

#[test]
fn crashed_signup_still_alerts_once() {
    let alerts = AlertStore::new();
    let accounts = Arc::new(InMemoryAccounts::new());
    let form = RegistrationForm::new(
        RegistrationConfig::default(),
        accounts,
        Arc::new(Crashing),
        alerts.clone(),
    );
    let mut program = Program::new(form);
    program.send(Msg::Submit);
    assert!(program.model().is_submitting());

    assert!(program.run_until_idle().is_ok());
    assert_eq!(program.tasks_in_flight(), 0);
    let sent = alerts.alerts();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].level, AlertLevel::Error);
    assert!(!program.model().is_submitting());

    // A second pass has nothing left to wait for.
    assert!(program.run_until_idle().is_ok());
    assert_eq!(alerts.len(), 1);
}

#[test]
fn crashed_lookup_resolves_username_as_valid() {
    let accounts = Arc::new(InMemoryAccounts::new());
    let form = RegistrationForm::new(
        RegistrationConfig::default(),
        Arc::new(Crashing),
        accounts,
        AlertStore::new(),
    );
    let mut sim = ProgramSimulator::new(form).task_mode(TaskMode::Immediate);
    sim.send(Msg::Input {
        field: Field::Username,
        value: "anna".to_string(),
    });
    sim.advance(DEBOUNCE);

    let username = sim.model().field(Field::Username).unwrap();
    assert_eq!(username.status(), Status::Valid);
    assert!(!username.pending());
    assert!(!sim.model().is_username_invalid());
}
