//! Property-based tests for the registration error predicates.
//!
//! 1. A field's error hint shows exactly when the field is invalid and was
//!    typed into or left; a field nobody interacted with never shows one.
//! 2. The confirmation hint never shows together with the password hint.

use std::sync::Arc;

use proptest::prelude::*;
use quill_alert::AlertStore;
use quill_auth::{Field, InMemoryAccounts, Msg, RegistrationConfig, RegistrationForm};
use quill_runtime::Model;

#[derive(Debug, Clone)]
enum Op {
    Input(Field, String),
    Blur(Field),
}

fn field() -> impl Strategy<Value = Field> {
    prop::sample::select(Field::ALL.to_vec())
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (field(), "[a-z@.]{0,40}").prop_map(|(f, v)| Op::Input(f, v)),
        1 => field().prop_map(Op::Blur),
    ]
}

fn screen() -> RegistrationForm {
    let accounts = Arc::new(InMemoryAccounts::new());
    RegistrationForm::new(
        RegistrationConfig::default(),
        accounts.clone(),
        accounts,
        AlertStore::new(),
    )
}

fn apply(form: &mut RegistrationForm, op: &Op) {
    // Returned commands are dropped: timers never fire, lookups never run.
    let _ = match op {
        Op::Input(field, value) => form.update(Msg::Input {
            field: *field,
            value: value.clone(),
        }),
        Op::Blur(field) => form.update(Msg::Blur(*field)),
    };
}

fn hint(form: &RegistrationForm, field: Field) -> bool {
    match field {
        Field::Email => form.is_email_invalid(),
        Field::Username => form.is_username_invalid(),
        Field::Password => form.is_password_invalid(),
        Field::PasswordConfirmation => form.is_password_confirmation_invalid(),
    }
}

proptest! {
    #[test]
    fn hint_iff_invalid_and_interacted(ops in prop::collection::vec(op(), 0..32)) {
        let mut form = screen();
        for op in &ops {
            apply(&mut form, op);
            for field in [Field::Email, Field::Username, Field::Password] {
                let control = form.field(field).unwrap();
                let expected = control.invalid() && (control.dirty() || control.touched());
                prop_assert_eq!(hint(&form, field), expected);
            }
        }

        for field in Field::ALL {
            let used = ops.iter().any(|op| match op {
                Op::Input(f, _) | Op::Blur(f) => *f == field,
            });
            if !used {
                prop_assert!(!hint(&form, field), "{:?} shows a hint untouched", field);
            }
        }
    }

    #[test]
    fn confirmation_hint_yields_to_password_hint(ops in prop::collection::vec(op(), 0..32)) {
        let mut form = screen();
        for op in &ops {
            apply(&mut form, op);
            if form.is_password_invalid() {
                prop_assert!(!form.is_password_confirmation_invalid());
            }
        }
    }
}
