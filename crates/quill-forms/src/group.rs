#![forbid(unsafe_code)]

//! Named trees of controls with group-level rules.
//!
//! A [`FormGroup`] owns its children in declaration order. Nodes are
//! addressed by dotted paths (`"password.password2"`). Every mutation goes
//! through the root so the rules of each group on the path are re-run after
//! the control changes.
//!
//! Group status follows the usual reactive-forms precedence:
//!
//! 1. own errors present: `Invalid`
//! 2. any child `Pending`: `Pending`
//! 3. any child `Invalid`: `Invalid`
//! 4. otherwise `Valid`

use crate::control::{AsyncRequest, FormControl, LookupOutcome, PendingLookup};
use crate::state::{Interaction, Status};
use crate::validation::{ValidationErrors, ValidationResult, ValidationToken};

/// A rule over a whole group (for example "both passwords match").
pub trait GroupValidator: Send + Sync {
    fn validate(&self, group: &FormGroup) -> ValidationResult;
}

impl<F> GroupValidator for F
where
    F: Fn(&FormGroup) -> ValidationResult + Send + Sync,
{
    fn validate(&self, group: &FormGroup) -> ValidationResult {
        self(group)
    }
}

/// A child of a group.
#[derive(Debug)]
pub enum FormNode {
    Control(FormControl),
    Group(FormGroup),
}

impl FormNode {
    #[must_use]
    pub fn status(&self) -> Status {
        match self {
            Self::Control(c) => c.status(),
            Self::Group(g) => g.status(),
        }
    }

    #[must_use]
    pub fn errors(&self) -> &ValidationErrors {
        match self {
            Self::Control(c) => c.errors(),
            Self::Group(g) => g.errors(),
        }
    }

    #[must_use]
    pub fn interaction(&self) -> Interaction {
        match self {
            Self::Control(c) => c.interaction(),
            Self::Group(g) => g.interaction(),
        }
    }

    #[must_use]
    pub fn invalid(&self) -> bool {
        self.status() == Status::Invalid
    }
}

/// Split `"a.b.c"` into `("a", Some("b.c"))`.
fn split_path(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    }
}

/// A composite of named controls and groups.
#[derive(Default)]
pub struct FormGroup {
    children: Vec<(String, FormNode)>,
    validators: Vec<Box<dyn GroupValidator>>,
    errors: ValidationErrors,
}

impl std::fmt::Debug for FormGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormGroup")
            .field("children", &self.children)
            .field("errors", &self.errors)
            .field("validators", &self.validators.len())
            .finish()
    }
}

impl FormGroup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named control.
    #[must_use]
    pub fn control(mut self, name: impl Into<String>, control: FormControl) -> Self {
        self.children.push((name.into(), FormNode::Control(control)));
        self.run_validators();
        self
    }

    /// Add a named sub-group.
    #[must_use]
    pub fn group(mut self, name: impl Into<String>, group: FormGroup) -> Self {
        self.children.push((name.into(), FormNode::Group(group)));
        self.run_validators();
        self
    }

    /// Attach a group-level rule.
    #[must_use]
    pub fn validator(mut self, validator: impl GroupValidator + 'static) -> Self {
        self.validators.push(Box::new(validator));
        self.run_validators();
        self
    }

    // -- lookup --

    /// Find the node at `path`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&FormNode> {
        let (head, rest) = split_path(path);
        let node = self.child(head)?;
        match (node, rest) {
            (node, None) => Some(node),
            (FormNode::Group(g), Some(rest)) => g.get(rest),
            (FormNode::Control(_), Some(_)) => None,
        }
    }

    /// Find the control at `path`.
    #[must_use]
    pub fn get_control(&self, path: &str) -> Option<&FormControl> {
        match self.get(path)? {
            FormNode::Control(c) => Some(c),
            FormNode::Group(_) => None,
        }
    }

    /// Find the group at `path`.
    #[must_use]
    pub fn get_group(&self, path: &str) -> Option<&FormGroup> {
        match self.get(path)? {
            FormNode::Group(g) => Some(g),
            FormNode::Control(_) => None,
        }
    }

    /// Current value of the control at `path`.
    #[must_use]
    pub fn value_at(&self, path: &str) -> Option<&str> {
        self.get_control(path).map(FormControl::value)
    }

    /// Direct children in declaration order.
    pub fn children(&self) -> impl Iterator<Item = (&str, &FormNode)> {
        self.children.iter().map(|(name, node)| (name.as_str(), node))
    }

    fn child(&self, name: &str) -> Option<&FormNode> {
        self.children
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, node)| node)
    }

    fn child_mut(&mut self, name: &str) -> Option<&mut FormNode> {
        self.children
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, node)| node)
    }

    // -- aggregate state --

    /// Errors produced by this group's own rules.
    #[must_use]
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    #[must_use]
    pub fn has_error(&self, code: &str) -> bool {
        self.errors.contains(code)
    }

    #[must_use]
    pub fn status(&self) -> Status {
        if !self.errors.is_empty() {
            return Status::Invalid;
        }
        let statuses = || self.children.iter().map(|(_, node)| node.status());
        if statuses().any(|s| s == Status::Pending) {
            Status::Pending
        } else if statuses().any(|s| s == Status::Invalid) {
            Status::Invalid
        } else {
            Status::Valid
        }
    }

    #[must_use]
    pub fn valid(&self) -> bool {
        self.status() == Status::Valid
    }

    #[must_use]
    pub fn invalid(&self) -> bool {
        self.status() == Status::Invalid
    }

    #[must_use]
    pub fn pending(&self) -> bool {
        self.status() == Status::Pending
    }

    /// Any-of interaction over all descendants.
    #[must_use]
    pub fn interaction(&self) -> Interaction {
        self.children
            .iter()
            .fold(Interaction::PRISTINE, |acc, (_, node)| {
                acc.merge(node.interaction())
            })
    }

    #[must_use]
    pub fn dirty(&self) -> bool {
        self.interaction().dirty
    }

    #[must_use]
    pub fn touched(&self) -> bool {
        self.interaction().touched
    }

    /// Every failing `(path, code)` pair, group errors included, in tree order.
    #[must_use]
    pub fn errors_summary(&self) -> Vec<(String, &'static str)> {
        let mut summary = Vec::new();
        self.collect_errors("", &mut summary);
        summary
    }

    fn collect_errors(&self, prefix: &str, out: &mut Vec<(String, &'static str)>) {
        let here = prefix.trim_end_matches('.');
        out.extend(self.errors.codes().map(|code| (here.to_string(), code)));
        for (name, node) in &self.children {
            let path = format!("{prefix}{name}");
            match node {
                FormNode::Control(c) => {
                    out.extend(c.errors().codes().map(|code| (path.clone(), code)));
                }
                FormNode::Group(g) => g.collect_errors(&format!("{path}."), out),
            }
        }
    }

    // -- mutation --

    /// Apply `f` to the control at `path`, then re-run the rules of every
    /// group on the path (innermost first).
    ///
    /// Returns `None` if `path` does not name a control.
    pub fn update_control<R>(
        &mut self,
        path: &str,
        f: impl FnOnce(&mut FormControl) -> R,
    ) -> Option<R> {
        let (head, rest) = split_path(path);
        let out = match (self.child_mut(head)?, rest) {
            (FormNode::Control(c), None) => Some(f(c)),
            (FormNode::Group(g), Some(rest)) => g.update_control(rest, f),
            _ => None,
        };
        if out.is_some() {
            self.run_validators();
        } else {
            tracing::warn!(path, "no control at path");
        }
        out
    }

    /// User input into the control at `path`.
    pub fn input(&mut self, path: &str, value: impl Into<String>) -> Option<AsyncRequest> {
        self.update_control(path, |c| c.input(value)).flatten()
    }

    /// Programmatic value change of the control at `path`.
    pub fn set_value(&mut self, path: &str, value: impl Into<String>) -> Option<AsyncRequest> {
        self.update_control(path, |c| c.set_value(value)).flatten()
    }

    /// The control at `path` lost focus.
    pub fn blur(&mut self, path: &str) {
        self.update_control(path, FormControl::blur);
    }

    /// See [`FormControl::begin_async`].
    pub fn begin_async(&mut self, path: &str, token: ValidationToken) -> Option<PendingLookup> {
        self.update_control(path, |c| c.begin_async(token))
            .flatten()
    }

    /// See [`FormControl::complete_async`].
    pub fn complete_async(&mut self, path: &str, outcome: LookupOutcome) -> bool {
        self.update_control(path, |c| c.complete_async(outcome))
            .unwrap_or(false)
    }

    /// Mark every descendant control touched.
    pub fn mark_all_as_touched(&mut self) {
        for (_, node) in &mut self.children {
            match node {
                FormNode::Control(c) => c.mark_as_touched(),
                FormNode::Group(g) => g.mark_all_as_touched(),
            }
        }
    }

    /// Reset every descendant control, returning the async checks to
    /// schedule keyed by control path.
    pub fn reset(&mut self) -> Vec<(String, AsyncRequest)> {
        let mut requests = Vec::new();
        self.reset_into("", &mut requests);
        requests
    }

    fn reset_into(&mut self, prefix: &str, out: &mut Vec<(String, AsyncRequest)>) {
        for (name, node) in &mut self.children {
            let path = format!("{prefix}{name}");
            match node {
                FormNode::Control(c) => {
                    if let Some(request) = c.reset() {
                        out.push((path, request));
                    }
                }
                FormNode::Group(g) => g.reset_into(&format!("{path}."), out),
            }
        }
        self.run_validators();
    }

    fn run_validators(&mut self) {
        let errors: ValidationErrors = self
            .validators
            .iter()
            .filter_map(|v| v.validate(self).into_error())
            .collect();
        self.errors = errors;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
