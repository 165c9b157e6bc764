#![forbid(unsafe_code)]

//! Quill Alert
//!
//! Leveled notifications ([`Alert`]) and the shared [`AlertStore`] screens
//! dispatch them to. The rendering layer subscribes to the store and shows
//! each alert as a toast.

pub mod alert;
pub mod store;

pub use alert::{Alert, AlertLevel};
pub use store::{AlertAction, AlertReceiver, AlertStore};
