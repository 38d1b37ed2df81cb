//! Per-alert pipeline: decide, render, route, send.

mod dispatcher;
mod filter;
mod formatter;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use filter::{Decision, NotificationFilter, SkipReason};
pub use formatter::MessageFormatter;
