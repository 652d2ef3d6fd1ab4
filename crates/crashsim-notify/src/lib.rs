//! crashsim notifications
//!
//! [`NotificationDispatcher`] turns a [`CrashRecord`](crashsim_model::CrashRecord)
//! into a [`CrashNotification`] and hands it to a [`MessageSink`]. Delivery is
//! best-effort: the outcome is reported, never raised.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod dispatcher;
mod error;
mod message;
mod sink;

pub use dispatcher::{NotificationDispatcher, DEFAULT_DASHBOARD_URL, DEFAULT_NOTIFY_TIMEOUT};
pub use error::NotifyError;
pub use message::{sample_link, thousands, CrashNotification};
pub use sink::{MessageSink, SlackConfig, SlackSink, SLACK_API_BASE};
