//! Notification port and post-commit dispatch

pub mod dispatcher;
pub mod ports;

pub use dispatcher::{DeliveryMode, NotificationDispatcher};
