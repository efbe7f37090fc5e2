//! sessionguard - inactivity session monitor
//!
//! Detects user inactivity across execution contexts that share an activity
//! medium, warns ahead of expiry and invokes a logout handler at most once
//! per idle cycle.

pub mod clock;
pub mod config;
pub mod database;
pub mod error;
pub mod monitor;
pub mod notify;
pub mod server;
pub mod sync;

pub use config::MonitorConfig;
pub use error::{MediumError, MonitorError};
pub use monitor::{CoordinatorState, InputKind, SessionMonitor};
pub use notify::{Notifier, SessionNotice};
