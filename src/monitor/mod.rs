//! Inactivity monitoring.
//!
//! [`activity`] turns raw input into throttled activity signals,
//! [`coordinator`] schedules the warning and timeout of each idle cycle, and
//! [`session`] wires both to the cross-context broadcaster.

pub mod activity;
pub mod coordinator;
pub mod session;

pub use activity::*;
pub use coordinator::*;
pub use session::*;
