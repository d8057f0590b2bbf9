//! Deadline alerts: generation sweeps and manual handling.

pub mod domain;
pub mod service;
pub mod sweep;

pub use domain::{Alert, AlertPriority, AlertState, AlertSubject, AlertType};
pub use service::{AlertService, ALERT_TEMPLATE};
pub use sweep::AlertSweeper;
