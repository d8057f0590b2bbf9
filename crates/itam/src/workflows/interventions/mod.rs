//! On-site work: scheduling, completion and satisfaction tracking.

pub mod domain;
pub mod service;

pub use domain::{Intervention, InterventionKind, InterventionState};
pub use service::InterventionService;
