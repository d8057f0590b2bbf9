//! Software licenses, seat usage and compliance.

pub mod domain;
pub mod service;

pub use domain::{ComplianceStatus, License, LicenseState, LicenseType};
pub use service::{LicenseService, RenewalQuote};
