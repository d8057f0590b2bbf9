pub mod alerts;
pub mod assets;
pub mod contracts;
pub mod interventions;
pub mod licenses;
pub mod tickets;

#[cfg(test)]
pub(crate) mod tests;

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::store::{AssetId, ContractId, EntityRef, LicenseId, StoreError};

/// Outcome of one sweep. A failure on one entity is recorded here and the
/// sweep moves on to the next entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub created: usize,
    pub skipped: usize,
    pub failures: Vec<SweepFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepFailure {
    pub entity: EntityRef,
    pub error: String,
}

impl SweepReport {
    pub fn fail(&mut self, entity: EntityRef, error: impl fmt::Display) {
        tracing::warn!(%entity, %error, "sweep entity failed");
        self.failures.push(SweepFailure {
            entity,
            error: error.to_string(),
        });
    }

    pub fn merge(&mut self, other: SweepReport) {
        self.created += other.created;
        self.skipped += other.skipped;
        self.failures.extend(other.failures);
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Error raised by the workflow services.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A required precondition is missing; the operation is aborted before any
/// write.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("asset {0} has no purchase date; set it before computing depreciation")]
    MissingPurchaseDate(AssetId),
    #[error("contract {0} is not active; only active contracts can be invoiced")]
    InactiveContract(ContractId),
    #[error("license {0} has no vendor")]
    MissingVendor(LicenseId),
}

/// An invariant would be violated; the record is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("purchased seats must be greater than zero (got {0})")]
    NonPositiveSeats(i64),
    #[error("depreciation years must be greater than zero when a method is set")]
    ZeroDepreciationYears,
    #[error("depreciation years must not exceed 100 (got {0})")]
    DepreciationYearsTooLarge(u32),
    #[error("values must satisfy purchase >= salvage >= 0")]
    InvalidDepreciableAmount,
    #[error("cannot move {kind} from {from} to {to}")]
    IllegalTransition {
        kind: &'static str,
        from: &'static str,
        to: &'static str,
    },
    #[error("intervention ends before it starts")]
    InvertedInterval,
    #[error("renewal window {from} .. {to} is empty")]
    EmptyWindow { from: NaiveDate, to: NaiveDate },
    #[error("satisfaction rating {0} is outside 1..=5")]
    RatingOutOfRange(String),
    #[error("date arithmetic overflowed from {0}")]
    DateOutOfRange(NaiveDate),
}
