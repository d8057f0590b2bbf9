use chrono::{NaiveDateTime, TimeDelta};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::store::{AssetId, ContractId, CustomerId, InterventionId, InvoiceId, Record, UserId};
use crate::workflows::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionKind {
    Preventive,
    Corrective,
    Installation,
    Upgrade,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionState {
    #[default]
    Planned,
    InProgress,
    Done,
    Cancelled,
}

impl InterventionState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(self, next: InterventionState) -> bool {
        use InterventionState::*;
        matches!(
            (self, next),
            (Planned, InProgress)
                | (InProgress, Done)
                | (Planned | InProgress, Cancelled)
                | (Cancelled, Planned)
        )
    }

    /// Work that still occupies a technician's calendar.
    pub fn is_scheduled(self) -> bool {
        matches!(self, Self::Planned | Self::InProgress)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intervention {
    pub id: InterventionId,
    pub reference: String,
    pub description: String,
    pub customer: Option<CustomerId>,
    pub assets: Vec<AssetId>,
    pub kind: InterventionKind,
    pub state: InterventionState,
    pub date_start: NaiveDateTime,
    pub date_end: NaiveDateTime,
    pub technician: Option<UserId>,
    pub contract: Option<ContractId>,
    pub billable: bool,
    pub invoiced: bool,
    pub invoice_id: Option<InvoiceId>,
    pub hourly_rate: Option<Decimal>,
    /// Customer rating from 1 to 5.
    pub satisfaction_rating: Option<Decimal>,
}

impl Intervention {
    pub fn new(
        reference: impl Into<String>,
        kind: InterventionKind,
        date_start: NaiveDateTime,
        date_end: NaiveDateTime,
    ) -> Self {
        Self {
            id: InterventionId(0),
            reference: reference.into(),
            description: String::new(),
            customer: None,
            assets: Vec::new(),
            kind,
            state: InterventionState::Planned,
            date_start,
            date_end,
            technician: None,
            contract: None,
            billable: false,
            invoiced: false,
            invoice_id: None,
            hourly_rate: None,
            satisfaction_rating: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.date_end < self.date_start {
            return Err(ValidationError::InvertedInterval);
        }
        if let Some(rating) = self.satisfaction_rating {
            if rating < Decimal::ONE || rating > Decimal::from(5) {
                return Err(ValidationError::RatingOutOfRange(rating.to_string()));
            }
        }
        Ok(())
    }

    pub fn duration(&self) -> TimeDelta {
        self.date_end - self.date_start
    }

    /// Elapsed time in hours, to the cent of an hour.
    pub fn duration_hours(&self) -> Decimal {
        (Decimal::from(self.duration().num_seconds()) / Decimal::from(3600)).round_dp(2)
    }

    pub fn rate_or(&self, default: Decimal) -> Decimal {
        match self.hourly_rate {
            Some(rate) if rate > Decimal::ZERO => rate,
            _ => default,
        }
    }

    pub fn covers(&self, asset: AssetId) -> bool {
        self.assets.contains(&asset)
    }

    /// Closed-interval overlap with `[start, end]`.
    pub fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        self.date_start <= end && self.date_end >= start
    }

    /// Preventive work under a contract is included in the fee; work done
    /// without any contract is billed. Anything else keeps its current flag.
    pub fn suggested_billable(&self) -> bool {
        match (self.contract, self.kind) {
            (Some(_), InterventionKind::Preventive) => false,
            (None, _) => true,
            _ => self.billable,
        }
    }
}

impl Record for Intervention {
    type Id = InterventionId;

    const KIND: &'static str = "intervention";

    fn id(&self) -> InterventionId {
        self.id
    }

    fn set_id(&mut self, id: InterventionId) {
        self.id = id;
    }
}
