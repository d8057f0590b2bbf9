use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::{Asset, RenewalPriority};
use crate::store::CustomerId;
use crate::workflows::ValidationError;

const AGE_WEIGHT: f64 = 0.3;
const VALUE_WEIGHT: f64 = 0.2;
const HEALTH_WEIGHT: f64 = 0.3;
const INCIDENT_WEIGHT: f64 = 0.2;

/// Raw signals feeding the renewal heuristic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenewalInputs {
    /// Days until the recommended renewal date; `None` when the asset has
    /// no such date, which always scores low.
    pub days_to_renewal: Option<i64>,
    pub current_value: Decimal,
    pub purchase_value: Decimal,
    /// Missing scores count as a perfectly healthy asset.
    pub health_score: Option<f64>,
    pub incident_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenewalFactorKind {
    Age,
    Value,
    Health,
    Incidents,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenewalFactor {
    pub kind: RenewalFactorKind,
    pub value: f64,
    pub weight: f64,
    pub notes: String,
}

impl RenewalFactor {
    fn new(kind: RenewalFactorKind, value: f64, weight: f64, notes: String) -> Self {
        Self {
            kind,
            value,
            weight,
            notes,
        }
    }

    pub fn contribution(&self) -> f64 {
        self.value * self.weight
    }
}

/// Outcome of the renewal heuristic with the factor breakdown that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenewalAssessment {
    pub priority: RenewalPriority,
    pub score: f64,
    pub factors: Vec<RenewalFactor>,
}

impl RenewalInputs {
    pub fn assess(&self) -> RenewalAssessment {
        let Some(days) = self.days_to_renewal else {
            return RenewalAssessment {
                priority: RenewalPriority::Low,
                score: 0.0,
                factors: Vec::new(),
            };
        };

        let factors = vec![
            age_factor(days),
            value_factor(self.current_value, self.purchase_value),
            health_factor(self.health_score.unwrap_or(100.0)),
            incident_factor(self.incident_count),
        ];
        let score: f64 = factors.iter().map(RenewalFactor::contribution).sum();

        RenewalAssessment {
            priority: priority_for_score(score),
            score,
            factors,
        }
    }
}

pub fn compute_priority(inputs: &RenewalInputs) -> RenewalPriority {
    inputs.assess().priority
}

fn priority_for_score(score: f64) -> RenewalPriority {
    if score > 0.75 {
        RenewalPriority::Critical
    } else if score > 0.5 {
        RenewalPriority::High
    } else if score > 0.25 {
        RenewalPriority::Medium
    } else {
        RenewalPriority::Low
    }
}

fn age_factor(days: i64) -> RenewalFactor {
    let (value, notes) = if days < 0 {
        (1.0, "renewal date passed".to_string())
    } else if days < 90 {
        (0.8, format!("renewal due in {days} days"))
    } else if days < 180 {
        (0.5, format!("renewal due in {days} days"))
    } else {
        (0.2, format!("renewal due in {days} days"))
    };
    RenewalFactor::new(RenewalFactorKind::Age, value, AGE_WEIGHT, notes)
}

fn value_factor(current: Decimal, purchase: Decimal) -> RenewalFactor {
    let value = if purchase <= Decimal::ZERO {
        0.0
    } else {
        let ratio = (current / purchase).to_f64().unwrap_or(0.0);
        (1.0 - ratio).clamp(0.0, 1.0)
    };
    let notes = format!("current value {current} of {purchase}");
    RenewalFactor::new(RenewalFactorKind::Value, value, VALUE_WEIGHT, notes)
}

fn health_factor(health: f64) -> RenewalFactor {
    let value = if health < 30.0 {
        1.0
    } else if health < 60.0 {
        0.7
    } else if health < 80.0 {
        0.3
    } else {
        0.0
    };
    let notes = format!("health score {health:.1}");
    RenewalFactor::new(RenewalFactorKind::Health, value, HEALTH_WEIGHT, notes)
}

fn incident_factor(incidents: usize) -> RenewalFactor {
    let value = if incidents > 3 {
        1.0
    } else if incidents > 1 {
        0.6
    } else {
        0.0
    };
    let notes = format!("{incidents} corrective interventions");
    RenewalFactor::new(RenewalFactorKind::Incidents, value, INCIDENT_WEIGHT, notes)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityFilter {
    #[default]
    All,
    HighAndCritical,
    CriticalOnly,
}

impl PriorityFilter {
    pub fn accepts(self, priority: RenewalPriority) -> bool {
        match self {
            Self::All => true,
            Self::HighAndCritical => priority >= RenewalPriority::High,
            Self::CriticalOnly => priority == RenewalPriority::Critical,
        }
    }
}

/// Selection used when planning renewals in bulk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalPlanFilter {
    pub from: NaiveDate,
    pub to: NaiveDate,
    #[serde(default)]
    pub priority: PriorityFilter,
    #[serde(default)]
    pub customer: Option<CustomerId>,
}

impl RenewalPlanFilter {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.to < self.from {
            return Err(ValidationError::EmptyWindow {
                from: self.from,
                to: self.to,
            });
        }
        Ok(())
    }

    /// Whether `asset`, with its recommended renewal date, belongs in the plan.
    /// Already planned assets never do.
    pub fn selects(&self, asset: &Asset, recommended: Option<NaiveDate>) -> bool {
        let Some(date) = recommended else {
            return false;
        };
        !asset.renewal.planned
            && (self.from..=self.to).contains(&date)
            && self.priority.accepts(asset.renewal_priority)
            && self.customer.map_or(true, |customer| asset.customer == Some(customer))
    }
}
