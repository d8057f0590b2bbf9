use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::config::AlertBands;
use crate::store::{
    AlertId, AssetId, ContractId, CustomerId, EntityRef, LicenseId, Record, UserId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    Contract,
    Warranty,
    License,
    Maintenance,
    LicenseCompliance,
}

impl AlertType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Contract => "contract",
            Self::Warranty => "warranty",
            Self::License => "license",
            Self::Maintenance => "maintenance",
            Self::LicenseCompliance => "license_compliance",
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AlertPriority {
    #[default]
    Normal = 0,
    Important = 1,
    Urgent = 2,
    Critical = 3,
}

impl AlertPriority {
    /// Banding shared by the date-driven sweeps.
    pub fn for_deadline(deadline: NaiveDate, today: NaiveDate, bands: &AlertBands) -> Self {
        let days = (deadline - today).num_days();
        if days <= bands.urgent_days {
            Self::Urgent
        } else if days <= bands.important_days {
            Self::Important
        } else {
            Self::Normal
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertState {
    #[default]
    New,
    InProgress,
    Done,
    Cancelled,
}

impl AlertState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_open(self) -> bool {
        matches!(self, Self::New | Self::InProgress)
    }

    pub fn can_transition_to(self, next: AlertState) -> bool {
        use AlertState::*;
        matches!(
            (self, next),
            (New, InProgress)
                | (InProgress, Done)
                | (New | InProgress, Cancelled)
                | (Done | Cancelled, New)
        )
    }
}

/// Record an alert was raised for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AlertSubject {
    Contract(ContractId),
    Asset(AssetId),
    License(LicenseId),
}

impl AlertSubject {
    pub fn entity(self) -> EntityRef {
        match self {
            Self::Contract(id) => EntityRef::Contract(id),
            Self::Asset(id) => EntityRef::Asset(id),
            Self::License(id) => EntityRef::License(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub title: String,
    pub description: String,
    pub deadline: NaiveDate,
    pub alert_type: AlertType,
    pub priority: AlertPriority,
    pub state: AlertState,
    pub subject: Option<AlertSubject>,
    pub customer: Option<CustomerId>,
    pub assigned_to: Option<UserId>,
    pub treated_by: Option<UserId>,
    pub treated_at: Option<NaiveDateTime>,
    pub email_sent: bool,
    pub email_sent_at: Option<NaiveDateTime>,
    pub resolution_notes: Option<String>,
}

impl Alert {
    pub fn new(
        alert_type: AlertType,
        subject: AlertSubject,
        title: impl Into<String>,
        deadline: NaiveDate,
        priority: AlertPriority,
    ) -> Self {
        Self {
            id: AlertId(0),
            title: title.into(),
            description: String::new(),
            deadline,
            alert_type,
            priority,
            state: AlertState::New,
            subject: Some(subject),
            customer: None,
            assigned_to: None,
            treated_by: None,
            treated_at: None,
            email_sent: false,
            email_sent_at: None,
            resolution_notes: None,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn for_customer(mut self, customer: Option<CustomerId>) -> Self {
        self.customer = customer;
        self
    }

    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Negative once the deadline has passed.
    pub fn days_remaining(&self, today: NaiveDate) -> i64 {
        (self.deadline - today).num_days()
    }
}

impl Record for Alert {
    type Id = AlertId;

    const KIND: &'static str = "alert";

    fn id(&self) -> AlertId {
        self.id
    }

    fn set_id(&mut self, id: AlertId) {
        self.id = id;
    }

    /// At most one open alert per (subject, type).
    fn conflicts_with(&self, other: &Self) -> bool {
        self.is_open()
            && other.is_open()
            && self.subject.is_some()
            && self.subject == other.subject
            && self.alert_type == other.alert_type
    }
}
