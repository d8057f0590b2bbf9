use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::store::{AssetId, CustomerId, Record, TicketId};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketState {
    #[default]
    New,
    InProgress,
    Waiting,
    Resolved,
    Cancelled,
}

/// Support ticket. The engine only raises them (renewal requests); the
/// helpdesk owns everything after that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub subject: String,
    pub customer: Option<CustomerId>,
    pub asset: Option<AssetId>,
    pub description: String,
    pub priority: TicketPriority,
    pub state: TicketState,
    pub opened_on: NaiveDate,
}

impl Ticket {
    pub fn new(subject: impl Into<String>, opened_on: NaiveDate) -> Self {
        Self {
            id: TicketId(0),
            subject: subject.into(),
            customer: None,
            asset: None,
            description: String::new(),
            priority: TicketPriority::default(),
            state: TicketState::New,
            opened_on,
        }
    }
}

impl Record for Ticket {
    type Id = TicketId;

    const KIND: &'static str = "ticket";

    fn id(&self) -> TicketId {
        self.id
    }

    fn set_id(&mut self, id: TicketId) {
        self.id = id;
    }
}
