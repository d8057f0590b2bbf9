use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{
    AlertId, AssetId, ContractId, InterventionId, InvoiceId, LicenseId, TicketId, UserId,
};

/// Typed back-reference to any record the engine tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntityRef {
    Asset(AssetId),
    Contract(ContractId),
    License(LicenseId),
    Alert(AlertId),
    Intervention(InterventionId),
    Invoice(InvoiceId),
    Ticket(TicketId),
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Asset(id) => write!(f, "asset/{id}"),
            EntityRef::Contract(id) => write!(f, "contract/{id}"),
            EntityRef::License(id) => write!(f, "license/{id}"),
            EntityRef::Alert(id) => write!(f, "alert/{id}"),
            EntityRef::Intervention(id) => write!(f, "intervention/{id}"),
            EntityRef::Invoice(id) => write!(f, "invoice/{id}"),
            EntityRef::Ticket(id) => write!(f, "ticket/{id}"),
        }
    }
}

/// Append-only history entry keyed by the entity it describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub entity: EntityRef,
    pub at: NaiveDateTime,
    pub actor: Option<UserId>,
    pub action: String,
    pub detail: String,
}

impl AuditEvent {
    pub fn new(entity: EntityRef, at: NaiveDateTime, action: impl Into<String>) -> Self {
        Self {
            entity,
            at,
            actor: None,
            action: action.into(),
            detail: String::new(),
        }
    }

    pub fn by(mut self, actor: Option<UserId>) -> Self {
        self.actor = actor;
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }
}
