//! Outbound hooks: notification delivery and document rendering.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::store::EntityRef;

/// Outbound notification hook (mail gateway, chat bridge, ...).
///
/// Delivery is fire-and-forget from the engine's point of view: callers log
/// a failed send and carry on.
pub trait Notifier: Send + Sync {
    fn send(&self, notification: Notification) -> Result<(), NotificationError>;
}

/// Renders a record into a printable payload (PDF in production).
pub trait DocumentRenderer: Send + Sync {
    fn render(
        &self,
        entity: EntityRef,
        payload: &serde_json::Value,
    ) -> Result<RenderedDocument, RenderError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub template: String,
    pub entity: EntityRef,
    pub details: BTreeMap<String, String>,
    pub attachments: Vec<RenderedDocument>,
}

impl Notification {
    pub fn new(template: impl Into<String>, entity: EntityRef) -> Self {
        Self {
            template: template.into(),
            entity,
            details: BTreeMap::new(),
            attachments: Vec::new(),
        }
    }

    pub fn detail(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.details.insert(key.into(), value.to_string());
        self
    }

    pub fn attach(mut self, document: RenderedDocument) -> Self {
        self.attachments.push(document);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedDocument {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
    #[error("unknown notification template {0}")]
    UnknownTemplate(String),
}

/// Document rendering error.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("renderer failed for {entity}: {reason}")]
    Failed { entity: EntityRef, reason: String },
}
