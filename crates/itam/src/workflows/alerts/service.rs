use std::sync::Arc;

use chrono::NaiveDateTime;

use super::domain::{Alert, AlertState};
use crate::outbound::{Notification, Notifier};
use crate::store::{AlertId, AuditEvent, EntityRef, Query, RecordStore, UserId};
use crate::workflows::{ValidationError, WorkflowError};

pub const ALERT_TEMPLATE: &str = "it_alert";

/// Manual handling of alerts: triage, resolution and notification.
pub struct AlertService<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
}

impl<S, N> AlertService<S, N>
where
    S: RecordStore + 'static,
    N: Notifier + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>) -> Self {
        Self { store, notifier }
    }

    /// Open alerts, most pressing first.
    pub fn open_alerts(&self) -> Result<Vec<Alert>, WorkflowError> {
        let query = Query::filter(|alert: &Alert| alert.is_open()).order_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.deadline.cmp(&b.deadline))
        });
        Ok(self.store.alerts().find(&query)?)
    }

    /// Takes the alert in hand; the caller becomes its assignee.
    pub fn start(
        &self,
        id: AlertId,
        user: UserId,
        at: NaiveDateTime,
    ) -> Result<Alert, WorkflowError> {
        self.transition(id, AlertState::InProgress, Some(user), at, |alert| {
            alert.assigned_to = Some(user);
        })
    }

    pub fn complete(
        &self,
        id: AlertId,
        user: UserId,
        notes: Option<String>,
        at: NaiveDateTime,
    ) -> Result<Alert, WorkflowError> {
        self.transition(id, AlertState::Done, Some(user), at, |alert| {
            alert.treated_by = Some(user);
            alert.treated_at = Some(at);
            if notes.is_some() {
                alert.resolution_notes = notes;
            }
        })
    }

    pub fn cancel(&self, id: AlertId, at: NaiveDateTime) -> Result<Alert, WorkflowError> {
        self.transition(id, AlertState::Cancelled, None, at, |_| {})
    }

    /// Reopens a closed alert. Rejected by the store when another open alert
    /// already holds the same subject and type.
    pub fn reset(&self, id: AlertId, at: NaiveDateTime) -> Result<Alert, WorkflowError> {
        self.transition(id, AlertState::New, None, at, |_| {})
    }

    /// Mails the alert. Delivery failures are logged and leave the alert
    /// marked as not sent.
    pub fn send_notification(&self, id: AlertId, at: NaiveDateTime) -> Result<Alert, WorkflowError> {
        let mut alert = self.store.alerts().require(id)?;
        let entity = EntityRef::Alert(id);

        let mut notification = Notification::new(ALERT_TEMPLATE, entity)
            .detail("title", &alert.title)
            .detail("type", alert.alert_type.label())
            .detail("deadline", alert.deadline)
            .detail("days_remaining", alert.days_remaining(at.date()));
        if let Some(subject) = alert.subject {
            notification = notification.detail("subject", subject.entity());
        }

        match self.notifier.send(notification) {
            Ok(()) => {
                alert.email_sent = true;
                alert.email_sent_at = Some(at);
                self.store.alerts().update(&alert)?;
                self.store
                    .record_event(AuditEvent::new(entity, at, "email_sent"))?;
            }
            Err(error) => tracing::warn!(alert = %id, %error, "alert notification failed"),
        }
        Ok(alert)
    }

    fn transition(
        &self,
        id: AlertId,
        next: AlertState,
        actor: Option<UserId>,
        at: NaiveDateTime,
        apply: impl FnOnce(&mut Alert),
    ) -> Result<Alert, WorkflowError> {
        let mut alert = self.store.alerts().require(id)?;
        let current = alert.state;
        if !current.can_transition_to(next) {
            return Err(ValidationError::IllegalTransition {
                kind: "alert",
                from: current.label(),
                to: next.label(),
            }
            .into());
        }

        alert.state = next;
        apply(&mut alert);
        self.store.alerts().update(&alert)?;
        self.store.record_event(
            AuditEvent::new(EntityRef::Alert(id), at, next.label())
                .by(actor)
                .detail(format!("{} -> {}", current.label(), next.label())),
        )?;
        Ok(alert)
    }
}
