use std::sync::Arc;

use chrono::NaiveDateTime;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::domain::{Intervention, InterventionState};
use crate::config::BillingConfig;
use crate::store::{
    AuditEvent, CustomerId, EntityRef, InterventionId, Query, RecordStore, StoreError, UserId,
};
use crate::workflows::assets::AssetService;
use crate::workflows::{ValidationError, WorkflowError};

/// Scheduling and state changes for on-site work.
pub struct InterventionService<S> {
    store: Arc<S>,
    assets: AssetService<S>,
}

impl<S> InterventionService<S>
where
    S: RecordStore + 'static,
{
    pub fn new(store: Arc<S>, billing: BillingConfig) -> Self {
        let assets = AssetService::new(Arc::clone(&store), billing);
        Self { store, assets }
    }

    /// Stores a new planned intervention. The billable flag follows the
    /// contract coverage rule.
    pub fn schedule(
        &self,
        mut intervention: Intervention,
        at: NaiveDateTime,
    ) -> Result<Intervention, WorkflowError> {
        intervention.validate()?;
        intervention.state = InterventionState::Planned;
        intervention.billable = intervention.suggested_billable();
        let stored = self.store.interventions().create(intervention)?;
        self.audit(stored.id, at, "scheduled", stored.reference.clone())?;
        Ok(stored)
    }

    pub fn start(&self, id: InterventionId, at: NaiveDateTime) -> Result<Intervention, WorkflowError> {
        self.transition(id, InterventionState::InProgress, at)
    }

    /// Closes the intervention and refreshes the indicators of every asset it
    /// touched. A failed refresh is logged; the completion stands.
    pub fn complete(
        &self,
        id: InterventionId,
        at: NaiveDateTime,
    ) -> Result<Intervention, WorkflowError> {
        let intervention = self.transition(id, InterventionState::Done, at)?;
        for asset in &intervention.assets {
            if let Err(error) = self.assets.refresh_indicators(*asset, at.date()) {
                tracing::warn!(%asset, intervention = %id, %error, "asset refresh failed");
            }
        }
        Ok(intervention)
    }

    pub fn cancel(&self, id: InterventionId, at: NaiveDateTime) -> Result<Intervention, WorkflowError> {
        self.transition(id, InterventionState::Cancelled, at)
    }

    pub fn replan(&self, id: InterventionId, at: NaiveDateTime) -> Result<Intervention, WorkflowError> {
        self.transition(id, InterventionState::Planned, at)
    }

    pub fn rate(
        &self,
        id: InterventionId,
        rating: Decimal,
        at: NaiveDateTime,
    ) -> Result<Intervention, WorkflowError> {
        let mut intervention = self.store.interventions().require(id)?;
        intervention.satisfaction_rating = Some(rating);
        intervention.validate()?;
        self.store.interventions().update(&intervention)?;
        self.audit(id, at, "rated", rating.to_string())?;
        Ok(intervention)
    }

    /// Whether the technician has no planned or running work overlapping the
    /// window. `ignore` excludes the intervention being rescheduled.
    pub fn technician_available(
        &self,
        technician: UserId,
        start: NaiveDateTime,
        end: NaiveDateTime,
        ignore: Option<InterventionId>,
    ) -> Result<bool, WorkflowError> {
        if end < start {
            return Err(ValidationError::InvertedInterval.into());
        }
        let query = Query::filter(move |intervention: &Intervention| {
            intervention.technician == Some(technician)
                && intervention.state.is_scheduled()
                && Some(intervention.id) != ignore
                && intervention.overlaps(start, end)
        });
        Ok(self.store.interventions().count(&query)? == 0)
    }

    /// Planned and running work starting inside the window, earliest first.
    pub fn technician_schedule(
        &self,
        technician: UserId,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Intervention>, WorkflowError> {
        let query = Query::filter(move |intervention: &Intervention| {
            intervention.technician == Some(technician)
                && intervention.state.is_scheduled()
                && (from..=to).contains(&intervention.date_start)
        })
        .order_by(|a, b| a.date_start.cmp(&b.date_start));
        Ok(self.store.interventions().find(&query)?)
    }

    /// Average rating of the customer's completed work on a 0..=100 scale.
    ///
    /// Dashboards must keep rendering, so a store failure reads as 0 and is
    /// only logged.
    pub fn customer_satisfaction_rate(&self, customer: CustomerId) -> f64 {
        match self.satisfaction_ratings(customer) {
            Ok(ratings) if !ratings.is_empty() => {
                let total: Decimal = ratings.iter().sum();
                let average = total / Decimal::from(ratings.len());
                (average * Decimal::from(20)).to_f64().unwrap_or(0.0)
            }
            Ok(_) => 0.0,
            Err(error) => {
                tracing::warn!(%customer, %error, "satisfaction lookup failed; reporting 0");
                0.0
            }
        }
    }

    fn satisfaction_ratings(&self, customer: CustomerId) -> Result<Vec<Decimal>, StoreError> {
        let query = Query::filter(move |intervention: &Intervention| {
            intervention.customer == Some(customer)
                && intervention.state == InterventionState::Done
                && intervention.satisfaction_rating.is_some()
        });
        Ok(self
            .store
            .interventions()
            .find(&query)?
            .into_iter()
            .filter_map(|intervention| intervention.satisfaction_rating)
            .collect())
    }

    fn transition(
        &self,
        id: InterventionId,
        next: InterventionState,
        at: NaiveDateTime,
    ) -> Result<Intervention, WorkflowError> {
        let mut intervention = self.store.interventions().require(id)?;
        let current = intervention.state;
        if !current.can_transition_to(next) {
            return Err(ValidationError::IllegalTransition {
                kind: "intervention",
                from: current.label(),
                to: next.label(),
            }
            .into());
        }

        intervention.state = next;
        self.store.interventions().update(&intervention)?;
        self.audit(
            id,
            at,
            next.label(),
            format!("{} -> {}", current.label(), next.label()),
        )?;
        Ok(intervention)
    }

    fn audit(
        &self,
        id: InterventionId,
        at: NaiveDateTime,
        action: &str,
        detail: String,
    ) -> Result<(), WorkflowError> {
        self.store
            .record_event(AuditEvent::new(EntityRef::Intervention(id), at, action).detail(detail))?;
        Ok(())
    }
}
