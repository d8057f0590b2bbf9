use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Serialize;

use super::depreciation::{compute_schedule, DepreciationInput, DepreciationSummary};
use super::domain::{Asset, AssetStatus, DepreciationEntry, DepreciationMethod, RenewalPriority};
use super::health::compute_health;
use super::lifecycle::{
    age_in_months, current_value, end_of_life_date, recommended_renewal_date, timeline,
    IncidentMetrics, LifecycleCost, TimelineEvent,
};
use super::renewal::{RenewalAssessment, RenewalInputs, RenewalPlanFilter};
use crate::config::BillingConfig;
use crate::store::{AssetId, AuditEvent, EntityRef, Query, RecordStore, StoreError};
use crate::workflows::interventions::Intervention;
use crate::workflows::tickets::{Ticket, TicketPriority};
use crate::workflows::{ConfigurationError, SweepReport, WorkflowError};

/// Everything derived about an asset on a given day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetIndicators {
    pub asset_id: AssetId,
    pub age_months: u32,
    pub current_value: Decimal,
    pub health_score: f64,
    pub recommended_renewal_date: Option<NaiveDate>,
    pub end_of_life_date: Option<NaiveDate>,
    pub incidents: IncidentMetrics,
    pub lifecycle_cost: LifecycleCost,
    pub renewal: RenewalAssessment,
    pub timeline: Vec<TimelineEvent>,
}

/// Tickets raised by one renewal batch. `report.created` counts them and
/// `report.failures` lists the assets that could not be processed.
#[derive(Debug, Clone, Default)]
pub struct RenewalBatch {
    pub tickets: Vec<Ticket>,
    pub report: SweepReport,
}

/// Asset intake, depreciation boards, indicators and renewal planning.
pub struct AssetService<S> {
    store: Arc<S>,
    billing: BillingConfig,
}

impl<S> AssetService<S>
where
    S: RecordStore + 'static,
{
    pub fn new(store: Arc<S>, billing: BillingConfig) -> Self {
        Self { store, billing }
    }

    pub fn register(&self, asset: Asset, at: NaiveDateTime) -> Result<Asset, WorkflowError> {
        asset.validate()?;
        let stored = self.store.assets().create(asset)?;
        self.audit(stored.id, at, "registered", stored.name.clone())?;
        Ok(stored)
    }

    pub fn update(&self, asset: &Asset, at: NaiveDateTime) -> Result<(), WorkflowError> {
        asset.validate()?;
        self.store.assets().update(asset)?;
        self.audit(asset.id, at, "updated", String::new())
    }

    /// Assets are never deleted; retiring takes them out of every sweep.
    pub fn retire(&self, id: AssetId, at: NaiveDateTime) -> Result<Asset, WorkflowError> {
        let mut asset = self.store.assets().require(id)?;
        asset.status = AssetStatus::Retired;
        self.store.assets().update(&asset)?;
        self.audit(id, at, "retired", String::new())?;
        Ok(asset)
    }

    /// Regenerates the whole depreciation board of an asset. Nothing is
    /// written when the asset lacks a purchase date.
    pub fn compute_depreciation_board(
        &self,
        id: AssetId,
        at: NaiveDateTime,
    ) -> Result<Vec<DepreciationEntry>, WorkflowError> {
        let asset = self.store.assets().require(id)?;

        let entries = match asset.depreciation_method {
            DepreciationMethod::None => Vec::new(),
            method => {
                let purchase_date = asset
                    .purchase_date
                    .ok_or(ConfigurationError::MissingPurchaseDate(id))?;
                let input = DepreciationInput {
                    purchase_value: asset.purchase_value,
                    salvage_value: asset.salvage_value,
                    method,
                    years: asset.depreciation_years,
                    start_date: asset.depreciation_start_date.unwrap_or(purchase_date),
                };
                compute_schedule(&input)?
                    .into_iter()
                    .map(|line| line.into_entry(id))
                    .collect()
            }
        };

        let stored = self.store.replace_schedule(id, entries)?;
        tracing::info!(asset = %id, periods = stored.len(), "depreciation board computed");
        self.audit(
            id,
            at,
            "depreciation_computed",
            format!("{} periods", stored.len()),
        )?;
        Ok(stored)
    }

    pub fn depreciation_board(&self, id: AssetId) -> Result<Vec<DepreciationEntry>, WorkflowError> {
        let query = Query::filter(move |entry: &DepreciationEntry| entry.asset_id == id)
            .order_by(|a, b| a.sequence.cmp(&b.sequence));
        Ok(self.store.depreciation_entries().find(&query)?)
    }

    pub fn depreciation_summary(&self, id: AssetId) -> Result<DepreciationSummary, WorkflowError> {
        let asset = self.store.assets().require(id)?;
        let entries = self.depreciation_board(id)?;
        Ok(DepreciationSummary::from_entries(&asset, &entries))
    }

    pub fn indicators(&self, id: AssetId, today: NaiveDate) -> Result<AssetIndicators, WorkflowError> {
        let asset = self.store.assets().require(id)?;
        let interventions = self.interventions_for(id)?;
        Ok(self.evaluate(&asset, &interventions, today))
    }

    pub fn assess_renewal(
        &self,
        id: AssetId,
        today: NaiveDate,
    ) -> Result<RenewalAssessment, WorkflowError> {
        Ok(self.indicators(id, today)?.renewal)
    }

    /// Recomputes and stores the health score and renewal priority.
    pub fn refresh_indicators(&self, id: AssetId, today: NaiveDate) -> Result<Asset, WorkflowError> {
        let mut asset = self.store.assets().require(id)?;
        let interventions = self.interventions_for(id)?;
        let indicators = self.evaluate(&asset, &interventions, today);

        asset.health_score = Some(indicators.health_score);
        asset.renewal_priority = indicators.renewal.priority;
        self.store.assets().update(&asset)?;

        tracing::debug!(
            asset = %id,
            health = indicators.health_score,
            priority = asset.renewal_priority.label(),
            "asset indicators refreshed"
        );
        Ok(asset)
    }

    /// Indicator refresh over every asset still in service. `created`
    /// counts refreshed assets.
    pub fn refresh_all(&self, today: NaiveDate) -> Result<SweepReport, StoreError> {
        let assets = self
            .store
            .assets()
            .find(&Query::filter(|asset: &Asset| !asset.is_retired()))?;

        let mut report = SweepReport::default();
        for asset in assets {
            match self.refresh_indicators(asset.id, today) {
                Ok(_) => report.created += 1,
                Err(error) => report.fail(EntityRef::Asset(asset.id), error),
            }
        }
        tracing::info!(
            refreshed = report.created,
            failures = report.failures.len(),
            "asset indicator sweep finished"
        );
        Ok(report)
    }

    /// Raises a renewal ticket for one asset and marks its renewal as planned.
    pub fn request_renewal(&self, id: AssetId, at: NaiveDateTime) -> Result<Ticket, WorkflowError> {
        let asset = self.store.assets().require(id)?;
        self.raise_renewal(asset, at, "Automated renewal request")
    }

    /// Assets whose recommended renewal falls inside the filter window and
    /// that have no renewal planned yet.
    pub fn plan_renewals(&self, filter: &RenewalPlanFilter) -> Result<Vec<Asset>, WorkflowError> {
        filter.validate()?;
        let filter = filter.clone();
        let query = Query::filter(move |asset: &Asset| {
            !asset.is_retired() && filter.selects(asset, recommended_renewal_date(asset))
        })
        .order_by(|a, b| recommended_renewal_date(a).cmp(&recommended_renewal_date(b)));
        Ok(self.store.assets().find(&query)?)
    }

    /// Raises a renewal ticket for every planned asset. An asset that fails
    /// is recorded in the batch report and the batch moves on.
    pub fn generate_renewal_requests(
        &self,
        filter: &RenewalPlanFilter,
        at: NaiveDateTime,
    ) -> Result<RenewalBatch, WorkflowError> {
        let assets = self.plan_renewals(filter)?;
        let mut batch = RenewalBatch::default();
        for asset in assets {
            let id = asset.id;
            match self.raise_renewal(asset, at, "Renewal request from batch planning") {
                Ok(ticket) => {
                    batch.report.created += 1;
                    batch.tickets.push(ticket);
                }
                Err(error) => batch.report.fail(EntityRef::Asset(id), error),
            }
        }
        tracing::info!(
            requests = batch.report.created,
            failures = batch.report.failures.len(),
            "renewal requests generated"
        );
        Ok(batch)
    }

    fn raise_renewal(
        &self,
        mut asset: Asset,
        at: NaiveDateTime,
        origin: &str,
    ) -> Result<Ticket, WorkflowError> {
        let today = at.date();
        let recommended = recommended_renewal_date(&asset);
        let priority = match asset.renewal_priority {
            RenewalPriority::High | RenewalPriority::Critical => TicketPriority::High,
            _ => TicketPriority::Medium,
        };

        let mut ticket = Ticket::new(format!("Renewal Request for {}", asset.name), today);
        ticket.customer = asset.customer;
        ticket.asset = Some(asset.id);
        ticket.priority = priority;
        ticket.description = format!(
            "{origin} for {name}.\n\nRenewal priority: {priority}\nRecommended renewal date: {date}\n\
             Current value: {current}\nPurchase value: {purchase}\nAge: {age} months",
            name = asset.name,
            priority = asset.renewal_priority.label(),
            date = recommended.map_or_else(|| "-".to_string(), |date| date.to_string()),
            current = current_value(&asset, today),
            purchase = asset.purchase_value,
            age = age_in_months(asset.purchase_date, today),
        );
        let ticket = self.store.tickets().create(ticket)?;

        asset.renewal.planned = true;
        asset.renewal.date = recommended;
        asset.renewal.notes = Some(format!(
            "Renewal request generated on {today}. Ticket: {}",
            ticket.id
        ));
        if let Err(error) = self.store.assets().update(&asset) {
            if let Err(cleanup) = self.store.tickets().delete(ticket.id) {
                tracing::warn!(
                    ticket = %ticket.id,
                    error = %cleanup,
                    "orphaned renewal ticket left behind"
                );
            }
            return Err(error.into());
        }
        if let Err(error) =
            self.audit(asset.id, at, "renewal_requested", format!("ticket {}", ticket.id))
        {
            tracing::warn!(asset = %asset.id, %error, "audit event dropped");
        }

        Ok(ticket)
    }

    fn interventions_for(&self, id: AssetId) -> Result<Vec<Intervention>, StoreError> {
        self.store
            .interventions()
            .find(&Query::filter(move |intervention: &Intervention| {
                intervention.covers(id)
            }))
    }

    fn evaluate(
        &self,
        asset: &Asset,
        interventions: &[Intervention],
        today: NaiveDate,
    ) -> AssetIndicators {
        let age_months = age_in_months(asset.purchase_date, today);
        let health_score = compute_health(age_months, asset.depreciation_years, &asset.components);
        let value = current_value(asset, today);
        let recommended = recommended_renewal_date(asset);
        let incidents = IncidentMetrics::for_asset(asset.id, interventions);

        let renewal = RenewalInputs {
            days_to_renewal: recommended.map(|date| (date - today).num_days()),
            current_value: value,
            purchase_value: asset.purchase_value,
            health_score: Some(health_score),
            incident_count: incidents.incident_count,
        }
        .assess();

        AssetIndicators {
            asset_id: asset.id,
            age_months,
            current_value: value,
            health_score,
            recommended_renewal_date: recommended,
            end_of_life_date: end_of_life_date(asset),
            incidents,
            lifecycle_cost: LifecycleCost::compute(
                asset,
                interventions,
                self.billing.default_hourly_rate,
                today,
            ),
            renewal,
            timeline: timeline(asset),
        }
    }

    fn audit(
        &self,
        id: AssetId,
        at: NaiveDateTime,
        action: &str,
        detail: String,
    ) -> Result<(), WorkflowError> {
        self.store
            .record_event(AuditEvent::new(EntityRef::Asset(id), at, action).detail(detail))?;
        Ok(())
    }
}
