use std::sync::Arc;

use chrono::{Months, NaiveDate, TimeDelta};

use super::domain::{Alert, AlertPriority, AlertSubject, AlertType};
use crate::config::AlertBands;
use crate::store::{Query, RecordStore, StoreError};
use crate::workflows::assets::Asset;
use crate::workflows::contracts::Contract;
use crate::workflows::interventions::{Intervention, InterventionKind, InterventionState};
use crate::workflows::licenses::{ComplianceStatus, License, LicenseState};
use crate::workflows::SweepReport;

/// Periodic alert generation, one sweep per monitored record type.
///
/// Deduplication is left to the store: an alert whose (subject, type) is
/// already open is rejected with [`StoreError::Conflict`] and counted as
/// skipped. Failures on one record are collected and the sweep continues.
pub struct AlertSweeper<S> {
    store: Arc<S>,
    bands: AlertBands,
}

impl<S> AlertSweeper<S>
where
    S: RecordStore + 'static,
{
    pub fn new(store: Arc<S>, bands: AlertBands) -> Self {
        Self { store, bands }
    }

    /// Every sweep, in a fixed order, merged into one report.
    pub fn run_all(&self, today: NaiveDate) -> Result<SweepReport, StoreError> {
        let mut report = self.contract_sweep(today)?;
        report.merge(self.warranty_sweep(today)?);
        report.merge(self.license_sweep(today)?);
        report.merge(self.maintenance_sweep(today)?);
        report.merge(self.license_compliance_sweep(today)?);
        Ok(report)
    }

    /// Active contracts ending within the horizon.
    pub fn contract_sweep(&self, today: NaiveDate) -> Result<SweepReport, StoreError> {
        let horizon = self.horizon(today);
        let contracts = self.store.contracts().find(&Query::filter(move |contract: &Contract| {
            contract.is_active() && (today..=horizon).contains(&contract.end_date)
        }))?;

        let mut report = SweepReport::default();
        for contract in contracts {
            let days = (contract.end_date - today).num_days();
            let alert = Alert::new(
                AlertType::Contract,
                AlertSubject::Contract(contract.id),
                format!("Contract {} expires in {days} days", contract.reference),
                contract.end_date,
                AlertPriority::for_deadline(contract.end_date, today, &self.bands),
            )
            .describe(format!(
                "Contract {} for customer {} expires on {}.",
                contract.reference, contract.customer, contract.end_date
            ))
            .for_customer(Some(contract.customer));
            self.raise(&mut report, alert);
        }
        finish(AlertType::Contract, report)
    }

    /// Assets in service whose warranty ends within the horizon.
    pub fn warranty_sweep(&self, today: NaiveDate) -> Result<SweepReport, StoreError> {
        let horizon = self.horizon(today);
        let assets = self.store.assets().find(&Query::filter(move |asset: &Asset| {
            !asset.is_retired()
                && asset
                    .warranty_end
                    .is_some_and(|end| (today..=horizon).contains(&end))
        }))?;

        let mut report = SweepReport::default();
        for asset in assets {
            let Some(warranty_end) = asset.warranty_end else {
                continue;
            };
            let days = (warranty_end - today).num_days();
            let alert = Alert::new(
                AlertType::Warranty,
                AlertSubject::Asset(asset.id),
                format!("Warranty for {} expires in {days} days", asset.name),
                warranty_end,
                AlertPriority::for_deadline(warranty_end, today, &self.bands),
            )
            .describe(format!(
                "The warranty of {} ({}) expires on {warranty_end}.",
                asset.name,
                asset.asset_type.label()
            ))
            .for_customer(asset.customer);
            self.raise(&mut report, alert);
        }
        finish(AlertType::Warranty, report)
    }

    /// Active licenses expiring within the horizon.
    pub fn license_sweep(&self, today: NaiveDate) -> Result<SweepReport, StoreError> {
        let horizon = self.horizon(today);
        let licenses = self.store.licenses().find(&Query::filter(move |license: &License| {
            license.state == LicenseState::Active
                && license
                    .expiration_date
                    .is_some_and(|expiry| (today..=horizon).contains(&expiry))
        }))?;

        let mut report = SweepReport::default();
        for license in licenses {
            let Some(expiry) = license.expiration_date else {
                continue;
            };
            let days = (expiry - today).num_days();
            let alert = Alert::new(
                AlertType::License,
                AlertSubject::License(license.id),
                format!("License {} expires in {days} days", license.name),
                expiry,
                AlertPriority::for_deadline(expiry, today, &self.bands),
            )
            .describe(format!(
                "License {} for {} expires on {expiry}.",
                license.name, license.software
            ))
            .for_customer(license.customer);
            self.raise(&mut report, alert);
        }
        finish(AlertType::License, report)
    }

    /// Assets whose next preventive maintenance falls within the horizon.
    ///
    /// The due date is the end of the latest completed preventive
    /// intervention plus the asset's interval, or the purchase date plus the
    /// interval when no maintenance was ever done. Assets with neither are
    /// skipped.
    pub fn maintenance_sweep(&self, today: NaiveDate) -> Result<SweepReport, StoreError> {
        let horizon = self.horizon(today);
        let assets = self.store.assets().find(&Query::filter(|asset: &Asset| {
            !asset.is_retired() && asset.maintenance_interval_months > 0
        }))?;

        let mut report = SweepReport::default();
        for asset in assets {
            let due = match self.next_maintenance(&asset) {
                Ok(Some(due)) => due,
                Ok(None) => {
                    tracing::debug!(asset = %asset.id, "no maintenance baseline; skipped");
                    continue;
                }
                Err(error) => {
                    report.fail(AlertSubject::Asset(asset.id).entity(), error);
                    continue;
                }
            };
            if !(today..=horizon).contains(&due) {
                continue;
            }

            let alert = Alert::new(
                AlertType::Maintenance,
                AlertSubject::Asset(asset.id),
                format!("Preventive maintenance for {}", asset.name),
                due,
                AlertPriority::for_deadline(due, today, &self.bands),
            )
            .describe(format!(
                "Preventive maintenance is due for {} ({}) on {due}.",
                asset.name,
                asset.asset_type.label()
            ))
            .for_customer(asset.customer);
            self.raise(&mut report, alert);
        }
        finish(AlertType::Maintenance, report)
    }

    /// Active licenses using more seats than purchased. Always urgent, with
    /// a fixed deadline after the sweep date.
    pub fn license_compliance_sweep(&self, today: NaiveDate) -> Result<SweepReport, StoreError> {
        let licenses = self.store.licenses().find(&Query::filter(move |license: &License| {
            license.state == LicenseState::Active
                && license.compliance_status(today) == ComplianceStatus::OverUsed
        }))?;
        let deadline = today + TimeDelta::days(self.bands.compliance_deadline_days);

        let mut report = SweepReport::default();
        for license in licenses {
            let alert = Alert::new(
                AlertType::LicenseCompliance,
                AlertSubject::License(license.id),
                format!("License {} is over-used", license.name),
                deadline,
                AlertPriority::Urgent,
            )
            .describe(format!(
                "License {} for {} is used by {} assets or users while {} seats were purchased.",
                license.name,
                license.software,
                license.used_seats(),
                license.purchased_seats
            ))
            .for_customer(license.customer);
            self.raise(&mut report, alert);
        }
        finish(AlertType::LicenseCompliance, report)
    }

    fn horizon(&self, today: NaiveDate) -> NaiveDate {
        today + TimeDelta::days(self.bands.horizon_days)
    }

    fn next_maintenance(&self, asset: &Asset) -> Result<Option<NaiveDate>, StoreError> {
        let id = asset.id;
        let query = Query::filter(move |intervention: &Intervention| {
            intervention.kind == InterventionKind::Preventive
                && intervention.state == InterventionState::Done
                && intervention.covers(id)
        })
        .order_by(|a, b| b.date_end.cmp(&a.date_end));

        let baseline = match self.store.interventions().find_one(query)? {
            Some(last) => Some(last.date_end.date()),
            None => asset.purchase_date,
        };
        Ok(baseline.and_then(|date| {
            date.checked_add_months(Months::new(asset.maintenance_interval_months))
        }))
    }

    fn raise(&self, report: &mut SweepReport, alert: Alert) {
        let Some(subject) = alert.subject else {
            return;
        };
        match self.store.alerts().create(alert) {
            Ok(created) => {
                tracing::debug!(
                    alert = %created.id,
                    subject = %subject.entity(),
                    priority = ?created.priority,
                    "alert raised"
                );
                report.created += 1;
            }
            Err(StoreError::Conflict { .. }) => report.skipped += 1,
            Err(error) => report.fail(subject.entity(), error),
        }
    }
}

fn finish(alert_type: AlertType, report: SweepReport) -> Result<SweepReport, StoreError> {
    tracing::info!(
        sweep = alert_type.label(),
        created = report.created,
        skipped = report.skipped,
        failures = report.failures.len(),
        "alert sweep finished"
    );
    Ok(report)
}
