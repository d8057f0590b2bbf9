use std::sync::Arc;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;

use super::domain::{ComplianceStatus, License, LicenseState, LicenseType};
use crate::store::{AssetId, AuditEvent, EntityRef, LicenseId, RecordStore, UserId};
use crate::workflows::{ConfigurationError, ValidationError, WorkflowError};

/// Purchase request for renewing a license with its vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenewalQuote {
    pub license_id: LicenseId,
    pub vendor: String,
    pub label: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub note: String,
}

pub struct LicenseService<S> {
    store: Arc<S>,
}

impl<S> LicenseService<S>
where
    S: RecordStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn register(&self, license: License, at: NaiveDateTime) -> Result<License, WorkflowError> {
        license.validate()?;
        let stored = self.store.licenses().create(license)?;
        self.audit(stored.id, at, "registered", stored.name.clone())?;
        Ok(stored)
    }

    pub fn update(&self, license: &License, at: NaiveDateTime) -> Result<(), WorkflowError> {
        license.validate()?;
        self.store.licenses().update(license)?;
        self.audit(license.id, at, "updated", String::new())
    }

    pub fn activate(&self, id: LicenseId, at: NaiveDateTime) -> Result<License, WorkflowError> {
        self.transition(id, LicenseState::Active, at)
    }

    pub fn expire(&self, id: LicenseId, at: NaiveDateTime) -> Result<License, WorkflowError> {
        self.transition(id, LicenseState::Expired, at)
    }

    pub fn terminate(&self, id: LicenseId, at: NaiveDateTime) -> Result<License, WorkflowError> {
        self.transition(id, LicenseState::Terminated, at)
    }

    pub fn reset_to_draft(&self, id: LicenseId, at: NaiveDateTime) -> Result<License, WorkflowError> {
        self.transition(id, LicenseState::Draft, at)
    }

    /// Stamps the audit date and reports the compliance status found.
    pub fn audit_license(
        &self,
        id: LicenseId,
        at: NaiveDateTime,
    ) -> Result<ComplianceStatus, WorkflowError> {
        let mut license = self.store.licenses().require(id)?;
        let today = at.date();
        license.last_audit_date = Some(today);
        self.store.licenses().update(&license)?;

        let status = license.compliance_status(today);
        self.audit(
            id,
            at,
            "audited",
            format!(
                "{} ({} of {} seats used)",
                status.label(),
                license.used_seats(),
                license.purchased_seats
            ),
        )?;
        Ok(status)
    }

    pub fn assign_asset(
        &self,
        id: LicenseId,
        asset: AssetId,
        at: NaiveDateTime,
    ) -> Result<License, WorkflowError> {
        self.change_seats(id, at, "asset_assigned", asset.to_string(), |license| {
            if !license.assets.contains(&asset) {
                license.assets.push(asset);
            }
        })
    }

    pub fn release_asset(
        &self,
        id: LicenseId,
        asset: AssetId,
        at: NaiveDateTime,
    ) -> Result<License, WorkflowError> {
        self.change_seats(id, at, "asset_released", asset.to_string(), |license| {
            license.assets.retain(|assigned| *assigned != asset);
        })
    }

    pub fn assign_user(
        &self,
        id: LicenseId,
        user: UserId,
        at: NaiveDateTime,
    ) -> Result<License, WorkflowError> {
        self.change_seats(id, at, "user_assigned", user.to_string(), |license| {
            if !license.users.contains(&user) {
                license.users.push(user);
            }
        })
    }

    pub fn release_user(
        &self,
        id: LicenseId,
        user: UserId,
        at: NaiveDateTime,
    ) -> Result<License, WorkflowError> {
        self.change_seats(id, at, "user_released", user.to_string(), |license| {
            license.users.retain(|assigned| *assigned != user);
        })
    }

    /// Builds the vendor quote for renewing every purchased seat and marks
    /// the renewal as planned.
    pub fn renewal_quote(
        &self,
        id: LicenseId,
        at: NaiveDateTime,
    ) -> Result<RenewalQuote, WorkflowError> {
        let mut license = self.store.licenses().require(id)?;
        let vendor = license
            .vendor
            .clone()
            .ok_or(ConfigurationError::MissingVendor(id))?;

        let mut label = format!("Renewal {}", license.software);
        if license.license_type == LicenseType::Subscription {
            label.push_str(&format!(" for {} months", license.renewal_term_months));
        }
        let quote = RenewalQuote {
            license_id: id,
            vendor,
            label,
            quantity: license.purchased_seats,
            unit_price: license.renewal_cost.unwrap_or(license.purchase_value),
            note: format!(
                "License renewal for {}.\nReference: {}",
                license.software,
                license.contract_reference.as_deref().unwrap_or("N/A")
            ),
        };

        license.renewal_planned = true;
        self.store.licenses().update(&license)?;
        self.audit(id, at, "renewal_quoted", quote.vendor.clone())?;
        Ok(quote)
    }

    fn change_seats(
        &self,
        id: LicenseId,
        at: NaiveDateTime,
        action: &str,
        detail: String,
        change: impl FnOnce(&mut License),
    ) -> Result<License, WorkflowError> {
        let mut license = self.store.licenses().require(id)?;
        change(&mut license);
        self.store.licenses().update(&license)?;
        self.audit(id, at, action, detail)?;
        Ok(license)
    }

    fn transition(
        &self,
        id: LicenseId,
        next: LicenseState,
        at: NaiveDateTime,
    ) -> Result<License, WorkflowError> {
        let mut license = self.store.licenses().require(id)?;
        let current = license.state;
        if !current.can_transition_to(next) {
            return Err(ValidationError::IllegalTransition {
                kind: "license",
                from: current.label(),
                to: next.label(),
            }
            .into());
        }
        license.state = next;
        self.store.licenses().update(&license)?;
        self.audit(id, at, next.label(), format!("{} -> {}", current.label(), next.label()))?;
        Ok(license)
    }

    fn audit(
        &self,
        id: LicenseId,
        at: NaiveDateTime,
        action: &str,
        detail: String,
    ) -> Result<(), WorkflowError> {
        self.store
            .record_event(AuditEvent::new(EntityRef::License(id), at, action).detail(detail))?;
        Ok(())
    }
}
