use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::store::{AssetId, CustomerId, LicenseId, Record, UserId};
use crate::workflows::ValidationError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseType {
    Perpetual,
    #[default]
    Subscription,
    Trial,
    OpenSource,
    Saas,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseState {
    #[default]
    Draft,
    Active,
    Expired,
    Terminated,
}

impl LicenseState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Terminated => "terminated",
        }
    }

    pub fn can_transition_to(self, next: LicenseState) -> bool {
        use LicenseState::*;
        matches!(
            (self, next),
            (Draft, Active)
                | (Active, Expired)
                | (Draft | Active | Expired, Terminated)
                | (Active | Expired | Terminated, Draft)
        )
    }
}

/// Utilisation classification derived from seats, dates and state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Compliant,
    OverUsed,
    UnderUsed,
    Expired,
    ToReview,
}

impl ComplianceStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Compliant => "compliant",
            Self::OverUsed => "over_used",
            Self::UnderUsed => "under_used",
            Self::Expired => "expired",
            Self::ToReview => "to_review",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub id: LicenseId,
    pub name: String,
    pub software: String,
    pub license_key: Option<String>,
    pub license_type: LicenseType,
    /// Floating licenses count users; dedicated ones count assets.
    pub concurrent: bool,
    pub purchased_seats: i64,
    pub assets: Vec<AssetId>,
    pub users: Vec<UserId>,
    pub customer: Option<CustomerId>,
    pub activation_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
    pub purchase_value: Decimal,
    pub renewal_cost: Option<Decimal>,
    pub renewal_term_months: u32,
    pub vendor: Option<String>,
    pub contract_reference: Option<String>,
    pub last_audit_date: Option<NaiveDate>,
    pub state: LicenseState,
    pub renewal_planned: bool,
}

impl License {
    pub fn new(software: impl Into<String>, purchased_seats: i64) -> Self {
        let software = software.into();
        Self {
            id: LicenseId(0),
            name: format!("{software} license"),
            software,
            license_key: None,
            license_type: LicenseType::default(),
            concurrent: false,
            purchased_seats,
            assets: Vec::new(),
            users: Vec::new(),
            customer: None,
            activation_date: None,
            expiration_date: None,
            purchase_value: Decimal::ZERO,
            renewal_cost: None,
            renewal_term_months: 12,
            vendor: None,
            contract_reference: None,
            last_audit_date: None,
            state: LicenseState::Draft,
            renewal_planned: false,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.purchased_seats <= 0 {
            return Err(ValidationError::NonPositiveSeats(self.purchased_seats));
        }
        Ok(())
    }

    pub fn used_seats(&self) -> i64 {
        let used = if self.concurrent {
            self.users.len()
        } else {
            self.assets.len()
        };
        i64::try_from(used).unwrap_or(i64::MAX)
    }

    /// Negative when the license is over-used.
    pub fn available_seats(&self) -> i64 {
        self.purchased_seats - self.used_seats()
    }

    pub fn compliance_status(&self, today: NaiveDate) -> ComplianceStatus {
        match self.state {
            LicenseState::Active => {}
            LicenseState::Expired => return ComplianceStatus::Expired,
            LicenseState::Draft | LicenseState::Terminated => return ComplianceStatus::ToReview,
        }

        let used = self.used_seats();
        if self.expiration_date.is_some_and(|expiry| expiry < today) {
            ComplianceStatus::Expired
        } else if used > self.purchased_seats {
            ComplianceStatus::OverUsed
        } else if used * 5 < self.purchased_seats * 4 {
            // below 80% of the purchased seats
            ComplianceStatus::UnderUsed
        } else {
            ComplianceStatus::Compliant
        }
    }
}

impl Record for License {
    type Id = LicenseId;

    const KIND: &'static str = "license";

    fn id(&self) -> LicenseId {
        self.id
    }

    fn set_id(&mut self, id: LicenseId) {
        self.id = id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date")
    }

    fn active(seats: i64, assigned: u64) -> License {
        let mut license = License::new("Office", seats);
        license.state = LicenseState::Active;
        license.assets = (1..=assigned).map(AssetId).collect();
        license
    }

    #[test]
    fn six_assets_on_five_seats_is_over_used() {
        let license = active(5, 6);
        assert_eq!(license.used_seats(), 6);
        assert_eq!(license.available_seats(), -1);
        assert_eq!(license.compliance_status(today()), ComplianceStatus::OverUsed);
    }

    #[test]
    fn concurrent_licenses_count_users() {
        let mut license = active(2, 5);
        license.concurrent = true;
        license.users = vec![UserId(7), UserId(8)];
        assert_eq!(license.used_seats(), 2);
        assert_eq!(license.compliance_status(today()), ComplianceStatus::Compliant);
    }

    #[test]
    fn status_accounts_for_state_expiry_and_usage() {
        assert_eq!(active(10, 7).compliance_status(today()), ComplianceStatus::UnderUsed);
        assert_eq!(active(10, 8).compliance_status(today()), ComplianceStatus::Compliant);

        let mut lapsed = active(5, 5);
        lapsed.expiration_date = NaiveDate::from_ymd_opt(2024, 5, 31);
        assert_eq!(lapsed.compliance_status(today()), ComplianceStatus::Expired);

        let mut draft = active(5, 9);
        draft.state = LicenseState::Draft;
        assert_eq!(draft.compliance_status(today()), ComplianceStatus::ToReview);
    }

    #[test]
    fn seats_must_be_positive() {
        assert_eq!(
            License::new("Office", 0).validate(),
            Err(ValidationError::NonPositiveSeats(0))
        );
    }
}
