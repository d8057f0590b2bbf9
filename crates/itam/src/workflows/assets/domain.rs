use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::depreciation::MAX_DEPRECIATION_YEARS;
use crate::store::{AssetId, CustomerId, DepreciationEntryId, Record, UserId};
use crate::workflows::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Computer,
    Printer,
    Network,
    Other,
}

impl AssetType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Computer => "Computer",
            Self::Printer => "Printer",
            Self::Network => "Network Equipment",
            Self::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    Active,
    Maintenance,
    Stock,
    Retired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepreciationMethod {
    Linear,
    Degressive,
    None,
}

/// Three-level rating recorded for a hardware component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentCondition {
    Good,
    Medium,
    Poor,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub cpu: Option<ComponentCondition>,
    pub ram: Option<ComponentCondition>,
    pub disk: Option<ComponentCondition>,
    pub battery: Option<ComponentCondition>,
}

impl ComponentHealth {
    pub fn ratings(&self) -> [Option<ComponentCondition>; 4] {
        [self.cpu, self.ram, self.disk, self.battery]
    }
}

/// Heuristic urgency for replacing an aging asset.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RenewalPriority {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl RenewalPriority {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalPlan {
    pub planned: bool,
    pub date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub name: String,
    pub asset_type: AssetType,
    pub serial_number: Option<String>,
    pub customer: Option<CustomerId>,
    pub assigned_user: Option<UserId>,
    pub location: Option<String>,
    pub status: AssetStatus,
    pub purchase_date: Option<NaiveDate>,
    pub purchase_value: Decimal,
    pub salvage_value: Decimal,
    pub depreciation_method: DepreciationMethod,
    pub depreciation_years: u32,
    pub depreciation_start_date: Option<NaiveDate>,
    pub components: ComponentHealth,
    pub commissioning_date: Option<NaiveDate>,
    pub warranty_end: Option<NaiveDate>,
    pub maintenance_interval_months: u32,
    pub health_score: Option<f64>,
    pub renewal_priority: RenewalPriority,
    pub renewal: RenewalPlan,
}

impl Asset {
    /// New, unsaved asset with intake defaults: linear over three years,
    /// preventive maintenance every twelve months.
    pub fn new(name: impl Into<String>, asset_type: AssetType) -> Self {
        Self {
            id: AssetId(0),
            name: name.into(),
            asset_type,
            serial_number: None,
            customer: None,
            assigned_user: None,
            location: None,
            status: AssetStatus::Active,
            purchase_date: None,
            purchase_value: Decimal::ZERO,
            salvage_value: Decimal::ZERO,
            depreciation_method: DepreciationMethod::Linear,
            depreciation_years: 3,
            depreciation_start_date: None,
            components: ComponentHealth::default(),
            commissioning_date: None,
            warranty_end: None,
            maintenance_interval_months: 12,
            health_score: None,
            renewal_priority: RenewalPriority::Low,
            renewal: RenewalPlan::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.depreciation_method != DepreciationMethod::None && self.depreciation_years == 0 {
            return Err(ValidationError::ZeroDepreciationYears);
        }
        if self.depreciation_years > MAX_DEPRECIATION_YEARS {
            return Err(ValidationError::DepreciationYearsTooLarge(
                self.depreciation_years,
            ));
        }
        if self.salvage_value < Decimal::ZERO || self.purchase_value < self.salvage_value {
            return Err(ValidationError::InvalidDepreciableAmount);
        }
        Ok(())
    }

    pub fn is_retired(&self) -> bool {
        self.status == AssetStatus::Retired
    }
}

impl Record for Asset {
    type Id = AssetId;

    const KIND: &'static str = "asset";

    fn id(&self) -> AssetId {
        self.id
    }

    fn set_id(&mut self, id: AssetId) {
        self.id = id;
    }
}

/// One period of an asset's depreciation board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepreciationEntry {
    pub id: DepreciationEntryId,
    pub asset_id: AssetId,
    pub sequence: u32,
    pub label: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub depreciated_value: Decimal,
    pub remaining_value: Decimal,
}

impl Record for DepreciationEntry {
    type Id = DepreciationEntryId;

    const KIND: &'static str = "depreciation entry";

    fn id(&self) -> DepreciationEntryId {
        self.id
    }

    fn set_id(&mut self, id: DepreciationEntryId) {
        self.id = id;
    }
}
