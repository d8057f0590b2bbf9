//! Asset intake, depreciation boards, health and renewal planning.

pub mod depreciation;
pub mod domain;
pub mod health;
pub mod lifecycle;
pub mod renewal;
pub mod service;

pub use depreciation::{
    compute_schedule, depreciation_rate, DepreciationInput, DepreciationSummary, ScheduleLine,
    MAX_DEPRECIATION_YEARS,
};
pub use domain::{
    Asset, AssetStatus, AssetType, ComponentCondition, ComponentHealth, DepreciationEntry,
    DepreciationMethod, RenewalPlan, RenewalPriority,
};
pub use health::compute_health;
pub use lifecycle::{IncidentMetrics, LifecycleCost, TimelineEvent, TimelineKind};
pub use renewal::{
    compute_priority, PriorityFilter, RenewalAssessment, RenewalFactor, RenewalFactorKind,
    RenewalInputs, RenewalPlanFilter,
};
pub use service::{AssetIndicators, AssetService, RenewalBatch};
