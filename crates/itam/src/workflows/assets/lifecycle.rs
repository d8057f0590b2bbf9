//! Date and cost helpers describing where an asset stands in its life.

use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::Asset;
use crate::store::AssetId;
use crate::workflows::interventions::{Intervention, InterventionKind};

/// Straight-line write-off horizon for the book value shown on dashboards.
const BOOK_VALUE_HORIZON_DAYS: i64 = 1095;

/// Whole calendar months elapsed since `purchase`; zero when unknown or in
/// the future.
pub fn age_in_months(purchase: Option<NaiveDate>, today: NaiveDate) -> u32 {
    let Some(purchase) = purchase else {
        return 0;
    };
    let mut months = (today.year() - purchase.year()) * 12 + today.month() as i32
        - purchase.month() as i32;
    if today.day() < purchase.day() {
        months -= 1;
    }
    u32::try_from(months).unwrap_or(0)
}

/// Indicative value, written off linearly to zero over three years.
pub fn current_value(asset: &Asset, today: NaiveDate) -> Decimal {
    let Some(purchase) = asset.purchase_date else {
        return Decimal::ZERO;
    };
    if asset.purchase_value.is_zero() {
        return Decimal::ZERO;
    }

    let age_days = (today - purchase).num_days();
    if age_days < 0 {
        return asset.purchase_value;
    }
    if age_days >= BOOK_VALUE_HORIZON_DAYS {
        return Decimal::ZERO;
    }

    let remaining = Decimal::ONE
        - Decimal::from(age_days) / Decimal::from(BOOK_VALUE_HORIZON_DAYS);
    (asset.purchase_value * remaining).round_dp(2)
}

fn add_years(start: NaiveDate, years: u32) -> Option<NaiveDate> {
    start.checked_add_months(Months::new(years.checked_mul(12)?))
}

pub fn recommended_renewal_date(asset: &Asset) -> Option<NaiveDate> {
    match asset.depreciation_years {
        0 => None,
        years => add_years(asset.purchase_date?, years),
    }
}

pub fn end_of_life_date(asset: &Asset) -> Option<NaiveDate> {
    let start = asset.commissioning_date.or(asset.purchase_date)?;
    match asset.depreciation_years {
        0 => None,
        years => add_years(start, years),
    }
}

/// Failure statistics over the corrective interventions touching an asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct IncidentMetrics {
    pub incident_count: usize,
    /// Mean days between the end of one incident and the start of the next.
    pub mttf_days: f64,
    /// Mean repair time in hours.
    pub mttr_hours: f64,
}

impl IncidentMetrics {
    pub fn for_asset(asset: AssetId, interventions: &[Intervention]) -> Self {
        let mut incidents: Vec<&Intervention> = interventions
            .iter()
            .filter(|intervention| {
                intervention.kind == InterventionKind::Corrective && intervention.covers(asset)
            })
            .collect();
        if incidents.is_empty() {
            return Self::default();
        }
        incidents.sort_by_key(|incident| incident.date_start);

        let count = incidents.len();
        let mttf_days = if count > 1 {
            let gap_days: f64 = incidents
                .windows(2)
                .map(|pair| {
                    (pair[1].date_start - pair[0].date_end).num_seconds() as f64 / 86_400.0
                })
                .sum();
            gap_days / (count - 1) as f64
        } else {
            0.0
        };

        let repair_hours: f64 = incidents
            .iter()
            .map(|incident| incident.duration().num_seconds() as f64 / 3_600.0)
            .sum();

        Self {
            incident_count: count,
            mttf_days,
            mttr_hours: repair_hours / count as f64,
        }
    }
}

/// Total cost of ownership: purchase price plus billable work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LifecycleCost {
    pub total: Decimal,
    pub per_month: Decimal,
}

impl LifecycleCost {
    pub fn compute(
        asset: &Asset,
        interventions: &[Intervention],
        default_hourly_rate: Decimal,
        today: NaiveDate,
    ) -> Self {
        let work: Decimal = interventions
            .iter()
            .filter(|intervention| intervention.billable && intervention.covers(asset.id))
            .map(|intervention| {
                intervention.duration_hours() * intervention.rate_or(default_hourly_rate)
            })
            .sum();
        let total = asset.purchase_value + work;

        let months = age_in_months(asset.purchase_date, today).max(1);
        Self {
            total,
            per_month: (total / Decimal::from(months)).round_dp(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineKind {
    Purchase,
    Commissioning,
    WarrantyEnd,
    Renewal,
    EndOfLife,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub date: NaiveDate,
    pub kind: TimelineKind,
}

/// Key dates of the asset in chronological order.
pub fn timeline(asset: &Asset) -> Vec<TimelineEvent> {
    let mut events: Vec<TimelineEvent> = [
        (asset.purchase_date, TimelineKind::Purchase),
        (asset.commissioning_date, TimelineKind::Commissioning),
        (asset.warranty_end, TimelineKind::WarrantyEnd),
        (recommended_renewal_date(asset), TimelineKind::Renewal),
        (end_of_life_date(asset), TimelineKind::EndOfLife),
    ]
    .into_iter()
    .filter_map(|(date, kind)| Some(TimelineEvent { date: date?, kind }))
    .collect();
    events.sort_by_key(|event| (event.date, event.kind));
    events
}
