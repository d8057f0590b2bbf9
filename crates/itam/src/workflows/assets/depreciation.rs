use chrono::{Months, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use super::domain::{Asset, DepreciationEntry, DepreciationMethod};
use crate::store::{AssetId, DepreciationEntryId};
use crate::workflows::ValidationError;

const MONTHS_PER_YEAR: u32 = 12;

/// Longest depreciation period an asset may declare.
pub const MAX_DEPRECIATION_YEARS: u32 = 100;

/// Everything the board computation needs, detached from the asset record.
#[derive(Debug, Clone, PartialEq)]
pub struct DepreciationInput {
    pub purchase_value: Decimal,
    pub salvage_value: Decimal,
    pub method: DepreciationMethod,
    pub years: u32,
    pub start_date: NaiveDate,
}

impl DepreciationInput {
    pub fn amount_to_depreciate(&self) -> Decimal {
        self.purchase_value - self.salvage_value
    }

    pub fn period_count(&self) -> u32 {
        match self.method {
            DepreciationMethod::None => 0,
            _ => self.years.saturating_mul(MONTHS_PER_YEAR),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleLine {
    pub sequence: u32,
    pub label: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub depreciated_value: Decimal,
    pub remaining_value: Decimal,
}

impl ScheduleLine {
    pub fn into_entry(self, asset_id: AssetId) -> DepreciationEntry {
        DepreciationEntry {
            id: DepreciationEntryId(0),
            asset_id,
            sequence: self.sequence,
            label: self.label,
            date: self.date,
            amount: self.amount,
            depreciated_value: self.depreciated_value,
            remaining_value: self.remaining_value,
        }
    }
}

/// Annual rate in percent: `100 / years` linear, `200 / years` degressive.
pub fn depreciation_rate(method: DepreciationMethod, years: u32) -> Decimal {
    if years == 0 {
        return Decimal::ZERO;
    }
    match method {
        DepreciationMethod::Linear => Decimal::ONE_HUNDRED / Decimal::from(years),
        DepreciationMethod::Degressive => Decimal::from(200) / Decimal::from(years),
        DepreciationMethod::None => Decimal::ZERO,
    }
}

/// Monthly schedule, one line per period. Period amounts are truncated to
/// cents and the last period absorbs the remainder, so the amounts always
/// sum to `purchase_value - salvage_value` and the last remaining value is
/// exactly the salvage value.
pub fn compute_schedule(input: &DepreciationInput) -> Result<Vec<ScheduleLine>, ValidationError> {
    if input.method == DepreciationMethod::None || input.purchase_value.is_zero() {
        return Ok(Vec::new());
    }
    if input.years == 0 {
        return Err(ValidationError::ZeroDepreciationYears);
    }
    if input.years > MAX_DEPRECIATION_YEARS {
        return Err(ValidationError::DepreciationYearsTooLarge(input.years));
    }
    if input.salvage_value < Decimal::ZERO || input.purchase_value < input.salvage_value {
        return Err(ValidationError::InvalidDepreciableAmount);
    }

    let periods = input.period_count();
    let amount_to_depreciate = input.amount_to_depreciate();
    let linear_amount = truncate_cents(amount_to_depreciate / Decimal::from(periods));

    let mut residual = amount_to_depreciate;
    let mut lines = Vec::with_capacity(periods as usize);

    for sequence in 1..=periods {
        let date = input
            .start_date
            .checked_add_months(Months::new(sequence))
            .ok_or(ValidationError::DateOutOfRange(input.start_date))?;

        let amount = if sequence == periods {
            residual
        } else {
            match input.method {
                DepreciationMethod::Linear => linear_amount,
                // 200% / years annualised is 2 / periods per month.
                _ => truncate_cents(residual * Decimal::TWO / Decimal::from(periods)),
            }
        };

        residual -= amount;
        lines.push(ScheduleLine {
            sequence,
            label: format!("Depreciation {sequence}/{periods}"),
            date,
            amount,
            depreciated_value: amount_to_depreciate - residual,
            remaining_value: residual + input.salvage_value,
        });
    }

    Ok(lines)
}

fn truncate_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::ToZero)
}

/// Read-side summary of a stored board.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepreciationSummary {
    pub rate_percent: Decimal,
    pub period_count: u32,
    pub depreciated_value: Decimal,
    pub depreciation_percentage: Decimal,
}

impl DepreciationSummary {
    pub fn from_entries(asset: &Asset, entries: &[DepreciationEntry]) -> Self {
        let depreciated_value: Decimal = entries.iter().map(|entry| entry.amount).sum();
        let depreciation_percentage = if asset.purchase_value.is_zero() {
            Decimal::ZERO
        } else {
            (depreciated_value / asset.purchase_value * Decimal::ONE_HUNDRED).round_dp(2)
        };

        Self {
            rate_percent: depreciation_rate(asset.depreciation_method, asset.depreciation_years)
                .round_dp(2),
            period_count: asset.depreciation_years.saturating_mul(MONTHS_PER_YEAR),
            depreciated_value,
            depreciation_percentage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn input(method: DepreciationMethod, purchase: i64, salvage: i64, years: u32) -> DepreciationInput {
        DepreciationInput {
            purchase_value: Decimal::from(purchase),
            salvage_value: Decimal::from(salvage),
            method,
            years,
            start_date: date(2021, 1, 1),
        }
    }

    #[test]
    fn linear_three_year_board_closes_at_zero() {
        let lines = compute_schedule(&input(DepreciationMethod::Linear, 3000, 0, 3))
            .expect("schedule computes");

        assert_eq!(lines.len(), 36);
        assert!(lines[..35]
            .iter()
            .all(|line| line.amount == Decimal::new(8333, 2)));
        assert_eq!(lines[35].amount, Decimal::new(8345, 2));
        assert_eq!(lines[35].remaining_value, Decimal::ZERO);
        assert_eq!(lines[35].depreciated_value, Decimal::from(3000));
        assert_eq!(lines[0].date, date(2021, 2, 1));
        assert_eq!(lines[35].date, date(2024, 1, 1));
        assert_eq!(lines[0].label, "Depreciation 1/36");
    }

    #[test]
    fn amounts_sum_to_depreciable_base_and_end_at_salvage() {
        for method in [DepreciationMethod::Linear, DepreciationMethod::Degressive] {
            for (purchase, salvage, years) in [(1999, 150, 4), (7, 0, 10), (2500, 2499, 2), (1, 0, 5)] {
                let lines = compute_schedule(&input(method, purchase, salvage, years))
                    .expect("schedule computes");
                let total: Decimal = lines.iter().map(|line| line.amount).sum();

                assert_eq!(total, Decimal::from(purchase - salvage), "{method:?} {purchase}");
                assert_eq!(
                    lines.last().map(|line| line.remaining_value),
                    Some(Decimal::from(salvage))
                );
                assert!(lines.iter().all(|line| line.amount >= Decimal::ZERO));
            }
        }
    }

    #[test]
    fn degressive_front_loads_depreciation() {
        let lines = compute_schedule(&input(DepreciationMethod::Degressive, 1200, 0, 2))
            .expect("schedule computes");

        // 100% annual rate: first month is 1200 / 12.
        assert_eq!(lines[0].amount, Decimal::from(100));
        assert!(lines[1].amount < lines[0].amount);
        assert_eq!(lines[1].remaining_value, lines[0].remaining_value - lines[1].amount);
    }

    #[test]
    fn method_none_and_zero_value_yield_empty_boards() {
        assert!(compute_schedule(&input(DepreciationMethod::None, 3000, 0, 3))
            .expect("computes")
            .is_empty());
        assert!(compute_schedule(&input(DepreciationMethod::Linear, 0, 0, 3))
            .expect("computes")
            .is_empty());
    }

    #[test]
    fn rejects_invalid_inputs() {
        assert_eq!(
            compute_schedule(&input(DepreciationMethod::Linear, 3000, 0, 0)),
            Err(ValidationError::ZeroDepreciationYears)
        );
        assert_eq!(
            compute_schedule(&input(DepreciationMethod::Degressive, 3000, 0, 400_000_000)),
            Err(ValidationError::DepreciationYearsTooLarge(400_000_000))
        );
        assert_eq!(
            compute_schedule(&input(DepreciationMethod::Linear, 100, 200, 3)),
            Err(ValidationError::InvalidDepreciableAmount)
        );
    }

    #[test]
    fn month_end_start_dates_clamp() {
        let mut input = input(DepreciationMethod::Linear, 120, 0, 1);
        input.start_date = date(2024, 1, 31);
        let lines = compute_schedule(&input).expect("schedule computes");
        assert_eq!(lines[0].date, date(2024, 2, 29));
    }

    #[test]
    fn rate_follows_method() {
        assert_eq!(
            depreciation_rate(DepreciationMethod::Degressive, 4),
            Decimal::from(50)
        );
        assert_eq!(depreciation_rate(DepreciationMethod::Linear, 0), Decimal::ZERO);
    }
}
