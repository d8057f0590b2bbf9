use super::domain::{ComponentCondition, ComponentHealth};

const MAX_AGE_PENALTY: f64 = 30.0;
const POOR_PENALTY: f64 = 70.0;
const MEDIUM_PENALTY: f64 = 30.0;
const FALLBACK_LIFESPAN_MONTHS: f64 = 36.0;

/// 0..=100 health estimate from age and component ratings.
///
/// Age costs up to 30 points, reached at the end of the depreciation period
/// (36 months when none is set). Component penalties are shared out over the
/// rated components only, so one poor disk on an otherwise unrated machine
/// costs the full 70 points.
pub fn compute_health(age_months: u32, depreciation_years: u32, components: &ComponentHealth) -> f64 {
    let mut score = 100.0;

    let lifespan_months = match depreciation_years {
        0 => FALLBACK_LIFESPAN_MONTHS,
        years => f64::from(years) * 12.0,
    };
    let age_factor = (f64::from(age_months) / lifespan_months).min(1.0);
    score -= MAX_AGE_PENALTY * age_factor;

    let ratings = components.ratings();
    let rated = ratings.iter().flatten().count();
    if rated > 0 {
        let share = rated as f64;
        for condition in ratings.iter().flatten() {
            score -= match condition {
                ComponentCondition::Poor => POOR_PENALTY / share,
                ComponentCondition::Medium => MEDIUM_PENALTY / share,
                ComponentCondition::Good => 0.0,
            };
        }
    }

    score.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn components(
        cpu: Option<ComponentCondition>,
        ram: Option<ComponentCondition>,
        disk: Option<ComponentCondition>,
        battery: Option<ComponentCondition>,
    ) -> ComponentHealth {
        ComponentHealth {
            cpu,
            ram,
            disk,
            battery,
        }
    }

    #[test]
    fn unrated_components_leave_only_the_age_penalty() {
        let health = compute_health(18, 3, &ComponentHealth::default());
        assert!((health - 85.0).abs() < 1e-9);
    }

    #[test]
    fn age_penalty_caps_at_thirty_points() {
        let health = compute_health(240, 3, &ComponentHealth::default());
        assert!((health - 70.0).abs() < 1e-9);
    }

    #[test]
    fn missing_depreciation_years_falls_back_to_36_months() {
        let health = compute_health(36, 0, &ComponentHealth::default());
        assert!((health - 70.0).abs() < 1e-9);
    }

    #[test]
    fn component_penalties_are_shared_across_rated_components() {
        use ComponentCondition::*;
        let mixed = components(Some(Poor), Some(Medium), None, Some(Good));
        let health = compute_health(0, 3, &mixed);
        assert!((health - (100.0 - 70.0 / 3.0 - 30.0 / 3.0)).abs() < 1e-9);

        let single_poor = components(None, None, Some(Poor), None);
        assert!((compute_health(0, 3, &single_poor) - 30.0).abs() < 1e-9);
    }

    #[test]
    fn score_stays_within_bounds() {
        use ComponentCondition::*;
        let conditions = [None, Some(Good), Some(Medium), Some(Poor)];
        for cpu in conditions {
            for disk in conditions {
                for age in [0, 12, 36, 600] {
                    let health = compute_health(age, 1, &components(cpu, Some(Poor), disk, None));
                    assert!((0.0..=100.0).contains(&health), "{health}");
                }
            }
        }
    }
}
