use std::sync::Arc;

use chrono::NaiveDate;
use itam::store::memory::InMemoryStore;
use itam::store::{Query, RecordStore};
use itam::workflows::assets::{Asset, AssetService, RenewalPlanFilter};
use itam::workflows::{ConfigurationError, SweepReport, WorkflowError};

/// Computes and prints the depreciation board of every asset. Assets that
/// cannot be depreciated are reported and skipped.
pub(crate) fn print_depreciation(
    store: &Arc<InMemoryStore>,
    service: &AssetService<InMemoryStore>,
    today: NaiveDate,
    show_lines: bool,
) -> Result<(), WorkflowError> {
    let at = today.and_time(chrono::NaiveTime::MIN);
    let assets = store.assets().find(&Query::all())?;
    println!("Depreciation boards ({} assets)", assets.len());

    for asset in assets {
        let entries = match service.compute_depreciation_board(asset.id, at) {
            Ok(entries) => entries,
            Err(WorkflowError::Configuration(ConfigurationError::MissingPurchaseDate(_))) => {
                println!("- {} [{}]: no purchase date, skipped", asset.name, asset.id);
                continue;
            }
            Err(err) => return Err(err),
        };
        let summary = service.depreciation_summary(asset.id)?;
        println!(
            "- {} [{}]: {:?} {} periods at {}%/yr | depreciated {} ({}%)",
            asset.name,
            asset.id,
            asset.depreciation_method,
            summary.period_count,
            summary.rate_percent,
            summary.depreciated_value,
            summary.depreciation_percentage.round_dp(2)
        );
        if show_lines {
            for entry in entries {
                println!(
                    "    {:>3} {} {:>12} remaining {:>12}",
                    entry.sequence, entry.date, entry.amount, entry.remaining_value
                );
            }
        }
    }
    Ok(())
}

/// Prints the renewal plan for a window, optionally raising the tickets.
pub(crate) fn print_renewals(
    service: &AssetService<InMemoryStore>,
    filter: &RenewalPlanFilter,
    today: NaiveDate,
    raise_tickets: bool,
) -> Result<(), WorkflowError> {
    let refreshed = service.refresh_all(today)?;
    print_sweep_failures(&refreshed);

    let planned = service.plan_renewals(filter)?;
    println!(
        "Renewal plan {} to {} ({} assets)",
        filter.from,
        filter.to,
        planned.len()
    );
    for asset in &planned {
        print_renewal_line(service, asset, today)?;
    }

    if raise_tickets && !planned.is_empty() {
        let at = today.and_time(chrono::NaiveTime::MIN);
        let batch = service.generate_renewal_requests(filter, at)?;
        for ticket in &batch.tickets {
            println!("  ticket {} {}", ticket.id, ticket.subject);
        }
        print_sweep_report("renewal-requests", &batch.report);
    }
    Ok(())
}

fn print_renewal_line(
    service: &AssetService<InMemoryStore>,
    asset: &Asset,
    today: NaiveDate,
) -> Result<(), WorkflowError> {
    let indicators = service.indicators(asset.id, today)?;
    let renewal_date = indicators
        .recommended_renewal_date
        .map_or_else(|| "-".to_string(), |date| date.to_string());
    println!(
        "- {} [{}]: {} (score {:.2}) | renew by {} | health {:.0} | value {}",
        asset.name,
        asset.id,
        indicators.renewal.priority.label(),
        indicators.renewal.score,
        renewal_date,
        indicators.health_score,
        indicators.current_value
    );
    for factor in &indicators.renewal.factors {
        println!(
            "    {:?}: {:.2} x {:.1} ({})",
            factor.kind, factor.value, factor.weight, factor.notes
        );
    }
    Ok(())
}

pub(crate) fn print_sweep_report(label: &str, report: &SweepReport) {
    println!(
        "{label}: {} created | {} skipped | {} failures",
        report.created,
        report.skipped,
        report.failures.len()
    );
    print_sweep_failures(report);
}

fn print_sweep_failures(report: &SweepReport) {
    for failure in &report.failures {
        println!("  ! {}: {}", failure.entity, failure.error);
    }
}
