use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use itam::config::BillingConfig;
use itam::import::{AssetImporter, LicenseImporter};
use itam::store::memory::InMemoryStore;
use itam::workflows::assets::{
    compute_health, compute_schedule, AssetService, ComponentCondition, ComponentHealth,
    DepreciationInput, DepreciationMethod, RenewalPriority,
};
use itam::workflows::licenses::{ComplianceStatus, LicenseService};
use rust_decimal::Decimal;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn noon(day: NaiveDate) -> NaiveDateTime {
    day.and_hms_opt(12, 0, 0).expect("valid time")
}

#[test]
fn three_year_laptop_depreciates_in_36_monthly_steps() {
    let input = DepreciationInput {
        purchase_value: Decimal::from(1200),
        salvage_value: Decimal::ZERO,
        method: DepreciationMethod::Linear,
        years: 3,
        start_date: date(2024, 1, 1),
    };

    let schedule = compute_schedule(&input).expect("schedule computed");

    assert_eq!(schedule.len(), 36);
    assert!(schedule[..35]
        .iter()
        .all(|line| line.amount == Decimal::new(3333, 2)));
    assert_eq!(schedule[35].amount, Decimal::new(3345, 2));
    assert_eq!(schedule[35].date, date(2027, 1, 1));
    assert_eq!(schedule[35].remaining_value, Decimal::ZERO);
    assert_eq!(
        schedule.iter().map(|line| line.amount).sum::<Decimal>(),
        Decimal::from(1200)
    );
}

#[test]
fn salvage_value_is_the_final_remaining_value() {
    let input = DepreciationInput {
        purchase_value: Decimal::new(99_999, 2),
        salvage_value: Decimal::from(100),
        method: DepreciationMethod::Degressive,
        years: 4,
        start_date: date(2023, 5, 31),
    };

    let schedule = compute_schedule(&input).expect("schedule computed");

    assert_eq!(schedule.len(), 48);
    assert_eq!(
        schedule.last().map(|line| line.remaining_value),
        Some(Decimal::from(100))
    );
    assert_eq!(
        schedule.iter().map(|line| line.amount).sum::<Decimal>(),
        Decimal::new(89_999, 2)
    );
    assert!(schedule.windows(2).all(|pair| pair[0].date < pair[1].date));
}

#[test]
fn health_stays_within_bounds_for_every_rating_mix() {
    let ratings = [
        None,
        Some(ComponentCondition::Good),
        Some(ComponentCondition::Medium),
        Some(ComponentCondition::Poor),
    ];
    for cpu in ratings {
        for disk in ratings {
            for age in [0, 12, 36, 120] {
                let components = ComponentHealth {
                    cpu,
                    ram: None,
                    disk,
                    battery: Some(ComponentCondition::Medium),
                };
                let health = compute_health(age, 3, &components);
                assert!((0.0..=100.0).contains(&health), "health {health} out of range");
            }
        }
    }
}

#[test]
fn imported_inventory_flows_through_the_services() {
    let assets = "\
Name,Type,Customer,Purchase Date,Purchase Value,Depreciation Years,Disk
Old desktop,computer,3,2020-02-01,900,3,poor
New printer,printer,3,2024-05-01,450.50,5,
";
    let licenses = "\
Software,Seats,State,Assets
Office,1,active,1;2
";
    let store = Arc::new(InMemoryStore::new());
    let asset_service = AssetService::new(Arc::clone(&store), BillingConfig::default());
    let license_service = LicenseService::new(Arc::clone(&store));
    let today = date(2024, 6, 1);

    let mut registered = Vec::new();
    for asset in AssetImporter::from_reader(assets.as_bytes()).expect("assets parse") {
        registered.push(asset_service.register(asset, noon(today)).expect("registered"));
    }
    let license = LicenseImporter::from_reader(licenses.as_bytes())
        .expect("licenses parse")
        .remove(0);
    let license = license_service
        .register(license, noon(today))
        .expect("registered");

    let board = asset_service
        .compute_depreciation_board(registered[1].id, noon(today))
        .expect("board");
    assert_eq!(board.len(), 60);

    let old = asset_service
        .refresh_indicators(registered[0].id, today)
        .expect("refreshed");
    let new = asset_service
        .refresh_indicators(registered[1].id, today)
        .expect("refreshed");
    assert_eq!(old.renewal_priority, RenewalPriority::Critical);
    assert_eq!(new.renewal_priority, RenewalPriority::Low);

    assert_eq!(
        license_service
            .audit_license(license.id, noon(today))
            .expect("audited"),
        ComplianceStatus::OverUsed
    );
}
