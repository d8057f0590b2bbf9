use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use itam::config::AppConfig;
use itam::error::AppError;
use itam::scheduler::{SweepJob, SweepRunner};
use itam::store::CustomerId;
use itam::telemetry;
use itam::workflows::assets::{AssetService, PriorityFilter, RenewalPlanFilter};
use tracing::{error, info};

use crate::infra::{load_store, InventoryArgs, JsonRenderer, LogNotifier};
use crate::reports::{print_depreciation, print_renewals, print_sweep_report};

#[derive(Parser, Debug)]
#[command(
    name = "itam-worker",
    about = "Run the IT asset care sweeps and reports from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every sweep on a fixed interval until interrupted (default command)
    Run(RunArgs),
    /// Run a single named sweep once and print its report
    Sweep(SweepArgs),
    /// Compute and print the depreciation board of every asset
    Depreciation(DepreciationArgs),
    /// Print the renewal plan for a date window
    Renewals(RenewalArgs),
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    #[command(flatten)]
    inventory: InventoryArgs,
    /// Override the configured interval between ticks
    #[arg(long)]
    interval_hours: Option<u64>,
    /// Run a single tick and exit
    #[arg(long)]
    once: bool,
}

#[derive(Args, Debug)]
struct SweepArgs {
    /// Sweep to run (contract-alerts, warranty-alerts, license-alerts,
    /// maintenance-alerts, license-compliance-alerts, contract-invoices,
    /// asset-indicators)
    job: SweepJob,
    #[command(flatten)]
    inventory: InventoryArgs,
    /// Sweep date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    today: Option<NaiveDate>,
}

#[derive(Args, Debug)]
struct DepreciationArgs {
    #[command(flatten)]
    inventory: InventoryArgs,
    /// Print every period of each board
    #[arg(long)]
    lines: bool,
    /// Reporting date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    today: Option<NaiveDate>,
}

#[derive(Args, Debug)]
struct RenewalArgs {
    #[command(flatten)]
    inventory: InventoryArgs,
    /// Window start (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    from: Option<NaiveDate>,
    /// Window end (YYYY-MM-DD). Defaults to one year after the start.
    #[arg(long, value_parser = crate::infra::parse_date)]
    to: Option<NaiveDate>,
    #[arg(long, value_enum, default_value_t = PriorityArg::All)]
    priority: PriorityArg,
    /// Restrict the plan to one customer
    #[arg(long)]
    customer: Option<u64>,
    /// Raise a renewal ticket for every planned asset
    #[arg(long)]
    raise_tickets: bool,
    /// Evaluation date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    today: Option<NaiveDate>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum PriorityArg {
    All,
    HighAndCritical,
    CriticalOnly,
}

impl From<PriorityArg> for PriorityFilter {
    fn from(value: PriorityArg) -> Self {
        match value {
            PriorityArg::All => PriorityFilter::All,
            PriorityArg::HighAndCritical => PriorityFilter::HighAndCritical,
            PriorityArg::CriticalOnly => PriorityFilter::CriticalOnly,
        }
    }
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Run(RunArgs::default()));

    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry, config.environment)?;

    match command {
        Command::Run(args) => run_loop(config, args).await,
        Command::Sweep(args) => run_sweep(&config, args),
        Command::Depreciation(args) => run_depreciation(&config, args),
        Command::Renewals(args) => run_renewals(&config, args),
    }
}

fn today_or_now(today: Option<NaiveDate>) -> NaiveDate {
    today.unwrap_or_else(|| Local::now().date_naive())
}

async fn run_loop(config: AppConfig, args: RunArgs) -> Result<(), AppError> {
    let interval_hours = args
        .interval_hours
        .unwrap_or(config.scheduler.interval_hours)
        .max(1);
    let store = load_store(&args.inventory, &config.billing, today_or_now(None))?;
    let runner = Arc::new(SweepRunner::new(
        store,
        Arc::new(JsonRenderer),
        Arc::new(LogNotifier),
        &config,
    ));

    info!(
        ?config.environment,
        interval_hours,
        "asset care worker started"
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(interval_hours * 3600));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let runner = Arc::clone(&runner);
                let tick = tokio::task::spawn_blocking(move || {
                    runner.run_all(Local::now().naive_local())
                })
                .await;
                match tick {
                    Ok(report) => print_sweep_report("tick", &report),
                    Err(err) => error!(%err, "sweep tick panicked"),
                }
                if args.once {
                    break;
                }
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(err) = signal {
                    error!(%err, "unable to listen for shutdown signal");
                }
                info!("shutdown requested");
                break;
            }
        }
    }
    Ok(())
}

fn run_sweep(config: &AppConfig, args: SweepArgs) -> Result<(), AppError> {
    let today = today_or_now(args.today);
    let store = load_store(&args.inventory, &config.billing, today)?;
    let runner = SweepRunner::new(store, Arc::new(JsonRenderer), Arc::new(LogNotifier), config);

    let at = match args.today {
        Some(day) => day.and_time(chrono::NaiveTime::MIN),
        None => Local::now().naive_local(),
    };
    let report = runner.run(args.job, at)?;
    print_sweep_report(args.job.name(), &report);
    Ok(())
}

fn run_depreciation(config: &AppConfig, args: DepreciationArgs) -> Result<(), AppError> {
    let today = today_or_now(args.today);
    let store = load_store(&args.inventory, &config.billing, today)?;
    let service = AssetService::new(Arc::clone(&store), config.billing.clone());
    print_depreciation(&store, &service, today, args.lines)?;
    Ok(())
}

fn run_renewals(config: &AppConfig, args: RenewalArgs) -> Result<(), AppError> {
    let today = today_or_now(args.today);
    let from = args.from.unwrap_or(today);
    let to = args
        .to
        .unwrap_or_else(|| from.checked_add_months(chrono::Months::new(12)).unwrap_or(from));
    let filter = RenewalPlanFilter {
        from,
        to,
        priority: args.priority.into(),
        customer: args.customer.map(CustomerId),
    };

    let store = load_store(&args.inventory, &config.billing, today)?;
    let service = AssetService::new(store, config.billing.clone());
    print_renewals(&service, &filter, today, args.raise_tickets)?;
    Ok(())
}
