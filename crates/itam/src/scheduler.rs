//! Named periodic sweeps and an in-process runner that refuses overlapping
//! runs of the same job.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::outbound::{DocumentRenderer, Notifier};
use crate::store::{RecordStore, StoreError};
use crate::workflows::alerts::AlertSweeper;
use crate::workflows::assets::AssetService;
use crate::workflows::contracts::InvoiceAssembler;
use crate::workflows::SweepReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SweepJob {
    ContractAlerts,
    WarrantyAlerts,
    LicenseAlerts,
    MaintenanceAlerts,
    LicenseComplianceAlerts,
    ContractInvoices,
    AssetIndicators,
}

impl SweepJob {
    /// Run order of a full tick. Indicators go first so renewal scores are
    /// fresh, invoices go last.
    pub const ALL: [SweepJob; 7] = [
        SweepJob::AssetIndicators,
        SweepJob::ContractAlerts,
        SweepJob::WarrantyAlerts,
        SweepJob::LicenseAlerts,
        SweepJob::MaintenanceAlerts,
        SweepJob::LicenseComplianceAlerts,
        SweepJob::ContractInvoices,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            SweepJob::ContractAlerts => "contract-alerts",
            SweepJob::WarrantyAlerts => "warranty-alerts",
            SweepJob::LicenseAlerts => "license-alerts",
            SweepJob::MaintenanceAlerts => "maintenance-alerts",
            SweepJob::LicenseComplianceAlerts => "license-compliance-alerts",
            SweepJob::ContractInvoices => "contract-invoices",
            SweepJob::AssetIndicators => "asset-indicators",
        }
    }
}

impl fmt::Display for SweepJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SweepJob {
    type Err = SchedulerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_ascii_lowercase();
        SweepJob::ALL
            .into_iter()
            .find(|job| job.name() == wanted)
            .ok_or(SchedulerError::UnknownJob(wanted))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("sweep {0} is already running")]
    AlreadyRunning(SweepJob),
    #[error("unknown sweep job '{0}'")]
    UnknownJob(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Runs sweeps by name on behalf of an external trigger (the worker's timer,
/// a CLI invocation).
pub struct SweepRunner<S, R, N> {
    alerts: AlertSweeper<S>,
    invoices: InvoiceAssembler<S, R, N>,
    assets: AssetService<S>,
    running: Mutex<HashSet<SweepJob>>,
}

impl<S, R, N> SweepRunner<S, R, N>
where
    S: RecordStore + 'static,
    R: DocumentRenderer + 'static,
    N: Notifier + 'static,
{
    pub fn new(store: Arc<S>, renderer: Arc<R>, notifier: Arc<N>, config: &AppConfig) -> Self {
        Self {
            alerts: AlertSweeper::new(Arc::clone(&store), config.alerts),
            invoices: InvoiceAssembler::new(
                Arc::clone(&store),
                renderer,
                notifier,
                config.billing.clone(),
            ),
            assets: AssetService::new(store, config.billing.clone()),
            running: Mutex::new(HashSet::new()),
        }
    }

    /// Runs one job for the day of `at`. A job already in flight is refused
    /// rather than queued.
    pub fn run(&self, job: SweepJob, at: NaiveDateTime) -> Result<SweepReport, SchedulerError> {
        let _guard = self.claim(job)?;
        let today = at.date();
        tracing::info!(job = %job, %today, "sweep started");

        let report = match job {
            SweepJob::ContractAlerts => self.alerts.contract_sweep(today)?,
            SweepJob::WarrantyAlerts => self.alerts.warranty_sweep(today)?,
            SweepJob::LicenseAlerts => self.alerts.license_sweep(today)?,
            SweepJob::MaintenanceAlerts => self.alerts.maintenance_sweep(today)?,
            SweepJob::LicenseComplianceAlerts => self.alerts.license_compliance_sweep(today)?,
            SweepJob::ContractInvoices => self.invoices.sweep(at)?,
            SweepJob::AssetIndicators => self.assets.refresh_all(today)?,
        };
        Ok(report)
    }

    /// Every job in [`SweepJob::ALL`] order. A job that errors out is logged
    /// and the tick continues with the next one.
    pub fn run_all(&self, at: NaiveDateTime) -> SweepReport {
        let mut total = SweepReport::default();
        for job in SweepJob::ALL {
            match self.run(job, at) {
                Ok(report) => total.merge(report),
                Err(error) => tracing::error!(job = %job, %error, "sweep aborted"),
            }
        }
        total
    }

    fn claim(&self, job: SweepJob) -> Result<RunningGuard<'_>, SchedulerError> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if !running.insert(job) {
            tracing::warn!(job = %job, "sweep skipped: previous run still in progress");
            return Err(SchedulerError::AlreadyRunning(job));
        }
        Ok(RunningGuard {
            running: &self.running,
            job,
        })
    }
}

struct RunningGuard<'a> {
    running: &'a Mutex<HashSet<SweepJob>>,
    job: SweepJob,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.job);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AssetId;
    use crate::workflows::licenses::{License, LicenseState};
    use crate::workflows::tests::common::{at, date, Fixture};

    #[test]
    fn job_names_round_trip_through_from_str() {
        for job in SweepJob::ALL {
            assert_eq!(job.name().parse::<SweepJob>().expect("known job"), job);
        }
        assert!(matches!(
            "nightly".parse::<SweepJob>(),
            Err(SchedulerError::UnknownJob(_))
        ));
    }

    #[test]
    fn refuses_a_job_that_is_already_running() {
        let fixture = Fixture::new();
        let runner = fixture.runner();

        let held = runner.claim(SweepJob::ContractAlerts).expect("first claim");
        let err = runner
            .run(SweepJob::ContractAlerts, at(2024, 6, 1))
            .expect_err("overlap refused");
        assert!(matches!(err, SchedulerError::AlreadyRunning(SweepJob::ContractAlerts)));

        runner
            .run(SweepJob::WarrantyAlerts, at(2024, 6, 1))
            .expect("other jobs still run");

        drop(held);
        runner
            .run(SweepJob::ContractAlerts, at(2024, 6, 1))
            .expect("released after the guard drops");
    }

    #[test]
    fn run_all_covers_compliance_alerts() {
        let fixture = Fixture::new();
        let mut license = License::new("CAD Suite", 1);
        license.state = LicenseState::Active;
        license.assets = vec![AssetId(1), AssetId(2)];
        fixture.insert_license(license);

        let report = fixture.runner().run_all(at(2024, 6, 1));
        assert_eq!(report.created, 1);
        assert!(report.is_clean());

        let alerts = fixture.open_alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].deadline, date(2024, 6, 8));
    }
}
