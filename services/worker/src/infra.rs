use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use clap::Args;
use itam::config::BillingConfig;
use itam::error::AppError;
use itam::import::{AssetImporter, LicenseImporter};
use itam::outbound::{
    DocumentRenderer, Notification, NotificationError, Notifier, RenderError, RenderedDocument,
};
use itam::store::memory::InMemoryStore;
use itam::store::{CustomerId, EntityRef, RecordStore};
use itam::workflows::assets::AssetService;
use itam::workflows::contracts::{BillingFrequency, Contract, ContractState, ExtraService};
use itam::workflows::licenses::LicenseService;
use itam::workflows::WorkflowError;
use rust_decimal::Decimal;
use serde::Deserialize;

/// Inventory files loaded into the in-memory store before any command runs.
#[derive(Args, Debug, Default, Clone)]
pub(crate) struct InventoryArgs {
    /// Asset inventory CSV export
    #[arg(long)]
    pub(crate) assets: Option<PathBuf>,
    /// License register CSV export
    #[arg(long)]
    pub(crate) licenses: Option<PathBuf>,
    /// Maintenance contracts as a JSON array
    #[arg(long)]
    pub(crate) contracts: Option<PathBuf>,
}

/// Writes every outbound notification to the log instead of a mail gateway.
#[derive(Debug, Default, Clone)]
pub(crate) struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, notification: Notification) -> Result<(), NotificationError> {
        tracing::info!(
            template = %notification.template,
            entity = %notification.entity,
            attachments = notification.attachments.len(),
            details = ?notification.details,
            "notification dispatched"
        );
        Ok(())
    }
}

/// Renders records as pretty-printed JSON documents.
#[derive(Debug, Default, Clone)]
pub(crate) struct JsonRenderer;

impl DocumentRenderer for JsonRenderer {
    fn render(
        &self,
        entity: EntityRef,
        payload: &serde_json::Value,
    ) -> Result<RenderedDocument, RenderError> {
        let bytes = serde_json::to_vec_pretty(payload).map_err(|err| RenderError::Failed {
            entity,
            reason: err.to_string(),
        })?;
        Ok(RenderedDocument {
            filename: format!("{}.json", entity.to_string().replace('/', "-")),
            content_type: "application/json".to_string(),
            bytes,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ContractSeed {
    reference: String,
    customer: CustomerId,
    start_date: NaiveDate,
    end_date: NaiveDate,
    #[serde(default)]
    state: ContractState,
    #[serde(default)]
    amount: Decimal,
    #[serde(default)]
    billing_frequency: BillingFrequency,
    #[serde(default)]
    next_invoice_date: Option<NaiveDate>,
    #[serde(default)]
    discount_rate: Decimal,
    #[serde(default)]
    discount_amount: Decimal,
    #[serde(default = "enabled")]
    auto_send: bool,
    #[serde(default)]
    special_conditions: Option<String>,
    #[serde(default)]
    bill_out_of_scope: bool,
    #[serde(default)]
    extra_services: Vec<ExtraService>,
}

fn enabled() -> bool {
    true
}

impl From<ContractSeed> for Contract {
    fn from(seed: ContractSeed) -> Self {
        let mut contract =
            Contract::new(seed.reference, seed.customer, seed.start_date, seed.end_date);
        contract.state = seed.state;
        contract.amount = seed.amount;
        contract.billing_frequency = seed.billing_frequency;
        contract.next_invoice_date = seed.next_invoice_date;
        contract.discount_rate = seed.discount_rate;
        contract.discount_amount = seed.discount_amount;
        contract.auto_send = seed.auto_send;
        contract.special_conditions = seed.special_conditions;
        contract.bill_out_of_scope = seed.bill_out_of_scope;
        contract.extra_services = seed.extra_services;
        contract
    }
}

/// Builds a store holding the given inventory. Assets and licenses go
/// through their services so intake validation and audit events apply.
pub(crate) fn load_store(
    inventory: &InventoryArgs,
    billing: &BillingConfig,
    today: NaiveDate,
) -> Result<Arc<InMemoryStore>, AppError> {
    let store = Arc::new(InMemoryStore::new());
    let at = today.and_time(chrono::NaiveTime::MIN);

    if let Some(path) = &inventory.assets {
        let service = AssetService::new(Arc::clone(&store), billing.clone());
        let assets = AssetImporter::from_path(path)?;
        let count = assets.len();
        for asset in assets {
            service.register(asset, at)?;
        }
        tracing::info!(count, path = %path.display(), "assets loaded");
    }

    if let Some(path) = &inventory.licenses {
        let service = LicenseService::new(Arc::clone(&store));
        let licenses = LicenseImporter::from_path(path)?;
        let count = licenses.len();
        for license in licenses {
            service.register(license, at)?;
        }
        tracing::info!(count, path = %path.display(), "licenses loaded");
    }

    if let Some(path) = &inventory.contracts {
        let seeds = read_contracts(path)?;
        let count = seeds.len();
        for seed in seeds {
            store
                .contracts()
                .create(Contract::from(seed))
                .map_err(WorkflowError::from)?;
        }
        tracing::info!(count, path = %path.display(), "contracts loaded");
    }

    Ok(store)
}

fn read_contracts(path: &Path) -> Result<Vec<ContractSeed>, AppError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
