use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use crate::config::{
    AlertBands, AppConfig, AppEnvironment, BillingConfig, SchedulerConfig, TelemetryConfig,
};
use crate::outbound::{
    DocumentRenderer, Notification, NotificationError, Notifier, RenderError, RenderedDocument,
};
use crate::scheduler::SweepRunner;
use crate::store::memory::InMemoryStore;
use crate::store::{
    AssetId, AuditEvent, ContractId, CustomerId, EntityRef, InterventionId, InvoiceId, Query,
    Record, RecordStore, Repository, StoreError,
};
use crate::workflows::alerts::{Alert, AlertService, AlertSweeper};
use crate::workflows::assets::{Asset, AssetService, AssetType, DepreciationEntry};
use crate::workflows::contracts::{Contract, ContractState, Invoice, InvoiceAssembler};
use crate::workflows::interventions::{Intervention, InterventionService};
use crate::workflows::licenses::{License, LicenseService};
use crate::workflows::tickets::Ticket;

pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// Nine in the morning on the given day.
pub(crate) fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
    at_hm(y, m, d, 9, 0)
}

pub(crate) fn at_hm(y: i32, m: u32, d: u32, hour: u32, minute: u32) -> NaiveDateTime {
    date(y, m, d)
        .and_hms_opt(hour, minute, 0)
        .expect("valid time")
}

pub(crate) fn config() -> AppConfig {
    AppConfig {
        environment: AppEnvironment::Test,
        scheduler: SchedulerConfig { interval_hours: 24 },
        alerts: AlertBands::default(),
        billing: BillingConfig::default(),
        telemetry: TelemetryConfig {
            log_level: "debug".to_string(),
        },
    }
}

/// Linear three-year laptop bought for 1200.
pub(crate) fn laptop(purchase_date: NaiveDate) -> Asset {
    let mut asset = Asset::new("Laptop 01", AssetType::Computer);
    asset.customer = Some(CustomerId(1));
    asset.purchase_date = Some(purchase_date);
    asset.purchase_value = Decimal::from(1200);
    asset
}

pub(crate) fn active_contract(reference: &str, start: NaiveDate, end: NaiveDate) -> Contract {
    let mut contract = Contract::new(reference, CustomerId(1), start, end);
    contract.state = ContractState::Active;
    contract.amount = Decimal::from(500);
    contract
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    fail: bool,
}

impl RecordingNotifier {
    pub(crate) fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub(crate) fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, notification: Notification) -> Result<(), NotificationError> {
        if self.fail {
            return Err(NotificationError::Transport("smtp relay offline".to_string()));
        }
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(notification);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct JsonRenderer {
    fail: bool,
}

impl JsonRenderer {
    pub(crate) fn failing() -> Self {
        Self { fail: true }
    }
}

impl DocumentRenderer for JsonRenderer {
    fn render(
        &self,
        entity: EntityRef,
        payload: &serde_json::Value,
    ) -> Result<RenderedDocument, RenderError> {
        if self.fail {
            return Err(RenderError::Failed {
                entity,
                reason: "template missing".to_string(),
            });
        }
        Ok(RenderedDocument {
            filename: format!("{}.json", entity.to_string().replace('/', "-")),
            content_type: "application/json".to_string(),
            bytes: payload.to_string().into_bytes(),
        })
    }
}

/// In-memory store plus recording collaborators, with one constructor per
/// service under test.
pub(crate) struct Fixture {
    pub(crate) store: Arc<InMemoryStore>,
    pub(crate) notifier: Arc<RecordingNotifier>,
    pub(crate) renderer: Arc<JsonRenderer>,
    pub(crate) config: AppConfig,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        Self::with(RecordingNotifier::default(), JsonRenderer::default())
    }

    pub(crate) fn with(notifier: RecordingNotifier, renderer: JsonRenderer) -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            notifier: Arc::new(notifier),
            renderer: Arc::new(renderer),
            config: config(),
        }
    }

    pub(crate) fn assets(&self) -> AssetService<InMemoryStore> {
        AssetService::new(Arc::clone(&self.store), self.config.billing.clone())
    }

    pub(crate) fn interventions(&self) -> InterventionService<InMemoryStore> {
        InterventionService::new(Arc::clone(&self.store), self.config.billing.clone())
    }

    pub(crate) fn licenses(&self) -> LicenseService<InMemoryStore> {
        LicenseService::new(Arc::clone(&self.store))
    }

    pub(crate) fn alerts(&self) -> AlertService<InMemoryStore, RecordingNotifier> {
        AlertService::new(Arc::clone(&self.store), Arc::clone(&self.notifier))
    }

    pub(crate) fn sweeper(&self) -> AlertSweeper<InMemoryStore> {
        AlertSweeper::new(Arc::clone(&self.store), self.config.alerts)
    }

    pub(crate) fn invoices(&self) -> InvoiceAssembler<InMemoryStore, JsonRenderer, RecordingNotifier> {
        InvoiceAssembler::new(
            Arc::clone(&self.store),
            Arc::clone(&self.renderer),
            Arc::clone(&self.notifier),
            self.config.billing.clone(),
        )
    }

    pub(crate) fn runner(&self) -> SweepRunner<InMemoryStore, JsonRenderer, RecordingNotifier> {
        SweepRunner::new(
            Arc::clone(&self.store),
            Arc::clone(&self.renderer),
            Arc::clone(&self.notifier),
            &self.config,
        )
    }

    pub(crate) fn insert_asset(&self, asset: Asset) -> Asset {
        self.store.assets().create(asset).expect("asset stored")
    }

    pub(crate) fn insert_license(&self, license: License) -> License {
        self.store.licenses().create(license).expect("license stored")
    }

    pub(crate) fn insert_contract(&self, contract: Contract) -> Contract {
        self.store.contracts().create(contract).expect("contract stored")
    }

    pub(crate) fn insert_intervention(&self, intervention: Intervention) -> Intervention {
        self.store
            .interventions()
            .create(intervention)
            .expect("intervention stored")
    }

    pub(crate) fn open_alerts(&self) -> Vec<Alert> {
        self.store
            .alerts()
            .find(&Query::filter(|alert: &Alert| alert.is_open()))
            .expect("alerts readable")
    }
}

type FaultRule<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;

/// One table of a [`FaultyStore`]. Reads always reach the wrapped store;
/// writes matching a rule are rejected as if the backend were down.
pub(crate) struct FaultyTable<E: Record> {
    inner: Arc<InMemoryStore>,
    table: fn(&InMemoryStore) -> &dyn Repository<E>,
    create_rule: Mutex<Option<FaultRule<E>>>,
    update_rule: Mutex<Option<FaultRule<E>>>,
}

impl<E: Record> FaultyTable<E> {
    fn new(inner: &Arc<InMemoryStore>, table: fn(&InMemoryStore) -> &dyn Repository<E>) -> Self {
        Self {
            inner: Arc::clone(inner),
            table,
            create_rule: Mutex::new(None),
            update_rule: Mutex::new(None),
        }
    }

    pub(crate) fn fail_creates_when(&self, rule: impl Fn(&E) -> bool + Send + Sync + 'static) {
        *self.create_rule.lock().expect("rule mutex poisoned") = Some(Box::new(rule));
    }

    pub(crate) fn fail_updates_when(&self, rule: impl Fn(&E) -> bool + Send + Sync + 'static) {
        *self.update_rule.lock().expect("rule mutex poisoned") = Some(Box::new(rule));
    }

    fn repo(&self) -> &dyn Repository<E> {
        (self.table)(&self.inner)
    }

    fn check(rule: &Mutex<Option<FaultRule<E>>>, record: &E) -> Result<(), StoreError> {
        let rule = rule.lock().expect("rule mutex poisoned");
        if rule.as_ref().is_some_and(|rule| rule(record)) {
            return Err(StoreError::Unavailable(format!("{} write rejected", E::KIND)));
        }
        Ok(())
    }
}

impl<E: Record> Repository<E> for FaultyTable<E> {
    fn find(&self, query: &Query<E>) -> Result<Vec<E>, StoreError> {
        self.repo().find(query)
    }

    fn count(&self, query: &Query<E>) -> Result<usize, StoreError> {
        self.repo().count(query)
    }

    fn get(&self, id: E::Id) -> Result<Option<E>, StoreError> {
        self.repo().get(id)
    }

    fn create(&self, record: E) -> Result<E, StoreError> {
        Self::check(&self.create_rule, &record)?;
        self.repo().create(record)
    }

    fn update(&self, record: &E) -> Result<(), StoreError> {
        Self::check(&self.update_rule, record)?;
        self.repo().update(record)
    }

    fn delete(&self, id: E::Id) -> Result<(), StoreError> {
        self.repo().delete(id)
    }
}

/// In-memory store whose asset, alert, invoice and ticket writes can be made
/// to fail for chosen records. `inner` gives tests direct access for setup
/// and assertions.
pub(crate) struct FaultyStore {
    pub(crate) inner: Arc<InMemoryStore>,
    pub(crate) assets: FaultyTable<Asset>,
    pub(crate) alerts: FaultyTable<Alert>,
    pub(crate) invoices: FaultyTable<Invoice>,
    pub(crate) tickets: FaultyTable<Ticket>,
}

impl FaultyStore {
    pub(crate) fn shared() -> Arc<Self> {
        let inner = Arc::new(InMemoryStore::new());
        Arc::new(Self {
            assets: FaultyTable::new(&inner, <InMemoryStore as RecordStore>::assets),
            alerts: FaultyTable::new(&inner, <InMemoryStore as RecordStore>::alerts),
            invoices: FaultyTable::new(&inner, <InMemoryStore as RecordStore>::invoices),
            tickets: FaultyTable::new(&inner, <InMemoryStore as RecordStore>::tickets),
            inner,
        })
    }
}

impl RecordStore for FaultyStore {
    fn assets(&self) -> &dyn Repository<Asset> {
        &self.assets
    }

    fn depreciation_entries(&self) -> &dyn Repository<DepreciationEntry> {
        self.inner.depreciation_entries()
    }

    fn contracts(&self) -> &dyn Repository<Contract> {
        self.inner.contracts()
    }

    fn alerts(&self) -> &dyn Repository<Alert> {
        &self.alerts
    }

    fn licenses(&self) -> &dyn Repository<License> {
        self.inner.licenses()
    }

    fn interventions(&self) -> &dyn Repository<Intervention> {
        self.inner.interventions()
    }

    fn invoices(&self) -> &dyn Repository<Invoice> {
        &self.invoices
    }

    fn tickets(&self) -> &dyn Repository<Ticket> {
        &self.tickets
    }

    fn replace_schedule(
        &self,
        asset: AssetId,
        entries: Vec<DepreciationEntry>,
    ) -> Result<Vec<DepreciationEntry>, StoreError> {
        self.inner.replace_schedule(asset, entries)
    }

    fn claim_intervention(
        &self,
        intervention: InterventionId,
        invoice: InvoiceId,
    ) -> Result<bool, StoreError> {
        self.inner.claim_intervention(intervention, invoice)
    }

    fn release_intervention(
        &self,
        intervention: InterventionId,
        invoice: InvoiceId,
    ) -> Result<(), StoreError> {
        self.inner.release_intervention(intervention, invoice)
    }

    fn advance_invoice_date(
        &self,
        contract: ContractId,
        expected: Option<NaiveDate>,
        next: Option<NaiveDate>,
    ) -> Result<bool, StoreError> {
        self.inner.advance_invoice_date(contract, expected, next)
    }

    fn record_event(&self, event: AuditEvent) -> Result<(), StoreError> {
        self.inner.record_event(event)
    }

    fn history(&self, entity: EntityRef) -> Result<Vec<AuditEvent>, StoreError> {
        self.inner.history(entity)
    }
}
