use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;

use super::audit::{AuditEvent, EntityRef};
use super::{
    AssetId, ContractId, InterventionId, InvoiceId, Query, Record, RecordStore, Repository,
    StoreError,
};
use crate::workflows::alerts::Alert;
use crate::workflows::assets::{Asset, DepreciationEntry};
use crate::workflows::contracts::{Contract, Invoice};
use crate::workflows::interventions::Intervention;
use crate::workflows::licenses::License;
use crate::workflows::tickets::Ticket;

/// One mutex-guarded table. Every write holds the lock for the whole
/// check-then-write so uniqueness constraints cannot race.
pub struct MemoryTable<E: Record> {
    rows: Mutex<BTreeMap<E::Id, E>>,
    sequence: AtomicU64,
}

impl<E: Record> Default for MemoryTable<E> {
    fn default() -> Self {
        Self {
            rows: Mutex::new(BTreeMap::new()),
            sequence: AtomicU64::new(1),
        }
    }
}

impl<E: Record> MemoryTable<E> {
    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<E::Id, E>>, StoreError> {
        self.rows
            .lock()
            .map_err(|_| StoreError::Unavailable(format!("{} table lock poisoned", E::KIND)))
    }

    fn next_id(&self) -> E::Id {
        E::Id::from(self.sequence.fetch_add(1, Ordering::Relaxed))
    }

    fn ensure_unique(rows: &BTreeMap<E::Id, E>, candidate: &E) -> Result<(), StoreError> {
        match rows
            .values()
            .find(|row| row.id() != candidate.id() && candidate.conflicts_with(row))
        {
            Some(existing) => Err(StoreError::Conflict {
                kind: E::KIND,
                detail: format!("{} {} holds the same key", E::KIND, existing.id()),
            }),
            None => Ok(()),
        }
    }

    fn mutate<T>(
        &self,
        id: E::Id,
        change: impl FnOnce(&mut E) -> T,
    ) -> Result<T, StoreError> {
        let mut rows = self.lock()?;
        let row = rows.get_mut(&id).ok_or_else(|| StoreError::NotFound {
            kind: E::KIND,
            id: id.to_string(),
        })?;
        Ok(change(row))
    }
}

impl<E: Record> Repository<E> for MemoryTable<E> {
    fn find(&self, query: &Query<E>) -> Result<Vec<E>, StoreError> {
        let rows = self.lock()?;
        Ok(query.apply(rows.values().cloned()))
    }

    fn count(&self, query: &Query<E>) -> Result<usize, StoreError> {
        let rows = self.lock()?;
        Ok(rows.values().filter(|row| query.matches(row)).count())
    }

    fn get(&self, id: E::Id) -> Result<Option<E>, StoreError> {
        let rows = self.lock()?;
        Ok(rows.get(&id).cloned())
    }

    fn create(&self, mut record: E) -> Result<E, StoreError> {
        let mut rows = self.lock()?;
        record.set_id(self.next_id());
        Self::ensure_unique(&rows, &record)?;
        rows.insert(record.id(), record.clone());
        Ok(record)
    }

    fn update(&self, record: &E) -> Result<(), StoreError> {
        let mut rows = self.lock()?;
        if !rows.contains_key(&record.id()) {
            return Err(StoreError::NotFound {
                kind: E::KIND,
                id: record.id().to_string(),
            });
        }
        Self::ensure_unique(&rows, record)?;
        rows.insert(record.id(), record.clone());
        Ok(())
    }

    fn delete(&self, id: E::Id) -> Result<(), StoreError> {
        let mut rows = self.lock()?;
        rows.remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                kind: E::KIND,
                id: id.to_string(),
            })
    }
}

/// Process-local [`RecordStore`] used by the worker binary and the tests.
#[derive(Default)]
pub struct InMemoryStore {
    assets: MemoryTable<Asset>,
    depreciation_entries: MemoryTable<DepreciationEntry>,
    contracts: MemoryTable<Contract>,
    alerts: MemoryTable<Alert>,
    licenses: MemoryTable<License>,
    interventions: MemoryTable<Intervention>,
    invoices: MemoryTable<Invoice>,
    tickets: MemoryTable<Ticket>,
    events: Mutex<Vec<AuditEvent>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn events(&self) -> Result<MutexGuard<'_, Vec<AuditEvent>>, StoreError> {
        self.events
            .lock()
            .map_err(|_| StoreError::Unavailable("audit log lock poisoned".to_string()))
    }
}

impl RecordStore for InMemoryStore {
    fn assets(&self) -> &dyn Repository<Asset> {
        &self.assets
    }

    fn depreciation_entries(&self) -> &dyn Repository<DepreciationEntry> {
        &self.depreciation_entries
    }

    fn contracts(&self) -> &dyn Repository<Contract> {
        &self.contracts
    }

    fn alerts(&self) -> &dyn Repository<Alert> {
        &self.alerts
    }

    fn licenses(&self) -> &dyn Repository<License> {
        &self.licenses
    }

    fn interventions(&self) -> &dyn Repository<Intervention> {
        &self.interventions
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
        let table = &self.depreciation_entries;
        let mut rows = table.lock()?;
        rows.retain(|_, entry| entry.asset_id != asset);

        let mut stored = Vec::with_capacity(entries.len());
        for mut entry in entries {
            entry.asset_id = asset;
            entry.set_id(table.next_id());
            rows.insert(entry.id(), entry.clone());
            stored.push(entry);
        }
        Ok(stored)
    }

    fn claim_intervention(
        &self,
        intervention: InterventionId,
        invoice: InvoiceId,
    ) -> Result<bool, StoreError> {
        self.interventions.mutate(intervention, |row| {
            if row.invoiced {
                false
            } else {
                row.invoiced = true;
                row.invoice_id = Some(invoice);
                true
            }
        })
    }

    fn release_intervention(
        &self,
        intervention: InterventionId,
        invoice: InvoiceId,
    ) -> Result<(), StoreError> {
        self.interventions.mutate(intervention, |row| {
            if row.invoice_id == Some(invoice) {
                row.invoiced = false;
                row.invoice_id = None;
            }
        })
    }

    fn advance_invoice_date(
        &self,
        contract: ContractId,
        expected: Option<NaiveDate>,
        next: Option<NaiveDate>,
    ) -> Result<bool, StoreError> {
        self.contracts.mutate(contract, |row| {
            if row.next_invoice_date == expected {
                row.next_invoice_date = next;
                true
            } else {
                false
            }
        })
    }

    fn record_event(&self, event: AuditEvent) -> Result<(), StoreError> {
        self.events()?.push(event);
        Ok(())
    }

    fn history(&self, entity: EntityRef) -> Result<Vec<AuditEvent>, StoreError> {
        Ok(self
            .events()?
            .iter()
            .filter(|event| event.entity == entity)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CustomerId, DepreciationEntryId};
    use crate::workflows::alerts::{AlertPriority, AlertState, AlertSubject, AlertType};
    use crate::workflows::assets::AssetType;
    use crate::workflows::interventions::InterventionKind;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn warranty_alert(asset: AssetId) -> Alert {
        Alert::new(
            AlertType::Warranty,
            AlertSubject::Asset(asset),
            "Warranty ends",
            date(2024, 6, 10),
            AlertPriority::Important,
        )
    }

    #[test]
    fn ids_are_assigned_on_create() {
        let store = InMemoryStore::new();
        let first = store
            .assets()
            .create(Asset::new("A", AssetType::Computer))
            .expect("created");
        let second = store
            .assets()
            .create(Asset::new("B", AssetType::Printer))
            .expect("created");

        assert_eq!(first.id, AssetId(1));
        assert_eq!(second.id, AssetId(2));
        assert_eq!(store.assets().count(&Query::all()).expect("count"), 2);
    }

    #[test]
    fn query_orders_then_pages() {
        let store = InMemoryStore::new();
        for name in ["delta", "alpha", "charlie", "bravo"] {
            store
                .assets()
                .create(Asset::new(name, AssetType::Other))
                .expect("created");
        }

        let query = Query::filter(|asset: &Asset| asset.name != "delta")
            .order_by(|a, b| a.name.cmp(&b.name))
            .offset(1)
            .limit(1);
        let page = store.assets().find(&query).expect("page");

        assert_eq!(page.len(), 1);
        assert_eq!(page[0].name, "bravo");
    }

    #[test]
    fn open_alert_uniqueness_is_enforced_on_create_and_update() {
        let store = InMemoryStore::new();
        let first = store
            .alerts()
            .create(warranty_alert(AssetId(1)))
            .expect("created");

        assert!(matches!(
            store.alerts().create(warranty_alert(AssetId(1))),
            Err(StoreError::Conflict { .. })
        ));
        store
            .alerts()
            .create(warranty_alert(AssetId(2)))
            .expect("other subject");

        let mut closed = first.clone();
        closed.state = AlertState::Done;
        store.alerts().update(&closed).expect("closed");
        let reopened_slot = store
            .alerts()
            .create(warranty_alert(AssetId(1)))
            .expect("slot free again");

        closed.state = AlertState::New;
        assert!(matches!(
            store.alerts().update(&closed),
            Err(StoreError::Conflict { .. })
        ));
        assert_ne!(reopened_slot.id, first.id);
    }

    #[test]
    fn replace_schedule_swaps_only_the_target_asset() {
        let store = InMemoryStore::new();
        let entry = |asset: AssetId, sequence: u32| DepreciationEntry {
            id: DepreciationEntryId(0),
            asset_id: asset,
            sequence,
            label: format!("Depreciation {sequence}/2"),
            date: date(2024, sequence, 1),
            amount: Default::default(),
            depreciated_value: Default::default(),
            remaining_value: Default::default(),
        };

        store
            .replace_schedule(AssetId(1), vec![entry(AssetId(1), 1), entry(AssetId(1), 2)])
            .expect("stored");
        store
            .replace_schedule(AssetId(2), vec![entry(AssetId(2), 1)])
            .expect("stored");
        store
            .replace_schedule(AssetId(1), vec![entry(AssetId(1), 1)])
            .expect("replaced");

        let count = |asset: AssetId| {
            store
                .depreciation_entries()
                .count(&Query::filter(move |row: &DepreciationEntry| row.asset_id == asset))
                .expect("count")
        };
        assert_eq!(count(AssetId(1)), 1);
        assert_eq!(count(AssetId(2)), 1);
    }

    #[test]
    fn interventions_are_claimed_once_and_released_by_their_invoice() {
        let store = InMemoryStore::new();
        let start = date(2024, 3, 1).and_hms_opt(9, 0, 0).expect("valid time");
        let end = date(2024, 3, 1).and_hms_opt(10, 0, 0).expect("valid time");
        let visit = store
            .interventions()
            .create(Intervention::new("INT-1", InterventionKind::Corrective, start, end))
            .expect("created");

        assert!(store.claim_intervention(visit.id, InvoiceId(1)).expect("claim"));
        assert!(!store.claim_intervention(visit.id, InvoiceId(2)).expect("claim"));

        store
            .release_intervention(visit.id, InvoiceId(2))
            .expect("foreign release is ignored");
        assert!(store.interventions().require(visit.id).expect("row").invoiced);

        store
            .release_intervention(visit.id, InvoiceId(1))
            .expect("released");
        let row = store.interventions().require(visit.id).expect("row");
        assert!(!row.invoiced);
        assert_eq!(row.invoice_id, None);
    }

    #[test]
    fn invoice_date_advance_is_compare_and_set() {
        let store = InMemoryStore::new();
        let mut contract = Contract::new("C-1", CustomerId(1), date(2024, 1, 1), date(2024, 12, 31));
        contract.next_invoice_date = Some(date(2024, 1, 1));
        let contract = store.contracts().create(contract).expect("created");

        assert!(store
            .advance_invoice_date(contract.id, Some(date(2024, 1, 1)), Some(date(2024, 2, 1)))
            .expect("advance"));
        assert!(!store
            .advance_invoice_date(contract.id, Some(date(2024, 1, 1)), Some(date(2024, 2, 1)))
            .expect("stale advance"));
        assert!(store
            .advance_invoice_date(contract.id, Some(date(2024, 2, 1)), None)
            .expect("rollback"));
        assert_eq!(
            store
                .contracts()
                .require(contract.id)
                .expect("row")
                .next_invoice_date,
            None
        );
        assert!(matches!(
            store.advance_invoice_date(ContractId(99), None, None),
            Err(StoreError::NotFound { .. })
        ));
    }
}
