//! Record store collaborator.
//!
//! The engine never owns persistence. Every workflow talks to a
//! [`RecordStore`], which hands out one [`Repository`] per record type plus a
//! handful of operations that must be atomic with respect to concurrent
//! sweeps (schedule swaps, intervention claims, invoice date advances).

pub mod audit;
pub mod memory;

use std::cmp::Ordering;
use std::fmt;
use std::hash::Hash;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::workflows::alerts::Alert;
use crate::workflows::assets::{Asset, DepreciationEntry};
use crate::workflows::contracts::{Contract, Invoice};
use crate::workflows::interventions::Intervention;
use crate::workflows::licenses::License;
use crate::workflows::tickets::Ticket;

pub use audit::{AuditEvent, EntityRef};

macro_rules! record_id {
    ($($name:ident),* $(,)?) => {
        $(
            #[derive(
                Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
            )]
            #[serde(transparent)]
            pub struct $name(pub u64);

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl From<u64> for $name {
                fn from(value: u64) -> Self {
                    Self(value)
                }
            }
        )*
    };
}

record_id!(
    AssetId,
    DepreciationEntryId,
    ContractId,
    AlertId,
    LicenseId,
    InterventionId,
    InvoiceId,
    TicketId,
    CustomerId,
    UserId,
);

/// A persistable record. Ids are assigned by the store on creation; records
/// built in memory carry a zero id until then.
pub trait Record: Clone + fmt::Debug + Send + Sync + 'static {
    type Id: Copy + Eq + Hash + Ord + fmt::Display + fmt::Debug + From<u64> + Send + Sync;

    const KIND: &'static str;

    fn id(&self) -> Self::Id;

    fn set_id(&mut self, id: Self::Id);

    /// Uniqueness constraint between two rows of the same table. Stores must
    /// reject a create or update that would make this return `true` against
    /// any other stored row.
    fn conflicts_with(&self, _other: &Self) -> bool {
        false
    }
}

type Predicate<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;
type Comparator<E> = Box<dyn Fn(&E, &E) -> Ordering + Send + Sync>;

/// Filter, order and pagination over one record type.
pub struct Query<E> {
    filter: Option<Predicate<E>>,
    order: Option<Comparator<E>>,
    limit: Option<usize>,
    offset: usize,
}

impl<E> Default for Query<E> {
    fn default() -> Self {
        Self {
            filter: None,
            order: None,
            limit: None,
            offset: 0,
        }
    }
}

impl<E> Query<E> {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn filter(predicate: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        Self {
            filter: Some(Box::new(predicate)),
            ..Self::default()
        }
    }

    pub fn order_by(mut self, compare: impl Fn(&E, &E) -> Ordering + Send + Sync + 'static) -> Self {
        self.order = Some(Box::new(compare));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn matches(&self, record: &E) -> bool {
        self.filter.as_ref().map_or(true, |predicate| predicate(record))
    }

    /// Applies filter, order, offset and limit to rows already in natural
    /// (id) order.
    pub fn apply<I>(&self, rows: I) -> Vec<E>
    where
        I: IntoIterator<Item = E>,
    {
        let mut selected: Vec<E> = rows.into_iter().filter(|row| self.matches(row)).collect();
        if let Some(compare) = &self.order {
            selected.sort_by(|a, b| compare(a, b));
        }
        let selected = selected.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => selected.take(limit).collect(),
            None => selected.collect(),
        }
    }
}

impl<E> fmt::Debug for Query<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("filtered", &self.filter.is_some())
            .field("ordered", &self.order.is_some())
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .finish()
    }
}

/// CRUD access to one record type.
pub trait Repository<E: Record>: Send + Sync {
    fn find(&self, query: &Query<E>) -> Result<Vec<E>, StoreError>;
    fn count(&self, query: &Query<E>) -> Result<usize, StoreError>;
    fn get(&self, id: E::Id) -> Result<Option<E>, StoreError>;
    fn create(&self, record: E) -> Result<E, StoreError>;
    fn update(&self, record: &E) -> Result<(), StoreError>;
    fn delete(&self, id: E::Id) -> Result<(), StoreError>;

    fn require(&self, id: E::Id) -> Result<E, StoreError> {
        self.get(id)?.ok_or_else(|| StoreError::NotFound {
            kind: E::KIND,
            id: id.to_string(),
        })
    }

    fn find_one(&self, query: Query<E>) -> Result<Option<E>, StoreError> {
        Ok(self.find(&query.limit(1))?.into_iter().next())
    }
}

/// Storage abstraction so every workflow can be exercised in isolation.
///
/// Implementations provide per-write atomicity only; a sweep spanning many
/// records is never a single transaction.
pub trait RecordStore: Send + Sync {
    fn assets(&self) -> &dyn Repository<Asset>;
    fn depreciation_entries(&self) -> &dyn Repository<DepreciationEntry>;
    fn contracts(&self) -> &dyn Repository<Contract>;
    fn alerts(&self) -> &dyn Repository<Alert>;
    fn licenses(&self) -> &dyn Repository<License>;
    fn interventions(&self) -> &dyn Repository<Intervention>;
    fn invoices(&self) -> &dyn Repository<Invoice>;
    fn tickets(&self) -> &dyn Repository<Ticket>;

    /// Discards every entry of `asset` and stores `entries` in one step.
    fn replace_schedule(
        &self,
        asset: AssetId,
        entries: Vec<DepreciationEntry>,
    ) -> Result<Vec<DepreciationEntry>, StoreError>;

    /// Marks a billable intervention as invoiced on `invoice`. Returns
    /// `false` when it was already invoiced.
    fn claim_intervention(
        &self,
        intervention: InterventionId,
        invoice: InvoiceId,
    ) -> Result<bool, StoreError>;

    /// Releases a claim taken by [`RecordStore::claim_intervention`] when the
    /// invoice it was claimed for is abandoned.
    fn release_intervention(
        &self,
        intervention: InterventionId,
        invoice: InvoiceId,
    ) -> Result<(), StoreError>;

    /// Compare-and-set on a contract's next invoice date. Returns `false`
    /// when the stored date no longer equals `expected`. Assembly claims a
    /// billing period with it and puts the old date back if the invoice is
    /// abandoned.
    fn advance_invoice_date(
        &self,
        contract: ContractId,
        expected: Option<NaiveDate>,
        next: Option<NaiveDate>,
    ) -> Result<bool, StoreError>;

    fn record_event(&self, event: AuditEvent) -> Result<(), StoreError>;

    fn history(&self, entity: EntityRef) -> Result<Vec<AuditEvent>, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} conflicts with an existing record: {detail}")]
    Conflict { kind: &'static str, detail: String },
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
