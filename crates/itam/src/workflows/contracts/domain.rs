use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::store::{AssetId, ContractId, CustomerId, InterventionId, InvoiceId, Record};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractState {
    #[default]
    Draft,
    Active,
    Expired,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingFrequency {
    #[default]
    Monthly,
    Quarterly,
    SemiAnnual,
    Annual,
}

impl BillingFrequency {
    pub const fn months(self) -> u32 {
        match self {
            Self::Monthly => 1,
            Self::Quarterly => 3,
            Self::SemiAnnual => 6,
            Self::Annual => 12,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Monthly => "Monthly",
            Self::Quarterly => "Quarterly",
            Self::SemiAnnual => "Semi-annual",
            Self::Annual => "Annual",
        }
    }

    /// `date` moved forward by exactly one billing period, clamped to the
    /// end of shorter months.
    pub fn advance(self, date: NaiveDate) -> Option<NaiveDate> {
        date.checked_add_months(Months::new(self.months()))
    }
}

/// Additional service billed on every invoice of the contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraService {
    pub label: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    pub reference: String,
    pub customer: CustomerId,
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub state: ContractState,
    pub assets: Vec<AssetId>,
    /// Flat fee per billing period.
    pub amount: Decimal,
    pub billing_frequency: BillingFrequency,
    pub next_invoice_date: Option<NaiveDate>,
    /// Percentage discount applied to the base line.
    pub discount_rate: Decimal,
    /// Fixed discount billed as a negative line.
    pub discount_amount: Decimal,
    /// When positive and assets are covered, replaces the flat fee.
    pub price_per_asset: Decimal,
    pub auto_send: bool,
    pub special_conditions: Option<String>,
    pub bill_out_of_scope: bool,
    pub out_of_scope: Vec<InterventionId>,
    pub extra_services: Vec<ExtraService>,
}

impl Contract {
    pub fn new(
        reference: impl Into<String>,
        customer: CustomerId,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            id: ContractId(0),
            reference: reference.into(),
            customer,
            description: String::new(),
            start_date,
            end_date,
            state: ContractState::Draft,
            assets: Vec::new(),
            amount: Decimal::ZERO,
            billing_frequency: BillingFrequency::Monthly,
            next_invoice_date: None,
            discount_rate: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
            price_per_asset: Decimal::ZERO,
            auto_send: true,
            special_conditions: None,
            bill_out_of_scope: false,
            out_of_scope: Vec::new(),
            extra_services: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == ContractState::Active
    }

    /// Invoice is due on or before `today`. Contracts that were never
    /// scheduled are not due.
    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.is_active() && self.next_invoice_date.is_some_and(|date| date <= today)
    }

    /// Fee for one billing period before discounts.
    pub fn base_amount(&self) -> Decimal {
        if self.price_per_asset > Decimal::ZERO && !self.assets.is_empty() {
            self.price_per_asset * Decimal::from(self.assets.len())
        } else {
            self.amount
        }
    }
}

impl Record for Contract {
    type Id = ContractId;

    const KIND: &'static str = "contract";

    fn id(&self) -> ContractId {
        self.id
    }

    fn set_id(&mut self, id: ContractId) {
        self.id = id;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "intervention", rename_all = "snake_case")]
pub enum InvoiceLineKind {
    Base,
    ExtraService,
    Intervention(InterventionId),
    Discount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub kind: InvoiceLineKind,
    pub label: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Line-level percentage discount.
    pub discount_percent: Decimal,
}

impl InvoiceLine {
    pub fn new(
        kind: InvoiceLineKind,
        label: impl Into<String>,
        quantity: Decimal,
        unit_price: Decimal,
    ) -> Self {
        Self {
            kind,
            label: label.into(),
            quantity,
            unit_price,
            discount_percent: Decimal::ZERO,
        }
    }

    pub fn subtotal(&self) -> Decimal {
        let gross = self.quantity * self.unit_price;
        let factor = Decimal::ONE - self.discount_percent / Decimal::ONE_HUNDRED;
        (gross * factor).round_dp(2)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub contract: ContractId,
    pub customer: CustomerId,
    pub date: NaiveDate,
    pub origin: String,
    pub narration: String,
    pub lines: Vec<InvoiceLine>,
}

impl Invoice {
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(InvoiceLine::subtotal).sum()
    }
}

impl Record for Invoice {
    type Id = InvoiceId;

    const KIND: &'static str = "invoice";

    fn id(&self) -> InvoiceId {
        self.id
    }

    fn set_id(&mut self, id: InvoiceId) {
        self.id = id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn frequencies_advance_by_one_period() {
        let start = date(2024, 1, 1);
        assert_eq!(BillingFrequency::Monthly.advance(start), Some(date(2024, 2, 1)));
        assert_eq!(BillingFrequency::Quarterly.advance(start), Some(date(2024, 4, 1)));
        assert_eq!(BillingFrequency::SemiAnnual.advance(start), Some(date(2024, 7, 1)));
        assert_eq!(BillingFrequency::Annual.advance(start), Some(date(2025, 1, 1)));
        assert_eq!(
            BillingFrequency::Monthly.advance(date(2024, 1, 31)),
            Some(date(2024, 2, 29))
        );
    }

    #[test]
    fn price_per_asset_replaces_flat_amount_only_with_assets() {
        let mut contract = Contract::new("C-1", CustomerId(1), date(2024, 1, 1), date(2024, 12, 31));
        contract.amount = Decimal::from(500);
        contract.price_per_asset = Decimal::from(40);
        assert_eq!(contract.base_amount(), Decimal::from(500));

        contract.assets = vec![AssetId(1), AssetId(2), AssetId(3)];
        assert_eq!(contract.base_amount(), Decimal::from(120));
    }

    #[test]
    fn line_discount_is_a_percentage() {
        let mut line = InvoiceLine::new(InvoiceLineKind::Base, "Base", Decimal::ONE, Decimal::from(200));
        line.discount_percent = Decimal::from(10);
        assert_eq!(line.subtotal(), Decimal::from(180));
    }
}
