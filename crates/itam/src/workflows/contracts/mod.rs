//! Maintenance contracts and their periodic invoices.

pub mod domain;
pub mod invoicing;

pub use domain::{
    BillingFrequency, Contract, ContractState, ExtraService, Invoice, InvoiceLine, InvoiceLineKind,
};
pub use invoicing::{invoice_lines, InvoiceAssembler, INVOICE_TEMPLATE};
