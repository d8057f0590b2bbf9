use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use super::domain::{Contract, Invoice, InvoiceLine, InvoiceLineKind};
use crate::config::BillingConfig;
use crate::outbound::{DocumentRenderer, Notification, Notifier};
use crate::store::{
    AuditEvent, ContractId, EntityRef, InterventionId, InvoiceId, Query, RecordStore, StoreError,
};
use crate::workflows::interventions::Intervention;
use crate::workflows::{ConfigurationError, SweepReport, ValidationError, WorkflowError};

pub const INVOICE_TEMPLATE: &str = "contract_invoice";

/// Invoice lines for one billing period, in billing order: base fee, extra
/// services, out-of-scope work, fixed discount.
pub fn invoice_lines(
    contract: &Contract,
    out_of_scope: &[Intervention],
    default_hourly_rate: Decimal,
) -> Vec<InvoiceLine> {
    let mut lines = Vec::with_capacity(2 + contract.extra_services.len() + out_of_scope.len());

    let mut base = InvoiceLine::new(
        InvoiceLineKind::Base,
        format!(
            "IT maintenance - {} ({})",
            contract.reference,
            contract.billing_frequency.label()
        ),
        Decimal::ONE,
        contract.base_amount(),
    );
    if contract.discount_rate > Decimal::ZERO {
        base.discount_percent = contract.discount_rate;
    }
    lines.push(base);

    lines.extend(contract.extra_services.iter().map(|service| {
        InvoiceLine::new(
            InvoiceLineKind::ExtraService,
            service.label.clone(),
            service.quantity,
            service.unit_price,
        )
    }));

    lines.extend(out_of_scope.iter().map(|intervention| {
        InvoiceLine::new(
            InvoiceLineKind::Intervention(intervention.id),
            format!(
                "Intervention {} on {}",
                intervention.reference,
                intervention.date_start.format("%Y-%m-%d %H:%M")
            ),
            intervention.duration_hours(),
            intervention.rate_or(default_hourly_rate),
        )
    }));

    if contract.discount_amount > Decimal::ZERO {
        lines.push(InvoiceLine::new(
            InvoiceLineKind::Discount,
            "Contractual discount",
            Decimal::ONE,
            -contract.discount_amount,
        ));
    }

    lines
}

/// Turns active contracts into invoices and advances their billing dates.
///
/// Each invoice first claims its billing period with a compare-and-set on
/// the contract's next invoice date, then claims every out-of-scope
/// intervention individually. Two overlapping runs therefore never bill the
/// same period or the same intervention twice.
pub struct InvoiceAssembler<S, R, N> {
    store: Arc<S>,
    renderer: Arc<R>,
    notifier: Arc<N>,
    billing: BillingConfig,
}

impl<S, R, N> InvoiceAssembler<S, R, N>
where
    S: RecordStore + 'static,
    R: DocumentRenderer + 'static,
    N: Notifier + 'static,
{
    pub fn new(store: Arc<S>, renderer: Arc<R>, notifier: Arc<N>, billing: BillingConfig) -> Self {
        Self {
            store,
            renderer,
            notifier,
            billing,
        }
    }

    /// Manual invoicing, allowed for active contracts only.
    pub fn invoice_now(&self, id: ContractId, at: NaiveDateTime) -> Result<Invoice, WorkflowError> {
        let contract = self.store.contracts().require(id)?;
        if !contract.is_active() {
            return Err(ConfigurationError::InactiveContract(id).into());
        }
        self.assemble(&contract, at)
    }

    /// Invoices every active contract whose next invoice date is due.
    pub fn sweep(&self, at: NaiveDateTime) -> Result<SweepReport, StoreError> {
        let today = at.date();
        let due = self
            .store
            .contracts()
            .find(&Query::filter(move |contract: &Contract| contract.is_due(today)))?;

        let mut report = SweepReport::default();
        for contract in due {
            match self.assemble(&contract, at) {
                Ok(_) => report.created += 1,
                Err(WorkflowError::Store(StoreError::Conflict { .. })) => {
                    tracing::debug!(contract = %contract.id, "billing period already claimed");
                    report.skipped += 1;
                }
                Err(error) => report.fail(EntityRef::Contract(contract.id), error),
            }
        }
        tracing::info!(
            invoices = report.created,
            skipped = report.skipped,
            failures = report.failures.len(),
            "invoice sweep finished"
        );
        Ok(report)
    }

    /// Billable work for the contract's customer that has not been invoiced.
    pub fn billable_interventions(&self, id: ContractId) -> Result<Vec<Intervention>, WorkflowError> {
        let contract = self.store.contracts().require(id)?;
        let customer = contract.customer;
        let query = Query::filter(move |intervention: &Intervention| {
            intervention.billable
                && !intervention.invoiced
                && intervention.customer == Some(customer)
        })
        .order_by(|a, b| a.date_start.cmp(&b.date_start));
        Ok(self.store.interventions().find(&query)?)
    }

    /// Replaces the contract's out-of-scope selection with every billable,
    /// uninvoiced intervention of its customer.
    pub fn select_billable_interventions(
        &self,
        id: ContractId,
    ) -> Result<Vec<InterventionId>, WorkflowError> {
        let selection: Vec<InterventionId> = self
            .billable_interventions(id)?
            .into_iter()
            .map(|intervention| intervention.id)
            .collect();
        let mut contract = self.store.contracts().require(id)?;
        contract.out_of_scope = selection.clone();
        self.store.contracts().update(&contract)?;
        Ok(selection)
    }

    fn assemble(&self, contract: &Contract, at: NaiveDateTime) -> Result<Invoice, WorkflowError> {
        let previous = contract.next_invoice_date;
        let period_start = previous.unwrap_or(contract.start_date);
        let next = contract
            .billing_frequency
            .advance(period_start)
            .ok_or(ValidationError::DateOutOfRange(period_start))?;

        if !self
            .store
            .advance_invoice_date(contract.id, previous, Some(next))?
        {
            return Err(StoreError::Conflict {
                kind: "contract",
                detail: format!("billing period {period_start} already invoiced"),
            }
            .into());
        }

        let header = Invoice {
            id: InvoiceId(0),
            contract: contract.id,
            customer: contract.customer,
            date: at.date(),
            origin: contract.reference.clone(),
            narration: contract.special_conditions.clone().unwrap_or_default(),
            lines: Vec::new(),
        };
        let mut invoice = match self.store.invoices().create(header) {
            Ok(invoice) => invoice,
            Err(error) => {
                self.restore_period(contract.id, next, previous);
                return Err(error.into());
            }
        };

        let mut claimed = Vec::new();
        if let Err(error) = self.fill_invoice(contract, &mut invoice, &mut claimed) {
            self.abandon(&invoice, &claimed);
            self.restore_period(contract.id, next, previous);
            return Err(error);
        }

        tracing::info!(
            contract = %contract.id,
            invoice = %invoice.id,
            total = %invoice.total(),
            next_invoice_date = %next,
            "invoice assembled"
        );
        self.record(EntityRef::Contract(contract.id), at, "invoiced", invoice.id.to_string());
        self.record(
            EntityRef::Invoice(invoice.id),
            at,
            "created",
            format!("period {period_start} .. {next}"),
        );

        if contract.auto_send {
            self.send(contract, &invoice);
        }
        Ok(invoice)
    }

    fn fill_invoice(
        &self,
        contract: &Contract,
        invoice: &mut Invoice,
        claimed: &mut Vec<InterventionId>,
    ) -> Result<(), WorkflowError> {
        let mut out_of_scope = Vec::new();
        if contract.bill_out_of_scope {
            for id in &contract.out_of_scope {
                let Some(intervention) = self.store.interventions().get(*id)? else {
                    tracing::warn!(
                        contract = %contract.id,
                        intervention = %id,
                        "selected intervention missing"
                    );
                    continue;
                };
                if !self.store.claim_intervention(*id, invoice.id)? {
                    tracing::debug!(intervention = %id, "intervention already invoiced");
                    continue;
                }
                claimed.push(*id);
                out_of_scope.push(intervention);
            }
        }

        invoice.lines = invoice_lines(contract, &out_of_scope, self.billing.default_hourly_rate);
        self.store.invoices().update(invoice)?;
        Ok(())
    }

    fn abandon(&self, invoice: &Invoice, claimed: &[InterventionId]) {
        for id in claimed {
            if let Err(error) = self.store.release_intervention(*id, invoice.id) {
                tracing::warn!(intervention = %id, %error, "could not release intervention claim");
            }
        }
        if let Err(error) = self.store.invoices().delete(invoice.id) {
            tracing::warn!(invoice = %invoice.id, %error, "could not discard abandoned invoice");
        }
    }

    fn restore_period(&self, id: ContractId, claimed: NaiveDate, previous: Option<NaiveDate>) {
        match self.store.advance_invoice_date(id, Some(claimed), previous) {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(contract = %id, "invoice date moved before it could be restored")
            }
            Err(error) => tracing::warn!(contract = %id, %error, "could not restore invoice date"),
        }
    }

    fn record(&self, entity: EntityRef, at: NaiveDateTime, action: &str, detail: String) {
        if let Err(error) = self
            .store
            .record_event(AuditEvent::new(entity, at, action).detail(detail))
        {
            tracing::warn!(%entity, %error, "audit event dropped");
        }
    }

    /// Renders and mails the invoice. Failures are logged, never surfaced.
    fn send(&self, contract: &Contract, invoice: &Invoice) {
        let entity = EntityRef::Invoice(invoice.id);
        let payload = match serde_json::to_value(invoice) {
            Ok(payload) => payload,
            Err(error) => {
                tracing::warn!(%entity, %error, "invoice payload serialisation failed");
                return;
            }
        };
        let document = match self.renderer.render(entity, &payload) {
            Ok(document) => document,
            Err(error) => {
                tracing::warn!(%entity, %error, "invoice rendering failed; not sent");
                return;
            }
        };

        let notification = Notification::new(INVOICE_TEMPLATE, entity)
            .detail("contract", &contract.reference)
            .detail("customer", contract.customer)
            .detail("total", invoice.total())
            .attach(document);
        if let Err(error) = self.notifier.send(notification) {
            tracing::warn!(%entity, %error, "invoice notification failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AssetId, CustomerId};
    use crate::workflows::contracts::ExtraService;
    use crate::workflows::interventions::InterventionKind;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn lines_follow_billing_order() {
        let mut contract = Contract::new("C-7", CustomerId(2), date(2024, 1, 1), date(2024, 12, 31));
        contract.price_per_asset = Decimal::from(25);
        contract.assets = vec![AssetId(1), AssetId(2)];
        contract.discount_rate = Decimal::from(10);
        contract.discount_amount = Decimal::from(15);
        contract.extra_services.push(ExtraService {
            label: "Backup monitoring".to_string(),
            quantity: Decimal::from(2),
            unit_price: Decimal::from(12),
        });

        let start = date(2024, 2, 3).and_hms_opt(9, 0, 0).expect("valid time");
        let end = date(2024, 2, 3).and_hms_opt(10, 30, 0).expect("valid time");
        let mut visit = Intervention::new("INT-9", InterventionKind::Corrective, start, end);
        visit.id = InterventionId(9);

        let lines = invoice_lines(&contract, &[visit], Decimal::from(80));
        let kinds: Vec<InvoiceLineKind> = lines.iter().map(|line| line.kind).collect();
        assert_eq!(
            kinds,
            vec![
                InvoiceLineKind::Base,
                InvoiceLineKind::ExtraService,
                InvoiceLineKind::Intervention(InterventionId(9)),
                InvoiceLineKind::Discount,
            ]
        );

        assert_eq!(lines[0].subtotal(), Decimal::from(45));
        assert_eq!(lines[1].subtotal(), Decimal::from(24));
        assert_eq!(lines[2].quantity, Decimal::new(150, 2));
        assert_eq!(lines[2].subtotal(), Decimal::from(120));
        assert_eq!(lines[3].subtotal(), Decimal::from(-15));
    }

    #[test]
    fn flat_amount_without_discounts_is_a_single_line() {
        let mut contract = Contract::new("C-8", CustomerId(2), date(2024, 1, 1), date(2024, 12, 31));
        contract.amount = Decimal::from(300);
        let lines = invoice_lines(&contract, &[], Decimal::from(75));

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].discount_percent, Decimal::ZERO);
        assert_eq!(lines[0].subtotal(), Decimal::from(300));
    }
}
