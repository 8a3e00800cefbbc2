//! Invoice Reconciliation: effective status derived at read time.
//!
//! Payments are recorded through the ledger independently of the invoice row, so
//! the stored status is only a default. Every read recomputes the status from the
//! total, the payments and the due date.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use tamirhane_core::{InvoiceId, Money};

use crate::invoice::{Invoice, InvoiceNumber, InvoiceStatus, Payment};

/// Rules, in priority order:
/// 1. stored `void` stays `void`;
/// 2. balance at or below zero (at currency precision) is `paid`;
/// 3. a due date strictly before `today` with balance left is `overdue`;
/// 4. otherwise `open`.
pub fn effective_status(invoice: &Invoice, payments: &[Payment], today: NaiveDate) -> InvoiceStatus {
    if invoice.status == InvoiceStatus::Void {
        return InvoiceStatus::Void;
    }

    let paid: Money = payments.iter().map(|p| p.amount.money()).sum();
    let balance = invoice.total.money() - paid;
    if balance.is_settled() {
        return InvoiceStatus::Paid;
    }

    match invoice.due_date {
        Some(due) if due < today => InvoiceStatus::Overdue,
        _ => InvoiceStatus::Open,
    }
}

/// Read model: an invoice with its derived balance and status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceView {
    pub invoice_id: InvoiceId,
    pub number: InvoiceNumber,
    pub total: Money,
    pub paid: Money,
    pub balance: Money,
    pub due_date: Option<NaiveDate>,
    pub stored_status: InvoiceStatus,
    pub status: InvoiceStatus,
}

impl InvoiceView {
    pub fn of(invoice: &Invoice, today: NaiveDate) -> Self {
        let paid = invoice.total_paid();
        Self {
            invoice_id: invoice.id,
            number: invoice.number,
            total: invoice.total.money(),
            paid,
            balance: (invoice.total.money() - paid).round_to_currency(),
            due_date: invoice.due_date,
            stored_status: invoice.status,
            status: effective_status(invoice, &invoice.payments, today),
        }
    }

    /// Stored status disagrees with what the payments say.
    pub fn is_stale(&self) -> bool {
        self.stored_status != self.status
    }
}

/// Views of the invoices whose effective status is `status`, e.g. the overdue list.
pub fn with_status<'a>(
    invoices: impl IntoIterator<Item = &'a Invoice>,
    status: InvoiceStatus,
    today: NaiveDate,
) -> Vec<InvoiceView> {
    invoices
        .into_iter()
        .map(|inv| InvoiceView::of(inv, today))
        .filter(|view| view.status == status)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use tamirhane_core::{Amount, CustomerId, PaymentId};

    use crate::invoice::IssueInvoice;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    }

    fn invoice(total: Decimal, due_date: Option<NaiveDate>) -> Invoice {
        Invoice::issue(
            InvoiceId::new(),
            InvoiceNumber::new(2026, 7).unwrap(),
            &IssueInvoice {
                customer_id: CustomerId::new(),
                subtotal: Money::ZERO,
                total: Amount::new(total).unwrap(),
                issue_date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
                due_date,
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn payment(amount: Decimal) -> Payment {
        Payment {
            id: PaymentId::new(),
            amount: Amount::new(amount).unwrap(),
            paid_at: Utc::now(),
            entry_id: None,
        }
    }

    #[test]
    fn full_payment_is_paid() {
        let inv = invoice(Decimal::new(1000, 0), None);
        let payments = vec![payment(Decimal::new(1000, 0))];
        assert_eq!(effective_status(&inv, &payments, today()), InvoiceStatus::Paid);
    }

    #[test]
    fn partial_payment_past_due_is_overdue() {
        let mut inv = invoice(Decimal::new(1000, 0), Some(today() - Duration::days(1)));
        inv.payments = vec![payment(Decimal::new(150, 0)), payment(Decimal::new(250, 0))];

        let view = InvoiceView::of(&inv, today());
        assert_eq!(view.status, InvoiceStatus::Overdue);
        assert_eq!(view.balance, Money::new(Decimal::new(600, 0)));
        assert!(view.is_stale());
    }

    #[test]
    fn due_today_is_still_open() {
        let inv = invoice(Decimal::new(1000, 0), Some(today()));
        assert_eq!(effective_status(&inv, &[], today()), InvoiceStatus::Open);
    }

    #[test]
    fn void_overrides_paid() {
        let mut inv = invoice(Decimal::new(1000, 0), None);
        inv.status = InvoiceStatus::Void;
        let payments = vec![payment(Decimal::new(1000, 0))];
        assert_eq!(effective_status(&inv, &payments, today()), InvoiceStatus::Void);
    }

    #[test]
    fn stored_paid_is_not_trusted() {
        let mut inv = invoice(Decimal::new(1000, 0), None);
        inv.status = InvoiceStatus::Paid;
        assert_eq!(effective_status(&inv, &[], today()), InvoiceStatus::Open);
    }

    #[test]
    fn thirds_that_sum_to_the_total_settle_it() {
        let inv = invoice(Decimal::new(10000, 2), None);
        let payments = vec![
            payment(Decimal::new(3333, 2)),
            payment(Decimal::new(3333, 2)),
            payment(Decimal::new(3334, 2)),
        ];
        assert_eq!(effective_status(&inv, &payments, today()), InvoiceStatus::Paid);
    }

    #[test]
    fn with_status_filters_on_effective_status() {
        let past = Some(today() - Duration::days(10));
        let mut paid = invoice(Decimal::new(500, 0), past);
        paid.payments.push(payment(Decimal::new(500, 0)));
        let overdue = invoice(Decimal::new(500, 0), past);
        let open = invoice(Decimal::new(500, 0), None);
        let all = vec![paid, overdue.clone(), open];

        let views = with_status(&all, InvoiceStatus::Overdue, today());
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].invoice_id, overdue.id);
    }

    proptest! {
        /// Property: whenever payments cover the total, a non-void invoice is paid.
        #[test]
        fn covered_invoices_are_paid(
            parts in prop::collection::vec(1i64..100_000i64, 1..10),
            days_late in 0i64..365,
        ) {
            let total: i64 = parts.iter().sum();
            let inv = invoice(Decimal::new(total, 2), Some(today() - Duration::days(days_late)));
            let payments: Vec<Payment> = parts.iter().map(|c| payment(Decimal::new(*c, 2))).collect();
            prop_assert_eq!(effective_status(&inv, &payments, today()), InvoiceStatus::Paid);
        }
    }
}
