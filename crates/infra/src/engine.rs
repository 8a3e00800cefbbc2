//! Posting engine: the only code path that writes to the ledger.
//!
//! Every operation follows the same pipeline:
//!
//! ```text
//! request
//!   ↓
//! 1. Read what the decision needs (chart, invoice, existing numbers)
//!   ↓
//! 2. Decide with pure domain code (validate, build entry/payment/invoice)
//!   ↓
//! 3. Commit all resulting writes as one atomic batch
//! ```
//!
//! Validation failures are returned before anything reaches the store. Store
//! failures are mapped into [`DomainError`] here and nowhere else.

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use tamirhane_accounting::{
    Account, AccountCode, CashNote, ChartOfAccounts, EntryCorrection, LedgerEntry, PostingPattern,
    PostingRequest, ReferenceKind, validate,
};
use tamirhane_core::{DomainError, DomainResult, Entity, EntryId, InvoiceId, PaymentId};
use tamirhane_invoicing::{Invoice, InvoiceNumber, InvoiceStatus, IssueInvoice, Payment};

use crate::store::{LedgerStore, LedgerWrite, StoreError};

impl From<StoreError> for DomainError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::UniqueViolation(msg) | StoreError::CheckViolation(msg) => {
                DomainError::Conflict(msg)
            }
            StoreError::ForeignKeyViolation(msg) => DomainError::referenced("record", "", msg),
            StoreError::NotFound(msg) => DomainError::not_found("record", msg),
            StoreError::SerializationFailure(msg) | StoreError::Backend(msg) => {
                DomainError::TransactionAborted(msg)
            }
        }
    }
}

/// Accounts with a fixed role in the higher-level posting patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRoles {
    /// Customer receivables (debited on issue, credited on collection).
    pub receivables: AccountCode,
    /// Revenue credited when an invoice is issued.
    pub revenue: AccountCode,
    /// Cash-like account used when a payment names none.
    pub default_cash: AccountCode,
    pub default_expense: AccountCode,
}

impl AccountRoles {
    pub fn new(
        receivables: &str,
        revenue: &str,
        default_cash: &str,
        default_expense: &str,
    ) -> DomainResult<Self> {
        Ok(Self {
            receivables: AccountCode::new(receivables)?,
            revenue: AccountCode::new(revenue)?,
            default_cash: AccountCode::new(default_cash)?,
            default_expense: AccountCode::new(default_expense)?,
        })
    }

    /// Roles of the standard repair-shop chart.
    pub fn standard() -> Self {
        Self {
            receivables: AccountCode::receivables(),
            revenue: AccountCode::service_revenue(),
            default_cash: AccountCode::cash(),
            default_expense: AccountCode::general_expense(),
        }
    }
}

impl Default for AccountRoles {
    fn default() -> Self {
        Self::standard()
    }
}

/// Input for recording a customer payment against an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayment {
    pub amount: Decimal,
    pub paid_at: DateTime<Utc>,
    /// Cash-like account receiving the money; the configured default when absent.
    pub cash_code: Option<String>,
    pub cash_summary: Option<String>,
}

impl RecordPayment {
    pub fn new(amount: Decimal, paid_at: DateTime<Utc>) -> Self {
        Self {
            amount,
            paid_at,
            cash_code: None,
            cash_summary: None,
        }
    }

    pub fn into_account(mut self, cash_code: impl Into<String>) -> Self {
        self.cash_code = Some(cash_code.into());
        self
    }

    pub fn with_cash_summary(mut self, summary: impl Into<String>) -> Self {
        self.cash_summary = Some(summary.into());
        self
    }
}

/// The ledger's exclusive writer.
#[derive(Debug)]
pub struct PostingEngine<S> {
    store: S,
    roles: AccountRoles,
}

impl<S> PostingEngine<S> {
    pub fn new(store: S) -> Self {
        Self::with_roles(store, AccountRoles::standard())
    }

    pub fn with_roles(store: S, roles: AccountRoles) -> Self {
        Self { store, roles }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn roles(&self) -> &AccountRoles {
        &self.roles
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

impl<S> PostingEngine<S>
where
    S: LedgerStore,
{
    /// Register every account of the standard chart that is not present yet.
    ///
    /// Returns the number of accounts added; a second call adds nothing.
    #[instrument(skip(self), err)]
    pub async fn seed_chart(&self) -> DomainResult<usize> {
        let chart = self.store.chart().await?;
        let writes: Vec<LedgerWrite> = ChartOfAccounts::standard()
            .accounts()
            .filter(|a| chart.get(&a.code).is_none())
            .cloned()
            .map(LedgerWrite::InsertAccount)
            .collect();

        let added = writes.len();
        self.store.commit(writes).await.map_err(|e| match e {
            StoreError::UniqueViolation(msg) => {
                DomainError::aborted(format!("chart seeded concurrently: {msg}"))
            }
            other => other.into(),
        })?;
        if added > 0 {
            info!(added, "seeded chart of accounts");
        }
        Ok(added)
    }

    #[instrument(skip(self, account), fields(code = %account.code), err)]
    pub async fn register_account(&self, account: Account) -> DomainResult<()> {
        let chart = self.store.chart().await?;
        if chart.get(&account.code).is_some() {
            return Err(DomainError::conflict(format!(
                "account code {} already exists",
                account.code
            )));
        }
        let code = account.code.clone();
        self.store
            .commit(vec![LedgerWrite::InsertAccount(account)])
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation(_) => {
                    DomainError::conflict(format!("account code {code} already exists"))
                }
                other => other.into(),
            })?;
        info!("account registered");
        Ok(())
    }

    /// Remove an account no entry references.
    #[instrument(skip(self), err)]
    pub async fn remove_account(&self, code: &str) -> DomainResult<Account> {
        let chart = self.store.chart().await?;
        let account = chart.find_by_code(code)?.clone();

        self.store
            .commit(vec![LedgerWrite::RemoveAccount(account.code.clone())])
            .await
            .map_err(|e| match e {
                StoreError::ForeignKeyViolation(reason) => {
                    DomainError::referenced("account", account.code.as_str(), reason)
                }
                StoreError::NotFound(_) => DomainError::not_found("account", account.code.as_str()),
                other => other.into(),
            })?;
        info!("account removed");
        Ok(account)
    }

    /// Validate and commit one balanced entry, with its CashNote when a summary is
    /// supplied.
    #[instrument(
        skip(self, request),
        fields(debit = %request.debit_code, credit = %request.credit_code, amount = %request.amount),
        err
    )]
    pub async fn post(&self, request: PostingRequest) -> DomainResult<LedgerEntry> {
        self.post_checked(request, None).await
    }

    /// Income pattern: debit a cash-like account, credit receivables or revenue.
    #[instrument(
        skip(self, request),
        fields(debit = %request.debit_code, credit = %request.credit_code, amount = %request.amount),
        err
    )]
    pub async fn record_income(&self, request: PostingRequest) -> DomainResult<LedgerEntry> {
        self.post_checked(request, Some(PostingPattern::Income)).await
    }

    /// Expense pattern: debit an expense account, credit a cash-like account.
    #[instrument(
        skip(self, request),
        fields(debit = %request.debit_code, credit = %request.credit_code, amount = %request.amount),
        err
    )]
    pub async fn record_expense(&self, request: PostingRequest) -> DomainResult<LedgerEntry> {
        self.post_checked(request, Some(PostingPattern::Expense)).await
    }

    async fn post_checked(
        &self,
        mut request: PostingRequest,
        pattern: Option<PostingPattern>,
    ) -> DomainResult<LedgerEntry> {
        if let Some(pattern) = pattern {
            if request.ref_type.as_deref().is_none_or(|t| t.trim().is_empty()) {
                request.ref_type = Some(pattern.reference_kind().to_string());
            }
        }

        let chart = self.store.chart().await?;
        let posting = validate(&request, &chart)
            .and_then(|posting| {
                if let Some(pattern) = pattern {
                    pattern.check(&posting.debit, &posting.credit)?;
                }
                Ok(posting)
            })
            .inspect_err(|e| warn!(error = %e, "posting rejected"))?;

        let (entry, note) = posting.into_entry(EntryId::new(), Utc::now());
        self.commit_entry(entry, note).await
    }

    async fn commit_entry(&self, entry: LedgerEntry, note: Option<CashNote>) -> DomainResult<LedgerEntry> {
        self.store
            .commit(vec![LedgerWrite::InsertEntry {
                entry: entry.clone(),
                note,
            }])
            .await
            .map_err(|e| map_posting_error(&entry, e))?;
        info!(entry_id = %entry.id(), "entry posted");
        Ok(entry)
    }

    /// Narrow correction of amount, date or note; accounts never change. Entries
    /// behind an invoice or payment keep their amount.
    #[instrument(skip(self, correction), fields(entry_id = %entry_id), err)]
    pub async fn correct(&self, entry_id: EntryId, correction: EntryCorrection) -> DomainResult<LedgerEntry> {
        if correction.is_empty() {
            return Err(DomainError::validation("correction changes nothing"));
        }
        let (entry, _) = self
            .store
            .entry(entry_id)
            .await?
            .ok_or_else(|| DomainError::not_found("ledger_entry", entry_id.to_string()))?;

        let corrected = entry.corrected(&correction);
        if corrected.amount() != entry.amount() && entry.backs_invoice() {
            return Err(DomainError::referenced(
                "ledger_entry",
                entry_id.to_string(),
                "amount of an invoice or payment entry is fixed",
            ));
        }
        let note = correction
            .cash_summary
            .and_then(|summary| CashNote::new(entry_id, summary));

        self.store
            .commit(vec![LedgerWrite::UpdateEntry {
                entry: corrected.clone(),
                note,
            }])
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => DomainError::not_found("ledger_entry", entry_id.to_string()),
                StoreError::ForeignKeyViolation(reason) => {
                    DomainError::referenced("ledger_entry", entry_id.to_string(), reason)
                }
                other => other.into(),
            })?;
        info!("entry corrected");
        Ok(corrected)
    }

    /// Delete an entry and its CashNote. Entries behind an invoice or payment stay.
    #[instrument(skip(self), fields(entry_id = %entry_id), err)]
    pub async fn delete_entry(&self, entry_id: EntryId) -> DomainResult<()> {
        self.store
            .commit(vec![LedgerWrite::DeleteEntry(entry_id)])
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => DomainError::not_found("ledger_entry", entry_id.to_string()),
                StoreError::ForeignKeyViolation(reason) => {
                    DomainError::referenced("ledger_entry", entry_id.to_string(), reason)
                }
                other => other.into(),
            })?;
        info!("entry deleted");
        Ok(())
    }

    /// Issue an invoice under the next number of its year and post the receivable.
    #[instrument(skip(self, cmd), fields(customer_id = %cmd.customer_id, total = %cmd.total), err)]
    pub async fn issue_invoice(&self, cmd: IssueInvoice) -> DomainResult<Invoice> {
        let year = cmd.issue_date.year();
        let existing = self.store.invoice_numbers(year).await?;
        let number = InvoiceNumber::next_for_year(year, &existing);

        let now = Utc::now();
        let invoice = Invoice::issue(InvoiceId::new(), number, &cmd, now)
            .inspect_err(|e| warn!(error = %e, "invoice rejected"))?;

        let chart = self.store.chart().await?;
        let request = PostingRequest::new(
            cmd.issue_date,
            self.roles.receivables.as_str(),
            self.roles.revenue.as_str(),
            invoice.total.value(),
        )
        .with_reference(ReferenceKind::Invoice.as_str(), Some(invoice.id.to_string()))
        .with_note(format!("Invoice {number}"));
        let (entry, note) = validate(&request, &chart)?.into_entry(EntryId::new(), now);

        self.store
            .commit(vec![
                LedgerWrite::InsertInvoice(invoice.clone()),
                LedgerWrite::InsertEntry { entry, note },
            ])
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation(msg) => {
                    DomainError::aborted(format!("invoice number {number} taken concurrently: {msg}"))
                }
                other => other.into(),
            })?;
        info!(invoice_id = %invoice.id, number = %number, "invoice issued");
        Ok(invoice)
    }

    /// Record a customer payment: the Payment and the cash/receivables entry that
    /// moved the money commit together.
    #[instrument(skip(self, payment), fields(invoice_id = %invoice_id, amount = %payment.amount), err)]
    pub async fn record_payment(
        &self,
        invoice_id: InvoiceId,
        payment: RecordPayment,
    ) -> DomainResult<(Payment, LedgerEntry)> {
        let mut invoice = self
            .store
            .invoice(invoice_id)
            .await?
            .ok_or_else(|| DomainError::not_found("invoice", invoice_id.to_string()))?;

        let cash_code = payment
            .cash_code
            .clone()
            .unwrap_or_else(|| self.roles.default_cash.as_str().to_string());
        let mut request = PostingRequest::new(
            payment.paid_at.date_naive(),
            cash_code,
            self.roles.receivables.as_str(),
            payment.amount,
        )
        .with_reference(ReferenceKind::Payment.as_str(), Some(invoice_id.to_string()))
        .with_note(format!("Invoice {}", invoice.number));
        if let Some(summary) = payment.cash_summary {
            request = request.with_cash_summary(summary);
        }

        let chart = self.store.chart().await?;
        let posting = validate(&request, &chart)
            .and_then(|posting| {
                PostingPattern::Income.check(&posting.debit, &posting.credit)?;
                Ok(posting)
            })
            .inspect_err(|e| warn!(error = %e, "payment rejected"))?;

        let (entry, note) = posting.into_entry(EntryId::new(), Utc::now());
        let recorded = Payment {
            id: PaymentId::new(),
            amount: entry.amount(),
            paid_at: payment.paid_at,
            entry_id: Some(*entry.id()),
        };
        invoice
            .add_payment(recorded.clone())
            .inspect_err(|e| warn!(error = %e, "payment rejected"))?;

        let mut writes = vec![
            LedgerWrite::InsertEntry {
                entry: entry.clone(),
                note,
            },
            LedgerWrite::InsertPayment {
                invoice_id,
                payment: recorded.clone(),
            },
        ];
        if invoice.balance().is_settled() {
            writes.push(LedgerWrite::SetInvoiceStatus {
                invoice_id,
                status: InvoiceStatus::Paid,
            });
        }

        self.store.commit(writes).await.map_err(|e| match e {
            StoreError::CheckViolation(msg) => DomainError::conflict(msg),
            other => map_posting_error(&entry, other),
        })?;
        info!(payment_id = %recorded.id, entry_id = %entry.id(), "payment recorded");
        Ok((recorded, entry))
    }

    /// Void an invoice. Any outstanding balance is reversed out of receivables
    /// (debit revenue, credit receivables) in the same unit of work.
    #[instrument(skip(self), fields(invoice_id = %invoice_id), err)]
    pub async fn void_invoice(&self, invoice_id: InvoiceId) -> DomainResult<Invoice> {
        let mut invoice = self
            .store
            .invoice(invoice_id)
            .await?
            .ok_or_else(|| DomainError::not_found("invoice", invoice_id.to_string()))?;
        invoice.void()?;

        let mut writes = vec![LedgerWrite::SetInvoiceStatus {
            invoice_id,
            status: InvoiceStatus::Void,
        }];

        let outstanding = invoice.balance().round_to_currency();
        if outstanding.is_positive() {
            let chart = self.store.chart().await?;
            let request = PostingRequest::new(
                Utc::now().date_naive(),
                self.roles.revenue.as_str(),
                self.roles.receivables.as_str(),
                outstanding.value(),
            )
            .with_reference(ReferenceKind::Invoice.as_str(), Some(invoice_id.to_string()))
            .with_note(format!("Void invoice {}", invoice.number));
            let (entry, note) = validate(&request, &chart)?.into_entry(EntryId::new(), Utc::now());
            writes.push(LedgerWrite::InsertEntry { entry, note });
        }

        self.store.commit(writes).await?;
        info!(number = %invoice.number, "invoice voided");
        Ok(invoice)
    }
}

/// Concurrent chart changes surface as a foreign key failure on insert.
fn map_posting_error(entry: &LedgerEntry, err: StoreError) -> DomainError {
    match err {
        StoreError::ForeignKeyViolation(msg) => DomainError::aborted(format!(
            "accounts of entry {} changed during posting: {msg}",
            entry.id()
        )),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use std::sync::{Arc, Mutex};
    use tamirhane_accounting::{AccountType, cash_balance, DateRange};
    use tamirhane_core::{Amount, CustomerId, Money};

    use crate::store::{InMemoryLedgerStore, LedgerSnapshot};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    fn money(units: i64, scale: u32) -> Money {
        Money::new(Decimal::new(units, scale))
    }

    async fn engine() -> PostingEngine<InMemoryLedgerStore> {
        let engine = PostingEngine::new(InMemoryLedgerStore::new());
        engine.seed_chart().await.unwrap();
        engine
    }

    async fn entry_count(engine: &PostingEngine<InMemoryLedgerStore>) -> usize {
        engine.store().snapshot().await.unwrap().entries.len()
    }

    fn issue(total: i64, due_date: Option<NaiveDate>) -> IssueInvoice {
        IssueInvoice {
            customer_id: CustomerId::new(),
            subtotal: Money::ZERO,
            total: Amount::new(Decimal::new(total, 0)).unwrap(),
            issue_date: day(),
            due_date,
        }
    }

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let engine = PostingEngine::new(InMemoryLedgerStore::new());
        assert_eq!(engine.seed_chart().await.unwrap(), ChartOfAccounts::standard().len());
        assert_eq!(engine.seed_chart().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn post_with_summary_creates_entry_and_note() {
        let engine = engine().await;
        let entry = engine
            .post(
                PostingRequest::new(day(), "1001", "1200", Decimal::new(25000, 2))
                    .with_cash_summary("Müşteri tahsilatı"),
            )
            .await
            .unwrap();

        let (stored, note) = engine.store().entry(*entry.id()).await.unwrap().unwrap();
        assert_eq!(stored, entry);
        assert_eq!(note.unwrap().summary, "Müşteri tahsilatı");
    }

    #[tokio::test]
    async fn invalid_amounts_write_nothing() {
        let engine = engine().await;
        for cents in [0, -500] {
            let err = engine
                .post(PostingRequest::new(day(), "1001", "1200", Decimal::new(cents, 2)))
                .await
                .unwrap_err();
            assert_eq!(err.code(), "invalid_amount");
            assert_eq!(err.field(), Some("amount"));
        }
        assert_eq!(entry_count(&engine).await, 0);
    }

    #[tokio::test]
    async fn unknown_account_writes_neither_entry_nor_note() {
        let engine = engine().await;
        let err = engine
            .post(
                PostingRequest::new(day(), "1001", "9999", Decimal::new(100, 0))
                    .with_cash_summary("orphan"),
            )
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::unknown_account("credit_code", "9999"));

        let snapshot = engine.store().snapshot().await.unwrap();
        assert!(snapshot.entries.is_empty());
        assert!(snapshot.notes.is_empty());
    }

    #[tokio::test]
    async fn same_account_is_rejected() {
        let engine = engine().await;
        let err = engine
            .post(PostingRequest::new(day(), "1001", "1001", Decimal::ONE))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::SameAccount { .. }));
        assert_eq!(entry_count(&engine).await, 0);
    }

    #[tokio::test]
    async fn patterns_check_account_types() {
        let engine = engine().await;
        let err = engine
            .record_expense(PostingRequest::new(day(), "1200", "1001", Decimal::ONE))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let entry = engine
            .record_expense(PostingRequest::new(day(), "6100", "1020", Decimal::new(4500, 0)))
            .await
            .unwrap();
        assert_eq!(entry.reference().map(|r| r.kind.clone()), Some(ReferenceKind::Expense));

        let entry = engine
            .record_income(
                PostingRequest::new(day(), "1001", "4100", Decimal::new(800, 0))
                    .with_reference("Payment", Some("walk-in".to_string())),
            )
            .await
            .unwrap();
        assert_eq!(entry.reference().map(|r| r.kind.clone()), Some(ReferenceKind::Payment));
    }

    #[tokio::test]
    async fn referenced_accounts_cannot_be_removed() {
        let engine = engine().await;
        engine
            .post(PostingRequest::new(day(), "6000", "1001", Decimal::TEN))
            .await
            .unwrap();

        let err = engine.remove_account("6000").await.unwrap_err();
        assert_eq!(err.code(), "referential_integrity");

        let removed = engine.remove_account("6300").await.unwrap();
        assert_eq!(removed.account_type, AccountType::Expense);
        assert!(matches!(
            engine.remove_account("6300").await.unwrap_err(),
            DomainError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn duplicate_account_registration_conflicts() {
        let engine = engine().await;
        let err = engine
            .register_account(Account::cash(AccountCode::new("1001").unwrap(), "İkinci Kasa"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        engine
            .register_account(Account::cash(AccountCode::new("1030").unwrap(), "POS"))
            .await
            .unwrap();
        assert!(engine.store().chart().await.unwrap().is_cash_like(&AccountCode::new("1030").unwrap()));
    }

    #[tokio::test]
    async fn corrections_touch_only_amount_date_and_note() {
        let engine = engine().await;
        let entry = engine
            .post(PostingRequest::new(day(), "6000", "1001", Decimal::new(100, 0)).with_note("kırtasiye"))
            .await
            .unwrap();

        let corrected = engine
            .correct(
                *entry.id(),
                EntryCorrection {
                    amount: Some(Amount::new(Decimal::new(120, 0)).unwrap()),
                    cash_summary: Some("Kırtasiye gideri".to_string()),
                    ..EntryCorrection::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(corrected.amount().value(), Decimal::new(120, 0));
        assert_eq!(corrected.debit(), entry.debit());
        assert_eq!(corrected.note(), Some("kırtasiye"));

        let (_, note) = engine.store().entry(*entry.id()).await.unwrap().unwrap();
        assert_eq!(note.unwrap().summary, "Kırtasiye gideri");

        let err = engine.correct(*entry.id(), EntryCorrection::default()).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        let err = engine
            .correct(EntryId::new(), EntryCorrection { note: Some("x".into()), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn delete_cascades_and_respects_payments() {
        let engine = engine().await;
        let plain = engine
            .post(PostingRequest::new(day(), "6000", "1001", Decimal::TEN).with_cash_summary("çay"))
            .await
            .unwrap();
        engine.delete_entry(*plain.id()).await.unwrap();
        assert!(engine.store().snapshot().await.unwrap().notes.is_empty());

        let invoice = engine.issue_invoice(issue(500, None)).await.unwrap();
        let (_, entry) = engine
            .record_payment(invoice.id, RecordPayment::new(Decimal::new(200, 0), Utc::now()))
            .await
            .unwrap();
        let err = engine.delete_entry(*entry.id()).await.unwrap_err();
        assert_eq!(err.code(), "referential_integrity");

        let err = engine.delete_entry(EntryId::new()).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn invoices_are_numbered_per_year_and_post_the_receivable() {
        let engine = engine().await;
        let first = engine.issue_invoice(issue(1000, None)).await.unwrap();
        let second = engine.issue_invoice(issue(300, None)).await.unwrap();
        assert_eq!(first.number.to_string(), "2026-0001");
        assert_eq!(second.number.to_string(), "2026-0002");

        let snapshot = engine.store().snapshot().await.unwrap();
        let receivables = &engine.roles().receivables;
        let ar: Money = snapshot.entries.iter().map(|e| e.signed_movement(receivables)).sum();
        assert_eq!(ar, money(1300, 0));
    }

    #[tokio::test]
    async fn full_payment_marks_invoice_paid_and_moves_cash() {
        let engine = engine().await;
        let invoice = engine.issue_invoice(issue(1000, Some(day()))).await.unwrap();
        let (payment, entry) = engine
            .record_payment(
                invoice.id,
                RecordPayment::new(Decimal::new(1000, 0), Utc::now())
                    .into_account("1020")
                    .with_cash_summary("Havale ile tahsilat"),
            )
            .await
            .unwrap();

        assert_eq!(payment.entry_id, Some(*entry.id()));
        assert_eq!(entry.reference().and_then(|r| r.id.clone()), Some(invoice.id.to_string()));

        let stored = engine.store().invoice(invoice.id).await.unwrap().unwrap();
        assert_eq!(stored.status, InvoiceStatus::Paid);
        assert_eq!(stored.payments, vec![payment]);

        let snapshot = engine.store().snapshot().await.unwrap();
        assert_eq!(cash_balance(&snapshot.chart, &snapshot.entries, DateRange::all()), money(1000, 0));
    }

    #[tokio::test]
    async fn payments_cannot_overpay_or_hit_void_invoices() {
        let engine = engine().await;
        let invoice = engine.issue_invoice(issue(100, None)).await.unwrap();

        let err = engine
            .record_payment(invoice.id, RecordPayment::new(Decimal::new(101, 0), Utc::now()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_amount");

        let err = engine
            .record_payment(invoice.id, RecordPayment::new(Decimal::TEN, Utc::now()).into_account("6000"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        engine.void_invoice(invoice.id).await.unwrap();
        let before = entry_count(&engine).await;
        let err = engine
            .record_payment(invoice.id, RecordPayment::new(Decimal::TEN, Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(entry_count(&engine).await, before);

        let err = engine
            .record_payment(InvoiceId::new(), RecordPayment::new(Decimal::TEN, Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn voiding_reverses_the_outstanding_receivable() {
        let engine = engine().await;
        let invoice = engine
            .issue_invoice(issue(1000, Some(day() + Duration::days(30))))
            .await
            .unwrap();
        engine
            .record_payment(invoice.id, RecordPayment::new(Decimal::new(400, 0), Utc::now()))
            .await
            .unwrap();

        let voided = engine.void_invoice(invoice.id).await.unwrap();
        assert_eq!(voided.status, InvoiceStatus::Void);
        assert!(matches!(engine.void_invoice(invoice.id).await.unwrap_err(), DomainError::Conflict(_)));

        let snapshot = engine.store().snapshot().await.unwrap();
        let receivables = &engine.roles().receivables;
        let ar: Money = snapshot.entries.iter().map(|e| e.signed_movement(receivables)).sum();
        assert_eq!(ar, Money::ZERO);
    }

    #[tokio::test]
    async fn concurrent_payments_never_overpay() {
        let engine = Arc::new(engine().await);
        let invoice = engine.issue_invoice(issue(100, None)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .record_payment(invoice.id, RecordPayment::new(Decimal::new(30, 0), Utc::now()))
                    .await
            }));
        }
        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                accepted += 1;
            }
        }

        let stored = engine.store().invoice(invoice.id).await.unwrap().unwrap();
        assert_eq!(stored.payments.len(), accepted);
        assert!(stored.total_paid() <= stored.total.money());
        assert_eq!(accepted, 3);
    }

    #[tokio::test]
    async fn invoice_backed_entries_cannot_be_resized_or_deleted() {
        let engine = engine().await;
        let yesterday = Utc::now().date_naive() - Duration::days(1);
        let invoice = engine
            .issue_invoice(IssueInvoice {
                issue_date: yesterday - Duration::days(30),
                ..issue(1000, Some(yesterday))
            })
            .await
            .unwrap();
        let (_, payment_entry) = engine
            .record_payment(invoice.id, RecordPayment::new(Decimal::new(400, 0), Utc::now()))
            .await
            .unwrap();
        let issue_entry = engine
            .store()
            .snapshot()
            .await
            .unwrap()
            .entries
            .into_iter()
            .find(|e| e.reference().is_some_and(|r| r.kind == ReferenceKind::Invoice))
            .unwrap();

        let resize = EntryCorrection {
            amount: Some(Amount::new(Decimal::new(1000, 0)).unwrap()),
            ..EntryCorrection::default()
        };
        for id in [*payment_entry.id(), *issue_entry.id()] {
            let err = engine.correct(id, resize.clone()).await.unwrap_err();
            assert_eq!(err.code(), "referential_integrity");
            let err = engine.delete_entry(id).await.unwrap_err();
            assert_eq!(err.code(), "referential_integrity");
        }

        engine
            .correct(
                *payment_entry.id(),
                EntryCorrection { note: Some("kasa sayımı".into()), ..Default::default() },
            )
            .await
            .unwrap();

        let snapshot = engine.store().snapshot().await.unwrap();
        let receivables = &engine.roles().receivables;
        let ar: Money = snapshot.entries.iter().map(|e| e.signed_movement(receivables)).sum();
        let stored = engine.store().invoice(invoice.id).await.unwrap().unwrap();
        assert_eq!(ar, money(600, 0));
        assert_eq!(stored.balance(), ar);
        assert_eq!(cash_balance(&snapshot.chart, &snapshot.entries, DateRange::all()), money(400, 0));
    }

    /// Store whose next commit fails with a preset error and writes nothing.
    struct FlakyStore {
        inner: InMemoryLedgerStore,
        next_failure: Mutex<Option<StoreError>>,
    }

    impl FlakyStore {
        fn new(inner: InMemoryLedgerStore) -> Self {
            Self { inner, next_failure: Mutex::new(None) }
        }

        fn fail_next_commit(&self, err: StoreError) {
            *self.next_failure.lock().unwrap() = Some(err);
        }
    }

    #[async_trait::async_trait]
    impl LedgerStore for FlakyStore {
        async fn chart(&self) -> Result<ChartOfAccounts, StoreError> {
            self.inner.chart().await
        }

        async fn entry(&self, id: EntryId) -> Result<Option<(LedgerEntry, Option<CashNote>)>, StoreError> {
            self.inner.entry(id).await
        }

        async fn invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, StoreError> {
            self.inner.invoice(id).await
        }

        async fn invoice_numbers(&self, year: i32) -> Result<Vec<InvoiceNumber>, StoreError> {
            self.inner.invoice_numbers(year).await
        }

        async fn snapshot(&self) -> Result<LedgerSnapshot, StoreError> {
            self.inner.snapshot().await
        }

        async fn commit(&self, writes: Vec<LedgerWrite>) -> Result<(), StoreError> {
            let failure = self.next_failure.lock().unwrap().take();
            match failure {
                Some(err) => Err(err),
                None => self.inner.commit(writes).await,
            }
        }
    }

    fn flaky_engine() -> PostingEngine<FlakyStore> {
        PostingEngine::new(FlakyStore::new(InMemoryLedgerStore::with_chart(
            ChartOfAccounts::standard(),
        )))
    }

    fn assert_aborted(err: &DomainError) {
        assert!(matches!(err, DomainError::TransactionAborted(_)), "got {err:?}");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn invoice_number_race_is_retryable() {
        let engine = flaky_engine();
        let before = engine.store().snapshot().await.unwrap();

        engine.store().fail_next_commit(StoreError::UniqueViolation("invoices_number_key".into()));
        let err = engine.issue_invoice(issue(250, None)).await.unwrap_err();
        assert_aborted(&err);
        assert_eq!(engine.store().snapshot().await.unwrap(), before);

        let retried = engine.issue_invoice(issue(250, None)).await.unwrap();
        assert_eq!(retried.number.to_string(), "2026-0001");
    }

    #[tokio::test]
    async fn concurrent_seed_is_retryable() {
        let engine = PostingEngine::new(FlakyStore::new(InMemoryLedgerStore::new()));
        engine.store().fail_next_commit(StoreError::UniqueViolation("accounts_pkey".into()));
        let err = engine.seed_chart().await.unwrap_err();
        assert_aborted(&err);
        assert!(engine.store().chart().await.unwrap().is_empty());

        assert_eq!(engine.seed_chart().await.unwrap(), ChartOfAccounts::standard().len());
    }

    #[tokio::test]
    async fn vanished_account_during_posting_is_retryable() {
        let engine = flaky_engine();
        engine
            .store()
            .fail_next_commit(StoreError::ForeignKeyViolation("ledger_entries_debit_code_fkey".into()));
        let err = engine
            .post(PostingRequest::new(day(), "1001", "4000", Decimal::TEN).with_cash_summary("nakit"))
            .await
            .unwrap_err();
        assert_aborted(&err);

        let snapshot = engine.store().snapshot().await.unwrap();
        assert!(snapshot.entries.is_empty());
        assert!(snapshot.notes.is_empty());
    }

    #[tokio::test]
    async fn serialization_failure_on_payment_writes_nothing() {
        let engine = flaky_engine();
        let invoice = engine.issue_invoice(issue(100, None)).await.unwrap();
        let before = engine.store().snapshot().await.unwrap();

        engine.store().fail_next_commit(StoreError::SerializationFailure("40001".into()));
        let err = engine
            .record_payment(invoice.id, RecordPayment::new(Decimal::new(100, 0), Utc::now()))
            .await
            .unwrap_err();
        assert_aborted(&err);
        assert_eq!(engine.store().snapshot().await.unwrap(), before);
        assert!(engine.store().invoice(invoice.id).await.unwrap().unwrap().payments.is_empty());
    }
}
