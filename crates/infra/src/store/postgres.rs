//! Postgres-backed ledger store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `UniqueViolation` |
//! | Database (foreign key violation) | `23503` | `ForeignKeyViolation` |
//! | Database (check constraint violation) | `23514` | `CheckViolation` |
//! | Database (serialization failure, deadlock) | `40001`, `40P01` | `SerializationFailure` |
//! | Database (other), PoolClosed, Other | any | `Backend` |
//!
//! Every `commit` runs in one transaction. Payment batches lock the invoice row
//! (`SELECT ... FOR UPDATE`) before checking the outstanding balance, so two
//! concurrent payments can never overpay the same invoice.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};
use uuid::Uuid;

use tamirhane_accounting::{
    Account, AccountCode, AccountType, CashNote, ChartOfAccounts, EntryReference, EntrySides,
    LedgerEntry, ReferenceKind,
};
use tamirhane_core::{Amount, CustomerId, Entity, EntryId, InvoiceId, Money, PaymentId};
use tamirhane_invoicing::{Invoice, InvoiceNumber, InvoiceStatus, Payment};

use super::{LedgerSnapshot, LedgerStore, LedgerWrite, StoreError};

/// Postgres-backed ledger store.
///
/// Uses the SQLx connection pool, which is `Send + Sync`; the store can be shared
/// freely across tasks.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool against `url`.
    #[instrument(skip(url), err)]
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply pending schema migrations.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        tracing::info!("running ledger migrations");
        sqlx::migrate!("./migrations")
            .run(&*self.pool)
            .await
            .map_err(|e| StoreError::Backend(format!("migration failed: {e}")))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(skip(self), err)]
    async fn chart(&self) -> Result<ChartOfAccounts, StoreError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;
        load_chart(&mut *conn).await
    }

    #[instrument(skip(self), fields(entry_id = %id), err)]
    async fn entry(&self, id: EntryId) -> Result<Option<(LedgerEntry, Option<CashNote>)>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT e.id, e.entry_date, e.debit_code, e.credit_code, e.amount, e.note,
                   e.ref_type, e.ref_id, e.created_at, n.summary
            FROM ledger_entries e
            LEFT JOIN cash_notes n ON n.entry_id = e.id
            WHERE e.id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_entry", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let summary: Option<String> = row
            .try_get("summary")
            .map_err(|e| map_sqlx_error("load_entry", e))?;
        let entry = EntryRow::from_row(&row)
            .map_err(|e| map_sqlx_error("load_entry", e))?
            .into_entry()?;
        let note = summary.and_then(|s| CashNote::new(id, s));
        Ok(Some((entry, note)))
    }

    #[instrument(skip(self), fields(invoice_id = %id), err)]
    async fn invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, StoreError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;
        load_invoice(&mut *conn, id, false).await
    }

    #[instrument(skip(self), err)]
    async fn invoice_numbers(&self, year: i32) -> Result<Vec<InvoiceNumber>, StoreError> {
        let rows = sqlx::query("SELECT number_seq FROM invoices WHERE number_year = $1")
            .bind(year)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("invoice_numbers", e))?;

        rows.iter()
            .map(|row| {
                let seq: i32 = row
                    .try_get("number_seq")
                    .map_err(|e| map_sqlx_error("invoice_numbers", e))?;
                invoice_number(year, seq)
            })
            .collect()
    }

    #[instrument(skip(self), fields(entry_count = tracing::field::Empty), err)]
    async fn snapshot(&self) -> Result<LedgerSnapshot, StoreError> {
        let span = Span::current();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_isolation", e))?;

        let chart = load_chart(&mut *tx).await?;

        let entry_rows = sqlx::query(
            r#"
            SELECT id, entry_date, debit_code, credit_code, amount, note, ref_type, ref_id, created_at
            FROM ledger_entries
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("load_entries", e))?;
        let mut entries = Vec::with_capacity(entry_rows.len());
        for row in &entry_rows {
            let entry = EntryRow::from_row(row)
                .map_err(|e| map_sqlx_error("load_entries", e))?
                .into_entry()?;
            entries.push(entry);
        }

        let note_rows = sqlx::query("SELECT entry_id, summary FROM cash_notes")
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("load_notes", e))?;
        let mut notes = HashMap::with_capacity(note_rows.len());
        for row in &note_rows {
            let entry_id: Uuid = row.try_get("entry_id").map_err(|e| map_sqlx_error("load_notes", e))?;
            let summary: String = row.try_get("summary").map_err(|e| map_sqlx_error("load_notes", e))?;
            let entry_id = EntryId::from_uuid(entry_id);
            if let Some(note) = CashNote::new(entry_id, summary) {
                notes.insert(entry_id, note);
            }
        }

        let invoice_rows = sqlx::query(&format!("{INVOICE_SELECT} ORDER BY created_at ASC, id ASC"))
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("load_invoices", e))?;
        let mut payments = load_payments(&mut *tx, None).await?;
        let mut invoices = Vec::with_capacity(invoice_rows.len());
        for row in &invoice_rows {
            let mut invoice = InvoiceRow::from_row(row)
                .map_err(|e| map_sqlx_error("load_invoices", e))?
                .into_invoice()?;
            invoice.payments = payments.remove(&invoice.id).unwrap_or_default();
            invoices.push(invoice);
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        span.record("entry_count", entries.len());
        Ok(LedgerSnapshot {
            chart,
            entries,
            notes,
            invoices,
        })
    }

    #[instrument(skip(self, writes), fields(write_count = writes.len()), err)]
    async fn commit(&self, writes: Vec<LedgerWrite>) -> Result<(), StoreError> {
        if writes.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        for write in writes {
            // Dropping `tx` on error rolls the whole batch back.
            apply(&mut tx, write).await?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

async fn apply(tx: &mut Transaction<'_, Postgres>, write: LedgerWrite) -> Result<(), StoreError> {
    match write {
        LedgerWrite::InsertAccount(account) => {
            sqlx::query(
                "INSERT INTO accounts (code, name, account_type, is_cash_like) VALUES ($1, $2, $3, $4)",
            )
            .bind(account.code.as_str())
            .bind(&account.name)
            .bind(account.account_type.as_str())
            .bind(account.is_cash_like)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("insert_account", e))?;
        }
        LedgerWrite::RemoveAccount(code) => {
            let result = sqlx::query("DELETE FROM accounts WHERE code = $1")
                .bind(code.as_str())
                .execute(&mut **tx)
                .await
                .map_err(|e| map_sqlx_error("remove_account", e))?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound(format!("account {code}")));
            }
        }
        LedgerWrite::InsertEntry { entry, note } => {
            sqlx::query(
                r#"
                INSERT INTO ledger_entries (
                    id, entry_date, debit_code, credit_code, amount, note, ref_type, ref_id, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(entry.id().as_uuid())
            .bind(entry.date())
            .bind(entry.debit().as_str())
            .bind(entry.credit().as_str())
            .bind(entry.amount().value())
            .bind(entry.note())
            .bind(entry.reference().map(|r| r.kind.as_str().to_string()))
            .bind(entry.reference().and_then(|r| r.id.clone()))
            .bind(entry.created_at())
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("insert_entry", e))?;
            if let Some(note) = note {
                upsert_note(tx, *entry.id(), note).await?;
            }
        }
        LedgerWrite::UpdateEntry { entry, note } => {
            let row = sqlx::query(
                "SELECT debit_code, credit_code, amount, ref_type FROM ledger_entries WHERE id = $1 FOR UPDATE",
            )
            .bind(entry.id().as_uuid())
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("lock_entry", e))?
            .ok_or_else(|| StoreError::NotFound(format!("ledger entry {}", entry.id())))?;

            let debit: String = row.try_get("debit_code").map_err(|e| map_sqlx_error("lock_entry", e))?;
            let credit: String = row.try_get("credit_code").map_err(|e| map_sqlx_error("lock_entry", e))?;
            if debit != entry.debit().as_str() || credit != entry.credit().as_str() {
                return Err(StoreError::CheckViolation(format!(
                    "accounts of ledger entry {} cannot change",
                    entry.id()
                )));
            }
            let amount: Decimal = row.try_get("amount").map_err(|e| map_sqlx_error("lock_entry", e))?;
            if amount != entry.amount().value() {
                let ref_type: Option<String> =
                    row.try_get("ref_type").map_err(|e| map_sqlx_error("lock_entry", e))?;
                ensure_unbacked(tx, *entry.id(), ref_type).await?;
            }

            sqlx::query("UPDATE ledger_entries SET entry_date = $2, amount = $3, note = $4 WHERE id = $1")
                .bind(entry.id().as_uuid())
                .bind(entry.date())
                .bind(entry.amount().value())
                .bind(entry.note())
                .execute(&mut **tx)
                .await
                .map_err(|e| map_sqlx_error("update_entry", e))?;
            if let Some(note) = note {
                upsert_note(tx, *entry.id(), note).await?;
            }
        }
        LedgerWrite::DeleteEntry(id) => {
            let ref_type: Option<String> =
                sqlx::query_scalar("SELECT ref_type FROM ledger_entries WHERE id = $1 FOR UPDATE")
                    .bind(id.as_uuid())
                    .fetch_optional(&mut **tx)
                    .await
                    .map_err(|e| map_sqlx_error("lock_entry", e))?
                    .ok_or_else(|| StoreError::NotFound(format!("ledger entry {id}")))?;
            ensure_unbacked(tx, id, ref_type).await?;

            let result = sqlx::query("DELETE FROM ledger_entries WHERE id = $1")
                .bind(id.as_uuid())
                .execute(&mut **tx)
                .await
                .map_err(|e| map_sqlx_error("delete_entry", e))?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound(format!("ledger entry {id}")));
            }
        }
        LedgerWrite::InsertInvoice(invoice) => {
            sqlx::query(
                r#"
                INSERT INTO invoices (
                    id, number_year, number_seq, customer_id, subtotal, total,
                    issue_date, due_date, status, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(invoice.id.as_uuid())
            .bind(invoice.number.year())
            .bind(sequence_column(&invoice.number)?)
            .bind(invoice.customer_id.as_uuid())
            .bind(invoice.subtotal.value())
            .bind(invoice.total.value())
            .bind(invoice.issue_date)
            .bind(invoice.due_date)
            .bind(invoice.status.as_str())
            .bind(invoice.created_at)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("insert_invoice", e))?;
            for payment in invoice.payments {
                insert_payment(tx, invoice.id, &payment).await?;
            }
        }
        LedgerWrite::InsertPayment { invoice_id, payment } => {
            let mut invoice = load_invoice(&mut **tx, invoice_id, true).await?.ok_or_else(|| {
                StoreError::ForeignKeyViolation(format!("payment references missing invoice {invoice_id}"))
            })?;
            invoice
                .add_payment(payment.clone())
                .map_err(|e| StoreError::CheckViolation(e.to_string()))?;
            insert_payment(tx, invoice_id, &payment).await?;
        }
        LedgerWrite::SetInvoiceStatus { invoice_id, status } => {
            let result = sqlx::query("UPDATE invoices SET status = $2 WHERE id = $1")
                .bind(invoice_id.as_uuid())
                .bind(status.as_str())
                .execute(&mut **tx)
                .await
                .map_err(|e| map_sqlx_error("set_invoice_status", e))?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound(format!("invoice {invoice_id}")));
            }
        }
    }
    Ok(())
}

/// `number_seq` is an `INTEGER` column.
fn sequence_column(number: &InvoiceNumber) -> Result<i32, StoreError> {
    i32::try_from(number.sequence())
        .map_err(|_| StoreError::CheckViolation(format!("invoice number {number} out of range")))
}

/// Entries mirroring invoice state keep their amount and cannot be deleted.
async fn ensure_unbacked(
    tx: &mut Transaction<'_, Postgres>,
    id: EntryId,
    ref_type: Option<String>,
) -> Result<(), StoreError> {
    let paid_by: Option<Uuid> =
        sqlx::query_scalar("SELECT invoice_id FROM payments WHERE entry_id = $1 LIMIT 1 FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("check_entry_payments", e))?;
    if let Some(invoice_id) = paid_by {
        return Err(StoreError::ForeignKeyViolation(format!(
            "ledger entry {id} is referenced by a payment on invoice {invoice_id}"
        )));
    }
    if matches!(
        ref_type.map(ReferenceKind::from),
        Some(ReferenceKind::Invoice | ReferenceKind::Payment)
    ) {
        return Err(StoreError::ForeignKeyViolation(format!(
            "ledger entry {id} backs an invoice"
        )));
    }
    Ok(())
}

async fn upsert_note(
    tx: &mut Transaction<'_, Postgres>,
    entry_id: EntryId,
    note: CashNote,
) -> Result<(), StoreError> {
    if note.entry_id != entry_id {
        return Err(StoreError::CheckViolation(format!(
            "cash note for {} attached to entry {entry_id}",
            note.entry_id
        )));
    }
    sqlx::query(
        r#"
        INSERT INTO cash_notes (entry_id, summary) VALUES ($1, $2)
        ON CONFLICT (entry_id) DO UPDATE SET summary = EXCLUDED.summary
        "#,
    )
    .bind(entry_id.as_uuid())
    .bind(&note.summary)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("upsert_note", e))?;
    Ok(())
}

async fn insert_payment(
    tx: &mut Transaction<'_, Postgres>,
    invoice_id: InvoiceId,
    payment: &Payment,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO payments (id, invoice_id, amount, paid_at, entry_id) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(payment.id.as_uuid())
    .bind(invoice_id.as_uuid())
    .bind(payment.amount.value())
    .bind(payment.paid_at)
    .bind(payment.entry_id.map(|id| *id.as_uuid()))
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_payment", e))?;
    Ok(())
}

async fn load_chart(conn: &mut sqlx::PgConnection) -> Result<ChartOfAccounts, StoreError> {
    let rows = sqlx::query("SELECT code, name, account_type, is_cash_like FROM accounts ORDER BY code")
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("load_chart", e))?;

    let mut accounts = Vec::with_capacity(rows.len());
    for row in &rows {
        let account = AccountRow::from_row(row)
            .map_err(|e| map_sqlx_error("load_chart", e))?
            .into_account()?;
        accounts.push(account);
    }
    ChartOfAccounts::from_accounts(accounts).map_err(corrupt)
}

const INVOICE_SELECT: &str = r#"
    SELECT id, number_year, number_seq, customer_id, subtotal, total,
           issue_date, due_date, status, created_at
    FROM invoices
"#;

async fn load_invoice(
    conn: &mut sqlx::PgConnection,
    id: InvoiceId,
    for_update: bool,
) -> Result<Option<Invoice>, StoreError> {
    let sql = if for_update {
        format!("{INVOICE_SELECT} WHERE id = $1 FOR UPDATE")
    } else {
        format!("{INVOICE_SELECT} WHERE id = $1")
    };
    let row = sqlx::query(&sql)
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("load_invoice", e))?;

    let Some(row) = row else {
        return Ok(None);
    };
    let mut invoice = InvoiceRow::from_row(&row)
        .map_err(|e| map_sqlx_error("load_invoice", e))?
        .into_invoice()?;
    invoice.payments = load_payments(conn, Some(id)).await?.remove(&id).unwrap_or_default();
    Ok(Some(invoice))
}

/// Payments grouped by invoice, oldest first.
async fn load_payments(
    conn: &mut sqlx::PgConnection,
    invoice_id: Option<InvoiceId>,
) -> Result<HashMap<InvoiceId, Vec<Payment>>, StoreError> {
    let rows = sqlx::query(
        r#"
        SELECT id, invoice_id, amount, paid_at, entry_id
        FROM payments
        WHERE ($1::uuid IS NULL OR invoice_id = $1)
        ORDER BY paid_at ASC, id ASC
        "#,
    )
    .bind(invoice_id.map(|id| *id.as_uuid()))
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("load_payments", e))?;

    let mut grouped: HashMap<InvoiceId, Vec<Payment>> = HashMap::new();
    for row in &rows {
        let payment = PaymentRow::from_row(row).map_err(|e| map_sqlx_error("load_payments", e))?;
        let invoice_id = InvoiceId::from_uuid(payment.invoice_id);
        grouped.entry(invoice_id).or_default().push(payment.into_payment()?);
    }
    Ok(grouped)
}

fn invoice_number(year: i32, seq: i32) -> Result<InvoiceNumber, StoreError> {
    let seq = u32::try_from(seq).map_err(|_| StoreError::Backend(format!("invalid invoice sequence {seq}")))?;
    InvoiceNumber::new(year, seq).map_err(corrupt)
}

/// Rows that violate domain invariants were not written by this store.
fn corrupt(err: tamirhane_core::DomainError) -> StoreError {
    StoreError::Backend(format!("corrupt ledger row: {err}"))
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::UniqueViolation(msg),
                Some("23503") => StoreError::ForeignKeyViolation(msg),
                Some("23514") => StoreError::CheckViolation(msg),
                Some("40001") | Some("40P01") => StoreError::SerializationFailure(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => StoreError::Backend(format!("connection pool closed in {operation}")),
        sqlx::Error::RowNotFound => StoreError::NotFound(format!("unexpected row not found in {operation}")),
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}

// SQLx row types

#[derive(Debug)]
struct AccountRow {
    code: String,
    name: String,
    account_type: String,
    is_cash_like: bool,
}

impl<'r> FromRow<'r, PgRow> for AccountRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(AccountRow {
            code: row.try_get("code")?,
            name: row.try_get("name")?,
            account_type: row.try_get("account_type")?,
            is_cash_like: row.try_get("is_cash_like")?,
        })
    }
}

impl AccountRow {
    fn into_account(self) -> Result<Account, StoreError> {
        Ok(Account {
            code: AccountCode::new(self.code).map_err(corrupt)?,
            name: self.name,
            account_type: AccountType::from_str(&self.account_type).map_err(corrupt)?,
            is_cash_like: self.is_cash_like,
        })
    }
}

#[derive(Debug)]
struct EntryRow {
    id: Uuid,
    entry_date: NaiveDate,
    debit_code: String,
    credit_code: String,
    amount: Decimal,
    note: Option<String>,
    ref_type: Option<String>,
    ref_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for EntryRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(EntryRow {
            id: row.try_get("id")?,
            entry_date: row.try_get("entry_date")?,
            debit_code: row.try_get("debit_code")?,
            credit_code: row.try_get("credit_code")?,
            amount: row.try_get("amount")?,
            note: row.try_get("note")?,
            ref_type: row.try_get("ref_type")?,
            ref_id: row.try_get("ref_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl EntryRow {
    fn into_entry(self) -> Result<LedgerEntry, StoreError> {
        let sides = EntrySides::new(
            AccountCode::new(self.debit_code).map_err(corrupt)?,
            AccountCode::new(self.credit_code).map_err(corrupt)?,
        )
        .map_err(corrupt)?;
        let reference = self.ref_type.map(|kind| EntryReference::new(kind, self.ref_id));
        Ok(LedgerEntry::new(
            EntryId::from_uuid(self.id),
            self.entry_date,
            sides,
            Amount::new(self.amount).map_err(corrupt)?,
            self.note,
            reference,
            self.created_at,
        ))
    }
}

#[derive(Debug)]
struct InvoiceRow {
    id: Uuid,
    number_year: i32,
    number_seq: i32,
    customer_id: Uuid,
    subtotal: Decimal,
    total: Decimal,
    issue_date: NaiveDate,
    due_date: Option<NaiveDate>,
    status: String,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for InvoiceRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(InvoiceRow {
            id: row.try_get("id")?,
            number_year: row.try_get("number_year")?,
            number_seq: row.try_get("number_seq")?,
            customer_id: row.try_get("customer_id")?,
            subtotal: row.try_get("subtotal")?,
            total: row.try_get("total")?,
            issue_date: row.try_get("issue_date")?,
            due_date: row.try_get("due_date")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl InvoiceRow {
    fn into_invoice(self) -> Result<Invoice, StoreError> {
        Ok(Invoice {
            id: InvoiceId::from_uuid(self.id),
            number: invoice_number(self.number_year, self.number_seq)?,
            customer_id: CustomerId::from_uuid(self.customer_id),
            subtotal: Money::new(self.subtotal),
            total: Amount::new(self.total).map_err(corrupt)?,
            issue_date: self.issue_date,
            due_date: self.due_date,
            status: InvoiceStatus::from_str(&self.status).map_err(corrupt)?,
            payments: Vec::new(),
            created_at: self.created_at,
        })
    }
}

#[derive(Debug)]
struct PaymentRow {
    id: Uuid,
    invoice_id: Uuid,
    amount: Decimal,
    paid_at: DateTime<Utc>,
    entry_id: Option<Uuid>,
}

impl<'r> FromRow<'r, PgRow> for PaymentRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(PaymentRow {
            id: row.try_get("id")?,
            invoice_id: row.try_get("invoice_id")?,
            amount: row.try_get("amount")?,
            paid_at: row.try_get("paid_at")?,
            entry_id: row.try_get("entry_id")?,
        })
    }
}

impl PaymentRow {
    fn into_payment(self) -> Result<Payment, StoreError> {
        Ok(Payment {
            id: PaymentId::from_uuid(self.id),
            amount: Amount::new(self.amount).map_err(corrupt)?,
            paid_at: self.paid_at,
            entry_id: self.entry_id.map(EntryId::from_uuid),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequences_beyond_the_column_range_are_rejected() {
        let last = InvoiceNumber::new(2026, i32::MAX as u32).unwrap();
        assert_eq!(sequence_column(&last).unwrap(), i32::MAX);

        let overflow = InvoiceNumber::new(2026, i32::MAX as u32 + 1).unwrap();
        assert!(matches!(sequence_column(&overflow), Err(StoreError::CheckViolation(_))));
    }
}
