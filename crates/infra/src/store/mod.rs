//! Persistence boundary for the ledger.
//!
//! The store is the only component that touches durable state. It owns three
//! guarantees the ledger relies on:
//!
//! - **Atomic batches**: [`LedgerStore::commit`] applies every [`LedgerWrite`] of a
//!   batch or none of them. A posted entry and its CashNote, or a payment and the
//!   entry that moved its money, always land together.
//! - **Constraints**: unique account codes and invoice numbers, entries may only
//!   reference existing accounts, accounts and entries still referenced cannot be
//!   removed, deleting an entry cascades to its CashNote.
//! - **Consistent snapshots**: [`LedgerStore::snapshot`] never observes a partially
//!   applied batch.
//!
//! Balances are never stored here; readers fold over the snapshot.

pub mod in_memory;
pub mod postgres;

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use tamirhane_accounting::{Account, AccountCode, CashNote, ChartOfAccounts, LedgerEntry};
use tamirhane_core::{EntryId, InvoiceId};
use tamirhane_invoicing::{Invoice, InvoiceNumber, InvoiceStatus, Payment};

pub use in_memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;

/// Storage operation error.
///
/// These are **infrastructure errors** (constraints, isolation, backend failures) as
/// opposed to domain errors (validation, invariants).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("check constraint violated: {0}")]
    CheckViolation(String),

    /// Concurrent conflict (serialization failure, deadlock); nothing was written.
    #[error("serialization failure: {0}")]
    SerializationFailure(String),

    #[error("row not found: {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// One write inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerWrite {
    InsertAccount(Account),
    RemoveAccount(AccountCode),
    InsertEntry {
        entry: LedgerEntry,
        note: Option<CashNote>,
    },
    /// Replace amount/date/note of an existing entry; `note` upserts the CashNote.
    UpdateEntry {
        entry: LedgerEntry,
        note: Option<CashNote>,
    },
    DeleteEntry(EntryId),
    InsertInvoice(Invoice),
    /// Append a payment; the store rejects payments on void invoices and payments
    /// exceeding the outstanding balance.
    InsertPayment {
        invoice_id: InvoiceId,
        payment: Payment,
    },
    SetInvoiceStatus {
        invoice_id: InvoiceId,
        status: InvoiceStatus,
    },
}

/// Everything a read query needs, captured at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub chart: ChartOfAccounts,
    /// Ordered by creation.
    pub entries: Vec<LedgerEntry>,
    pub notes: HashMap<EntryId, CashNote>,
    pub invoices: Vec<Invoice>,
}

/// Durable, transactional ledger storage.
///
/// Implementations must:
/// - apply each `commit` batch atomically (all or nothing)
/// - enforce the constraints listed in the module docs
/// - serve `snapshot` from a single consistent read (at least read-committed, never
///   half of a batch)
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    /// Current chart of accounts.
    async fn chart(&self) -> Result<ChartOfAccounts, StoreError>;

    /// A single entry with its CashNote, if any.
    async fn entry(&self, id: EntryId) -> Result<Option<(LedgerEntry, Option<CashNote>)>, StoreError>;

    /// A single invoice with its payments.
    async fn invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, StoreError>;

    /// Invoice numbers already issued for `year`.
    async fn invoice_numbers(&self, year: i32) -> Result<Vec<InvoiceNumber>, StoreError>;

    /// Consistent view of accounts, entries, notes and invoices.
    async fn snapshot(&self) -> Result<LedgerSnapshot, StoreError>;

    /// Apply a batch of writes atomically.
    async fn commit(&self, writes: Vec<LedgerWrite>) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn chart(&self) -> Result<ChartOfAccounts, StoreError> {
        (**self).chart().await
    }

    async fn entry(&self, id: EntryId) -> Result<Option<(LedgerEntry, Option<CashNote>)>, StoreError> {
        (**self).entry(id).await
    }

    async fn invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, StoreError> {
        (**self).invoice(id).await
    }

    async fn invoice_numbers(&self, year: i32) -> Result<Vec<InvoiceNumber>, StoreError> {
        (**self).invoice_numbers(year).await
    }

    async fn snapshot(&self) -> Result<LedgerSnapshot, StoreError> {
        (**self).snapshot().await
    }

    async fn commit(&self, writes: Vec<LedgerWrite>) -> Result<(), StoreError> {
        (**self).commit(writes).await
    }
}
