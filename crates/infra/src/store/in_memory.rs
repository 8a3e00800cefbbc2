use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use tamirhane_accounting::{CashNote, ChartOfAccounts, LedgerEntry};
use tamirhane_core::{DomainError, Entity, EntryId, InvoiceId};
use tamirhane_invoicing::{Invoice, InvoiceNumber};

use super::{LedgerSnapshot, LedgerStore, LedgerWrite, StoreError};

#[derive(Debug, Clone, Default)]
struct State {
    chart: ChartOfAccounts,
    /// Keyed by time-ordered ids, so iteration follows creation order.
    entries: BTreeMap<EntryId, LedgerEntry>,
    notes: HashMap<EntryId, CashNote>,
    invoices: BTreeMap<InvoiceId, Invoice>,
}

impl State {
    fn apply(&mut self, write: LedgerWrite) -> Result<(), StoreError> {
        match write {
            LedgerWrite::InsertAccount(account) => {
                if self.chart.get(&account.code).is_some() {
                    return Err(StoreError::UniqueViolation(format!(
                        "account code {}",
                        account.code
                    )));
                }
                self.chart
                    .insert(account)
                    .map_err(|e| StoreError::UniqueViolation(e.to_string()))
            }
            LedgerWrite::RemoveAccount(code) => self
                .chart
                .remove(&code, self.entries.values())
                .map(|_| ())
                .map_err(|e| match e {
                    DomainError::NotFound { .. } => StoreError::NotFound(format!("account {code}")),
                    other => StoreError::ForeignKeyViolation(other.to_string()),
                }),
            LedgerWrite::InsertEntry { entry, note } => {
                let id = *entry.id();
                if self.entries.contains_key(&id) {
                    return Err(StoreError::UniqueViolation(format!("ledger entry {id}")));
                }
                for code in [entry.debit(), entry.credit()] {
                    if self.chart.get(code).is_none() {
                        return Err(StoreError::ForeignKeyViolation(format!(
                            "ledger entry {id} references missing account {code}"
                        )));
                    }
                }
                self.attach_note(id, note)?;
                self.entries.insert(id, entry);
                Ok(())
            }
            LedgerWrite::UpdateEntry { entry, note } => {
                let id = *entry.id();
                let existing = self
                    .entries
                    .get(&id)
                    .ok_or_else(|| StoreError::NotFound(format!("ledger entry {id}")))?;
                if existing.sides() != entry.sides() {
                    return Err(StoreError::CheckViolation(format!(
                        "accounts of ledger entry {id} cannot change"
                    )));
                }
                if existing.amount() != entry.amount() {
                    self.ensure_unbacked(existing)?;
                }
                self.attach_note(id, note)?;
                self.entries.insert(id, entry);
                Ok(())
            }
            LedgerWrite::DeleteEntry(id) => {
                let entry = self
                    .entries
                    .get(&id)
                    .ok_or_else(|| StoreError::NotFound(format!("ledger entry {id}")))?;
                self.ensure_unbacked(entry)?;
                self.entries.remove(&id);
                self.notes.remove(&id);
                Ok(())
            }
            LedgerWrite::InsertInvoice(invoice) => {
                if self.invoices.contains_key(&invoice.id) {
                    return Err(StoreError::UniqueViolation(format!("invoice {}", invoice.id)));
                }
                if self.invoices.values().any(|inv| inv.number == invoice.number) {
                    return Err(StoreError::UniqueViolation(format!(
                        "invoice number {}",
                        invoice.number
                    )));
                }
                self.invoices.insert(invoice.id, invoice);
                Ok(())
            }
            LedgerWrite::InsertPayment { invoice_id, payment } => {
                if let Some(entry_id) = payment.entry_id {
                    if !self.entries.contains_key(&entry_id) {
                        return Err(StoreError::ForeignKeyViolation(format!(
                            "payment references missing ledger entry {entry_id}"
                        )));
                    }
                }
                let invoice = self.invoices.get_mut(&invoice_id).ok_or_else(|| {
                    StoreError::ForeignKeyViolation(format!("payment references missing invoice {invoice_id}"))
                })?;
                invoice
                    .add_payment(payment)
                    .map_err(|e| StoreError::CheckViolation(e.to_string()))
            }
            LedgerWrite::SetInvoiceStatus { invoice_id, status } => {
                let invoice = self
                    .invoices
                    .get_mut(&invoice_id)
                    .ok_or_else(|| StoreError::NotFound(format!("invoice {invoice_id}")))?;
                invoice.status = status;
                Ok(())
            }
        }
    }

    /// Entries mirroring invoice state keep their amount and cannot be deleted.
    fn ensure_unbacked(&self, entry: &LedgerEntry) -> Result<(), StoreError> {
        let id = entry.id();
        if let Some(invoice) = self.invoices.values().find(|inv| inv.references_entry(id)) {
            return Err(StoreError::ForeignKeyViolation(format!(
                "ledger entry {id} is referenced by a payment on invoice {}",
                invoice.number
            )));
        }
        if entry.backs_invoice() {
            return Err(StoreError::ForeignKeyViolation(format!(
                "ledger entry {id} backs an invoice"
            )));
        }
        Ok(())
    }

    fn attach_note(&mut self, id: EntryId, note: Option<CashNote>) -> Result<(), StoreError> {
        if let Some(note) = note {
            if note.entry_id != id {
                return Err(StoreError::CheckViolation(format!(
                    "cash note for {} attached to entry {id}",
                    note.entry_id
                )));
            }
            self.notes.insert(id, note);
        }
        Ok(())
    }
}

/// In-memory ledger store.
///
/// Intended for tests/dev. A commit applies its batch to a copy of the state under
/// the write lock and swaps it in only when every write succeeded; readers hold the
/// read lock, so they see either the whole batch or none of it.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<State>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a chart of accounts.
    pub fn with_chart(chart: ChartOfAccounts) -> Self {
        Self {
            state: RwLock::new(State {
                chart,
                ..State::default()
            }),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn chart(&self) -> Result<ChartOfAccounts, StoreError> {
        Ok(self.read()?.chart.clone())
    }

    async fn entry(&self, id: EntryId) -> Result<Option<(LedgerEntry, Option<CashNote>)>, StoreError> {
        let state = self.read()?;
        Ok(state
            .entries
            .get(&id)
            .map(|e| (e.clone(), state.notes.get(&id).cloned())))
    }

    async fn invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, StoreError> {
        Ok(self.read()?.invoices.get(&id).cloned())
    }

    async fn invoice_numbers(&self, year: i32) -> Result<Vec<InvoiceNumber>, StoreError> {
        Ok(self
            .read()?
            .invoices
            .values()
            .map(|inv| inv.number)
            .filter(|n| n.year() == year)
            .collect())
    }

    async fn snapshot(&self) -> Result<LedgerSnapshot, StoreError> {
        let state = self.read()?;
        Ok(LedgerSnapshot {
            chart: state.chart.clone(),
            entries: state.entries.values().cloned().collect(),
            notes: state.notes.clone(),
            invoices: state.invoices.values().cloned().collect(),
        })
    }

    async fn commit(&self, writes: Vec<LedgerWrite>) -> Result<(), StoreError> {
        if writes.is_empty() {
            return Ok(());
        }

        let mut state = self
            .state
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;

        let mut next = state.clone();
        for write in writes {
            next.apply(write)?;
        }
        *state = next;
        Ok(())
    }
}
