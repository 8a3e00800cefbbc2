//! Read side: every query folds over one consistent store snapshot.
//!
//! Nothing here is cached between calls. Each query takes a fresh snapshot, so a
//! posting committed a moment ago is always reflected and a half-applied batch is
//! never observed.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use tamirhane_accounting::{
    Account, AccountCode, BalanceSummary, DateRange, LedgerEntry, account_balance,
    accounts_receivable, cash_balance, describe, total_expenses, total_revenue,
};
use tamirhane_core::{DomainError, DomainResult, Entity, EntryId, InvoiceId, Money};
use tamirhane_invoicing::{InvoiceStatus, InvoiceView, with_status};

use crate::engine::AccountRoles;
use crate::store::{LedgerSnapshot, LedgerStore};

/// An entry paired with its display text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribedEntry {
    pub entry: LedgerEntry,
    pub description: String,
    /// Whether `description` is a stored CashNote summary rather than a generated one.
    pub from_note: bool,
}

#[derive(Debug)]
pub struct LedgerReader<S> {
    store: S,
    receivables: AccountCode,
}

impl<S> LedgerReader<S> {
    pub fn new(store: S) -> Self {
        Self::with_roles(store, &AccountRoles::standard())
    }

    pub fn with_roles(store: S, roles: &AccountRoles) -> Self {
        Self {
            store,
            receivables: roles.receivables.clone(),
        }
    }
}

impl<S> LedgerReader<S>
where
    S: LedgerStore,
{
    async fn snapshot(&self) -> DomainResult<LedgerSnapshot> {
        let snapshot = self.store.snapshot().await?;
        debug!(entries = snapshot.entries.len(), invoices = snapshot.invoices.len(), "snapshot loaded");
        Ok(snapshot)
    }

    /// `findAccountByCode`: lookup by stable code, never by display name.
    pub async fn find_account(&self, code: &str) -> DomainResult<Account> {
        let chart = self.store.chart().await?;
        Ok(chart.find_by_code(code)?.clone())
    }

    pub async fn accounts(&self) -> DomainResult<Vec<Account>> {
        Ok(self.store.chart().await?.accounts().cloned().collect())
    }

    #[instrument(skip(self), err)]
    pub async fn cash_balance(&self, range: DateRange) -> DomainResult<Money> {
        let snapshot = self.snapshot().await?;
        Ok(cash_balance(&snapshot.chart, &snapshot.entries, range))
    }

    #[instrument(skip(self), err)]
    pub async fn total_revenue(&self, range: DateRange) -> DomainResult<Money> {
        let snapshot = self.snapshot().await?;
        Ok(total_revenue(&snapshot.chart, &snapshot.entries, range))
    }

    #[instrument(skip(self), err)]
    pub async fn total_expenses(&self, range: DateRange) -> DomainResult<Money> {
        let snapshot = self.snapshot().await?;
        Ok(total_expenses(&snapshot.chart, &snapshot.entries, range))
    }

    #[instrument(skip(self), err)]
    pub async fn accounts_receivable(&self, range: DateRange) -> DomainResult<Money> {
        let snapshot = self.snapshot().await?;
        Ok(accounts_receivable(&self.receivables, &snapshot.entries, range))
    }

    /// All four headline totals from one snapshot.
    #[instrument(skip(self), err)]
    pub async fn summary(&self, range: DateRange) -> DomainResult<BalanceSummary> {
        let snapshot = self.snapshot().await?;
        Ok(BalanceSummary::compute(
            &snapshot.chart,
            &self.receivables,
            &snapshot.entries,
            range,
        ))
    }

    /// Debit-positive balance of every account in the chart, keyed by code.
    #[instrument(skip(self), err)]
    pub async fn account_balances(&self, range: DateRange) -> DomainResult<BTreeMap<AccountCode, Money>> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot
            .chart
            .accounts()
            .map(|a| (a.code.clone(), account_balance(&a.code, &snapshot.entries, range)))
            .collect())
    }

    /// Invoice with its balance and effective status as of `today`.
    #[instrument(skip(self), fields(invoice_id = %id), err)]
    pub async fn invoice_view(&self, id: InvoiceId, today: NaiveDate) -> DomainResult<InvoiceView> {
        let invoice = self
            .store
            .invoice(id)
            .await?
            .ok_or_else(|| DomainError::not_found("invoice", id.to_string()))?;
        Ok(InvoiceView::of(&invoice, today))
    }

    /// Invoices whose effective status is `status`, e.g. the overdue list.
    #[instrument(skip(self), err)]
    pub async fn invoices_with_status(
        &self,
        status: InvoiceStatus,
        today: NaiveDate,
    ) -> DomainResult<Vec<InvoiceView>> {
        let snapshot = self.snapshot().await?;
        Ok(with_status(&snapshot.invoices, status, today))
    }

    /// Entries in `range`, each with its CashNote summary or the generated narrative.
    #[instrument(skip(self), err)]
    pub async fn describe_entries(&self, range: DateRange) -> DomainResult<Vec<DescribedEntry>> {
        let snapshot = self.snapshot().await?;
        snapshot
            .entries
            .iter()
            .filter(|e| range.contains(e.date()))
            .map(|entry| describe_one(&snapshot, entry))
            .collect()
    }

    /// Display text for a single entry.
    pub async fn describe_entry(&self, id: EntryId) -> DomainResult<DescribedEntry> {
        let (entry, note) = self
            .store
            .entry(id)
            .await?
            .ok_or_else(|| DomainError::not_found("ledger_entry", id.to_string()))?;
        let chart = self.store.chart().await?;
        let debit = chart.resolve("debit_code", entry.debit().as_str())?;
        let credit = chart.resolve("credit_code", entry.credit().as_str())?;
        Ok(DescribedEntry {
            description: describe(&entry, note.as_ref(), debit, credit),
            from_note: note.is_some(),
            entry,
        })
    }
}

fn describe_one(snapshot: &LedgerSnapshot, entry: &LedgerEntry) -> DomainResult<DescribedEntry> {
    let debit = snapshot.chart.resolve("debit_code", entry.debit().as_str())?;
    let credit = snapshot.chart.resolve("credit_code", entry.credit().as_str())?;
    let note = snapshot.notes.get(entry.id());
    Ok(DescribedEntry {
        entry: entry.clone(),
        description: describe(entry, note, debit, credit),
        from_note: note.is_some(),
    })
}
