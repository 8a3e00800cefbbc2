//! Narrative Summarizer: a display fallback for entries without a CashNote.
//!
//! The output is derived purely from the entry, its two accounts and its reference,
//! so the same inputs always produce the same string. It is never persisted.

use crate::account::{Account, AccountType};
use crate::entry::{CashNote, LedgerEntry, ReferenceKind};

/// Describe an entry from its accounts and reference.
pub fn summarize(entry: &LedgerEntry, debit: &Account, credit: &Account) -> String {
    let kind = entry.reference().map(|r| &r.kind);
    let receivable = |a: &Account| a.account_type == AccountType::Asset && !a.is_cash_like;

    let mut text = match kind {
        Some(ReferenceKind::Payment) if debit.is_cash_like && receivable(credit) => {
            format!("Customer collection into {}", debit.name)
        }
        Some(ReferenceKind::Expense) | None
            if debit.account_type == AccountType::Expense && credit.is_cash_like =>
        {
            format!("{} expense paid from {}", debit.name, credit.name)
        }
        Some(ReferenceKind::Expense) => format!("{} expense", debit.name),
        Some(ReferenceKind::Invoice) if receivable(debit) => {
            format!("Invoice issued: {} billed to {}", credit.name, debit.name)
        }
        _ if debit.is_cash_like && credit.is_cash_like => {
            format!("Transfer from {} to {}", credit.name, debit.name)
        }
        _ if debit.is_cash_like => format!("Receipt into {} from {}", debit.name, credit.name),
        _ if credit.is_cash_like => format!("Payment from {} for {}", credit.name, debit.name),
        _ => format!("{} / {}", debit.name, credit.name),
    };

    if let Some(id) = entry.reference().and_then(|r| r.id.as_deref()) {
        text.push_str(&format!(" ({} {id})", kind.map(ReferenceKind::as_str).unwrap_or("ref")));
    }
    if let Some(note) = entry.note() {
        text.push_str(": ");
        text.push_str(note);
    }
    text
}

/// Display text for an entry: its stored summary when present, otherwise the
/// generated narrative.
pub fn describe(
    entry: &LedgerEntry,
    note: Option<&CashNote>,
    debit: &Account,
    credit: &Account,
) -> String {
    match note {
        Some(note) => note.summary.clone(),
        None => summarize(entry, debit, credit),
    }
}
