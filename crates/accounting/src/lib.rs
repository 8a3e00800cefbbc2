//! Accounting module (double-entry ledger).
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.
//! The infrastructure crate owns committing postings and reading snapshots.

pub mod account;
pub mod balance;
pub mod entry;
pub mod narrative;
pub mod posting;

pub use account::{Account, AccountCode, AccountType, ChartOfAccounts};
pub use balance::{
    BalanceSummary, DateRange, account_balance, accounts_receivable, cash_balance,
    cash_contribution, total_expenses, total_revenue,
};
pub use entry::{
    CashNote, EntryCorrection, EntryReference, EntrySides, LedgerEntry, ReferenceKind, Side,
};
pub use narrative::{describe, summarize};
pub use posting::{PostingPattern, PostingRequest, ValidatedPosting, validate};
