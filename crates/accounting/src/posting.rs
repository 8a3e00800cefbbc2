//! Posting validation: the pure half of the posting engine.
//!
//! A [`PostingRequest`] is what the request layer hands in. [`validate`] turns it into
//! a [`ValidatedPosting`] or rejects it before anything is written. Persisting the
//! result is the infrastructure layer's job.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tamirhane_core::{Amount, DomainError, DomainResult, EntryId};

use crate::account::{Account, AccountType, ChartOfAccounts};
use crate::entry::{CashNote, EntryReference, EntrySides, LedgerEntry, normalize_text};

/// `post(date, debitCode, creditCode, amount, note?, refType?, refId?, cashSummary?)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingRequest {
    pub date: NaiveDate,
    pub debit_code: String,
    pub credit_code: String,
    pub amount: Decimal,
    pub note: Option<String>,
    pub ref_type: Option<String>,
    pub ref_id: Option<String>,
    pub cash_summary: Option<String>,
}

impl PostingRequest {
    pub fn new(
        date: NaiveDate,
        debit_code: impl Into<String>,
        credit_code: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            date,
            debit_code: debit_code.into(),
            credit_code: credit_code.into(),
            amount,
            note: None,
            ref_type: None,
            ref_id: None,
            cash_summary: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_reference(mut self, ref_type: impl Into<String>, ref_id: Option<String>) -> Self {
        self.ref_type = Some(ref_type.into());
        self.ref_id = ref_id;
        self
    }

    pub fn with_cash_summary(mut self, summary: impl Into<String>) -> Self {
        self.cash_summary = Some(summary.into());
        self
    }
}

/// A request that passed every precondition, with both accounts resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPosting {
    pub date: NaiveDate,
    pub sides: EntrySides,
    pub amount: Amount,
    pub note: Option<String>,
    pub reference: Option<EntryReference>,
    pub cash_summary: Option<String>,
    pub debit: Account,
    pub credit: Account,
}

impl ValidatedPosting {
    /// Materialize the entry and its optional note; both belong to one unit of work.
    pub fn into_entry(self, id: EntryId, created_at: DateTime<Utc>) -> (LedgerEntry, Option<CashNote>) {
        let note = self
            .cash_summary
            .and_then(|summary| CashNote::new(id, summary));
        let entry = LedgerEntry::new(
            id,
            self.date,
            self.sides,
            self.amount,
            self.note,
            self.reference,
            created_at,
        );
        (entry, note)
    }
}

/// Check every precondition of a posting against the chart of accounts.
pub fn validate(request: &PostingRequest, chart: &ChartOfAccounts) -> DomainResult<ValidatedPosting> {
    let amount = Amount::for_field("amount", request.amount)?;

    if request.debit_code.trim() == request.credit_code.trim() {
        return Err(DomainError::SameAccount {
            code: request.debit_code.trim().to_string(),
        });
    }

    let debit = chart.resolve("debit_code", &request.debit_code)?.clone();
    let credit = chart.resolve("credit_code", &request.credit_code)?.clone();
    let sides = EntrySides::new(debit.code.clone(), credit.code.clone())?;

    let ref_id = normalize_text(request.ref_id.clone());
    let reference = match normalize_text(request.ref_type.clone()) {
        Some(kind) => Some(EntryReference::new(kind, ref_id)),
        None if ref_id.is_some() => {
            return Err(DomainError::validation("ref_id given without ref_type"));
        }
        None => None,
    };

    Ok(ValidatedPosting {
        date: request.date,
        sides,
        amount,
        note: normalize_text(request.note.clone()),
        reference,
        cash_summary: normalize_text(request.cash_summary.clone()),
        debit,
        credit,
    })
}

/// The two canonical shapes higher-level callers post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostingPattern {
    /// Debit a cash-like account, credit receivables or revenue.
    Income,
    /// Debit an expense account, credit a cash-like account.
    Expense,
}

impl PostingPattern {
    pub fn check(self, debit: &Account, credit: &Account) -> DomainResult<()> {
        match self {
            PostingPattern::Income => {
                if !debit.is_cash_like {
                    return Err(DomainError::validation(format!(
                        "income must debit a cash-like account ({} is not)",
                        debit.code
                    )));
                }
                let receivable =
                    credit.account_type == AccountType::Asset && !credit.is_cash_like;
                if credit.account_type != AccountType::Revenue && !receivable {
                    return Err(DomainError::validation(format!(
                        "income must credit receivables or revenue ({} is {})",
                        credit.code, credit.account_type
                    )));
                }
            }
            PostingPattern::Expense => {
                if debit.account_type != AccountType::Expense {
                    return Err(DomainError::validation(format!(
                        "expense must debit an expense account ({} is {})",
                        debit.code, debit.account_type
                    )));
                }
                if !credit.is_cash_like {
                    return Err(DomainError::validation(format!(
                        "expense must credit a cash-like account ({} is not)",
                        credit.code
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn reference_kind(self) -> &'static str {
        match self {
            PostingPattern::Income => "Income",
            PostingPattern::Expense => "Expense",
        }
    }
}
