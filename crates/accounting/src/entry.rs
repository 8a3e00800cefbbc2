//! Ledger entries: one balanced movement between exactly two accounts.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use tamirhane_core::{Amount, DomainError, DomainResult, Entity, EntryId, Money, ValueObject};

use crate::account::AccountCode;

/// The debit/credit pair of an entry.
///
/// Constructed only through [`EntrySides::new`], so an entry can never carry a
/// single side or two identical sides.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawSides")]
pub struct EntrySides {
    debit: AccountCode,
    credit: AccountCode,
}

#[derive(Deserialize)]
struct RawSides {
    debit: AccountCode,
    credit: AccountCode,
}

impl TryFrom<RawSides> for EntrySides {
    type Error = DomainError;

    fn try_from(raw: RawSides) -> Result<Self, Self::Error> {
        Self::new(raw.debit, raw.credit)
    }
}

impl EntrySides {
    pub fn new(debit: AccountCode, credit: AccountCode) -> DomainResult<Self> {
        if debit == credit {
            return Err(DomainError::SameAccount {
                code: debit.to_string(),
            });
        }
        Ok(Self { debit, credit })
    }

    pub fn debit(&self) -> &AccountCode {
        &self.debit
    }

    pub fn credit(&self) -> &AccountCode {
        &self.credit
    }
}

impl ValueObject for EntrySides {}

/// Side of a posting relative to one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Debit,
    Credit,
}

/// Kind of business object an entry links back to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReferenceKind {
    Payment,
    Expense,
    Invoice,
    Income,
    Other(String),
}

impl ReferenceKind {
    pub fn as_str(&self) -> &str {
        match self {
            ReferenceKind::Payment => "Payment",
            ReferenceKind::Expense => "Expense",
            ReferenceKind::Invoice => "Invoice",
            ReferenceKind::Income => "Income",
            ReferenceKind::Other(other) => other,
        }
    }
}

impl From<String> for ReferenceKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Payment" => ReferenceKind::Payment,
            "Expense" => ReferenceKind::Expense,
            "Invoice" => ReferenceKind::Invoice,
            "Income" => ReferenceKind::Income,
            _ => ReferenceKind::Other(value),
        }
    }
}

impl From<&str> for ReferenceKind {
    fn from(value: &str) -> Self {
        ReferenceKind::from(value.to_string())
    }
}

impl From<ReferenceKind> for String {
    fn from(value: ReferenceKind) -> Self {
        value.as_str().to_string()
    }
}

impl core::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional link from an entry to a business object (`"Payment"`, invoice id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryReference {
    pub kind: ReferenceKind,
    pub id: Option<String>,
}

impl EntryReference {
    pub fn new(kind: impl Into<ReferenceKind>, id: Option<String>) -> Self {
        Self {
            kind: kind.into(),
            id: normalize_text(id),
        }
    }
}

/// One atomic balanced posting touching exactly two accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    id: EntryId,
    date: NaiveDate,
    sides: EntrySides,
    amount: Amount,
    note: Option<String>,
    reference: Option<EntryReference>,
    created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Rebuild an entry from validated parts (posting engine and storage adapters).
    pub fn new(
        id: EntryId,
        date: NaiveDate,
        sides: EntrySides,
        amount: Amount,
        note: Option<String>,
        reference: Option<EntryReference>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            date,
            sides,
            amount,
            note: normalize_text(note),
            reference,
            created_at,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn sides(&self) -> &EntrySides {
        &self.sides
    }

    pub fn debit(&self) -> &AccountCode {
        self.sides.debit()
    }

    pub fn credit(&self) -> &AccountCode {
        self.sides.credit()
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn reference(&self) -> Option<&EntryReference> {
        self.reference.as_ref()
    }

    /// Issue, void and payment entries mirror invoice state; their amount is fixed.
    pub fn backs_invoice(&self) -> bool {
        matches!(
            self.reference.as_ref().map(|r| &r.kind),
            Some(ReferenceKind::Invoice | ReferenceKind::Payment)
        )
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn touches(&self, code: &AccountCode) -> bool {
        self.debit() == code || self.credit() == code
    }

    pub fn side_of(&self, code: &AccountCode) -> Option<Side> {
        if self.debit() == code {
            Some(Side::Debit)
        } else if self.credit() == code {
            Some(Side::Credit)
        } else {
            None
        }
    }

    /// Debit-positive movement of `code` caused by this entry.
    pub fn signed_movement(&self, code: &AccountCode) -> Money {
        match self.side_of(code) {
            Some(Side::Debit) => self.amount.money(),
            Some(Side::Credit) => -self.amount.money(),
            None => Money::ZERO,
        }
    }

    /// Apply a narrow correction; accounts and reference never change.
    pub fn corrected(&self, correction: &EntryCorrection) -> Self {
        let mut next = self.clone();
        if let Some(amount) = correction.amount {
            next.amount = amount;
        }
        if let Some(date) = correction.date {
            next.date = date;
        }
        if let Some(note) = &correction.note {
            next.note = normalize_text(Some(note.clone()));
        }
        next
    }
}

impl Entity for LedgerEntry {
    type Id = EntryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Precomputed human-readable summary attached one-to-one to an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashNote {
    pub entry_id: EntryId,
    pub summary: String,
}

impl CashNote {
    /// `None` when the summary is blank.
    pub fn new(entry_id: EntryId, summary: impl Into<String>) -> Option<Self> {
        normalize_text(Some(summary.into())).map(|summary| Self { entry_id, summary })
    }
}

/// The only mutable fields of a posted entry.
///
/// `note: Some("")` clears the note. `cash_summary` replaces the entry's CashNote,
/// creating one if the entry had none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryCorrection {
    pub amount: Option<Amount>,
    pub date: Option<NaiveDate>,
    pub note: Option<String>,
    pub cash_summary: Option<String>,
}

impl EntryCorrection {
    pub fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.date.is_none()
            && self.note.is_none()
            && normalize_text(self.cash_summary.clone()).is_none()
    }
}

/// Trim free text; blank means absent.
pub fn normalize_text(text: Option<String>) -> Option<String> {
    text.and_then(|t| {
        let trimmed = t.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
