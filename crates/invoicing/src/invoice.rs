use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use tamirhane_core::{
    Amount, CURRENCY_SCALE, CustomerId, DomainError, DomainResult, Entity, EntryId, InvoiceId, Money,
    PaymentId,
};

/// Invoice status. Stored on the invoice as a default; read paths recompute it
/// with [`crate::effective_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Open,
    Paid,
    Overdue,
    Void,
}

impl InvoiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Open => "open",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Void => "void",
        }
    }
}

impl core::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for InvoiceStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(InvoiceStatus::Open),
            "paid" => Ok(InvoiceStatus::Paid),
            "overdue" => Ok(InvoiceStatus::Overdue),
            "void" => Ok(InvoiceStatus::Void),
            other => Err(DomainError::validation(format!("unknown invoice status '{other}'"))),
        }
    }
}

/// Invoice number, unique and sequential per year: `2026-0001`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InvoiceNumber {
    year: i32,
    sequence: u32,
}

impl InvoiceNumber {
    pub fn new(year: i32, sequence: u32) -> DomainResult<Self> {
        if sequence == 0 {
            return Err(DomainError::validation("invoice sequence starts at 1"));
        }
        Ok(Self { year, sequence })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// The number following the highest existing number of `year`.
    pub fn next_for_year<'a>(
        year: i32,
        existing: impl IntoIterator<Item = &'a InvoiceNumber>,
    ) -> Self {
        let last = existing
            .into_iter()
            .filter(|n| n.year == year)
            .map(|n| n.sequence)
            .max()
            .unwrap_or(0);
        Self {
            year,
            sequence: last + 1,
        }
    }
}

impl core::fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}-{:04}", self.year, self.sequence)
    }
}

impl core::str::FromStr for InvoiceNumber {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::validation(format!("invalid invoice number '{s}'"));
        let (year, sequence) = s.split_once('-').ok_or_else(invalid)?;
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let sequence = sequence.parse::<u32>().map_err(|_| invalid())?;
        Self::new(year, sequence)
    }
}

impl TryFrom<String> for InvoiceNumber {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InvoiceNumber> for String {
    fn from(value: InvoiceNumber) -> Self {
        value.to_string()
    }
}

/// A payment recorded against an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub amount: Amount,
    pub paid_at: DateTime<Utc>,
    /// Ledger entry that moved the money, when posted through the ledger.
    pub entry_id: Option<EntryId>,
}

/// Input for issuing an invoice; the number is assigned at issue time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueInvoice {
    pub customer_id: CustomerId,
    pub subtotal: Money,
    pub total: Amount,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
}

/// Customer-facing receivable. Owns its payments.
///
/// The posting engine is the only writer; other code reads invoices and derives
/// their state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub number: InvoiceNumber,
    pub customer_id: CustomerId,
    pub subtotal: Money,
    /// Gross, tax-inclusive.
    pub total: Amount,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub status: InvoiceStatus,
    pub payments: Vec<Payment>,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    pub fn issue(
        id: InvoiceId,
        number: InvoiceNumber,
        cmd: &IssueInvoice,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if cmd.subtotal < Money::ZERO {
            return Err(DomainError::invalid_amount("subtotal", "must not be negative"));
        }
        if cmd.subtotal.value().normalize().scale() > CURRENCY_SCALE {
            return Err(DomainError::invalid_amount(
                "subtotal",
                format!("more than {CURRENCY_SCALE} decimal places (got {})", cmd.subtotal.value()),
            ));
        }
        if cmd.subtotal > cmd.total.money() {
            return Err(DomainError::invalid_amount(
                "subtotal",
                format!("exceeds gross total {}", cmd.total),
            ));
        }
        if cmd.due_date.is_some_and(|due| due < cmd.issue_date) {
            return Err(DomainError::validation("due date precedes issue date"));
        }
        if number.year() != cmd.issue_date.year() {
            return Err(DomainError::validation(format!(
                "invoice number {number} does not belong to {}",
                cmd.issue_date.year()
            )));
        }

        Ok(Self {
            id,
            number,
            customer_id: cmd.customer_id,
            subtotal: cmd.subtotal,
            total: cmd.total,
            issue_date: cmd.issue_date,
            due_date: cmd.due_date,
            status: InvoiceStatus::Open,
            payments: Vec::new(),
            created_at,
        })
    }

    pub fn total_paid(&self) -> Money {
        self.payments.iter().map(|p| p.amount.money()).sum()
    }

    /// `total − Σ(payment amounts)`.
    pub fn balance(&self) -> Money {
        self.total.money() - self.total_paid()
    }

    /// Invariant: void invoices take no payments and nothing is paid past the total.
    pub fn add_payment(&mut self, payment: Payment) -> DomainResult<()> {
        if self.status == InvoiceStatus::Void {
            return Err(DomainError::conflict(format!(
                "invoice {} is void and cannot take payments",
                self.number
            )));
        }
        if payment.amount.money() > self.balance() {
            return Err(DomainError::invalid_amount(
                "amount",
                format!(
                    "payment {} exceeds outstanding balance {}",
                    payment.amount,
                    self.balance()
                ),
            ));
        }
        self.payments.push(payment);
        Ok(())
    }

    pub fn void(&mut self) -> DomainResult<()> {
        if self.status == InvoiceStatus::Void {
            return Err(DomainError::conflict(format!(
                "invoice {} is already void",
                self.number
            )));
        }
        self.status = InvoiceStatus::Void;
        Ok(())
    }

    pub fn references_entry(&self, entry_id: &EntryId) -> bool {
        self.payments.iter().any(|p| p.entry_id.as_ref() == Some(entry_id))
    }
}

impl Entity for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
