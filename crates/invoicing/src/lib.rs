//! Invoicing domain module.
//!
//! This crate contains business rules for invoices and accounts receivable,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod invoice;
pub mod reconciliation;

pub use invoice::{Invoice, InvoiceNumber, InvoiceStatus, IssueInvoice, Payment};
pub use reconciliation::{InvoiceView, effective_status, with_status};
