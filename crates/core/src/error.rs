//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Storage failures are mapped into this type exactly once,
/// at the boundary where the persistence layer is called.
///
/// Every caller-facing variant carries the offending field or key so the request
/// layer can render a precise message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A debit or credit account code did not resolve to a registered account.
    #[error("unknown account for {field}: {code}")]
    UnknownAccount { field: &'static str, code: String },

    /// An amount was zero, negative, non-finite, unparsable or too precise.
    #[error("invalid amount for {field}: {reason}")]
    InvalidAmount { field: &'static str, reason: String },

    /// Debit and credit resolve to the same account.
    #[error("debit and credit must differ (both are {code})")]
    SameAccount { code: String },

    /// A removal was refused because the resource is still referenced.
    #[error("{resource} {id} is still referenced: {reason}")]
    ReferentialIntegrity {
        resource: &'static str,
        id: String,
        reason: String,
    },

    /// The atomic commit failed; nothing was written and the caller may retry the
    /// whole logical operation.
    #[error("transaction aborted: {0}")]
    TransactionAborted(String),

    /// A requested resource does not exist.
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    /// A conflicting state (duplicate key, void invoice, ...).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),
}

impl DomainError {
    pub fn unknown_account(field: &'static str, code: impl Into<String>) -> Self {
        Self::UnknownAccount {
            field,
            code: code.into(),
        }
    }

    pub fn invalid_amount(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidAmount {
            field,
            reason: reason.into(),
        }
    }

    pub fn referenced(
        resource: &'static str,
        id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ReferentialIntegrity {
            resource,
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            id: id.into(),
        }
    }

    pub fn aborted(msg: impl Into<String>) -> Self {
        Self::TransactionAborted(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::UnknownAccount { .. } => "unknown_account",
            DomainError::InvalidAmount { .. } => "invalid_amount",
            DomainError::SameAccount { .. } => "same_account",
            DomainError::ReferentialIntegrity { .. } => "referential_integrity",
            DomainError::TransactionAborted(_) => "transaction_aborted",
            DomainError::NotFound { .. } => "not_found",
            DomainError::Conflict(_) => "conflict",
            DomainError::Validation(_) => "validation_error",
        }
    }

    /// The request field that caused the error, if any.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            DomainError::UnknownAccount { field, .. }
            | DomainError::InvalidAmount { field, .. } => Some(*field),
            DomainError::SameAccount { .. } => Some("credit_code"),
            _ => None,
        }
    }

    /// Whether the caller should retry the whole logical operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DomainError::TransactionAborted(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_name_the_offending_field() {
        let err = DomainError::unknown_account("debit_code", "9999");
        assert_eq!(err.code(), "unknown_account");
        assert_eq!(err.field(), Some("debit_code"));
        assert_eq!(err.to_string(), "unknown account for debit_code: 9999");

        let err = DomainError::invalid_amount("amount", "must be positive");
        assert_eq!(err.field(), Some("amount"));
    }

    #[test]
    fn only_aborted_transactions_are_retryable() {
        assert!(DomainError::aborted("serialization failure").is_retryable());
        assert!(!DomainError::conflict("duplicate").is_retryable());
        assert!(!DomainError::not_found("entry", "x").is_retryable());
    }
}
