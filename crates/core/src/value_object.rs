//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: two `Amount`s of
/// `250.00` are the same amount, while two ledger entries with identical fields are
/// still distinct entries.
///
/// To "modify" a value object, construct a new one through its validating
/// constructor; that constructor is the only place its invariants are checked.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
