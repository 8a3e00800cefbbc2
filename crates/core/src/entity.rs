//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Accounts are identified by their code, ledger entries and invoices by uuid ids.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
