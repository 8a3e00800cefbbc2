//! `tamirhane-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{CustomerId, EntryId, InvoiceId, PaymentId};
pub use money::{Amount, CURRENCY_SCALE, Money};
pub use value_object::ValueObject;
