//! Infrastructure layer: persistence, the posting engine, read queries and config.
//!
//! The domain crates decide; this crate reads what they need, commits what they
//! decide in atomic batches and serves reads from consistent snapshots.

pub mod config;
pub mod engine;
pub mod errors;
pub mod reader;
pub mod store;


pub use config::{ConfigError, LedgerConfig};
pub use engine::{AccountRoles, PostingEngine, RecordPayment};
pub use errors::error_payload;
pub use reader::{DescribedEntry, LedgerReader};
pub use store::{
    InMemoryLedgerStore, LedgerSnapshot, LedgerStore, LedgerWrite, PostgresLedgerStore, StoreError,
};
