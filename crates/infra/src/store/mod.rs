//! Transactional persistence for stock items, batches and ledger entries.
//!
//! The engine talks to storage only through [`LedgerStore`] / [`LedgerTx`],
//! so the same movement logic runs against the in-memory store in tests and
//! against Postgres in production.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;
pub use r#trait::{LedgerStore, LedgerTx, StoreError};
