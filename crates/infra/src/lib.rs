//! Infrastructure layer: stores, reference data, configuration and the
//! movement engine that ties them together.

pub mod config;
pub mod inventory_ledger;
pub mod query;
pub mod reference;
pub mod store;


pub use config::{ConfigError, LedgerConfig};
pub use inventory_ledger::{InventoryLedger, LedgerError, LineOutcome};
pub use query::{LedgerFilter, LedgerQuery, LedgerQueryResult, Pagination};
pub use reference::{
    CatalogReference, LocationRegistry, ProductInfo, ReferenceError, StaticCatalog,
    StaticLocationRegistry,
};
pub use store::{InMemoryLedgerStore, LedgerStore, LedgerTx, PostgresLedgerStore, StoreError};
