//! Apply the ledger schema to the database named by `DATABASE_URL`.

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use pharmacy_infra::{LedgerConfig, PostgresLedgerStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pharmacy_observability::init();

    let config = LedgerConfig::from_env().context("failed to load ledger configuration")?;
    let database_url = config.require_database_url()?;

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")?;

    let store = PostgresLedgerStore::new(pool);
    store.migrate().await.context("failed to apply ledger schema")?;

    tracing::info!(
        supplier_location = %config.supplier_location,
        policy = ?config.policy,
        "ledger schema is up to date"
    );
    Ok(())
}
