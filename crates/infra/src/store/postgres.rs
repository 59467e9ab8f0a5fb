//! Postgres-backed ledger store.
//!
//! Every engine operation runs in one database transaction. Stock item and
//! batch reads take row locks (`FOR UPDATE`) so concurrent movements on the
//! same stock item serialize; stock item writes additionally check the row
//! version.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Concurrent insert of the same stock row |
//! | Database (serialization / deadlock) | `40001` / `40P01` | `Conflict` | Lost race between transactions |
//! | Database (check constraint violation) | `23514` | `Backend` | Negative batch remaining, non-positive receipt |
//! | Database (other) | Any other | `Backend` | Other database errors |
//! | PoolClosed | N/A | `Backend` | Connection pool was closed |
//! | Other | N/A | `Backend` | Network errors, connection failures, etc. |

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use std::sync::Arc;
use tracing::instrument;

use pharmacy_core::{
    BatchId, DocumentId, EntryId, ExpectedVersion, LocationId, ProductId, StockItemId,
};
use pharmacy_inventory::{
    BatchBalance, DocumentRef, ExpirationBatch, LedgerEntry, NewBatch, NewLedgerEntry, StockItem,
};

use crate::query::{LedgerFilter, LedgerQuery, LedgerQueryResult, Pagination};

use super::r#trait::{LedgerStore, LedgerTx, StoreError};

/// Schema statements applied by [`PostgresLedgerStore::migrate`], in order.
///
/// Every statement is idempotent.
pub const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS stock_items (
        id UUID PRIMARY KEY,
        product_id UUID NOT NULL,
        location_id UUID NOT NULL,
        quantity BIGINT NOT NULL DEFAULT 0,
        version BIGINT NOT NULL DEFAULT 0,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (product_id, location_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS expiration_batches (
        id UUID PRIMARY KEY,
        stock_item_id UUID NOT NULL REFERENCES stock_items (id),
        expiry_date DATE NOT NULL,
        received_quantity BIGINT NOT NULL CHECK (received_quantity > 0),
        remaining BIGINT NOT NULL CHECK (remaining >= 0),
        sequence BIGSERIAL NOT NULL UNIQUE,
        received_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS expiration_batches_fifo_idx
        ON expiration_batches (stock_item_id, expiry_date, sequence)
        WHERE remaining > 0
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ledger_entries (
        id UUID PRIMARY KEY,
        sequence BIGSERIAL NOT NULL UNIQUE,
        stock_item_id UUID NOT NULL REFERENCES stock_items (id),
        movement TEXT NOT NULL,
        quantity_change BIGINT NOT NULL,
        source_location UUID NOT NULL,
        destination_location UUID,
        document_kind TEXT NOT NULL,
        document_id UUID NOT NULL,
        expiry_date DATE,
        occurred_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS ledger_entries_stock_item_idx
        ON ledger_entries (stock_item_id, sequence)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS ledger_entries_occurred_at_idx
        ON ledger_entries (occurred_at DESC, sequence DESC)
    "#,
    r#"
    CREATE OR REPLACE FUNCTION ledger_entries_append_only() RETURNS trigger AS $$
    BEGIN
        RAISE EXCEPTION 'ledger_entries is append-only';
    END;
    $$ LANGUAGE plpgsql
    "#,
    r#"
    DROP TRIGGER IF EXISTS ledger_entries_no_mutation ON ledger_entries
    "#,
    r#"
    CREATE TRIGGER ledger_entries_no_mutation
        BEFORE UPDATE OR DELETE ON ledger_entries
        FOR EACH ROW EXECUTE FUNCTION ledger_entries_append_only()
    "#,
];

/// Postgres-backed ledger store.
///
/// Uses the SQLx connection pool, which is thread-safe; the store is cheap to
/// clone and share.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply [`SCHEMA`] in a single transaction.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("migrate", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        tracing::info!(statements = SCHEMA.len(), "ledger schema applied");
        Ok(())
    }
}

#[async_trait::async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PostgresLedgerTx { tx }))
    }
}

struct PostgresLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait::async_trait]
impl LedgerTx for PostgresLedgerTx {
    #[instrument(skip(self), err)]
    async fn find_stock_item(
        &mut self,
        product_id: ProductId,
        location_id: LocationId,
    ) -> Result<Option<StockItem>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, product_id, location_id, quantity, version, updated_at
            FROM stock_items
            WHERE product_id = $1 AND location_id = $2
            FOR UPDATE
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(location_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_stock_item", e))?;

        row.map(|r| decode::<StockItemRow>(&r).map(Into::into)).transpose()
    }

    #[instrument(skip(self), err)]
    async fn get_stock_item(&mut self, id: StockItemId) -> Result<Option<StockItem>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, product_id, location_id, quantity, version, updated_at
            FROM stock_items
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("get_stock_item", e))?;

        row.map(|r| decode::<StockItemRow>(&r).map(Into::into)).transpose()
    }

    #[instrument(skip(self, item), fields(product_id = %item.product_id, location_id = %item.location_id), err)]
    async fn insert_stock_item(&mut self, item: StockItem) -> Result<StockItem, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO stock_items (id, product_id, location_id, quantity, version, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (product_id, location_id) DO NOTHING
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(item.product_id.as_uuid())
        .bind(item.location_id.as_uuid())
        .bind(item.quantity)
        .bind(item.version as i64)
        .bind(item.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_stock_item", e))?;

        // Either our row or the one a concurrent receipt created first.
        self.find_stock_item(item.product_id, item.location_id)
            .await?
            .ok_or_else(|| {
                StoreError::NotFound(format!(
                    "stock item for product {} at {} vanished after insert",
                    item.product_id, item.location_id
                ))
            })
    }

    #[instrument(skip(self, item), fields(stock_item_id = %item.id, quantity = item.quantity), err)]
    async fn update_stock_item(
        &mut self,
        item: &StockItem,
        expected: ExpectedVersion,
    ) -> Result<StockItem, StoreError> {
        let expected_version: Option<i64> = match expected {
            ExpectedVersion::Any => None,
            ExpectedVersion::Exact(v) => Some(v as i64),
        };

        let row = sqlx::query(
            r#"
            UPDATE stock_items
            SET quantity = $2, version = version + 1, updated_at = NOW()
            WHERE id = $1 AND ($3::bigint IS NULL OR version = $3)
            RETURNING id, product_id, location_id, quantity, version, updated_at
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(item.quantity)
        .bind(expected_version)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_stock_item", e))?;

        match row {
            Some(row) => Ok(decode::<StockItemRow>(&row)?.into()),
            None => {
                let exists = sqlx::query("SELECT 1 FROM stock_items WHERE id = $1")
                    .bind(item.id.as_uuid())
                    .fetch_optional(&mut *self.tx)
                    .await
                    .map_err(|e| map_sqlx_error("update_stock_item", e))?
                    .is_some();
                if exists {
                    Err(StoreError::Conflict(format!(
                        "stock item {}: expected {expected:?}",
                        item.id
                    )))
                } else {
                    Err(StoreError::NotFound(format!("stock item {}", item.id)))
                }
            }
        }
    }

    #[instrument(skip(self, batch), fields(stock_item_id = %batch.stock_item_id, expiry_date = %batch.expiry_date), err)]
    async fn insert_batch(&mut self, batch: NewBatch) -> Result<ExpirationBatch, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO expiration_batches
                (id, stock_item_id, expiry_date, received_quantity, remaining, received_at)
            VALUES ($1, $2, $3, $4, $4, $5)
            RETURNING id, stock_item_id, expiry_date, received_quantity, remaining, sequence, received_at
            "#,
        )
        .bind(BatchId::new().as_uuid())
        .bind(batch.stock_item_id.as_uuid())
        .bind(batch.expiry_date)
        .bind(batch.quantity)
        .bind(batch.received_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_batch", e))?;

        Ok(decode::<BatchRow>(&row)?.into())
    }

    #[instrument(skip(self), err)]
    async fn get_batch(&mut self, id: BatchId) -> Result<Option<ExpirationBatch>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, stock_item_id, expiry_date, received_quantity, remaining, sequence, received_at
            FROM expiration_batches
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("get_batch", e))?;

        row.map(|r| decode::<BatchRow>(&r).map(Into::into)).transpose()
    }

    #[instrument(skip(self), err)]
    async fn open_batches(
        &mut self,
        stock_item_id: StockItemId,
    ) -> Result<Vec<ExpirationBatch>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, stock_item_id, expiry_date, received_quantity, remaining, sequence, received_at
            FROM expiration_batches
            WHERE stock_item_id = $1 AND remaining > 0
            ORDER BY expiry_date ASC, sequence ASC
            FOR UPDATE
            "#,
        )
        .bind(stock_item_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("open_batches", e))?;

        rows.iter()
            .map(|r| decode::<BatchRow>(r).map(Into::into))
            .collect()
    }

    #[instrument(skip(self), err)]
    async fn update_batch_remaining(&mut self, id: BatchId, remaining: i64) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE expiration_batches SET remaining = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(remaining)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("update_batch_remaining", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("batch {id}")));
        }
        Ok(())
    }

    #[instrument(skip(self, entry), fields(stock_item_id = %entry.stock_item_id, movement = %entry.movement, change = entry.quantity_change), err)]
    async fn append_entry(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry, StoreError> {
        let id = EntryId::new();
        let row = sqlx::query(
            r#"
            INSERT INTO ledger_entries (
                id,
                stock_item_id,
                movement,
                quantity_change,
                source_location,
                destination_location,
                document_kind,
                document_id,
                expiry_date,
                occurred_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING sequence
            "#,
        )
        .bind(id.as_uuid())
        .bind(entry.stock_item_id.as_uuid())
        .bind(entry.movement.as_str())
        .bind(entry.quantity_change)
        .bind(entry.source_location.as_uuid())
        .bind(entry.destination_location.map(|l| *l.as_uuid()))
        .bind(entry.document.kind.as_str())
        .bind(entry.document.id.as_uuid())
        .bind(entry.expiry_date)
        .bind(entry.occurred_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("append_entry", e))?;

        let sequence: i64 = row
            .try_get("sequence")
            .map_err(|e| StoreError::Decode(format!("failed to read sequence: {e}")))?;

        Ok(entry.commit(id, sequence as u64))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

#[async_trait::async_trait]
impl LedgerQuery for PostgresLedgerStore {
    async fn stock_item(&self, id: StockItemId) -> Result<Option<StockItem>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, product_id, location_id, quantity, version, updated_at
            FROM stock_items
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("stock_item", e))?;

        row.map(|r| decode::<StockItemRow>(&r).map(Into::into)).transpose()
    }

    async fn find_stock_item(
        &self,
        product_id: ProductId,
        location_id: LocationId,
    ) -> Result<Option<StockItem>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, product_id, location_id, quantity, version, updated_at
            FROM stock_items
            WHERE product_id = $1 AND location_id = $2
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(location_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_stock_item", e))?;

        row.map(|r| decode::<StockItemRow>(&r).map(Into::into)).transpose()
    }

    #[instrument(skip(self), err)]
    async fn low_stock(
        &self,
        threshold: i64,
        location_id: Option<LocationId>,
    ) -> Result<Vec<StockItem>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, location_id, quantity, version, updated_at
            FROM stock_items
            WHERE quantity < $1
                AND ($2::uuid IS NULL OR location_id = $2)
            ORDER BY quantity ASC, id ASC
            "#,
        )
        .bind(threshold)
        .bind(location_id.map(|l| *l.as_uuid()))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("low_stock", e))?;

        rows.iter()
            .map(|r| decode::<StockItemRow>(r).map(Into::into))
            .collect()
    }

    #[instrument(skip(self), err)]
    async fn expiring_batches(
        &self,
        on_or_before: NaiveDate,
        location_id: Option<LocationId>,
    ) -> Result<Vec<ExpirationBatch>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT b.id, b.stock_item_id, b.expiry_date, b.received_quantity, b.remaining,
                   b.sequence, b.received_at
            FROM expiration_batches b
            JOIN stock_items s ON s.id = b.stock_item_id
            WHERE b.remaining > 0
                AND b.expiry_date <= $1
                AND ($2::uuid IS NULL OR s.location_id = $2)
            ORDER BY b.expiry_date ASC, b.sequence ASC
            "#,
        )
        .bind(on_or_before)
        .bind(location_id.map(|l| *l.as_uuid()))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("expiring_batches", e))?;

        rows.iter()
            .map(|r| decode::<BatchRow>(r).map(Into::into))
            .collect()
    }

    async fn batches(&self, stock_item_id: StockItemId) -> Result<Vec<ExpirationBatch>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, stock_item_id, expiry_date, received_quantity, remaining, sequence, received_at
            FROM expiration_batches
            WHERE stock_item_id = $1
            ORDER BY expiry_date ASC, sequence ASC
            "#,
        )
        .bind(stock_item_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("batches", e))?;

        rows.iter()
            .map(|r| decode::<BatchRow>(r).map(Into::into))
            .collect()
    }

    #[instrument(skip(self), err)]
    async fn entries(
        &self,
        filter: LedgerFilter,
        pagination: Pagination,
    ) -> Result<LedgerQueryResult, StoreError> {
        let pagination = pagination.capped();
        let stock_item_param = filter.stock_item_id.map(|id| *id.as_uuid());
        let movement_param = filter.movement.map(|m| m.as_str());
        let location_param = filter.location_id.map(|l| *l.as_uuid());

        let count_row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total
            FROM ledger_entries
            WHERE ($1::uuid IS NULL OR stock_item_id = $1)
                AND ($2::text IS NULL OR movement = $2)
                AND ($3::uuid IS NULL OR source_location = $3 OR destination_location = $3)
                AND ($4::timestamptz IS NULL OR occurred_at >= $4)
                AND ($5::timestamptz IS NULL OR occurred_at <= $5)
            "#,
        )
        .bind(stock_item_param)
        .bind(movement_param)
        .bind(location_param)
        .bind(filter.occurred_after)
        .bind(filter.occurred_before)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_entries", e))?;

        let total: i64 = count_row
            .try_get("total")
            .map_err(|e| StoreError::Decode(format!("failed to read count: {e}")))?;

        let rows = sqlx::query(
            r#"
            SELECT
                id,
                sequence,
                stock_item_id,
                movement,
                quantity_change,
                source_location,
                destination_location,
                document_kind,
                document_id,
                expiry_date,
                occurred_at
            FROM ledger_entries
            WHERE ($1::uuid IS NULL OR stock_item_id = $1)
                AND ($2::text IS NULL OR movement = $2)
                AND ($3::uuid IS NULL OR source_location = $3 OR destination_location = $3)
                AND ($4::timestamptz IS NULL OR occurred_at >= $4)
                AND ($5::timestamptz IS NULL OR occurred_at <= $5)
            ORDER BY occurred_at DESC, sequence DESC
            LIMIT $6 OFFSET $7
            "#,
        )
        .bind(stock_item_param)
        .bind(movement_param)
        .bind(location_param)
        .bind(filter.occurred_after)
        .bind(filter.occurred_before)
        .bind(pagination.limit as i64)
        .bind(pagination.offset as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("query_entries", e))?;

        let entries = rows
            .iter()
            .map(|r| decode::<LedgerEntryRow>(r).and_then(LedgerEntry::try_from))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(LedgerQueryResult::new(entries, total as u64, pagination))
    }

    async fn batch_balance(&self, stock_item_id: StockItemId) -> Result<Option<BatchBalance>, StoreError> {
        let Some(item) = self.stock_item(stock_item_id).await? else {
            return Ok(None);
        };
        let batches = self.batches(stock_item_id).await?;
        Ok(Some(BatchBalance::compute(&item, &batches)))
    }
}

fn decode<'r, T>(row: &'r PgRow) -> Result<T, StoreError>
where
    T: FromRow<'r, PgRow>,
{
    T::from_row(row).map_err(|e| StoreError::Decode(e.to_string()))
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());

            match db_err.code().as_deref() {
                // Unique violation: another transaction created the row first.
                Some("23505") => StoreError::Conflict(msg),
                // Serialization failure / deadlock detected.
                Some("40001") | Some("40P01") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Decode(format!("in {}: {}", operation, err))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

// SQLx row types

#[derive(Debug)]
struct StockItemRow {
    id: uuid::Uuid,
    product_id: uuid::Uuid,
    location_id: uuid::Uuid,
    quantity: i64,
    version: i64,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for StockItemRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(StockItemRow {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            location_id: row.try_get("location_id")?,
            quantity: row.try_get("quantity")?,
            version: row.try_get("version")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<StockItemRow> for StockItem {
    fn from(row: StockItemRow) -> Self {
        StockItem {
            id: StockItemId::from_uuid(row.id),
            product_id: ProductId::from_uuid(row.product_id),
            location_id: LocationId::from_uuid(row.location_id),
            quantity: row.quantity,
            version: row.version as u64,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug)]
struct BatchRow {
    id: uuid::Uuid,
    stock_item_id: uuid::Uuid,
    expiry_date: NaiveDate,
    received_quantity: i64,
    remaining: i64,
    sequence: i64,
    received_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for BatchRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(BatchRow {
            id: row.try_get("id")?,
            stock_item_id: row.try_get("stock_item_id")?,
            expiry_date: row.try_get("expiry_date")?,
            received_quantity: row.try_get("received_quantity")?,
            remaining: row.try_get("remaining")?,
            sequence: row.try_get("sequence")?,
            received_at: row.try_get("received_at")?,
        })
    }
}

impl From<BatchRow> for ExpirationBatch {
    fn from(row: BatchRow) -> Self {
        ExpirationBatch {
            id: BatchId::from_uuid(row.id),
            stock_item_id: StockItemId::from_uuid(row.stock_item_id),
            expiry_date: row.expiry_date,
            received_quantity: row.received_quantity,
            remaining: row.remaining,
            sequence: row.sequence as u64,
            received_at: row.received_at,
        }
    }
}

#[derive(Debug)]
struct LedgerEntryRow {
    id: uuid::Uuid,
    sequence: i64,
    stock_item_id: uuid::Uuid,
    movement: String,
    quantity_change: i64,
    source_location: uuid::Uuid,
    destination_location: Option<uuid::Uuid>,
    document_kind: String,
    document_id: uuid::Uuid,
    expiry_date: Option<NaiveDate>,
    occurred_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for LedgerEntryRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(LedgerEntryRow {
            id: row.try_get("id")?,
            sequence: row.try_get("sequence")?,
            stock_item_id: row.try_get("stock_item_id")?,
            movement: row.try_get("movement")?,
            quantity_change: row.try_get("quantity_change")?,
            source_location: row.try_get("source_location")?,
            destination_location: row.try_get("destination_location")?,
            document_kind: row.try_get("document_kind")?,
            document_id: row.try_get("document_id")?,
            expiry_date: row.try_get("expiry_date")?,
            occurred_at: row.try_get("occurred_at")?,
        })
    }
}

impl TryFrom<LedgerEntryRow> for LedgerEntry {
    type Error = StoreError;

    fn try_from(row: LedgerEntryRow) -> Result<Self, Self::Error> {
        let movement = row
            .movement
            .parse()
            .map_err(|e| StoreError::Decode(format!("ledger entry {}: {e}", row.id)))?;
        let kind = row
            .document_kind
            .parse()
            .map_err(|e| StoreError::Decode(format!("ledger entry {}: {e}", row.id)))?;

        Ok(LedgerEntry {
            id: EntryId::from_uuid(row.id),
            sequence: row.sequence as u64,
            stock_item_id: StockItemId::from_uuid(row.stock_item_id),
            movement,
            quantity_change: row.quantity_change,
            source_location: LocationId::from_uuid(row.source_location),
            destination_location: row.destination_location.map(LocationId::from_uuid),
            document: DocumentRef {
                kind,
                id: DocumentId::from_uuid(row.document_id),
            },
            expiry_date: row.expiry_date,
            occurred_at: row.occurred_at,
        })
    }
}
