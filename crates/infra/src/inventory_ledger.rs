//! Movement engine: the only writer of stock quantities, batch remainders and
//! ledger entries.
//!
//! Every movement follows the same pipeline:
//!
//! ```text
//! Request
//!   ↓
//! 1. Validate the request and resolve reference data (catalog, locations)
//!   ↓
//! 2. Begin a store transaction
//!   ↓
//! 3. Load (and lock) the stock rows and batches involved
//!   ↓
//! 4. Decide with pure domain logic (FIFO plan, policies, disposal checks)
//!   ↓
//! 5. Write quantities, batches and ledger entries
//!   ↓
//! 6. Commit, or roll back on any error
//! ```
//!
//! Policy refusals (`Reject` oversell/shortfall, strict transfers, excessive
//! disposals) are decided in step 4, so a refused movement leaves no trace.
//! Multi-line documents run one transaction per line.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::instrument;

use pharmacy_core::{
    BatchId, DocumentId, DomainError, ExpectedVersion, LocationId, ProductId, StockItemId,
};
use pharmacy_inventory::{
    AdjustOutcome, AdjustRequest, DisposeRequest, LedgerEntry, LedgerPolicy, NewBatch,
    NewLedgerEntry, OversellPolicy, PurchaseLineReceipt, ReceiptOutcome, ReceiveRequest,
    SaleAllocation, SaleCheckout, SellRequest, ShortfallPolicy, StockItem, TransferDocument,
    TransferOutcome, TransferPolicy, TransferRequest, check_disposal, plan_fifo,
};

use crate::config::LedgerConfig;
use crate::reference::{CatalogReference, LocationRegistry, ReferenceError};
use crate::store::{LedgerStore, LedgerTx, StoreError};

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Product or location unknown to the reference data.
    #[error("unknown {kind}: {id}")]
    ReferenceNotFound { kind: &'static str, id: String },

    #[error("stock item not found: {0}")]
    StockItemNotFound(String),

    #[error("expiration batch not found: {0}")]
    BatchNotFound(BatchId),

    #[error(
        "disposal of {requested} exceeds available stock (on hand {on_hand}, batch remaining {batch_remaining})"
    )]
    ExcessiveDisposalQuantity {
        requested: i64,
        on_hand: i64,
        batch_remaining: i64,
    },

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    #[error("sale of {demanded} cannot be covered by tracked batches ({allocatable} available)")]
    UnallocatedDemand { demanded: i64, allocatable: i64 },

    #[error("receipt accounts for {accounted} of {ordered} ordered units")]
    ReceiptNotReconciled { ordered: i64, accounted: i64 },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invariant violated: {0}")]
    Invariant(String),

    /// Optimistic concurrency failure; the movement was not applied.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Reference(#[from] ReferenceError),
}

impl From<DomainError> for LedgerError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => LedgerError::Validation(msg),
            DomainError::InvariantViolation(msg) => LedgerError::Invariant(msg),
            DomainError::InsufficientStock { requested, available } => {
                LedgerError::InsufficientStock { requested, available }
            }
            DomainError::ExcessiveDisposalQuantity {
                requested,
                on_hand,
                batch_remaining,
            } => LedgerError::ExcessiveDisposalQuantity {
                requested,
                on_hand,
                batch_remaining,
            },
            DomainError::UnallocatedDemand { demanded, allocatable } => {
                LedgerError::UnallocatedDemand { demanded, allocatable }
            }
            DomainError::ReceiptNotReconciled { ordered, accounted } => {
                LedgerError::ReceiptNotReconciled { ordered, accounted }
            }
            DomainError::Conflict(msg) => LedgerError::Conflict(msg),
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => LedgerError::Conflict(msg),
            other => LedgerError::Store(other),
        }
    }
}

/// Result of one line of a multi-line document.
#[derive(Debug)]
pub struct LineOutcome<T> {
    pub line_id: DocumentId,
    pub result: Result<T, LedgerError>,
}

impl<T> LineOutcome<T> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// The inventory movement engine.
///
/// Holds injected handles to the store and the reference backends; there is
/// no global client.
pub struct InventoryLedger<S, C, L> {
    store: S,
    catalog: C,
    locations: L,
    config: LedgerConfig,
}

impl<S, C, L> InventoryLedger<S, C, L>
where
    S: LedgerStore,
    C: CatalogReference,
    L: LocationRegistry,
{
    pub fn new(store: S, catalog: C, locations: L, config: LedgerConfig) -> Self {
        Self {
            store,
            catalog,
            locations,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> LedgerPolicy {
        self.config.policy
    }

    /// Receive stock into a location, opening a new batch when an expiry date
    /// is known.
    #[instrument(
        skip(self, request),
        fields(
            product_id = %request.product_id,
            destination = %request.destination,
            quantity = request.quantity,
            document = %request.document.id
        ),
        err
    )]
    pub async fn receive(&self, request: ReceiveRequest) -> Result<StockItem, LedgerError> {
        request.validate()?;
        self.require_product(request.product_id).await?;
        self.require_location(request.destination).await?;
        let source = match request.source {
            Some(source) => {
                self.require_location(source).await?;
                source
            }
            None => self.supplier_location().await?,
        };

        let mut tx = self.store.begin().await?;
        let result = self.receive_in(tx.as_mut(), &request, source, Utc::now()).await;
        let item = finish(tx, result).await?;

        tracing::info!(
            stock_item_id = %item.id,
            on_hand = item.quantity,
            "stock received"
        );
        Ok(item)
    }

    /// Sell one line, depleting batches first-expiring-first-out.
    #[instrument(
        skip(self, request),
        fields(
            product_id = %request.product_id,
            origin = %request.origin,
            quantity = request.quantity,
            sale_line = %request.sale_line
        ),
        err
    )]
    pub async fn sell(&self, request: SellRequest) -> Result<SaleAllocation, LedgerError> {
        request.validate()?;

        let mut tx = self.store.begin().await?;
        let result = self.sell_in(tx.as_mut(), &request, Utc::now()).await;
        let allocation = finish(tx, result).await?;

        tracing::info!(
            stock_item_id = %allocation.stock_item.id,
            on_hand = allocation.stock_item.quantity,
            batches = allocation.lines_allocated(),
            shortfall = allocation.shortfall,
            "sale recorded"
        );
        Ok(allocation)
    }

    /// Move one transfer line from its source to its destination.
    #[instrument(
        skip(self, request),
        fields(
            product_id = %request.product_id,
            source = %request.source,
            destination = %request.destination,
            quantity = request.quantity,
            transfer_line = %request.transfer_line
        ),
        err
    )]
    pub async fn transfer(&self, request: TransferRequest) -> Result<TransferOutcome, LedgerError> {
        request.validate()?;
        self.require_product(request.product_id).await?;
        self.require_location(request.source).await?;
        self.require_location(request.destination).await?;

        let mut tx = self.store.begin().await?;
        let result = self.transfer_in(tx.as_mut(), &request, Utc::now()).await;
        let outcome = finish(tx, result).await?;

        tracing::info!(
            deducted = outcome.deducted,
            added = outcome.added,
            "transfer applied"
        );
        Ok(outcome)
    }

    /// Write off part of one batch (expired, damaged, recalled).
    #[instrument(
        skip(self, request),
        fields(
            stock_item_id = %request.stock_item_id,
            batch_id = %request.batch_id,
            quantity = request.quantity
        ),
        err
    )]
    pub async fn dispose(&self, request: DisposeRequest) -> Result<LedgerEntry, LedgerError> {
        request.validate()?;

        let mut tx = self.store.begin().await?;
        let result = self.dispose_in(tx.as_mut(), &request).await;
        let entry = finish(tx, result).await?;

        tracing::info!(entry_id = %entry.id, "disposal recorded");
        Ok(entry)
    }

    /// Overwrite on-hand with a physical count.
    #[instrument(
        skip(self, request),
        fields(
            stock_item_id = %request.stock_item_id,
            counted = request.counted_quantity,
            reason = request.reason.as_deref().unwrap_or("")
        ),
        err
    )]
    pub async fn adjust(&self, request: AdjustRequest) -> Result<AdjustOutcome, LedgerError> {
        request.validate()?;

        let mut tx = self.store.begin().await?;
        let result = self.adjust_in(tx.as_mut(), &request, Utc::now()).await;
        let outcome = finish(tx, result).await?;

        if let Some(entry) = &outcome.entry {
            tracing::info!(delta = entry.quantity_change, "stock count adjusted");
        }
        Ok(outcome)
    }

    /// Sell every line of a checkout. Each line is its own transaction; a
    /// failing line does not roll back the others.
    #[instrument(skip(self, checkout), fields(origin = %checkout.origin, lines = checkout.lines.len()))]
    pub async fn sell_lines(&self, checkout: SaleCheckout) -> Vec<LineOutcome<SaleAllocation>> {
        let mut outcomes = Vec::with_capacity(checkout.lines.len());
        for request in checkout.requests() {
            let line_id = request.sale_line;
            let result = self.sell(request).await;
            if let Err(LedgerError::StockItemNotFound(_)) = &result {
                tracing::warn!(%line_id, "no stock row for sale line; skipped");
            }
            outcomes.push(LineOutcome { line_id, result });
        }
        outcomes
    }

    /// Apply every line of a completed transfer document.
    #[instrument(
        skip(self, document),
        fields(document_id = %document.document_id, lines = document.lines.len()),
        err
    )]
    pub async fn complete_transfer(
        &self,
        document: TransferDocument,
    ) -> Result<Vec<LineOutcome<TransferOutcome>>, LedgerError> {
        document.ensure_completed()?;

        let mut outcomes = Vec::with_capacity(document.lines.len());
        for request in document.requests() {
            let line_id = request.transfer_line;
            let result = self.transfer(request).await;
            outcomes.push(LineOutcome { line_id, result });
        }
        Ok(outcomes)
    }

    /// Post a fully accounted purchase-order line.
    #[instrument(
        skip(self, receipt),
        fields(
            purchase_order_item = %receipt.purchase_order_item,
            ordered = receipt.ordered,
            received = receipt.received
        ),
        err
    )]
    pub async fn receive_purchase_line(
        &self,
        receipt: PurchaseLineReceipt,
    ) -> Result<ReceiptOutcome, LedgerError> {
        receipt.reconcile()?;

        let stock_item = match receipt.to_receive_request() {
            Some(request) => Some(self.receive(request).await?),
            None => None,
        };

        let rejected = receipt.rejected();
        if rejected > 0 {
            tracing::info!(
                expired = receipt.expired,
                damaged = receipt.damaged,
                "units rejected at receipt"
            );
        }

        Ok(ReceiptOutcome {
            stock_item,
            rejected,
        })
    }

    async fn receive_in(
        &self,
        tx: &mut dyn LedgerTx,
        request: &ReceiveRequest,
        source: LocationId,
        now: DateTime<Utc>,
    ) -> Result<StockItem, LedgerError> {
        let mut item = stock_item_for(tx, request.product_id, request.destination, now).await?;
        let expected = ExpectedVersion::Exact(item.version);
        item.credit(request.quantity)?;
        let item = tx.update_stock_item(&item, expected).await?;

        if let Some(expiry_date) = request.expiry_date {
            let batch = tx
                .insert_batch(NewBatch {
                    stock_item_id: item.id,
                    expiry_date,
                    quantity: request.quantity,
                    received_at: now,
                })
                .await?;
            tracing::debug!(batch_id = %batch.id, %expiry_date, "batch opened");
        }

        tx.append_entry(NewLedgerEntry::receipt(
            item.id,
            request.quantity,
            source,
            request.destination,
            request.document,
            request.expiry_date,
            now,
        ))
        .await?;

        Ok(item)
    }

    async fn sell_in(
        &self,
        tx: &mut dyn LedgerTx,
        request: &SellRequest,
        now: DateTime<Utc>,
    ) -> Result<SaleAllocation, LedgerError> {
        let mut item = tx
            .find_stock_item(request.product_id, request.origin)
            .await?
            .ok_or_else(|| {
                LedgerError::StockItemNotFound(format!(
                    "product {} at location {}",
                    request.product_id, request.origin
                ))
            })?;

        let batches = tx.open_batches(item.id).await?;
        let plan = plan_fifo(&batches, request.quantity);

        if item.quantity < request.quantity {
            match self.config.policy.oversell {
                OversellPolicy::Reject => {
                    return Err(LedgerError::InsufficientStock {
                        requested: request.quantity,
                        available: item.quantity.max(0),
                    });
                }
                OversellPolicy::Allow => tracing::warn!(
                    stock_item_id = %item.id,
                    on_hand = item.quantity,
                    demanded = request.quantity,
                    "oversell: stock will go negative"
                ),
            }
        }

        if plan.shortfall > 0 {
            match self.config.policy.shortfall {
                ShortfallPolicy::Reject => {
                    return Err(LedgerError::UnallocatedDemand {
                        demanded: request.quantity,
                        allocatable: plan.allocated(),
                    });
                }
                ShortfallPolicy::Accept => tracing::warn!(
                    stock_item_id = %item.id,
                    demanded = request.quantity,
                    allocated = plan.allocated(),
                    shortfall = plan.shortfall,
                    "partial FIFO allocation"
                ),
            }
        }

        let expected = ExpectedVersion::Exact(item.version);
        item.debit(request.quantity)?;
        let item = tx.update_stock_item(&item, expected).await?;

        let gross_entry = tx
            .append_entry(NewLedgerEntry::sale_gross(
                item.id,
                request.quantity,
                request.origin,
                request.sale_line,
                now,
            ))
            .await?;

        let mut batch_entries = Vec::with_capacity(plan.draws.len());
        for draw in &plan.draws {
            let mut batch = batches
                .iter()
                .find(|b| b.id == draw.batch_id)
                .cloned()
                .ok_or(LedgerError::BatchNotFound(draw.batch_id))?;
            batch.draw(draw.quantity)?;
            tx.update_batch_remaining(batch.id, batch.remaining).await?;
            tracing::debug!(
                batch_id = %batch.id,
                expiry_date = %draw.expiry_date,
                taken = draw.quantity,
                remaining = batch.remaining,
                "batch drawn"
            );

            let entry = tx
                .append_entry(NewLedgerEntry::sale_batch(
                    item.id,
                    draw.quantity,
                    request.origin,
                    request.sale_line,
                    draw.expiry_date,
                    now,
                ))
                .await?;
            batch_entries.push(entry);
        }

        Ok(SaleAllocation {
            stock_item: item,
            gross_entry,
            draws: plan.draws,
            batch_entries,
            shortfall: plan.shortfall,
        })
    }

    async fn transfer_in(
        &self,
        tx: &mut dyn LedgerTx,
        request: &TransferRequest,
        now: DateTime<Utc>,
    ) -> Result<TransferOutcome, LedgerError> {
        let mut source = tx
            .find_stock_item(request.product_id, request.source)
            .await?
            .ok_or_else(|| {
                LedgerError::StockItemNotFound(format!(
                    "product {} at location {}",
                    request.product_id, request.source
                ))
            })?;

        let expected = ExpectedVersion::Exact(source.version);
        let deducted = match self.config.policy.transfer {
            TransferPolicy::Strict => {
                source.debit_exact(request.quantity)?;
                request.quantity
            }
            TransferPolicy::Lenient => {
                let deducted = source.debit_floored(request.quantity)?;
                if deducted < request.quantity {
                    tracing::warn!(
                        stock_item_id = %source.id,
                        requested = request.quantity,
                        deducted,
                        "lenient transfer: destination credited beyond source stock"
                    );
                }
                deducted
            }
        };
        let source = if deducted > 0 {
            tx.update_stock_item(&source, expected).await?
        } else {
            source
        };

        let mut destination =
            stock_item_for(tx, request.product_id, request.destination, now).await?;
        let expected = ExpectedVersion::Exact(destination.version);
        destination.credit(request.quantity)?;
        let destination = tx.update_stock_item(&destination, expected).await?;

        let entry = tx
            .append_entry(NewLedgerEntry::transfer(
                destination.id,
                request.quantity,
                request.source,
                request.destination,
                request.transfer_line,
                now,
            ))
            .await?;

        Ok(TransferOutcome {
            source,
            destination,
            deducted,
            added: request.quantity,
            entry,
        })
    }

    async fn dispose_in(
        &self,
        tx: &mut dyn LedgerTx,
        request: &DisposeRequest,
    ) -> Result<LedgerEntry, LedgerError> {
        let mut item = require_stock_item(tx, request.stock_item_id).await?;
        let mut batch = tx
            .get_batch(request.batch_id)
            .await?
            .ok_or(LedgerError::BatchNotFound(request.batch_id))?;

        check_disposal(&item, &batch, request.quantity)?;

        let expected = ExpectedVersion::Exact(item.version);
        item.debit_exact(request.quantity)?;
        batch.draw(request.quantity)?;
        let item = tx.update_stock_item(&item, expected).await?;
        tx.update_batch_remaining(batch.id, batch.remaining).await?;

        let entry = tx
            .append_entry(NewLedgerEntry::disposal(
                item.id,
                request.quantity,
                item.location_id,
                request.disposal_id,
                batch.expiry_date,
                request.disposed_at,
            ))
            .await?;
        Ok(entry)
    }

    async fn adjust_in(
        &self,
        tx: &mut dyn LedgerTx,
        request: &AdjustRequest,
        now: DateTime<Utc>,
    ) -> Result<AdjustOutcome, LedgerError> {
        let mut item = require_stock_item(tx, request.stock_item_id).await?;
        let expected = ExpectedVersion::Exact(item.version);
        let delta = item.set_counted(request.counted_quantity)?;
        if delta == 0 {
            return Ok(AdjustOutcome {
                stock_item: item,
                entry: None,
            });
        }

        let item = tx.update_stock_item(&item, expected).await?;
        let entry = tx
            .append_entry(NewLedgerEntry::adjustment(
                item.id,
                delta,
                item.location_id,
                request.count_id,
                now,
            ))
            .await?;

        Ok(AdjustOutcome {
            stock_item: item,
            entry: Some(entry),
        })
    }

    async fn require_product(&self, id: ProductId) -> Result<(), LedgerError> {
        match self.catalog.resolve_product(id).await? {
            Some(_) => Ok(()),
            None => Err(LedgerError::ReferenceNotFound {
                kind: "product",
                id: id.to_string(),
            }),
        }
    }

    async fn require_location(&self, id: LocationId) -> Result<(), LedgerError> {
        match self.locations.location_name(id).await? {
            Some(_) => Ok(()),
            None => Err(LedgerError::ReferenceNotFound {
                kind: "location",
                id: id.to_string(),
            }),
        }
    }

    async fn supplier_location(&self) -> Result<LocationId, LedgerError> {
        let name = &self.config.supplier_location;
        self.locations
            .location_id(name)
            .await?
            .ok_or_else(|| LedgerError::ReferenceNotFound {
                kind: "location",
                id: name.clone(),
            })
    }
}

async fn stock_item_for(
    tx: &mut dyn LedgerTx,
    product_id: ProductId,
    location_id: LocationId,
    now: DateTime<Utc>,
) -> Result<StockItem, LedgerError> {
    if let Some(item) = tx.find_stock_item(product_id, location_id).await? {
        return Ok(item);
    }
    Ok(tx
        .insert_stock_item(StockItem::new(product_id, location_id, now))
        .await?)
}

async fn require_stock_item(
    tx: &mut dyn LedgerTx,
    id: StockItemId,
) -> Result<StockItem, LedgerError> {
    tx.get_stock_item(id)
        .await?
        .ok_or_else(|| LedgerError::StockItemNotFound(id.to_string()))
}

/// Commit on success, roll back on failure.
async fn finish<T>(
    tx: Box<dyn LedgerTx>,
    result: Result<T, LedgerError>,
) -> Result<T, LedgerError> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback) = tx.rollback().await {
                tracing::warn!(error = %rollback, "rollback failed");
            }
            Err(err)
        }
    }
}
