use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::{Duration, NaiveDate, Utc};
use pharmacy_core::{BatchId, DocumentId, ProductId, StockItemId};
use pharmacy_infra::{
    InMemoryLedgerStore, InventoryLedger, LedgerConfig, StaticCatalog, StaticLocationRegistry,
};
use pharmacy_inventory::{DocumentRef, ExpirationBatch, ReceiveRequest, SellRequest, plan_fifo};

/// Batches with scrambled expiry dates so planning has to sort.
fn scattered_batches(count: usize) -> Vec<ExpirationBatch> {
    let base = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    let stock_item_id = StockItemId::new();
    (0..count)
        .map(|i| ExpirationBatch {
            id: BatchId::new(),
            stock_item_id,
            expiry_date: base + Duration::days(((i * 7919) % 730) as i64),
            received_quantity: 20,
            remaining: 20,
            sequence: i as u64 + 1,
            received_at: Utc::now(),
        })
        .collect()
}

fn bench_fifo_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("fifo_plan");

    for batch_count in [1usize, 10, 100, 1000].iter() {
        let batches = scattered_batches(*batch_count);
        // Demand that drains roughly half of the tracked stock.
        let demand = (*batch_count as i64 * 20) / 2 + 1;
        group.throughput(Throughput::Elements(*batch_count as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_count),
            &batches,
            |b, batches| {
                b.iter(|| black_box(plan_fifo(batches.iter(), black_box(demand))));
            },
        );
    }

    group.finish();
}

fn bench_in_memory_sale(c: &mut Criterion) {
    let mut group = c.benchmark_group("in_memory_sale");
    let rt = tokio::runtime::Runtime::new().unwrap();

    for batch_count in [10usize, 100].iter() {
        let product = ProductId::new();
        let mut locations = StaticLocationRegistry::new();
        let branch = locations.register("Main Branch");
        locations.register("Supplier");
        let catalog = StaticCatalog::new().with_product(product, "Paracetamol 500mg", "tablet");
        let ledger = InventoryLedger::new(
            InMemoryLedgerStore::new(),
            catalog,
            locations,
            LedgerConfig::default(),
        );

        let base = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        rt.block_on(async {
            for i in 0..*batch_count {
                ledger
                    .receive(ReceiveRequest {
                        product_id: product,
                        destination: branch,
                        quantity: 1_000_000,
                        expiry_date: Some(base + Duration::days(i as i64)),
                        document: DocumentRef::purchase_order_item(DocumentId::new()),
                        source: None,
                    })
                    .await
                    .unwrap();
            }
        });

        group.bench_with_input(
            BenchmarkId::from_parameter(batch_count),
            batch_count,
            |b, _| {
                b.iter(|| {
                    rt.block_on(ledger.sell(SellRequest {
                        product_id: product,
                        origin: branch,
                        quantity: 3,
                        sale_line: DocumentId::new(),
                    }))
                    .unwrap()
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_fifo_plan, bench_in_memory_sale);
criterion_main!(benches);
