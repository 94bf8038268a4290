use criterion::{Criterion, criterion_group, criterion_main};
use domain::{Album, CreateOrder, Customer, Money, OrderService};
use store::InMemoryStore;

type Service = OrderService<InMemoryStore, InMemoryStore, InMemoryStore>;

fn seeded_service(
    rt: &tokio::runtime::Runtime,
    albums: usize,
) -> (Service, CreateOrder) {
    let store = InMemoryStore::new();
    let customer = Customer::new("Bench Customer", "bench@example.com");
    let mut cmd = CreateOrder::for_customer(customer.id);

    rt.block_on(async {
        store.insert_customer(customer).await;
        for n in 0..albums {
            let album = Album::new(format!("Album {n}"), Money::from_cents(1999), u32::MAX / 2);
            cmd = cmd.clone().with_item(album.id, 1);
            store.insert_album(album).await;
        }
    });

    (
        OrderService::new(store.clone(), store.clone(), store),
        cmd,
    )
}

fn bench_create_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (service, cmd) = seeded_service(&rt, 1);

    c.bench_function("domain/create_order_single_line", |b| {
        b.iter(|| {
            rt.block_on(async {
                service.create_order(cmd.clone()).await.unwrap();
            });
        });
    });
}

fn bench_create_order_multi_line(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (service, cmd) = seeded_service(&rt, 10);

    c.bench_function("domain/create_order_ten_lines", |b| {
        b.iter(|| {
            rt.block_on(async {
                service.create_order(cmd.clone()).await.unwrap();
            });
        });
    });
}

fn bench_create_and_cancel(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (service, cmd) = seeded_service(&rt, 3);

    c.bench_function("domain/create_then_cancel", |b| {
        b.iter(|| {
            rt.block_on(async {
                let order = service.create_order(cmd.clone()).await.unwrap();
                service.cancel_order(order.id).await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_create_order,
    bench_create_order_multi_line,
    bench_create_and_cancel,
);
criterion_main!(benches);
