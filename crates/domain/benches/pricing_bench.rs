use std::sync::Arc;

use common::{
    AddressId, DiscountPercent, Money, PaymentMode, ProductId, PromoId, SlotId, UserId,
};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use domain::{
    AddToCart, CartService, ExpiringUrlSigner, OrderService, PlaceOrder, PricingSnapshot,
    StoreCatalog,
};
use order_store::{AddressRecord, InMemoryStore, ProductRecord, PromoRecord, SlotRecord, Store};

fn bench_charge_line(c: &mut Criterion) {
    let pricing = PricingSnapshot::new(Some(DiscountPercent::from_basis_points(1250).unwrap()));

    c.bench_function("pricing/charge_line", |b| {
        b.iter(|| pricing.charge(black_box(Money::from_cents(12_999)), black_box(3)));
    });
}

fn bench_total_50_lines(c: &mut Criterion) {
    let pricing = PricingSnapshot::new(Some(DiscountPercent::from_percent(10).unwrap()));
    let lines: Vec<(Money, u32)> = (1..=50)
        .map(|i| (Money::from_cents(100 * i), (i % 4 + 1) as u32))
        .collect();

    c.bench_function("pricing/total_50_lines", |b| {
        b.iter(|| pricing.total(black_box(lines.iter().copied())));
    });
}

fn bench_checkout_10_lines(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    let merchant = UserId::new();
    let promo = PromoId::new();

    let products: Vec<ProductId> = rt.block_on(async {
        store
            .put_promo(PromoRecord {
                id: promo,
                code: "BENCH".to_string(),
                discount: DiscountPercent::from_percent(15).unwrap(),
            })
            .await
            .unwrap();

        let mut products = Vec::new();
        for i in 0..10 {
            let product_id = ProductId::new();
            store
                .put_product(ProductRecord {
                    id: product_id,
                    merchant_id: merchant,
                    name: format!("Product {i}"),
                    price: Money::from_cents(1_000 + 250 * i),
                    discount: None,
                    image_key: None,
                })
                .await
                .unwrap();
            store
                .put_slot(SlotRecord {
                    id: SlotId::new(),
                    product_id,
                    size: 10.0,
                    quantity: u32::MAX,
                })
                .await
                .unwrap();
            products.push(product_id);
        }
        products
    });

    let carts = CartService::new(store.clone(), StoreCatalog::new(store.clone()));
    let orders = OrderService::new(
        store.clone(),
        Arc::new(ExpiringUrlSigner::new("https://images.bench")),
    );

    c.bench_function("pricing/checkout_10_lines", |b| {
        b.iter(|| {
            rt.block_on(async {
                let buyer = UserId::new();
                let address = AddressId::new();
                store
                    .put_address(AddressRecord {
                        id: address,
                        buyer_id: buyer,
                    })
                    .await
                    .unwrap();

                let mut cart_id = None;
                for product_id in &products {
                    let cart = carts
                        .add_to_cart(AddToCart::new(buyer, *product_id, 10.0, 1))
                        .await
                        .unwrap();
                    cart_id = Some(cart.id);
                }

                let cmd = PlaceOrder::new(buyer, address, cart_id.unwrap(), PaymentMode::Prepaid)
                    .with_promo(promo)
                    .with_transaction_id("bench");
                orders.create_order(cmd).await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_charge_line,
    bench_total_50_lines,
    bench_checkout_10_lines,
);
criterion_main!(benches);
