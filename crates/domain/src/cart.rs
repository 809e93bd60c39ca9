//! Cart intake: booking catalog lines into a buyer's cart.

use std::future::Future;
use std::time::Duration;

use common::{ProductId, UserId};
use order_store::{CartLine, CartRecord, Store};

use crate::collaborators::{Catalog, DEFAULT_COLLABORATOR_TIMEOUT};
use crate::error::{FulfillmentError, Result};
use crate::pricing::catalog_unit_price;

/// Largest quantity a single cart line may carry.
pub const MAX_LINE_QUANTITY: u32 = 10_000;

/// Command to add a product to a buyer's cart.
#[derive(Debug, Clone, PartialEq)]
pub struct AddToCart {
    pub buyer_id: UserId,
    pub product_id: ProductId,
    pub size: f64,
    pub quantity: u32,
}

impl AddToCart {
    pub fn new(buyer_id: UserId, product_id: ProductId, size: f64, quantity: u32) -> Self {
        Self {
            buyer_id,
            product_id,
            size,
            quantity,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.quantity == 0 {
            return Err(FulfillmentError::invalid_input("quantity must be at least 1"));
        }
        if self.quantity > MAX_LINE_QUANTITY {
            return Err(FulfillmentError::invalid_input(format!(
                "quantity must be at most {MAX_LINE_QUANTITY}"
            )));
        }
        if !self.size.is_finite() {
            return Err(FulfillmentError::invalid_input("size must be a finite number"));
        }
        Ok(())
    }
}

/// Service for adding lines to carts.
///
/// The unit price is resolved from the catalog when the line is added and
/// stored with it; checkout never asks the catalog again.
pub struct CartService<S: Store, C: Catalog> {
    store: S,
    catalog: C,
    timeout: Duration,
}

impl<S: Store, C: Catalog> CartService<S, C> {
    /// Creates a new cart service with the default collaborator timeout.
    pub fn new(store: S, catalog: C) -> Self {
        Self {
            store,
            catalog,
            timeout: DEFAULT_COLLABORATOR_TIMEOUT,
        }
    }

    /// Overrides the bound on each catalog call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Adds a line to the buyer's cart, creating the cart on first use.
    /// Returns the cart with its updated running total.
    #[tracing::instrument(skip(self))]
    pub async fn add_to_cart(&self, cmd: AddToCart) -> Result<CartRecord> {
        cmd.validate()?;

        let slot_id = self
            .bounded(self.catalog.inventory_slot(cmd.product_id, cmd.size))
            .await?;
        let price = self.bounded(self.catalog.price(cmd.product_id)).await?;
        let discount = self
            .bounded(self.catalog.active_discount(cmd.product_id))
            .await?;

        let unit_price = catalog_unit_price(price, discount);
        if unit_price.checked_multiply(cmd.quantity).is_none() {
            return Err(FulfillmentError::invalid_input("line total is out of range"));
        }

        let line = CartLine {
            product_id: cmd.product_id,
            slot_id,
            quantity: cmd.quantity,
            unit_price,
        };
        let cart = self.store.add_cart_line(cmd.buyer_id, line).await?;

        tracing::info!(cart_id = %cart.id, total = %cart.total, "cart line added");
        Ok(cart)
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "catalog call timed out"
                );
                Err(FulfillmentError::Internal)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::{DiscountPercent, Money, SlotId};
    use order_store::{InMemoryStore, ProductRecord, SlotRecord};

    use crate::collaborators::StoreCatalog;

    struct Fixture {
        store: InMemoryStore,
        product_id: ProductId,
        slot_id: SlotId,
    }

    async fn fixture(discount: Option<DiscountPercent>) -> Fixture {
        let store = InMemoryStore::new();
        let product_id = ProductId::new();
        let slot_id = SlotId::new();
        store
            .put_product(ProductRecord {
                id: product_id,
                merchant_id: UserId::new(),
                name: "Court Sneaker".to_string(),
                price: Money::from_dollars(80),
                discount,
                image_key: None,
            })
            .await
            .unwrap();
        store
            .put_slot(SlotRecord {
                id: slot_id,
                product_id,
                size: 9.5,
                quantity: 10,
            })
            .await
            .unwrap();
        Fixture {
            store,
            product_id,
            slot_id,
        }
    }

    #[tokio::test]
    async fn first_line_creates_cart() {
        let f = fixture(None).await;
        let service = CartService::new(f.store.clone(), StoreCatalog::new(f.store.clone()));
        let buyer = UserId::new();

        let cart = service
            .add_to_cart(AddToCart::new(buyer, f.product_id, 9.5, 2))
            .await
            .unwrap();

        assert_eq!(cart.buyer_id, buyer);
        assert_eq!(cart.total, Money::from_dollars(160));

        let items = f.store.cart_items(cart.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].slot_id, f.slot_id);
        assert_eq!(items[0].unit_price, Money::from_dollars(80));
    }

    #[tokio::test]
    async fn active_discount_lowers_unit_price() {
        let f = fixture(Some(DiscountPercent::from_percent(25).unwrap())).await;
        let service = CartService::new(f.store.clone(), StoreCatalog::new(f.store.clone()));
        let buyer = UserId::new();

        service
            .add_to_cart(AddToCart::new(buyer, f.product_id, 9.5, 1))
            .await
            .unwrap();
        let cart = service
            .add_to_cart(AddToCart::new(buyer, f.product_id, 9.5, 1))
            .await
            .unwrap();

        assert_eq!(cart.total, Money::from_dollars(120));
        let items = f.store.cart_items(cart.id).await.unwrap();
        assert!(items.iter().all(|i| i.unit_price == Money::from_dollars(60)));
    }

    #[tokio::test]
    async fn zero_quantity_is_rejected() {
        let f = fixture(None).await;
        let service = CartService::new(f.store.clone(), StoreCatalog::new(f.store.clone()));

        let err = service
            .add_to_cart(AddToCart::new(UserId::new(), f.product_id, 9.5, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, FulfillmentError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn oversized_quantity_is_rejected() {
        let f = fixture(None).await;
        let service = CartService::new(f.store.clone(), StoreCatalog::new(f.store.clone()));
        let buyer = UserId::new();

        let err = service
            .add_to_cart(AddToCart::new(buyer, f.product_id, 9.5, MAX_LINE_QUANTITY + 1))
            .await
            .unwrap_err();
        assert!(matches!(err, FulfillmentError::InvalidInput(_)));
        assert!(f.store.cart_for_buyer(buyer).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn overflowing_line_total_is_rejected() {
        let f = fixture(None).await;
        let product_id = ProductId::new();
        f.store
            .put_product(ProductRecord {
                id: product_id,
                merchant_id: UserId::new(),
                name: "Gilded Boot".to_string(),
                price: Money::from_cents(i64::MAX / 100),
                discount: None,
                image_key: None,
            })
            .await
            .unwrap();
        f.store
            .put_slot(SlotRecord {
                id: SlotId::new(),
                product_id,
                size: 9.5,
                quantity: 1_000,
            })
            .await
            .unwrap();
        let service = CartService::new(f.store.clone(), StoreCatalog::new(f.store.clone()));
        let buyer = UserId::new();

        let err = service
            .add_to_cart(AddToCart::new(buyer, product_id, 9.5, 500))
            .await
            .unwrap_err();
        assert!(matches!(err, FulfillmentError::InvalidInput(_)));
        assert!(f.store.cart_for_buyer(buyer).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_size_is_not_found() {
        let f = fixture(None).await;
        let service = CartService::new(f.store.clone(), StoreCatalog::new(f.store.clone()));
        let buyer = UserId::new();

        let err = service
            .add_to_cart(AddToCart::new(buyer, f.product_id, 12.0, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, FulfillmentError::NotFound { .. }));
        assert!(f.store.cart_for_buyer(buyer).await.unwrap().is_none());
    }

    struct StalledCatalog;

    #[async_trait]
    impl Catalog for StalledCatalog {
        async fn price(&self, _product_id: ProductId) -> Result<Money> {
            std::future::pending().await
        }

        async fn active_discount(
            &self,
            _product_id: ProductId,
        ) -> Result<Option<DiscountPercent>> {
            std::future::pending().await
        }

        async fn inventory_slot(&self, _product_id: ProductId, _size: f64) -> Result<SlotId> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_catalog_times_out() {
        let store = InMemoryStore::new();
        let service =
            CartService::new(store.clone(), StalledCatalog).with_timeout(Duration::from_millis(50));
        let buyer = UserId::new();

        let err = service
            .add_to_cart(AddToCart::new(buyer, ProductId::new(), 9.5, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, FulfillmentError::Internal));
        assert!(store.cart_for_buyer(buyer).await.unwrap().is_none());
    }
}
