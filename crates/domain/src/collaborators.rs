//! Contracts of the services surrounding the fulfillment core.
//!
//! The catalog and object storage are owned elsewhere; the core only reads
//! prices and stock locations from one and asks the other for image URLs.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::{DiscountPercent, Money, ProductId, SlotId};
use order_store::Store;

use crate::error::{FulfillmentError, Result};

/// Upper bound on any single collaborator call.
pub const DEFAULT_COLLABORATOR_TIMEOUT: Duration = Duration::from_secs(5);

/// Default lifetime of a signed image URL.
pub const DEFAULT_IMAGE_URL_TTL: Duration = Duration::from_secs(15 * 60);

/// Read access to product prices and stock locations.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Current list price of a product.
    async fn price(&self, product_id: ProductId) -> Result<Money>;

    /// Merchant discount currently in effect for a product, if any.
    async fn active_discount(&self, product_id: ProductId) -> Result<Option<DiscountPercent>>;

    /// The inventory slot stocking `size` of a product.
    async fn inventory_slot(&self, product_id: ProductId, size: f64) -> Result<SlotId>;
}

/// Catalog backed by the product and slot rows mirrored into the store.
#[derive(Debug, Clone)]
pub struct StoreCatalog<S: Store> {
    store: S,
}

impl<S: Store> StoreCatalog<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: Store> Catalog for StoreCatalog<S> {
    async fn price(&self, product_id: ProductId) -> Result<Money> {
        self.store
            .product(product_id)
            .await?
            .map(|p| p.price)
            .ok_or_else(|| FulfillmentError::not_found("product", product_id))
    }

    async fn active_discount(&self, product_id: ProductId) -> Result<Option<DiscountPercent>> {
        self.store
            .product(product_id)
            .await?
            .map(|p| p.discount)
            .ok_or_else(|| FulfillmentError::not_found("product", product_id))
    }

    async fn inventory_slot(&self, product_id: ProductId, size: f64) -> Result<SlotId> {
        self.store
            .find_slot(product_id, size)
            .await?
            .map(|slot| slot.id)
            .ok_or_else(|| {
                FulfillmentError::not_found("inventory slot", format!("{product_id} size {size}"))
            })
    }
}

/// Produces time-limited URLs for objects in storage.
pub trait ImageSigner: Send + Sync {
    fn sign(&self, key: &str, ttl: Duration) -> String;
}

/// Signs keys against a public base URL with an expiry timestamp.
///
/// Suitable for a CDN that validates the `expires` query parameter.
#[derive(Debug, Clone)]
pub struct ExpiringUrlSigner {
    base_url: String,
}

impl ExpiringUrlSigner {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl ImageSigner for ExpiringUrlSigner {
    fn sign(&self, key: &str, ttl: Duration) -> String {
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expires = Utc::now().timestamp().saturating_add(ttl_secs);
        format!(
            "{}/{}?expires={}",
            self.base_url,
            key.trim_start_matches('/'),
            expires
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::UserId;
    use order_store::{InMemoryStore, ProductRecord, SlotRecord};

    #[tokio::test]
    async fn store_catalog_reads_mirrored_rows() {
        let store = InMemoryStore::new();
        let product_id = ProductId::new();
        let slot_id = SlotId::new();
        store
            .put_product(ProductRecord {
                id: product_id,
                merchant_id: UserId::new(),
                name: "Canvas Tote".to_string(),
                price: Money::from_dollars(40),
                discount: Some(DiscountPercent::from_percent(5).unwrap()),
                image_key: None,
            })
            .await
            .unwrap();
        store
            .put_slot(SlotRecord {
                id: slot_id,
                product_id,
                size: 1.0,
                quantity: 3,
            })
            .await
            .unwrap();

        let catalog = StoreCatalog::new(store);
        assert_eq!(catalog.price(product_id).await.unwrap(), Money::from_dollars(40));
        assert_eq!(
            catalog.active_discount(product_id).await.unwrap(),
            Some(DiscountPercent::from_percent(5).unwrap())
        );
        assert_eq!(catalog.inventory_slot(product_id, 1.0).await.unwrap(), slot_id);

        let err = catalog.inventory_slot(product_id, 2.0).await.unwrap_err();
        assert!(matches!(err, FulfillmentError::NotFound { .. }));
        let err = catalog.price(ProductId::new()).await.unwrap_err();
        assert!(matches!(err, FulfillmentError::NotFound { entity: "product", .. }));
    }

    #[test]
    fn signed_url_embeds_key_and_expiry() {
        let signer = ExpiringUrlSigner::new("https://cdn.example.com/");
        let before = Utc::now().timestamp();
        let url = signer.sign("/products/tote.png", Duration::from_secs(60));

        let (path, expires) = url.split_once("?expires=").unwrap();
        assert_eq!(path, "https://cdn.example.com/products/tote.png");
        let expires: i64 = expires.parse().unwrap();
        assert!(expires >= before + 60);
    }
}
