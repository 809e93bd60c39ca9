//! Domain layer for the order fulfillment core.
//!
//! This crate provides:
//! - [`OrderService`], the atomic cart-to-order transaction and order listings
//! - [`TrackingService`], the per-item shipment state machine
//! - [`EligibilityGate`], the cash-on-delivery policy
//! - [`PricingSnapshot`], order-time price resolution
//! - [`CartService`], catalog-priced cart intake
//! - collaborator contracts for the catalog and image storage

pub mod cart;
pub mod collaborators;
pub mod eligibility;
pub mod error;
pub mod order;
pub mod pricing;
pub mod tracking;

pub use cart::{AddToCart, CartService, MAX_LINE_QUANTITY};
pub use collaborators::{
    Catalog, DEFAULT_COLLABORATOR_TIMEOUT, DEFAULT_IMAGE_URL_TTL, ExpiringUrlSigner, ImageSigner,
    StoreCatalog,
};
pub use eligibility::{DEFAULT_COD_MIN_PRIOR_ORDERS, EligibilityGate};
pub use error::{FulfillmentError, Result};
pub use order::{OrderListing, OrderService, PlaceOrder, PlacementOutcome};
pub use pricing::{PricingSnapshot, catalog_unit_price};
pub use tracking::{InvalidStage, TrackingHistory, TrackingService, TrackingStage, TrackingStep};
