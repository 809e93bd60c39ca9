//! Order placement and listings.

mod commands;
mod service;

pub use commands::{PlaceOrder, PlacementOutcome};
pub use service::{OrderListing, OrderService};
