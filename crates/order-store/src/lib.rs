//! Transactional relational store for the order fulfillment core.
//!
//! The [`Store`] trait exposes plain reads plus [`Store::begin`], which opens
//! a [`StoreTx`] whose writes become visible together on commit or not at
//! all. Two implementations are provided: [`PostgresStore`] backed by `sqlx`
//! and [`InMemoryStore`] for tests and local runs.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod records;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{FaultPoint, InMemoryStore, InMemoryTx};
pub use postgres::{PostgresStore, PostgresTx};
pub use records::{
    AddressRecord, CartItemRecord, CartRecord, OrderItemRecord, OrderItemView, OrderRecord,
    PaymentRecord, ProductRecord, PromoRecord, SlotRecord, TrackingEventRecord, TrackingRecord,
};
pub use store::{CartLine, Store, StoreTx, TrackingEventStream};
