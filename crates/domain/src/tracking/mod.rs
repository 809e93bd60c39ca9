//! Tracking state machine.

mod service;
mod stage;

pub use service::{TrackingHistory, TrackingService, TrackingStep};
pub use stage::{InvalidStage, TrackingStage};
