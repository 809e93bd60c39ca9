//! Shipment stages.

use chrono::{DateTime, Utc};
use common::{TrackingEventId, TrackingId};
use order_store::TrackingEventRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A stored stage number outside 0..=3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid tracking stage: {0}")]
pub struct InvalidStage(pub i16);

/// Shipment progress of one order item.
///
/// ```text
/// Processed ──► Shipped ──► EnRoute ──► Arrived
/// ```
///
/// Stages only move forward, one step at a time. `Arrived` is terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(try_from = "i16", into = "i16")]
pub enum TrackingStage {
    #[default]
    Processed,
    Shipped,
    EnRoute,
    Arrived,
}

impl TrackingStage {
    pub const ALL: [TrackingStage; 4] = [
        TrackingStage::Processed,
        TrackingStage::Shipped,
        TrackingStage::EnRoute,
        TrackingStage::Arrived,
    ];

    /// The stage number persisted on tracking rows.
    pub fn as_i16(&self) -> i16 {
        match self {
            TrackingStage::Processed => 0,
            TrackingStage::Shipped => 1,
            TrackingStage::EnRoute => 2,
            TrackingStage::Arrived => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackingStage::Processed => "Processed",
            TrackingStage::Shipped => "Shipped",
            TrackingStage::EnRoute => "EnRoute",
            TrackingStage::Arrived => "Arrived",
        }
    }

    /// The following stage, or `None` once arrived.
    pub fn next(&self) -> Option<TrackingStage> {
        match self {
            TrackingStage::Processed => Some(TrackingStage::Shipped),
            TrackingStage::Shipped => Some(TrackingStage::EnRoute),
            TrackingStage::EnRoute => Some(TrackingStage::Arrived),
            TrackingStage::Arrived => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TrackingStage::Arrived)
    }

    pub fn title(&self) -> &'static str {
        match self {
            TrackingStage::Processed => "Order Processed",
            TrackingStage::Shipped => "Order Shipped",
            TrackingStage::EnRoute => "Order En Route",
            TrackingStage::Arrived => "Order Arrived",
        }
    }

    pub fn summary(&self) -> &'static str {
        match self {
            TrackingStage::Processed => "Your Order is being processed",
            TrackingStage::Shipped => "Your Order is Shipped",
            TrackingStage::EnRoute => "Your Order is in Route",
            TrackingStage::Arrived => "Order Arrived",
        }
    }

    /// Builds the history entry recording that a record reached this stage.
    pub fn event(&self, tracking_id: TrackingId, at: DateTime<Utc>) -> TrackingEventRecord {
        TrackingEventRecord {
            id: TrackingEventId::new(),
            tracking_id,
            stage: self.as_i16(),
            title: self.title().to_string(),
            summary: self.summary().to_string(),
            created_at: at,
        }
    }
}

impl TryFrom<i16> for TrackingStage {
    type Error = InvalidStage;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TrackingStage::Processed),
            1 => Ok(TrackingStage::Shipped),
            2 => Ok(TrackingStage::EnRoute),
            3 => Ok(TrackingStage::Arrived),
            other => Err(InvalidStage(other)),
        }
    }
}

impl From<TrackingStage> for i16 {
    fn from(stage: TrackingStage) -> Self {
        stage.as_i16()
    }
}

impl std::fmt::Display for TrackingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_advance_one_step_at_a_time() {
        let mut stage = TrackingStage::default();
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            assert_eq!(next.as_i16(), stage.as_i16() + 1);
            stage = next;
            seen.push(stage);
        }
        assert_eq!(seen, TrackingStage::ALL.to_vec());
        assert!(stage.is_terminal());
    }

    #[test]
    fn stage_numbers_round_trip() {
        for stage in TrackingStage::ALL {
            assert_eq!(TrackingStage::try_from(stage.as_i16()), Ok(stage));
        }
        assert_eq!(TrackingStage::try_from(4), Err(InvalidStage(4)));
        assert_eq!(TrackingStage::try_from(-1), Err(InvalidStage(-1)));
    }

    #[test]
    fn event_text_comes_from_fixed_table() {
        let tracking_id = TrackingId::new();
        let event = TrackingStage::EnRoute.event(tracking_id, Utc::now());
        assert_eq!(event.tracking_id, tracking_id);
        assert_eq!(event.stage, 2);
        assert_eq!(event.title, "Order En Route");
        assert_eq!(event.summary, "Your Order is in Route");
    }

    #[test]
    fn serializes_as_stage_number() {
        let json = serde_json::to_string(&TrackingStage::Shipped).unwrap();
        assert_eq!(json, "1");
    }
}
