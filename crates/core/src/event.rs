//! Build events — progress reporting decoupled from the build loop.
//!
//! The builder publishes events as it drafts, validates and executes.
//! The CLI (or tests) subscribe to react without tight coupling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::geometry::BlockPos;

/// Everything observable about a build in progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BuildEvent {
    /// A draft was requested from the planning service
    DraftRequested {
        build_id: String,
        attempt: u32,
        with_feedback: bool,
        timestamp: DateTime<Utc>,
    },

    /// A draft failed planning or validation
    PlanRejected {
        build_id: String,
        attempt: u32,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A draft passed validation
    PlanAccepted {
        build_id: String,
        attempt: u32,
        operations: usize,
        timestamp: DateTime<Utc>,
    },

    /// One operation reached the world
    OperationApplied {
        build_id: String,
        index: usize,
        position: BlockPos,
        material: String,
        timestamp: DateTime<Utc>,
    },

    /// The build ended
    BuildFinished {
        build_id: String,
        success: bool,
        operations_applied: usize,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for build events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<BuildEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: BuildEvent) {
        // Ignore send errors (no subscribers = that's fine)
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<BuildEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
