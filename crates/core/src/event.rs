//! Domain event system — decoupled observability for the orchestration core.
//!
//! Events are published as a run progresses. Metrics, dashboards, or test
//! probes can subscribe without coupling to the loop internals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A hop's plan was validated and accepted
    HopPlanned {
        conversation_id: String,
        hop: usize,
        action_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// A retrieval action finished (success or failure)
    ActionExecuted {
        action_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A coverage evaluation completed
    CoverageEvaluated {
        conversation_id: String,
        hop: usize,
        score: f64,
        sufficient: bool,
        timestamp: DateTime<Utc>,
    },

    /// The reply was delivered (or delivery failed)
    ResponseDelivered {
        conversation_id: String,
        delivered: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The conversation was escalated to a human
    Escalated {
        conversation_id: String,
        origin: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// The run reached its terminal state
    Finalized {
        conversation_id: String,
        status: String,
        hops: usize,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
/// Components can subscribe to receive all events and filter for what they care about.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // Ignore send errors (no subscribers = that's fine)
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
