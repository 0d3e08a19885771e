//! Event types for the earmark event system
//!
//! The review session is the only writer of the backing table. Everything a
//! view needs to know about table mutations leaves the session as a
//! [`ReviewEvent`] on the [`EventBus`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Review session events
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ReviewEvent {
    /// Backing table was replaced wholesale; all row references are invalid
    TableReset {
        table_id: Uuid,
        row_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Rows were appended to the backing table
    RowsAppended {
        table_id: Uuid,
        first: usize,
        last: usize,
        timestamp: DateTime<Utc>,
    },

    /// Rows became visible through materialization (view positions)
    RowsMaterialized {
        table_id: Uuid,
        first: usize,
        last: usize,
        timestamp: DateTime<Utc>,
    },

    /// Specific rows changed in place (tag resync)
    RowsChanged {
        table_id: Uuid,
        rows: Vec<usize>,
        timestamp: DateTime<Utc>,
    },

    /// Row order or visibility changed (sort, filter, regex)
    LayoutChanged {
        table_id: Uuid,
        visible: usize,
        timestamp: DateTime<Utc>,
    },

    /// Query input was rejected or partially applied
    QueryRejected {
        input: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A background import settled
    ImportFinished {
        path: PathBuf,
        rows: usize,
        timestamp: DateTime<Utc>,
    },

    /// A tag store write or removal failed
    TagWriteFailed {
        store: PathBuf,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl ReviewEvent {
    /// Short event name for logging
    pub fn event_type(&self) -> &str {
        match self {
            ReviewEvent::TableReset { .. } => "TableReset",
            ReviewEvent::RowsAppended { .. } => "RowsAppended",
            ReviewEvent::RowsMaterialized { .. } => "RowsMaterialized",
            ReviewEvent::RowsChanged { .. } => "RowsChanged",
            ReviewEvent::LayoutChanged { .. } => "LayoutChanged",
            ReviewEvent::QueryRejected { .. } => "QueryRejected",
            ReviewEvent::ImportFinished { .. } => "ImportFinished",
            ReviewEvent::TagWriteFailed { .. } => "TagWriteFailed",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block the session)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use earmark_common::events::{EventBus, ReviewEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(ReviewEvent::QueryRejected {
///     input: "snr:>>5".to_string(),
///     reason: "unsupported operator".to_string(),
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ReviewEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ReviewEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ReviewEvent,
    ) -> Result<usize, broadcast::error::SendError<ReviewEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ReviewEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_bus_new_has_capacity() {
        let bus = EventBus::new(100);
        assert_eq!(bus.capacity(), 100);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_emit_without_subscribers_fails() {
        let bus = EventBus::new(10);
        let result = bus.emit(ReviewEvent::LayoutChanged {
            table_id: Uuid::new_v4(),
            visible: 0,
            timestamp: Utc::now(),
        });
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_emit_delivers_to_subscriber() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        let table_id = Uuid::new_v4();

        bus.emit(ReviewEvent::RowsChanged {
            table_id,
            rows: vec![1, 3],
            timestamp: Utc::now(),
        })
        .unwrap();

        match rx.recv().await.unwrap() {
            ReviewEvent::RowsChanged { table_id: id, rows, .. } => {
                assert_eq!(id, table_id);
                assert_eq!(rows, vec![1, 3]);
            }
            other => panic!("unexpected event {}", other.event_type()),
        }
    }

    #[test]
    fn test_emit_lossy_on_full_channel_does_not_panic() {
        let bus = EventBus::new(2);
        let _rx = bus.subscribe();
        for _ in 0..5 {
            bus.emit_lossy(ReviewEvent::LayoutChanged {
                table_id: Uuid::nil(),
                visible: 0,
                timestamp: Utc::now(),
            });
        }
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = ReviewEvent::QueryRejected {
            input: "snr:>>5".to_string(),
            reason: "bad operator".to_string(),
            timestamp: Utc::now(),
        };
        assert_eq!(event.event_type(), "QueryRejected");
    }
}
