//! # Event Bus System
//!
//! Provides an event-driven channel between the service modules using
//! `tokio::sync::broadcast`. The token manager and the sync coordinator publish
//! typed events; the binary (or a test) subscribes to observe what happened
//! without reaching into either module.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
//!
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Auth(AuthEvent::TokenRefreshed { expires_at: 1_700_000_000 }))
//!     .ok();
//!
//! assert!(subscriber.try_recv().is_ok());
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.
//!
//! Publishing with no subscribers returns an error that emitters ignore.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Authentication-related events
    Auth(AuthEvent),
    /// Polling cycle events
    Sync(SyncEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Auth(e) => e.description(),
            CoreEvent::Sync(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Auth(AuthEvent::AuthError { .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncEvent::CycleFailed { .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncEvent::CycleSkipped { .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::CycleCompleted { failed, .. }) if *failed > 0 => {
                EventSeverity::Warning
            }
            CoreEvent::Auth(AuthEvent::Authorized { .. }) => EventSeverity::Info,
            CoreEvent::Sync(SyncEvent::CycleCompleted { .. }) => EventSeverity::Info,
            CoreEvent::Sync(SyncEvent::FolderProvisioned { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Authentication Events
// ============================================================================

/// Events related to the tracking-system credential.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// An authorization code was exchanged for a first token pair.
    Authorized {
        /// Expiry of the new access token (Unix epoch seconds).
        expires_at: i64,
    },
    /// Access token is within the safety margin and is being refreshed.
    TokenRefreshing,
    /// Token refresh completed and the credential file was rewritten.
    TokenRefreshed {
        /// Expiry of the new access token (Unix epoch seconds).
        expires_at: i64,
    },
    /// Authentication error occurred.
    AuthError {
        /// Human-readable error message. Never contains token material.
        message: String,
        /// Whether a later cycle may succeed without operator action.
        recoverable: bool,
    },
}

impl AuthEvent {
    fn description(&self) -> &str {
        match self {
            AuthEvent::Authorized { .. } => "Authorization code exchanged",
            AuthEvent::TokenRefreshing => "Refreshing access token",
            AuthEvent::TokenRefreshed { .. } => "Token refreshed successfully",
            AuthEvent::AuthError { .. } => "Authentication error",
        }
    }
}

// ============================================================================
// Sync Events
// ============================================================================

/// Events emitted by the polling loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// A cycle passed its preconditions and is about to fetch.
    CycleStarted {
        cycle_id: String,
        /// Window start (RFC 3339)
        window_from: String,
        /// Window end (RFC 3339)
        window_to: String,
    },
    /// A job folder was materialized.
    FolderProvisioned {
        cycle_id: String,
        /// Raw job identifier
        identifier: String,
        /// Full path of the new folder
        path: String,
        /// `true` when the template copy succeeded, `false` for an empty folder
        from_template: bool,
    },
    /// The batch finished and the checkpoint advanced.
    CycleCompleted {
        cycle_id: String,
        /// Jobs the tracking system returned, before filtering
        fetched: u64,
        provisioned: u64,
        skipped: u64,
        failed: u64,
        duration_ms: u64,
    },
    /// Fetch or parse failed; the checkpoint did not move.
    CycleFailed { cycle_id: String, message: String },
    /// Preconditions were not met; nothing was fetched.
    CycleSkipped { cycle_id: String, reason: String },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::CycleStarted { .. } => "Polling cycle started",
            SyncEvent::FolderProvisioned { .. } => "Job folder provisioned",
            SyncEvent::CycleCompleted { .. } => "Polling cycle completed",
            SyncEvent::CycleFailed { .. } => "Polling cycle failed",
            SyncEvent::CycleSkipped { .. } => "Polling cycle skipped",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for [`CoreEvent`]s.
///
/// Cloning the bus is cheap; all clones publish into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// When a subscriber falls behind by more than `capacity` events it will
    /// receive `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(failed: u64) -> CoreEvent {
        CoreEvent::Sync(SyncEvent::CycleCompleted {
            cycle_id: "cycle-1".to_string(),
            fetched: 3,
            provisioned: 2,
            skipped: 1,
            failed,
            duration_ms: 420,
        })
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);

        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(CoreEvent::Auth(AuthEvent::TokenRefreshing)).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = CoreEvent::Sync(SyncEvent::CycleStarted {
            cycle_id: "cycle-1".to_string(),
            window_from: "2024-01-01T00:00:00Z".to_string(),
            window_to: "2024-01-01T00:01:00Z".to_string(),
        });

        assert_eq!(bus.emit(event.clone()).unwrap(), 2);
        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(CoreEvent::Auth(AuthEvent::TokenRefreshed { expires_at: i }))
                .ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let auth_error = CoreEvent::Auth(AuthEvent::AuthError {
            message: "refresh rejected".to_string(),
            recoverable: false,
        });
        assert_eq!(auth_error.severity(), EventSeverity::Error);

        assert_eq!(completed(0).severity(), EventSeverity::Info);
        assert_eq!(completed(2).severity(), EventSeverity::Warning);

        let skipped = CoreEvent::Sync(SyncEvent::CycleSkipped {
            cycle_id: "c".to_string(),
            reason: "no destinations".to_string(),
        });
        assert_eq!(skipped.severity(), EventSeverity::Warning);
        assert_eq!(
            CoreEvent::Auth(AuthEvent::TokenRefreshing).severity(),
            EventSeverity::Debug
        );
    }

    #[test]
    fn test_event_description() {
        assert_eq!(completed(0).description(), "Polling cycle completed");
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Sync(SyncEvent::FolderProvisioned {
            cycle_id: "cycle-9".to_string(),
            identifier: "9000549_1".to_string(),
            path: "/Active Jobs/9000549_1 - ALPHA".to_string(),
            from_template: true,
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Sync\""));
        assert!(json.contains("FolderProvisioned"));

        let deserialized: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, event);
    }
}
