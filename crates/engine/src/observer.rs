//! Lifecycle observation
//!
//! Load, flush and clear failures never reach the caller of the cache API.
//! They are reported here instead, to a `CacheObserver` chosen at
//! construction. The default observer writes them to `tracing`.

/// Something the background lifecycle did or failed to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// Initial load replaced the store with the persisted snapshot
    Restored {
        /// Records in the restored store
        records: usize,
        /// Root-call mappings in the restored store
        root_calls: usize,
    },
    /// Initial load found no snapshot (absent or empty value)
    NoSnapshot,
    /// Initial load found a snapshot that could not be decoded; the store was reset
    Discarded {
        /// Decode error
        reason: String,
    },
    /// Initial load could not read the medium; the store was left as is
    LoadFailed {
        /// Medium error
        reason: String,
    },
    /// A snapshot was written
    Flushed {
        /// Length of the written snapshot
        bytes: usize,
    },
    /// A snapshot could not be encoded or written
    FlushFailed {
        /// Codec or medium error
        reason: String,
    },
    /// The persisted snapshot was removed
    Cleared,
    /// Removing the persisted snapshot failed
    ClearFailed {
        /// Medium error
        reason: String,
    },
}

impl CacheEvent {
    /// True for events reporting a failure
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            CacheEvent::Discarded { .. }
                | CacheEvent::LoadFailed { .. }
                | CacheEvent::FlushFailed { .. }
                | CacheEvent::ClearFailed { .. }
        )
    }
}

/// Receives lifecycle events.
///
/// Called from background tasks; implementations must be cheap and must not
/// block.
pub trait CacheObserver: Send + Sync {
    /// Handle one event
    fn on_event(&self, event: &CacheEvent);
}

/// Observer that logs events through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl CacheObserver for TracingObserver {
    fn on_event(&self, event: &CacheEvent) {
        match event {
            CacheEvent::Restored {
                records,
                root_calls,
            } => {
                tracing::info!(
                    target: "relaycache::load",
                    records = records,
                    root_calls = root_calls,
                    "Restored cache from snapshot"
                );
            }
            CacheEvent::NoSnapshot => {
                tracing::debug!(target: "relaycache::load", "No persisted snapshot, starting empty");
            }
            CacheEvent::Discarded { reason } => {
                tracing::warn!(
                    target: "relaycache::load",
                    error = %reason,
                    "Discarded unreadable snapshot, starting empty"
                );
            }
            CacheEvent::LoadFailed { reason } => {
                tracing::warn!(target: "relaycache::load", error = %reason, "Failed to read snapshot");
            }
            CacheEvent::Flushed { bytes } => {
                tracing::trace!(target: "relaycache::flush", bytes = bytes, "Flushed snapshot");
            }
            CacheEvent::FlushFailed { reason } => {
                tracing::warn!(target: "relaycache::flush", error = %reason, "Failed to flush snapshot");
            }
            CacheEvent::Cleared => {
                tracing::debug!(target: "relaycache::storage", "Cleared persisted snapshot");
            }
            CacheEvent::ClearFailed { reason } => {
                tracing::warn!(
                    target: "relaycache::storage",
                    error = %reason,
                    "Failed to remove persisted snapshot"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_classification() {
        assert!(!CacheEvent::NoSnapshot.is_failure());
        assert!(!CacheEvent::Flushed { bytes: 10 }.is_failure());
        assert!(!CacheEvent::Cleared.is_failure());
        assert!(CacheEvent::FlushFailed {
            reason: "x".into()
        }
        .is_failure());
        assert!(CacheEvent::Discarded {
            reason: "x".into()
        }
        .is_failure());
    }

    #[test]
    fn test_tracing_observer_accepts_every_event() {
        let observer = TracingObserver;
        for event in [
            CacheEvent::Restored {
                records: 1,
                root_calls: 0,
            },
            CacheEvent::NoSnapshot,
            CacheEvent::LoadFailed {
                reason: "offline".into(),
            },
            CacheEvent::Cleared,
        ] {
            observer.on_event(&event);
        }
    }
}
