//! Subscriber registry: one callback per build id, and routing of raw frames to it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::LiveError;
use crate::models::BuildStatusUpdate;

/// Callback invoked with every update for one build.
///
/// Runs on the client's worker task, so it must not block. A panic is caught
/// and logged; other builds keep receiving updates.
pub type StatusCallback = Arc<dyn Fn(BuildStatusUpdate) + Send + Sync>;

/// Where a raw inbound frame goes.
pub enum Route {
    Deliver {
        callback: StatusCallback,
        update: BuildStatusUpdate,
    },
    /// Decoded fine, but nobody is subscribed to this build.
    Unclaimed { build_id: String },
    Malformed(LiveError),
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Deliver { update, .. } => f.debug_struct("Deliver").field("update", update).finish(),
            Route::Unclaimed { build_id } => {
                f.debug_struct("Unclaimed").field("build_id", build_id).finish()
            }
            Route::Malformed(e) => f.debug_tuple("Malformed").field(e).finish(),
        }
    }
}

/// Build id -> callback. Inserting an existing id replaces its callback.
#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: HashMap<String, StatusCallback>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when an earlier callback was replaced.
    pub fn insert(&mut self, build_id: impl Into<String>, callback: StatusCallback) -> bool {
        self.subscribers.insert(build_id.into(), callback).is_some()
    }

    /// Returns `true` when an entry was removed.
    pub fn remove(&mut self, build_id: &str) -> bool {
        self.subscribers.remove(build_id).is_some()
    }

    pub fn clear(&mut self) {
        self.subscribers.clear();
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Decode `raw` and find its subscriber. Invokes nothing.
    pub fn route(&self, raw: &str) -> Route {
        let update = match BuildStatusUpdate::decode(raw) {
            Ok(update) => update,
            Err(e) => return Route::Malformed(e),
        };
        match self.subscribers.get(&update.build_id) {
            Some(callback) => Route::Deliver {
                callback: Arc::clone(callback),
                update,
            },
            None => Route::Unclaimed {
                build_id: update.build_id,
            },
        }
    }
}
