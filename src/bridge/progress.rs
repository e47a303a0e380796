//! Progress observer registry.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::types::{ProgressCallback, RequestId};

/// Observers registered per request, waiting to be attached to a body.
#[derive(Default)]
pub(crate) struct ProgressRegistry {
    callbacks: Mutex<HashMap<RequestId, ProgressCallback>>,
}

impl ProgressRegistry {
    /// Registers an observer; `None` deregisters.
    pub(crate) fn register(&self, id: RequestId, callback: Option<ProgressCallback>) {
        let mut callbacks = self.callbacks.lock();
        match callback {
            Some(callback) => {
                callbacks.insert(id, callback);
            }
            None => {
                callbacks.remove(&id);
            }
        }
    }

    /// Removes and returns the observer for a request.
    pub(crate) fn take(&self, id: RequestId) -> Option<ProgressCallback> {
        self.callbacks.lock().remove(&id)
    }

    /// Drops any observer still registered for a request.
    pub(crate) fn remove(&self, id: RequestId) {
        self.callbacks.lock().remove(&id);
    }

    pub(crate) fn len(&self) -> usize {
        self.callbacks.lock().len()
    }
}

impl std::fmt::Debug for ProgressRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressRegistry")
            .field("registered", &self.len())
            .finish()
    }
}
