//! Per-user in-flight tracking
//!
//! A second sync or push for a user who already has one pending is rejected
//! rather than allowed to race the first one's local write.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
pub struct InFlightRegistry {
    users: Arc<Mutex<HashSet<String>>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `user_id` as busy. Returns `None` if it already is.
    pub fn try_acquire(&self, user_id: &str) -> Option<InFlightGuard> {
        if !self.lock().insert(user_id.to_string()) {
            return None;
        }
        Some(InFlightGuard {
            registry: self.clone(),
            user_id: user_id.to_string(),
        })
    }

    pub fn is_in_flight(&self, user_id: &str) -> bool {
        self.lock().contains(user_id)
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        // the set stays consistent even if a holder panicked
        self.users.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Releases the user's in-flight slot on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    registry: InFlightRegistry,
    user_id: String,
}

impl InFlightGuard {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.user_id);
    }
}
