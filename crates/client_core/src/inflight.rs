use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
};

use crate::error::RequestInFlight;

/// Keys of mutations currently awaiting the server. A second request for the
/// same key is refused until the first guard drops.
#[derive(Debug, Clone, Default)]
pub struct InflightRegistry {
    keys: Arc<Mutex<HashSet<String>>>,
}

impl InflightRegistry {
    pub fn begin(&self, key: impl Into<String>) -> Result<InflightGuard, RequestInFlight> {
        let key = key.into();
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        if !keys.insert(key.clone()) {
            return Err(RequestInFlight { operation: key });
        }
        Ok(InflightGuard {
            keys: Arc::clone(&self.keys),
            key,
        })
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }
}

#[derive(Debug)]
pub struct InflightGuard {
    keys: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}
