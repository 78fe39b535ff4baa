use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::AuthError;

/// Remembers token nonces long enough to reject a second presentation.
pub trait NonceStore: Send + Sync {
    /// Record `nonce` as used at `now`; fails if it is still remembered.
    fn check_and_record(&self, nonce: &str, now: i64, ttl: Duration) -> Result<(), AuthError>;
}

/// Process-local nonce store. Expired entries are pruned on insert.
#[derive(Debug, Default)]
pub struct MemoryNonceStore {
    seen: Mutex<HashMap<String, i64>>,
}

impl MemoryNonceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().map(|seen| seen.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NonceStore for MemoryNonceStore {
    fn check_and_record(&self, nonce: &str, now: i64, ttl: Duration) -> Result<(), AuthError> {
        let mut seen = self
            .seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        seen.retain(|_, expires| *expires > now);
        if seen.contains_key(nonce) {
            return Err(AuthError::ReplayDetected);
        }
        seen.insert(nonce.to_string(), now + ttl.as_secs() as i64);
        Ok(())
    }
}
