use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Generation state of a preview key that has no artifact yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimState {
    /// A job for this key is queued or running.
    Queued,
    /// The key was purged while its job was in flight. The job's output is
    /// discarded and the key is not claimed again until the job settles.
    Cancelled,
    /// The last job failed; the next ensure may claim the key again.
    Failed,
}

/// Claim table keyed by preview blob key.
///
/// This is the only shared mutable state of the preview pipeline. Claim-if-absent
/// happens under one lock, so concurrent callers for the same key get exactly one
/// winner. Only the worker running a job removes its claim.
#[derive(Debug, Clone, Default)]
pub struct ClaimTable {
    inner: Arc<Mutex<HashMap<String, ClaimState>>>,
}

impl ClaimTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key` for generation. Returns `false` when a job is already in flight.
    pub async fn try_claim(&self, key: &str) -> bool {
        let mut claims = self.inner.lock().await;
        match claims.get(key) {
            Some(ClaimState::Queued) | Some(ClaimState::Cancelled) => false,
            Some(ClaimState::Failed) | None => {
                claims.insert(key.to_string(), ClaimState::Queued);
                true
            }
        }
    }

    pub async fn state(&self, key: &str) -> Option<ClaimState> {
        self.inner.lock().await.get(key).copied()
    }

    pub async fn release(&self, key: &str) {
        self.inner.lock().await.remove(key);
    }

    /// Settle a successful job. Returns `false` and keeps the claim when the key
    /// was cancelled while the job ran; the caller discards the artifact and then
    /// releases the key.
    pub async fn settle(&self, key: &str) -> bool {
        let mut claims = self.inner.lock().await;
        if claims.get(key) == Some(&ClaimState::Cancelled) {
            return false;
        }
        claims.remove(key);
        true
    }

    pub async fn mark_failed(&self, key: &str) {
        self.inner
            .lock()
            .await
            .insert(key.to_string(), ClaimState::Failed);
    }

    /// Forget failures under `prefix` and cancel in-flight jobs there.
    /// Returns how many in-flight jobs were cancelled.
    pub async fn cancel_prefix(&self, prefix: &str) -> usize {
        let mut claims = self.inner.lock().await;
        claims.retain(|key, state| !(key.starts_with(prefix) && *state == ClaimState::Failed));

        let mut cancelled = 0;
        for (key, state) in claims.iter_mut() {
            if key.starts_with(prefix) && *state == ClaimState::Queued {
                *state = ClaimState::Cancelled;
                cancelled += 1;
            }
        }
        cancelled
    }
}
