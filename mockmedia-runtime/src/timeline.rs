//! # Cooperative Timeline
//!
//! Token-keyed, cancellable, coalescing timers built on
//! `tokio_util::time::DelayQueue`.
//!
//! The whole fixture runs on one logical timeline: every delayed callback —
//! the player's script tick and track-end timer, deferred browse replies,
//! self-update notifications, delayed action results — is an entry in a
//! [`Timeline`], and expirations are only ever observed by the single task
//! that owns it. A verb handler and a timer callback therefore never
//! interleave mid-mutation; the timeline *is* the lock.
//!
//! Keying rules:
//!
//! - Scheduling a key that is already armed **replaces** the pending entry
//!   (delay and payload of the newer scheduling win). This is what gives
//!   delayed action results their "latest write wins" coalescing.
//! - Cancelling a key that already fired, or was never armed, is a no-op.
//! - `delay` is a scheduling offset, never a blocking sleep; a zero delay
//!   still goes through the queue and is observed asynchronously.
//!
//! Under `#[tokio::test(start_paused = true)]` the queue runs on virtual
//! time, which is what makes scripted scenarios fully deterministic.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::Poll;
use std::time::Duration;

use tokio_util::time::delay_queue::Key;
use tokio_util::time::DelayQueue;

/// Opaque process-unique equality key for timeline entries.
///
/// The default token of a delayed result is fresh, i.e. coalesced with
/// nothing; callers wanting supersede-on-reschedule semantics share one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimelineToken(u64);

impl TimelineToken {
    /// Mints a token equal only to copies of itself.
    pub fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A set of armed timers keyed by caller-chosen tokens.
///
/// `K` is the cancellation/coalescing key, `V` the payload handed back on
/// expiry. At most one entry per key is armed at any time.
pub struct Timeline<K, V> {
    queue: DelayQueue<(K, V)>,
    armed: HashMap<K, Key>,
}

impl<K, V> Timeline<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            queue: DelayQueue::new(),
            armed: HashMap::new(),
        }
    }

    /// Arms `key` to expire with `value` after `delay`.
    ///
    /// If `key` is already armed, the pending entry is removed first — its
    /// payload is dropped unobserved and only the new scheduling fires.
    pub fn schedule(&mut self, key: K, delay: Duration, value: V) {
        if let Some(old) = self.armed.remove(&key) {
            self.queue.remove(&old);
        }
        let handle = self.queue.insert((key.clone(), value), delay);
        self.armed.insert(key, handle);
    }

    /// Disarms `key`. Returns `false` (a no-op) when the key is not armed,
    /// which includes the case of a timer that already fired.
    pub fn cancel(&mut self, key: &K) -> bool {
        match self.armed.remove(key) {
            Some(handle) => {
                self.queue.remove(&handle);
                true
            }
            None => false,
        }
    }

    /// Whether `key` is currently armed.
    pub fn is_armed(&self, key: &K) -> bool {
        self.armed.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.armed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.armed.len()
    }

    /// Waits for the next entry to expire and hands it back.
    ///
    /// An empty timeline never resolves; callers either guard with
    /// [`Timeline::is_empty`] in a `select!` arm or know the timeline is
    /// non-empty. The future is cancel-safe: dropping it leaves all entries
    /// armed.
    pub async fn expired(&mut self) -> (K, V) {
        futures::future::poll_fn(|cx| match self.queue.poll_expired(cx) {
            Poll::Ready(Some(entry)) => {
                let (key, value) = entry.into_inner();
                self.armed.remove(&key);
                Poll::Ready((key, value))
            }
            // An exhausted queue reports Ready(None); the surrounding actor
            // loop re-polls after every command, so parking here is safe.
            Poll::Ready(None) | Poll::Pending => Poll::Pending,
        })
        .await
    }
}

impl<K, V> Default for Timeline<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for Timeline<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timeline")
            .field("armed", &self.armed.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, Instant};

    #[tokio::test(start_paused = true)]
    async fn fires_in_deadline_order() {
        let mut timeline: Timeline<&str, u32> = Timeline::new();
        timeline.schedule("late", Duration::from_millis(500), 2);
        timeline.schedule("early", Duration::from_millis(100), 1);

        assert_eq!(timeline.expired().await, ("early", 1));
        assert_eq!(timeline.expired().await, ("late", 2));
        assert!(timeline.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_a_key_replaces_the_pending_entry() {
        let mut timeline: Timeline<&str, u32> = Timeline::new();
        timeline.schedule("token", Duration::from_millis(100), 1);
        timeline.schedule("token", Duration::from_millis(300), 2);
        assert_eq!(timeline.len(), 1);

        let start = Instant::now();
        let (key, value) = timeline.expired().await;
        assert_eq!((key, value), ("token", 2));
        // The first scheduling's deadline must not have fired.
        assert_eq!(start.elapsed(), Duration::from_millis(300));
        assert!(timeline.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_disarms_and_is_noop_after_fire() {
        let mut timeline: Timeline<&str, ()> = Timeline::new();
        timeline.schedule("a", Duration::from_millis(50), ());
        assert!(timeline.cancel(&"a"));
        assert!(!timeline.cancel(&"a"));
        assert!(timeline.is_empty());

        timeline.schedule("b", Duration::from_millis(50), ());
        timeline.expired().await;
        assert!(!timeline.cancel(&"b"));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_delay_is_still_asynchronous() {
        let mut timeline: Timeline<&str, ()> = Timeline::new();
        timeline.schedule("now", Duration::ZERO, ());
        // Not observable synchronously; still armed until awaited.
        assert!(timeline.is_armed(&"now"));
        timeline.expired().await;
        assert!(!timeline.is_armed(&"now"));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_is_cancel_safe() {
        let mut timeline: Timeline<&str, u32> = Timeline::new();
        timeline.schedule("k", Duration::from_millis(200), 7);

        // Poll once without letting it complete, then drop the future.
        {
            let fut = timeline.expired();
            futures::pin_mut!(fut);
            assert!(futures::poll!(fut.as_mut()).is_pending());
        }

        advance(Duration::from_millis(200)).await;
        assert_eq!(timeline.expired().await, ("k", 7));
    }

    #[test]
    fn tokens_are_unique() {
        let a = TimelineToken::fresh();
        let b = TimelineToken::fresh();
        assert_ne!(a, b);
        assert_eq!(a, a);
    }
}
