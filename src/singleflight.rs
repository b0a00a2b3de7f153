//! [`SingleFlight`]: at-most-one concurrent origin fetch per cache key
//! (spec §4.8).
//!
//! Grounded in the `Notify`-based request-coalescing pattern in
//! `examples/other_examples/8c86f8be_rust-dd-tako__src-plugins-idempotency.rs.rs`:
//! an in-flight slot per key holding a [`tokio::sync::Notify`]; waiters
//! park on it and re-consult the caller-supplied completion once notified,
//! the leader notifies all waiters when it finishes (success or failure).

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Notify;

/// Internal safety-net bound for a waiter with no caller-supplied
/// `wait_timeout`, matching spec §4.8's documented default maximum wait.
/// `Notify::notify_waiters` does not store a permit for calls to
/// `notified()` made after it fires, so a waiter that reads the map's slot
/// as occupied and is then descheduled before calling `notified()` could
/// miss a `complete()` that races in during that gap and hang forever.
/// Re-checking the map on this bound turns that (rare, genuine) lost
/// wakeup into bounded-latency forward progress instead of a deadlock.
const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(30);

/// Outcome of asking [`SingleFlight`] to run an operation for a key.
#[derive(Debug)]
pub enum Lead<T> {
    /// This caller is the leader and must perform the work itself, then
    /// call [`SingleFlight::complete`].
    Leader(LeaderToken),
    /// Another caller is already the leader; this caller waited for it and
    /// observed the given outcome (or timed out).
    Followed(Option<T>),
}

/// Held by the leader for the duration of its fetch; dropping it without
/// calling [`SingleFlight::complete`] (e.g. on cancellation/panic) still
/// notifies waiters so the first one can be promoted.
#[derive(Debug)]
pub struct LeaderToken {
    key: String,
    notify: Arc<Notify>,
    completed: bool,
}

impl Drop for LeaderToken {
    fn drop(&mut self) {
        if !self.completed {
            self.notify.notify_waiters();
        }
    }
}

#[derive(Debug)]
struct Slot {
    notify: Arc<Notify>,
}

/// Coalesces concurrent fetches for the same key. Cloneable; cheap to
/// share across tasks (the `DashMap` is the only state, behind an `Arc`).
#[derive(Debug, Clone, Default)]
pub struct SingleFlight {
    inflight: Arc<DashMap<String, Slot>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to become the leader for `key`. If another caller already leads,
    /// wait (optionally bounded by `wait_timeout`) until it completes, then
    /// return `Followed(None)` — per spec §4.8, waiters do not receive the
    /// leader's value directly; they re-consult the cache (the executor
    /// does this after `Followed`). If this caller becomes the leader, the
    /// caller must invoke [`SingleFlight::complete`] when it finishes.
    pub async fn enter<T>(
        &self,
        key: &str,
        wait_timeout: Option<Duration>,
    ) -> Lead<T> {
        loop {
            // dashmap's entry API is synchronous and serializes concurrent
            // inserters for the same key, so exactly one caller observes
            // `Vacant` and becomes the leader.
            let notify = {
                let entry = self.inflight.entry(key.to_string());
                match entry {
                    dashmap::mapref::entry::Entry::Occupied(occ) => {
                        occ.get().notify.clone()
                    }
                    dashmap::mapref::entry::Entry::Vacant(vac) => {
                        let notify = Arc::new(Notify::new());
                        vac.insert(Slot { notify: notify.clone() });
                        return Lead::Leader(LeaderToken {
                            key: key.to_string(),
                            notify,
                            completed: false,
                        });
                    }
                }
            };

            let bound = wait_timeout.unwrap_or(DEFAULT_MAX_WAIT);
            if tokio::time::timeout(bound, notify.notified()).await.is_ok() {
                return Lead::Followed(None);
            }
            if wait_timeout.is_some() {
                // Caller-specified timeout genuinely elapsed; give up.
                return Lead::Followed(None);
            }
            // No caller timeout: this was the internal safety-net bound.
            // Re-check whether the leader has actually finished (the
            // common case: we merely lost the wakeup race) before waiting
            // again.
            if !self.inflight.contains_key(key) {
                return Lead::Followed(None);
            }
        }
    }

    /// The leader calls this when its fetch finishes (success or failure)
    /// to release the slot and wake every waiter.
    pub fn complete<T>(&self, mut token: LeaderToken) {
        self.inflight.remove(&token.key);
        token.completed = true;
        token.notify.notify_waiters();
    }

    /// Non-blocking variant of [`Self::enter`]: become the leader for `key`
    /// if it is vacant, or return `None` immediately if someone else
    /// already leads rather than waiting. Used by the `stale-while-revalidate`
    /// background refresh trigger, which must not block the caller that
    /// fired it.
    pub fn try_enter(&self, key: &str) -> Option<LeaderToken> {
        match self.inflight.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => None,
            dashmap::mapref::entry::Entry::Vacant(vac) => {
                let notify = Arc::new(Notify::new());
                vac.insert(Slot { notify: notify.clone() });
                Some(LeaderToken { key: key.to_string(), notify, completed: false })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn ten_concurrent_callers_coalesce_to_one_leader() {
        let sf = SingleFlight::new();
        let origin_calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let sf = sf.clone();
            let origin_calls = origin_calls.clone();
            handles.push(tokio::spawn(async move {
                match sf.enter::<()>("key", None).await {
                    Lead::Leader(token) => {
                        origin_calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        sf.complete(token);
                        true
                    }
                    Lead::Followed(_) => false,
                }
            }));
        }
        let mut leaders = 0;
        for h in handles {
            if h.await.unwrap() {
                leaders += 1;
            }
        }
        assert_eq!(leaders, 1);
        assert_eq!(origin_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn leader_drop_without_complete_still_releases_waiters() {
        let sf = SingleFlight::new();
        let lead = sf.enter::<()>("key", None).await;
        let sf2 = sf.clone();
        let waiter = tokio::spawn(async move { sf2.enter::<()>("key", None).await });
        tokio::task::yield_now().await;
        match lead {
            Lead::Leader(token) => drop(token),
            _ => unreachable!(),
        }
        let outcome = tokio::time::timeout(Duration::from_millis(200), waiter)
            .await
            .expect("waiter should be released")
            .unwrap();
        assert!(matches!(outcome, Lead::Followed(None)));
    }

    #[test]
    fn try_enter_yields_leader_once_then_none_until_complete() {
        let sf = SingleFlight::new();
        let token = sf.try_enter("key").expect("vacant slot should yield a leader");
        assert!(sf.try_enter("key").is_none());
        sf.complete::<()>(token);
        assert!(sf.try_enter("key").is_some());
    }
}
