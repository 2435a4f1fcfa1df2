use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use super::{Entry, RequeueKey};
use crate::util::Error;

/// Owns the pacing state of every resource a process reconciles.
/// One store is created at startup and shared by all controllers.
#[derive(Debug)]
pub struct RequeueStore {
    min_interval: Duration,
    max_interval: Duration,
    multiplier: f64,
    entries: Mutex<HashMap<RequeueKey, Duration>>,
}

impl RequeueStore {
    /// Creates an empty store. Fails if `min_interval` exceeds
    /// `max_interval` or the multiplier would shrink the interval.
    pub fn new(
        min_interval: Duration,
        max_interval: Duration,
        multiplier: f64,
    ) -> Result<Self, Error> {
        if min_interval > max_interval {
            return Err(Error::UserInputError(format!(
                "minimum requeue interval {:?} exceeds maximum {:?}",
                min_interval, max_interval
            )));
        }
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(Error::UserInputError(format!(
                "requeue multiplier must be at least 1, got {}",
                multiplier
            )));
        }
        Ok(RequeueStore {
            min_interval,
            max_interval,
            multiplier,
            entries: Mutex::new(HashMap::new()),
        })
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn max_interval(&self) -> Duration {
        self.max_interval
    }

    /// Returns the entry for `key`, starting it at the minimum
    /// interval if the key has not been seen before.
    pub fn entry(self: &Arc<Self>, key: RequeueKey) -> Entry {
        self.lock()
            .entry(key.clone())
            .or_insert(self.min_interval);
        Entry::new(self.clone(), key)
    }

    /// Number of keys currently tracked.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the interval the next `stable()` call on `key` would
    /// hand out, or `None` if the key is not tracked.
    pub fn next_duration(&self, key: &RequeueKey) -> Option<Duration> {
        self.lock().get(key).copied()
    }

    /// Returns the current interval for `key` and advances it one step.
    pub(super) fn take_and_advance(&self, key: &RequeueKey) -> Duration {
        let mut entries = self.lock();
        let next = entries.entry(key.clone()).or_insert(self.min_interval);
        let current = *next;
        *next = self.advance(current);
        current
    }

    /// Resets `key` to the minimum interval, which is returned, and
    /// advances it one step for the call after.
    pub(super) fn restart(&self, key: &RequeueKey) -> Duration {
        self.lock()
            .insert(key.clone(), self.advance(self.min_interval));
        self.min_interval
    }

    pub(super) fn remove(&self, key: &RequeueKey) {
        self.lock().remove(key);
    }

    /// One backoff step from `current`, capped at the maximum interval.
    fn advance(&self, current: Duration) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * self.multiplier)
            .map_or(self.max_interval, |next| next.min(self.max_interval))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RequeueKey, Duration>> {
        // The map holds plain durations, so a panic while the lock
        // was held cannot leave it half-updated.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
