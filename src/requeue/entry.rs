use kube::runtime::controller::Action;
use std::{sync::Arc, time::Duration};

use super::{RequeueKey, RequeueStore};

/// Pacing handle for a single resource. A reconcile invocation obtains
/// one entry up front and finishes by calling exactly one of
/// [`Entry::stable`], [`Entry::progressing`], [`Entry::error`] or
/// [`Entry::never`].
#[derive(Debug, Clone)]
pub struct Entry {
    store: Arc<RequeueStore>,
    key: RequeueKey,
}

impl Entry {
    pub(super) fn new(store: Arc<RequeueStore>, key: RequeueKey) -> Self {
        Entry { store, key }
    }

    /// The resource is settled. Requeues after the current interval
    /// and backs off for the next call.
    pub fn stable(&self) -> Action {
        Action::requeue(self.store.take_and_advance(&self.key))
    }

    /// Work is underway. Requeues after the minimum interval; repeated
    /// `stable()` calls afterwards back off from there.
    pub fn progressing(&self) -> Action {
        Action::requeue(self.store.restart(&self.key))
    }

    /// Resets pacing and hands the error back for the controller's
    /// error policy to requeue.
    pub fn error<E>(&self, err: E) -> E {
        self.store.restart(&self.key);
        err
    }

    /// The resource's lifecycle is complete. Forgets the key and waits
    /// for the next change notification.
    pub fn never(&self) -> Action {
        self.store.remove(&self.key);
        Action::await_change()
    }

    /// The interval the next `stable()` call would return.
    pub fn next_duration(&self) -> Duration {
        self.store
            .next_duration(&self.key)
            .unwrap_or_else(|| self.store.min_interval())
    }
}
