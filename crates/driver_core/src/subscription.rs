//! Scoped subscriptions.
//!
//! Every live listener (realtime feed, location watcher, profile channel) is
//! represented by a [`Subscription`] holding its disposer. Dropping the handle
//! releases the listener, so teardown cannot be forgotten.

use std::fmt;

type Disposer = Box<dyn FnOnce() + Send + Sync>;

pub struct Subscription {
    label: &'static str,
    disposer: Option<Disposer>,
}

impl Subscription {
    pub fn new<F>(label: &'static str, disposer: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            label,
            disposer: Some(Box::new(disposer)),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Releases the listener now instead of at drop time.
    pub fn dispose(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(disposer) = self.disposer.take() {
            tracing::debug!(subscription = self.label, "subscription released");
            disposer();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("label", &self.label)
            .field("active", &self.disposer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(label: &'static str, counter: &Arc<AtomicUsize>) -> Subscription {
        let counter = Arc::clone(counter);
        Subscription::new(label, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn drop_runs_disposer_once() {
        let released = Arc::new(AtomicUsize::new(0));
        {
            let _sub = counting("rides", &released);
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn explicit_dispose_does_not_double_release() {
        let released = Arc::new(AtomicUsize::new(0));
        let sub = counting("rides", &released);
        assert_eq!(sub.label(), "rides");
        sub.dispose();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
