//! Bounded FIFO queue with blocking `put`/`take`.
//!
//! A plain `tokio::sync::mpsc` channel is a fine fit for a fixed
//! producer/consumer pair, but the demuxer needs a single addressable object
//! it can `put` into *and* hand off whole to a lazily spawned
//! `EventProcessor` for `take` — so this folds sender/receiver into one
//! `BoundedQueue<T>` guarded by a `tokio::sync::Mutex`, with two `Notify`s
//! standing in for the channel's internal wakers.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

/// Returned by blocking queue operations when the queue was cancelled via its
/// `CancellationToken` before the operation could complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// A FIFO queue with a fixed capacity (or unbounded, if `capacity == 0`),
/// shared via an internal `Arc` so clones are cheap handles to the same
/// underlying storage.
pub struct BoundedQueue<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    capacity: usize,
    state: Mutex<VecDeque<T>>,
    not_empty: Notify,
    not_full: Notify,
    cancel: CancellationToken,
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        BoundedQueue { inner: self.inner.clone() }
    }
}

impl<T> BoundedQueue<T> {
    /// `capacity == 0` means unbounded: `put` never blocks.
    pub fn new(capacity: usize) -> Self {
        Self::with_cancellation(capacity, CancellationToken::new())
    }

    pub fn with_cancellation(capacity: usize, cancel: CancellationToken) -> Self {
        BoundedQueue {
            inner: Arc::new(Inner {
                capacity,
                state: Mutex::new(VecDeque::new()),
                not_empty: Notify::new(),
                not_full: Notify::new(),
                cancel,
            }),
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Number of elements currently queued.
    pub async fn available(&self) -> usize {
        self.inner.state.lock().await.len()
    }

    pub fn is_unbounded(&self) -> bool {
        self.inner.capacity == 0
    }

    /// Blocks until there is room, then appends `item`. Returns `Err(Cancelled)`
    /// if the queue's token is cancelled first.
    pub async fn put(&self, item: T) -> Result<(), Cancelled> {
        loop {
            {
                let mut guard = self.inner.state.lock().await;
                if self.inner.capacity == 0 || guard.len() < self.inner.capacity {
                    guard.push_back(item);
                    drop(guard);
                    self.inner.not_empty.notify_one();
                    return Ok(());
                }
            }
            tokio::select! {
                _ = self.inner.not_full.notified() => {}
                _ = self.inner.cancel.cancelled() => return Err(Cancelled),
            }
        }
    }

    /// Blocks until an element is available, then removes and returns the
    /// oldest one. Returns `Err(Cancelled)` if the queue's token is cancelled
    /// first.
    pub async fn take(&self) -> Result<T, Cancelled> {
        loop {
            {
                let mut guard = self.inner.state.lock().await;
                if let Some(item) = guard.pop_front() {
                    drop(guard);
                    self.inner.not_full.notify_one();
                    return Ok(item);
                }
            }
            tokio::select! {
                _ = self.inner.not_empty.notified() => {}
                _ = self.inner.cancel.cancelled() => return Err(Cancelled),
            }
        }
    }

    /// Non-blocking removal of the oldest element, if any.
    pub async fn try_take(&self) -> Option<T> {
        let mut guard = self.inner.state.lock().await;
        let item = guard.pop_front();
        if item.is_some() {
            drop(guard);
            self.inner.not_full.notify_one();
        }
        item
    }
}
