//! Bounded typed FIFO channel with a per-channel overflow policy.
//!
//! A [`QueueChannel`] is cheap to clone; every clone refers to the same
//! queue, so any number of producers and consumers can share it. Capacity
//! is fixed at creation. Slot and item accounting use two semaphores so a
//! producer waiting for room and a consumer waiting for data both suspend
//! without holding the queue lock.

use crate::error::{BusError, BusResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::debug;

/// What a send does when the channel is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Wait for room up to this limit, then report [`SendOutcome::TimedOut`]
    Block(Duration),
    /// Reject the new item immediately
    DropNewest,
    /// Wait once for room up to this (short) limit, then drop the new item
    RetryOnce(Duration),
}

/// Result of [`QueueChannel::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Item is in the queue
    Enqueued,
    /// Item was rejected by the overflow policy
    Dropped,
    /// No room became available in time
    TimedOut,
}

/// Counters for a channel's send outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Items accepted
    pub enqueued: u64,
    /// Items rejected by the overflow policy
    pub dropped: u64,
    /// Sends that gave up waiting for room
    pub timed_out: u64,
}

struct Shared<T> {
    name: &'static str,
    capacity: usize,
    policy: OverflowPolicy,
    queue: Mutex<VecDeque<T>>,
    free_slots: Semaphore,
    ready_items: Semaphore,
    enqueued: AtomicU64,
    dropped: AtomicU64,
    timed_out: AtomicU64,
}

/// Bounded multi-producer, multi-consumer FIFO.
pub struct QueueChannel<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for QueueChannel<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> std::fmt::Debug for QueueChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueChannel")
            .field("name", &self.shared.name)
            .field("capacity", &self.shared.capacity)
            .field("policy", &self.shared.policy)
            .field("len", &self.len())
            .finish()
    }
}

impl<T> QueueChannel<T> {
    /// Create a channel. Capacity must be non-zero.
    pub fn new(name: &'static str, capacity: usize, policy: OverflowPolicy) -> BusResult<Self> {
        if capacity == 0 {
            return Err(BusError::ZeroCapacity { name });
        }

        Ok(Self {
            shared: Arc::new(Shared {
                name,
                capacity,
                policy,
                queue: Mutex::new(VecDeque::with_capacity(capacity)),
                free_slots: Semaphore::new(capacity),
                ready_items: Semaphore::new(0),
                enqueued: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
                timed_out: AtomicU64::new(0),
            }),
        })
    }

    /// Offer an item, waiting at most `timeout` (further capped by the policy).
    pub async fn send(&self, item: T, timeout: Duration) -> SendOutcome {
        let shared = &self.shared;

        let permit = match shared.policy {
            OverflowPolicy::DropNewest => shared.free_slots.try_acquire().ok(),
            OverflowPolicy::Block(limit) => self.acquire_slot(timeout.min(limit)).await,
            OverflowPolicy::RetryOnce(retry) => match shared.free_slots.try_acquire() {
                Ok(permit) => Some(permit),
                Err(_) => self.acquire_slot(timeout.min(retry)).await,
            },
        };

        match permit {
            Some(permit) => {
                permit.forget();
                shared.queue.lock().push_back(item);
                shared.ready_items.add_permits(1);
                shared.enqueued.fetch_add(1, Ordering::Relaxed);
                SendOutcome::Enqueued
            }
            None => match shared.policy {
                OverflowPolicy::Block(_) => {
                    shared.timed_out.fetch_add(1, Ordering::Relaxed);
                    debug!(channel = shared.name, "Send timed out on full channel");
                    SendOutcome::TimedOut
                }
                OverflowPolicy::DropNewest | OverflowPolicy::RetryOnce(_) => {
                    shared.dropped.fetch_add(1, Ordering::Relaxed);
                    debug!(channel = shared.name, "Channel full, dropping newest item");
                    SendOutcome::Dropped
                }
            },
        }
    }

    /// Take the oldest item without waiting.
    pub fn try_receive(&self) -> Option<T> {
        let permit = self.shared.ready_items.try_acquire().ok()?;
        self.take(permit)
    }

    /// Take the oldest item, waiting at most `timeout` for one to arrive.
    pub async fn receive(&self, timeout: Duration) -> Option<T> {
        let permit = tokio::time::timeout(timeout, self.shared.ready_items.acquire())
            .await
            .ok()?
            .ok()?;
        self.take(permit)
    }

    /// Free slots right now. Lets producers see back-pressure before sending.
    pub fn spaces_available(&self) -> usize {
        self.shared.free_slots.available_permits()
    }

    /// Items currently queued
    pub fn len(&self) -> usize {
        self.shared.queue.lock().len()
    }

    /// No items queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fixed capacity
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Channel name
    pub fn name(&self) -> &'static str {
        self.shared.name
    }

    /// Overflow policy
    pub fn policy(&self) -> OverflowPolicy {
        self.shared.policy
    }

    /// Send outcome counters
    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            enqueued: self.shared.enqueued.load(Ordering::Relaxed),
            dropped: self.shared.dropped.load(Ordering::Relaxed),
            timed_out: self.shared.timed_out.load(Ordering::Relaxed),
        }
    }

    async fn acquire_slot(&self, wait: Duration) -> Option<SemaphorePermit<'_>> {
        tokio::time::timeout(wait, self.shared.free_slots.acquire())
            .await
            .ok()?
            .ok()
    }

    // A ready permit is only issued after its item was pushed.
    fn take(&self, permit: SemaphorePermit<'_>) -> Option<T> {
        permit.forget();
        let item = self.shared.queue.lock().pop_front()?;
        self.shared.free_slots.add_permits(1);
        Some(item)
    }
}
