//! Per-stream bounded buffer
//!
//! One `StreamBuffer` exists per active stream. It hands entries from
//! producers to consumers in real time, buffering up to its capacity when no
//! consumer is waiting. The overflow discipline is chosen per send call:
//! circular overwrite drops the oldest entry to admit the newest, bounded
//! blocking waits up to a caller-supplied window for space.
//!
//! # Waiting model
//!
//! Every blocking wait is multiplexed over three arms: progress (space for a
//! writer, an entry for a reader), the buffer's stop signal, and the call's
//! own deadline. Internally a single mutex guards the queue and the list of
//! parked receivers; the mutex is never held across an await. Blocked
//! writers park on a [`Notify`] and re-check under the lock; each parked
//! receiver owns a oneshot slot, so a hand-off commits atomically with
//! respect to that receiver's deadline: an entry committed to a slot is
//! returned even if the deadline fires concurrently, and is never delivered
//! twice.
//!
//! A parked receiver only exists while the queue is empty, which keeps
//! delivery order equal to enqueue order over the surviving entries.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{oneshot, Notify};
use tokio::time::Instant;

use super::entry::StreamEntry;
use super::error::BufferError;

/// Overflow discipline for a single send call
///
/// The discipline is a property of each write, not of the buffer, so
/// fire-and-forget producers and back-pressure-aware producers can share a
/// stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Drop the oldest entry to admit the newest when the buffer is full
    Circular,
    /// Wait up to the window for space, then fail with a write timeout
    Blocking(Duration),
}

/// Counters and current occupancy for one buffer
#[derive(Debug, Clone)]
pub struct BufferStats {
    /// Configured capacity
    pub capacity: usize,
    /// Entries currently queued
    pub queued: usize,
    /// Entries accepted by send
    pub entries_in: u64,
    /// Entries delivered to a receiver
    pub entries_out: u64,
    /// Entries discarded by circular overwrite
    pub entries_dropped: u64,
    /// Whether the buffer has been stopped
    pub stopped: bool,
}

/// Hook fired exactly once when the buffer stops, installed by the registry
/// to unlink the buffer. The buffer never references the registry directly.
pub(super) type StopHook = Box<dyn FnOnce() + Send>;

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

/// A parked receiver. Dropping the slot resolves the receiver with a
/// stopped outcome.
struct Waiter {
    id: u64,
    slot: oneshot::Sender<StreamEntry>,
}

struct BufferState {
    queue: VecDeque<StreamEntry>,
    /// Receivers parked while the queue is empty, oldest first
    receivers: VecDeque<Waiter>,
    next_waiter_id: u64,
    stopped: bool,
    stop_hook: Option<StopHook>,
}

enum Delivery {
    /// Handed directly to a parked receiver
    Handoff,
    /// Appended to the queue
    Queued,
}

impl BufferState {
    /// Hand the entry to the oldest parked receiver, or enqueue it when a
    /// slot is free. Returns the entry back when the buffer is full.
    fn try_deliver(
        &mut self,
        entry: StreamEntry,
        capacity: usize,
    ) -> Result<Delivery, StreamEntry> {
        let mut entry = entry;
        while let Some(waiter) = self.receivers.pop_front() {
            match waiter.slot.send(entry) {
                Ok(()) => return Ok(Delivery::Handoff),
                // Receiver task went away mid-wait; reclaim and try the next
                Err(back) => entry = back,
            }
        }
        if self.queue.len() < capacity {
            self.queue.push_back(entry);
            Ok(Delivery::Queued)
        } else {
            Err(entry)
        }
    }
}

/// One bounded FIFO per active stream
///
/// Safe under unbounded concurrent producers and consumers. See the module
/// docs for the waiting model.
pub struct StreamBuffer {
    id: u64,
    capacity: usize,
    max_circular_iterations: usize,
    /// Lock-free mirror of the stopped flag for the fast path. A send that
    /// misses a concurrent stop fails on the stop arm of its wait instead.
    stopped: AtomicBool,
    state: Mutex<BufferState>,
    /// Wakes blocked writers: on dequeue, on a receiver parking (claimable
    /// rendezvous space), and on stop
    writer_wake: Notify,
    entries_in: AtomicU64,
    entries_out: AtomicU64,
    entries_dropped: AtomicU64,
}

impl StreamBuffer {
    /// Create a buffer with the given capacity
    ///
    /// Capacity 0 is a valid configuration: bounded-blocking sends then act
    /// as a synchronous rendezvous with a waiting receiver, and circular
    /// sends are rejected.
    pub fn new(capacity: usize, max_circular_iterations: usize) -> Self {
        Self {
            id: NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed),
            capacity,
            max_circular_iterations,
            stopped: AtomicBool::new(false),
            state: Mutex::new(BufferState {
                queue: VecDeque::with_capacity(capacity.min(1024)),
                receivers: VecDeque::new(),
                next_waiter_id: 0,
                stopped: false,
                stop_hook: None,
            }),
            writer_wake: Notify::new(),
            entries_in: AtomicU64::new(0),
            entries_out: AtomicU64::new(0),
            entries_dropped: AtomicU64::new(0),
        }
    }

    /// Process-unique buffer identity, used by the registry for
    /// remove-if-same on the stop path
    pub(super) fn buffer_id(&self) -> u64 {
        self.id
    }

    /// Install the stop hook. Called by the registry before the buffer is
    /// published, so no concurrent access exists yet.
    pub(super) fn set_stop_hook(&self, hook: StopHook) {
        self.lock_state().stop_hook = Some(hook);
    }

    fn lock_state(&self) -> MutexGuard<'_, BufferState> {
        // The lock is only poisoned if a panic escaped a critical section,
        // at which point the buffer is unusable anyway.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Send one entry with the given overflow discipline
    pub async fn send(&self, entry: StreamEntry, mode: WriteMode) -> Result<(), BufferError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(BufferError::Stopped);
        }
        match mode {
            WriteMode::Circular => self.send_circular(entry).await,
            WriteMode::Blocking(window) => self.send_blocking(entry, window).await,
        }
    }

    async fn send_circular(&self, entry: StreamEntry) -> Result<(), BufferError> {
        if self.capacity == 0 {
            return Err(BufferError::ZeroCapacityCircular);
        }

        let mut entry = entry;
        let mut iterations = 0usize;
        loop {
            {
                let mut state = self.lock_state();
                if state.stopped {
                    return Err(BufferError::Stopped);
                }
                match state.try_deliver(entry, self.capacity) {
                    Ok(delivery) => {
                        self.note_accepted(delivery);
                        return Ok(());
                    }
                    Err(back) => entry = back,
                }
                // Full. Give up once the retry budget is spent, otherwise
                // free the oldest slot and try again. The lock is released
                // between the free and the retry, so a blocked
                // bounded-blocking writer may claim the slot first.
                iterations += 1;
                if iterations > self.max_circular_iterations {
                    tracing::warn!(
                        buffer_id = self.id,
                        iterations = iterations,
                        "Circular overwrite retries exhausted"
                    );
                    return Err(BufferError::OverflowExhausted);
                }
                if state.queue.pop_front().is_some() {
                    self.entries_dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(buffer_id = self.id, "Oldest entry dropped by overwrite");
                }
            }
            self.writer_wake.notify_waiters();
            tokio::task::yield_now().await;
        }
    }

    async fn send_blocking(
        &self,
        entry: StreamEntry,
        window: Duration,
    ) -> Result<(), BufferError> {
        let deadline = deadline_after(window);
        let mut entry = entry;
        loop {
            // Register interest before checking state so a wake between the
            // check and the await is not lost.
            let notified = self.writer_wake.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let mut state = self.lock_state();
                if state.stopped {
                    return Err(BufferError::Stopped);
                }
                match state.try_deliver(entry, self.capacity) {
                    Ok(delivery) => {
                        self.note_accepted(delivery);
                        return Ok(());
                    }
                    Err(back) => entry = back,
                }
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(BufferError::WriteTimeout);
            }
        }
    }

    /// Receive the oldest available entry, waiting up to the window
    pub async fn receive(&self, window: Duration) -> Result<StreamEntry, BufferError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(BufferError::Stopped);
        }

        let deadline = deadline_after(window);
        let (waiter_id, mut slot) = {
            let mut state = self.lock_state();
            if state.stopped {
                return Err(BufferError::Stopped);
            }
            if let Some(entry) = state.queue.pop_front() {
                drop(state);
                self.entries_out.fetch_add(1, Ordering::Relaxed);
                self.writer_wake.notify_waiters();
                return Ok(entry);
            }
            let (tx, rx) = oneshot::channel();
            let id = state.next_waiter_id;
            state.next_waiter_id += 1;
            state.receivers.push_back(Waiter { id, slot: tx });
            (id, rx)
        };
        // A parked receiver is claimable space: wake writers so a blocked
        // rendezvous sender can complete the hand-off.
        self.writer_wake.notify_waiters();

        match tokio::time::timeout_at(deadline, &mut slot).await {
            Ok(Ok(entry)) => Ok(entry),
            // Slot dropped by stop
            Ok(Err(_)) => Err(BufferError::Stopped),
            Err(_) => {
                let mut state = self.lock_state();
                if let Some(pos) = state.receivers.iter().position(|w| w.id == waiter_id) {
                    state.receivers.remove(pos);
                    return Err(BufferError::ReceiveTimeout);
                }
                drop(state);
                // The slot was claimed as the deadline fired. A committed
                // hand-off wins over the timeout; the entry is never lost.
                match slot.try_recv() {
                    Ok(entry) => Ok(entry),
                    Err(_) => Err(BufferError::Stopped),
                }
            }
        }
    }

    /// Stop the buffer
    ///
    /// Idempotent and terminal. Queued entries are discarded, every parked
    /// sender and receiver is woken with a stopped outcome, and the
    /// registry unlink hook fires exactly once. No send or receive returns
    /// `Ok` after this returns.
    pub fn stop(&self) {
        let hook = {
            let mut state = self.lock_state();
            if state.stopped {
                return;
            }
            state.stopped = true;
            self.stopped.store(true, Ordering::Release);
            let discarded = state.queue.len();
            state.queue.clear();
            // Dropping the slots resolves every parked receiver as stopped
            state.receivers.clear();
            if discarded > 0 {
                tracing::debug!(
                    buffer_id = self.id,
                    discarded = discarded,
                    "Discarded queued entries on stop"
                );
            }
            state.stop_hook.take()
        };
        self.writer_wake.notify_waiters();
        if let Some(hook) = hook {
            hook();
        }
    }

    /// Whether the buffer has been stopped
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries currently queued
    pub fn len(&self) -> usize {
        self.lock_state().queue.len()
    }

    /// Whether the queue is currently empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of counters and occupancy
    pub fn stats(&self) -> BufferStats {
        let queued = self.len();
        BufferStats {
            capacity: self.capacity,
            queued,
            entries_in: self.entries_in.load(Ordering::Relaxed),
            entries_out: self.entries_out.load(Ordering::Relaxed),
            entries_dropped: self.entries_dropped.load(Ordering::Relaxed),
            stopped: self.is_stopped(),
        }
    }

    fn note_accepted(&self, delivery: Delivery) {
        self.entries_in.fetch_add(1, Ordering::Relaxed);
        if let Delivery::Handoff = delivery {
            self.entries_out.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl std::fmt::Debug for StreamBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamBuffer")
            .field("id", &self.id)
            .field("capacity", &self.capacity)
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

/// Deadline for a wait window. The clamp keeps the instant arithmetic from
/// overflowing on absurd caller-supplied durations.
fn deadline_after(window: Duration) -> Instant {
    const MAX_WINDOW: Duration = Duration::from_secs(365 * 24 * 60 * 60);
    Instant::now() + window.min(MAX_WINDOW)
}
