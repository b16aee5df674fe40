//! Per-client bounded mailbox.
//!
//! A mailbox is a FIFO of formatted messages plus the instant its owner last
//! polled. Senders enqueue without waiting; pollers wait on a [`Notify`] that
//! is signalled on every enqueue and on close, re-checking the queue after
//! each wakeup so spurious wakeups never end a poll.
//!
//! # State machine
//!
//! ```text
//!   Active ──close()──▶ Closed   (terminal)
//! ```
//!
//! Closing drops any queued messages, rejects later deliveries and makes
//! every current and future `recv` fail with `ChannelClosed`.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tokio::time::{sleep_until, Instant};

use chatbox_core::{ClientId, ClientInfo, HubError, HubResult};

/// Outcome of a non-blocking delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The message was appended to the queue.
    Queued,
    /// The queue was at capacity; the incoming message was dropped.
    Full,
    /// The mailbox was already closed.
    Closed,
}

struct MailboxState {
    queue: VecDeque<String>,
    last_seen: Instant,
    closed: bool,
    /// Pollers currently blocked in `recv`
    waiters: usize,
}

impl MailboxState {
    fn idle_for(&self, now: Instant) -> Duration {
        if self.waiters > 0 {
            return Duration::ZERO;
        }
        now.saturating_duration_since(self.last_seen)
    }
}

/// Counts a poller as waiting for as long as it lives.
struct Waiting<'a> {
    mailbox: &'a Mailbox,
}

impl<'a> Waiting<'a> {
    fn enter(mailbox: &'a Mailbox) -> Self {
        mailbox.state().waiters += 1;
        Self { mailbox }
    }
}

impl Drop for Waiting<'_> {
    fn drop(&mut self) {
        let mut state = self.mailbox.state();
        state.waiters = state.waiters.saturating_sub(1);
        // The idle clock restarts when the poll ends, however it ends
        state.last_seen = Instant::now();
    }
}

/// Bounded message queue owned by the registry for one client.
pub struct Mailbox {
    id: ClientId,
    capacity: usize,
    joined_at: DateTime<Utc>,
    state: Mutex<MailboxState>,
    notify: Notify,
}

impl Mailbox {
    /// Creates an empty, active mailbox with `last_seen = now`.
    pub fn new(id: ClientId, capacity: usize) -> Self {
        Self {
            id,
            capacity,
            joined_at: Utc::now(),
            state: Mutex::new(MailboxState {
                queue: VecDeque::with_capacity(capacity.min(16)),
                last_seen: Instant::now(),
                closed: false,
                waiters: 0,
            }),
            notify: Notify::new(),
        }
    }

    pub fn id(&self) -> &ClientId {
        &self.id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // The state is a plain queue plus flags; a panic elsewhere cannot leave it
    // half-updated, so a poisoned lock is still safe to use.
    fn state(&self) -> MutexGuard<'_, MailboxState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a message without waiting.
    ///
    /// Drop-newest: a full mailbox keeps what it has and rejects `message`.
    pub fn try_deliver(&self, message: &str) -> Delivery {
        {
            let mut state = self.state();
            if state.closed {
                return Delivery::Closed;
            }
            if state.queue.len() >= self.capacity {
                return Delivery::Full;
            }
            state.queue.push_back(message.to_string());
        }
        self.notify.notify_waiters();
        Delivery::Queued
    }

    /// Marks the owner as active now.
    pub fn touch(&self) {
        self.state().last_seen = Instant::now();
    }

    /// Time since the owner last polled, measured at `now`.
    ///
    /// Zero while a poll is blocked on this mailbox.
    pub fn idle_for(&self, now: Instant) -> Duration {
        self.state().idle_for(now)
    }

    /// Number of polls currently blocked in `recv`.
    pub fn waiters(&self) -> usize {
        self.state().waiters
    }

    /// Closes the mailbox and wakes every waiting poller.
    ///
    /// Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        let was_open = {
            let mut state = self.state();
            let was_open = !state.closed;
            state.closed = true;
            state.queue.clear();
            was_open
        };
        self.notify.notify_waiters();
        was_open
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    /// Number of queued messages.
    pub fn pending(&self) -> usize {
        self.state().queue.len()
    }

    /// Waits up to `wait` for the next message.
    ///
    /// # Errors
    ///
    /// - `HubError::ChannelClosed` if the mailbox is or becomes closed
    /// - `HubError::NoMessages` if `wait` elapses first
    ///
    /// Dropping the returned future leaves the queue untouched. While the
    /// call is pending the mailbox does not count as idle.
    pub async fn recv(&self, wait: Duration) -> HubResult<String> {
        let deadline = Instant::now() + wait;
        let _waiting = Waiting::enter(self);

        loop {
            // Register interest before inspecting the queue so a delivery
            // between the check and the await still wakes us.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state();
                if state.closed {
                    return Err(HubError::ChannelClosed(self.id.clone()));
                }
                if let Some(message) = state.queue.pop_front() {
                    return Ok(message);
                }
            }

            tokio::select! {
                biased;
                _ = &mut notified => {}
                _ = sleep_until(deadline) => return Err(HubError::NoMessages),
            }
        }
    }

    /// Snapshot for client listings.
    pub fn info(&self, now: Instant) -> ClientInfo {
        let state = self.state();
        ClientInfo {
            id: self.id.clone(),
            pending: state.queue.len(),
            joined_at: self.joined_at,
            idle_secs: state.idle_for(now).as_secs(),
        }
    }
}

impl std::fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("Mailbox")
            .field("id", &self.id)
            .field("capacity", &self.capacity)
            .field("pending", &state.queue.len())
            .field("closed", &state.closed)
            .finish()
    }
}
