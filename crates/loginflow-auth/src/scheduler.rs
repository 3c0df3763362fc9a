//! Cancellable one-shot timers.
//!
//! The controller never sleeps itself. It asks a [`Scheduler`] to deliver a
//! [`TimerEvent`] after a delay and keeps the returned [`TimerHandle`] so it
//! can cancel the timer when the flow moves on. Fired timers come back to
//! the controller as [`FiredTimer`] values through
//! [`AuthFlowController::handle_timer`](crate::AuthFlowController::handle_timer).
//!
//! Two implementations are provided:
//!
//! - [`TokioScheduler`] sleeps on the tokio runtime and delivers fired
//!   timers over an unbounded mpsc channel.
//! - [`ManualScheduler`] keeps a virtual clock that only moves when
//!   [`ManualScheduler::advance`] is called, for deterministic hosts and
//!   tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Opaque, unique identifier of one armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(Uuid);

impl TimerHandle {
    fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

/// What the controller should do when a timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerEvent {
    /// Open the authorization popup.
    LaunchPopup,
    /// Give up waiting for the popup and switch to manual paste.
    FallbackTimeout,
    /// Move input focus to the pasted-URL field.
    FocusInput,
}

/// A timer that elapsed without being cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiredTimer {
    pub handle: TimerHandle,
    pub event: TimerEvent,
}

/// Source of cancellable one-shot timers.
pub trait Scheduler: Send + Sync {
    /// Arm a timer that fires `event` after `delay`.
    fn schedule(&self, delay: Duration, event: TimerEvent) -> TimerHandle;

    /// Disarm a timer. Unknown or already-fired handles are ignored.
    fn cancel(&self, handle: TimerHandle);
}

// ---------------------------------------------------------------------------
// Tokio scheduler
// ---------------------------------------------------------------------------

/// Timers backed by `tokio::time::sleep`.
///
/// Must be used from within a tokio runtime. Each armed timer owns a
/// oneshot cancel sender stored in the registry; whichever of "fire" and
/// "cancel" removes the registry entry first wins, so a cancelled timer
/// never delivers.
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<FiredTimer>,
    armed: Arc<DashMap<TimerHandle, oneshot::Sender<()>>>,
}

impl TokioScheduler {
    /// Create a scheduler and the receiver fired timers arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FiredTimer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            tx,
            armed: Arc::new(DashMap::new()),
        };
        (scheduler, rx)
    }

    /// Number of timers armed and not yet fired or cancelled.
    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, event: TimerEvent) -> TimerHandle {
        let handle = TimerHandle::new();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.armed.insert(handle, cancel_tx);

        let armed = Arc::clone(&self.armed);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    if armed.remove(&handle).is_some() {
                        // The receiver is gone only when the host shut down.
                        let _ = tx.send(FiredTimer { handle, event });
                    }
                }
                _ = cancel_rx => {}
            }
        });

        tracing::debug!(?event, delay_ms = delay.as_millis() as u64, "timer armed");
        handle
    }

    fn cancel(&self, handle: TimerHandle) {
        if let Some((_, cancel_tx)) = self.armed.remove(&handle) {
            let _ = cancel_tx.send(());
            tracing::debug!("timer cancelled");
        }
    }
}

// ---------------------------------------------------------------------------
// Manual scheduler
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct PendingTimer {
    handle: TimerHandle,
    due: Duration,
    event: TimerEvent,
}

#[derive(Debug, Default)]
struct ManualState {
    now: Duration,
    pending: Vec<PendingTimer>,
    cancelled: usize,
}

/// Virtual-clock scheduler: nothing fires until [`advance`](Self::advance).
#[derive(Debug, Default)]
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the virtual clock forward and return every timer that came due,
    /// earliest first. Returned timers are no longer pending.
    pub fn advance(&self, by: Duration) -> Vec<FiredTimer> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.now += by;
        let now = state.now;

        let (mut due, pending): (Vec<_>, Vec<_>) =
            state.pending.drain(..).partition(|t| t.due <= now);
        state.pending = pending;

        due.sort_by_key(|t| t.due);
        due.into_iter()
            .map(|t| FiredTimer {
                handle: t.handle,
                event: t.event,
            })
            .collect()
    }

    /// Events still waiting to fire.
    pub fn pending_events(&self) -> Vec<TimerEvent> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.pending.iter().map(|t| t.event).collect()
    }

    /// How many armed timers were cancelled so far.
    pub fn cancelled_count(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).cancelled
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, event: TimerEvent) -> TimerHandle {
        let handle = TimerHandle::new();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let due = state.now + delay;
        state.pending.push(PendingTimer { handle, due, event });
        handle
    }

    fn cancel(&self, handle: TimerHandle) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let before = state.pending.len();
        state.pending.retain(|t| t.handle != handle);
        if state.pending.len() < before {
            state.cancelled += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
