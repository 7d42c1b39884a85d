//! Per-quantity refresh task.
//!
//! Each quantity runs in its own independent task with its own cadence,
//! timeout, and retry budget. A slow or failing refresh never blocks another
//! quantity or the interactive surface.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};

use super::sample::{ChangeEvent, Payload, QuantityId, SampleValue};
use super::store::StateStore;
use crate::core::registry::{FirstTick, RefreshPolicy};
use crate::error::{ControlError, FailureKind, Result};

/// Backoff stretch applied after a rate-limit response.
const RATE_LIMIT_BACKOFF_MULTIPLIER: u32 = 4;

/// Backoff is capped at this fraction of the interval so retries stay inside
/// their own tick.
const BACKOFF_CAP_RATIO: f64 = 0.5;

/// A refresh operation bound to one quantity: a hardware read, a telemetry
/// sample, or an external fetch.
pub trait RefreshTask: Send + Sync + 'static {
    fn refresh(&self) -> BoxFuture<'_, Result<Payload>>;
}

/// State shared between a ticker's task loop and the coordinator.
struct TickerShared {
    quantity: QuantityId,
    policy: RefreshPolicy,
    task: Arc<dyn RefreshTask>,
    /// Bumped by user-triggered writes; a read that began before the bump is
    /// discarded so it cannot overwrite the just-applied value.
    epoch: AtomicU64,
    /// Wakes the loop for a prompt re-read after a write.
    nudge: Notify,
    /// Set after the first Unsupported failure; the loop stops scheduling.
    disabled: AtomicBool,
}

/// Drives one quantity's refresh task on a fixed interval.
pub struct RefreshTicker {
    shared: Arc<TickerShared>,
    stop_tx: broadcast::Sender<()>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshTicker {
    pub fn new(quantity: QuantityId, policy: RefreshPolicy, task: Arc<dyn RefreshTask>) -> Self {
        let (stop_tx, _) = broadcast::channel(1);
        Self {
            shared: Arc::new(TickerShared {
                quantity,
                policy,
                task,
                epoch: AtomicU64::new(0),
                nudge: Notify::new(),
                disabled: AtomicBool::new(false),
            }),
            stop_tx,
            join: Mutex::new(None),
        }
    }

    pub fn quantity(&self) -> &QuantityId {
        &self.shared.quantity
    }

    pub fn policy(&self) -> &RefreshPolicy {
        &self.shared.policy
    }

    pub fn is_disabled(&self) -> bool {
        self.shared.disabled.load(Ordering::Acquire)
    }

    /// Begin invoking the task every `policy.interval`, writing one Sample
    /// per completed tick and emitting a change notification for each write.
    pub fn start(
        &self,
        handle: &Handle,
        store: Arc<StateStore>,
        events: broadcast::Sender<ChangeEvent>,
    ) {
        let mut join = self.join.lock();
        if join.is_some() {
            log::warn!("{}: ticker already started", self.shared.quantity);
            return;
        }
        let shared = self.shared.clone();
        let stop = self.stop_tx.subscribe();
        *join = Some(handle.spawn(run_ticker(shared, store, events, stop)));
    }

    /// Cancel all pending and future invocations. An in-flight attempt is
    /// left to finish on its own; its result is discarded.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(());
    }

    /// Invalidate the cached Sample after a user write: the next read must
    /// observe the device's true current value, never the pre-write cache.
    pub fn invalidate(&self) {
        self.shared.epoch.fetch_add(1, Ordering::AcqRel);
        self.shared.nudge.notify_one();
    }

    pub(crate) fn take_join(&self) -> Option<JoinHandle<()>> {
        self.join.lock().take()
    }
}

async fn run_ticker(
    shared: Arc<TickerShared>,
    store: Arc<StateStore>,
    events: broadcast::Sender<ChangeEvent>,
    mut stop: broadcast::Receiver<()>,
) {
    let interval = shared.policy.interval;
    let mut ticker = match shared.policy.first_tick {
        FirstTick::Immediate => time::interval(interval),
        FirstTick::AfterInterval => time::interval_at(Instant::now() + interval, interval),
    };
    // A tick whose predecessor is still running is silently skipped; at most
    // one invocation per quantity is ever in flight.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    log::debug!(
        "{}: refresh task started (interval {:?}, timeout {:?})",
        shared.quantity,
        interval,
        shared.policy.timeout
    );

    loop {
        let mut nudged = false;
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shared.nudge.notified() => { nudged = true; }
            _ = stop.recv() => break,
        }
        if nudged {
            // The nudged read replaces this cycle's scheduled tick.
            ticker.reset();
        }

        let deadline = Instant::now() + interval;
        let epoch_before = shared.epoch.load(Ordering::Acquire);

        let outcome = tokio::select! {
            outcome = run_attempts(&shared, deadline) => outcome,
            _ = stop.recv() => break,
        };

        if shared.epoch.load(Ordering::Acquire) != epoch_before {
            log::debug!(
                "{}: discarding read that started before a user write",
                shared.quantity
            );
            continue;
        }

        let sample = match outcome {
            Ok(payload) => store.record(&shared.quantity, SampleValue::Ready(payload)),
            Err(kind) => store.record(&shared.quantity, SampleValue::Failed(kind)),
        };
        let _ = events.send(ChangeEvent {
            quantity: shared.quantity.clone(),
            version: sample.version,
        });

        if sample.failure() == Some(FailureKind::Unsupported) {
            shared.disabled.store(true, Ordering::Release);
            log::warn!(
                "{}: capability unsupported on this host, disabling refresh",
                shared.quantity
            );
            break;
        }
    }

    log::debug!("{}: refresh task stopped", shared.quantity);
}

/// Run one tick: the initial attempt plus up to `retry_limit` retries, all
/// bounded by the tick deadline so retries never bleed into the next
/// scheduled tick. Returns the payload or the last observed failure kind.
async fn run_attempts(
    shared: &TickerShared,
    deadline: Instant,
) -> std::result::Result<Payload, FailureKind> {
    let policy = &shared.policy;
    let mut attempt: u32 = 0;

    loop {
        let now = Instant::now();
        let budget = deadline.duration_since(now);
        if budget.is_zero() {
            return Err(FailureKind::Timeout);
        }

        let attempt_timeout = policy.timeout.min(budget);
        let err = match time::timeout(attempt_timeout, shared.task.refresh()).await {
            Ok(Ok(payload)) => return Ok(payload),
            Ok(Err(e)) => e,
            Err(_) => ControlError::Timeout,
        };

        let kind = err.failure_kind();
        if !err.retryable() || attempt >= policy.retry_limit {
            if attempt > 0 || err.retryable() {
                log::warn!(
                    "{}: refresh failed after {} attempt(s): {}",
                    shared.quantity,
                    attempt + 1,
                    err
                );
            } else {
                log::warn!("{}: refresh failed: {}", shared.quantity, err);
            }
            return Err(kind);
        }

        let delay = backoff_delay(policy, attempt, err.is_rate_limited());
        if Instant::now() + delay >= deadline {
            log::debug!(
                "{}: retry budget exhausted after attempt {}",
                shared.quantity,
                attempt + 1
            );
            return Err(kind);
        }

        log::debug!(
            "{}: attempt {} failed ({}), retrying in {:?}",
            shared.quantity,
            attempt + 1,
            err,
            delay
        );
        time::sleep(delay).await;
        attempt += 1;
    }
}

/// Exponential backoff: doubles per attempt, stretched after a rate-limit
/// response, capped below the interval.
fn backoff_delay(policy: &RefreshPolicy, attempt: u32, rate_limited: bool) -> Duration {
    let shift = attempt.min(16);
    let mut delay = policy.backoff.saturating_mul(1u32 << shift);
    if rate_limited {
        delay = delay.saturating_mul(RATE_LIMIT_BACKOFF_MULTIPLIER);
    }
    delay.min(policy.interval.mul_f64(BACKOFF_CAP_RATIO))
}
