//! Coordinator: owns the registry of refresh tickers, fans their Samples
//! into the StateStore, and exposes change subscriptions to the interactive
//! surface.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::time::{self, Duration, Instant};

use super::sample::{ChangeEvent, QuantityId, Sample};
use super::store::StateStore;
use super::ticker::{RefreshTask, RefreshTicker};
use crate::core::registry::RefreshPolicy;
use crate::error::{ControlError, Result};
use crate::hw::ControlAdapter;

/// Capacity of the change-notification channel. Subscribers that fall
/// further behind than this skip to the newest notifications.
const EVENTS_CAPACITY: usize = 256;

/// What a subscriber is interested in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionScope {
    All,
    Quantity(QuantityId),
}

/// A registered interest in change notifications.
///
/// Every subscriber sees every version bump for its scope independently
/// (broadcast semantics). Notifications carry versions, not payloads;
/// re-read the store for the current Sample.
pub struct Subscription {
    scope: SubscriptionScope,
    rx: broadcast::Receiver<ChangeEvent>,
}

impl Subscription {
    fn matches(&self, event: &ChangeEvent) -> bool {
        match &self.scope {
            SubscriptionScope::All => true,
            SubscriptionScope::Quantity(q) => *q == event.quantity,
        }
    }

    /// Wait for the next matching notification. Returns `None` once the
    /// coordinator has shut down.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("subscriber lagged, skipped {} notifications", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking poll for a matching notification.
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if self.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    log::warn!("subscriber lagged, skipped {} notifications", skipped);
                    continue;
                }
                Err(_) => return None,
            }
        }
    }
}

struct Binding {
    ticker: RefreshTicker,
    adapter: Option<Arc<dyn ControlAdapter>>,
}

/// Registry of refresh tickers plus the store and notification fan-out.
pub struct Coordinator {
    store: Arc<StateStore>,
    events_tx: broadcast::Sender<ChangeEvent>,
    bindings: RwLock<Vec<Binding>>,
    started: AtomicBool,
}

impl Coordinator {
    pub fn new() -> Self {
        let (events_tx, _) = broadcast::channel(EVENTS_CAPACITY);
        Self {
            store: Arc::new(StateStore::new()),
            events_tx,
            bindings: RwLock::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Add a ticker for `quantity`. Controls additionally bind the adapter
    /// used by the immediate write path. Rejected after `start()` and for
    /// duplicate quantities.
    pub fn register(
        &self,
        quantity: QuantityId,
        policy: RefreshPolicy,
        task: Arc<dyn RefreshTask>,
        adapter: Option<Arc<dyn ControlAdapter>>,
    ) -> Result<()> {
        policy.validate(&quantity)?;
        if self.started.load(Ordering::Acquire) {
            return Err(ControlError::registry(format!(
                "{}: cannot register after start",
                quantity
            )));
        }
        let mut bindings = self.bindings.write();
        if bindings.iter().any(|b| *b.ticker.quantity() == quantity) {
            return Err(ControlError::registry(format!(
                "duplicate quantity: {}",
                quantity
            )));
        }
        bindings.push(Binding {
            ticker: RefreshTicker::new(quantity, policy, task),
            adapter,
        });
        Ok(())
    }

    /// Launch all registered tickers on the given runtime.
    pub fn start(&self, handle: &Handle) {
        if self.started.swap(true, Ordering::AcqRel) {
            log::warn!("coordinator already started");
            return;
        }
        let bindings = self.bindings.read();
        for binding in bindings.iter() {
            binding
                .ticker
                .start(handle, self.store.clone(), self.events_tx.clone());
        }
        log::debug!("coordinator started {} refresh tasks", bindings.len());
    }

    /// Cancel all tickers and wait for outstanding work to drain, bounded by
    /// the grace period. Tasks that do not finish in time are abandoned.
    pub async fn stop(&self) {
        {
            let bindings = self.bindings.read();
            for binding in bindings.iter() {
                binding.ticker.stop();
            }
        }

        let handles: Vec<_> = {
            let bindings = self.bindings.read();
            bindings
                .iter()
                .filter_map(|b| b.ticker.take_join().map(|h| (b.ticker.quantity().clone(), h)))
                .collect()
        };

        let deadline = Instant::now() + self.grace_timeout();
        for (quantity, mut handle) in handles {
            let remaining = deadline.duration_since(Instant::now());
            if time::timeout(remaining, &mut handle).await.is_err() {
                log::warn!(
                    "{}: refresh task did not drain within the grace period, abandoning",
                    quantity
                );
                handle.abort();
            }
        }
    }

    /// Bound on `stop()`: twice the largest per-attempt timeout across all
    /// registered quantities.
    pub fn grace_timeout(&self) -> Duration {
        self.bindings
            .read()
            .iter()
            .map(|b| b.ticker.policy().timeout)
            .max()
            .unwrap_or(Duration::from_secs(1))
            * 2
    }

    pub fn subscribe(&self, scope: SubscriptionScope) -> Subscription {
        Subscription {
            scope,
            rx: self.events_tx.subscribe(),
        }
    }

    pub fn get(&self, quantity: &QuantityId) -> Option<Arc<Sample>> {
        self.store.get(quantity)
    }

    /// Immediate user-triggered write to a control, bypassing the ticker.
    ///
    /// On success the quantity's cached Sample is invalidated and its next
    /// read runs promptly, reconfirming the device's true current value.
    pub fn set_control(&self, quantity: &QuantityId, value: f64) -> Result<()> {
        let bindings = self.bindings.read();
        let binding = bindings
            .iter()
            .find(|b| b.ticker.quantity() == quantity)
            .ok_or_else(|| ControlError::registry(format!("unknown quantity: {}", quantity)))?;
        let adapter = binding.adapter.as_ref().ok_or_else(|| {
            ControlError::registry(format!("{}: quantity is not controllable", quantity))
        })?;
        if binding.ticker.is_disabled() {
            return Err(ControlError::unsupported(format!(
                "{}: capability is disabled on this host",
                quantity
            )));
        }
        adapter.write(value)?;
        binding.ticker.invalidate();
        Ok(())
    }

    pub fn is_disabled(&self, quantity: &QuantityId) -> bool {
        self.bindings
            .read()
            .iter()
            .find(|b| b.ticker.quantity() == quantity)
            .map(|b| b.ticker.is_disabled())
            .unwrap_or(false)
    }

    pub fn quantities(&self) -> Vec<QuantityId> {
        self.bindings
            .read()
            .iter()
            .map(|b| b.ticker.quantity().clone())
            .collect()
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}
