//! Latest-value-wins store of Samples, shared between the coordinator's
//! refresh tasks and any number of readers.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::sample::{LastGood, QuantityId, Sample, SampleValue};

/// Last-known snapshot of every monitored quantity.
///
/// One `Arc<Sample>` per quantity, replaced wholesale on each refresh, so
/// readers never observe a partially written Sample. Only the owning
/// quantity's refresh task writes a given entry; the write lock is held just
/// long enough to swap the pointer.
#[derive(Debug, Default)]
pub struct StateStore {
    entries: RwLock<HashMap<QuantityId, Arc<Sample>>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, quantity: &QuantityId) -> Option<Arc<Sample>> {
        self.entries.read().get(quantity).cloned()
    }

    /// Bulk read of all current Samples, e.g. for an initial render.
    pub fn snapshot(&self) -> HashMap<QuantityId, Arc<Sample>> {
        self.entries.read().clone()
    }

    /// Record the outcome of one completed tick.
    ///
    /// Assigns the quantity's next version (strictly increasing, starting at
    /// 1) and, on failure, carries the previous successful payload forward in
    /// `last_good` so a failed refresh never erases the last known value.
    pub(crate) fn record(&self, quantity: &QuantityId, value: SampleValue) -> Arc<Sample> {
        let timestamp_ms = chrono::Utc::now().timestamp_millis();
        let mut entries = self.entries.write();
        let prev = entries.get(quantity);

        let version = prev.map(|s| s.version + 1).unwrap_or(1);
        let last_good = match &value {
            SampleValue::Ready(_) => None,
            SampleValue::Failed(_) => prev.and_then(|p| match &p.value {
                SampleValue::Ready(payload) => Some(LastGood {
                    payload: payload.clone(),
                    timestamp_ms: p.timestamp_ms,
                }),
                SampleValue::Failed(_) => p.last_good.clone(),
            }),
        };

        let sample = Arc::new(Sample {
            quantity: quantity.clone(),
            value,
            timestamp_ms,
            version,
            last_good,
        });
        entries.insert(quantity.clone(), sample.clone());
        sample
    }
}
