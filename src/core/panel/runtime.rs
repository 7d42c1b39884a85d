//! Dedicated runtime for the coordinator's refresh tasks.
//!
//! Refresh work runs on its own small thread pool, never on the interactive
//! thread: a slow network fetch or driver call cannot freeze a redraw.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use super::coordinator::{Coordinator, Subscription, SubscriptionScope};
use super::sample::{Payload, QuantityId, Sample};
use super::ticker::RefreshTask;
use crate::core::config::PanelConfig;
use crate::core::registry::{QuantitySpec, Registry, RegistryEntry};
use crate::error::Result as ControlResult;
use crate::feeds::{ExternalSource, HttpFetch, NewsSource, ReqwestFetcher, WeatherSource};
use crate::hw::{
    BacklightControl, BatterySampler, ControlAdapter, CpuSampler, MemorySampler, TelemetrySampler,
    VolumeControl,
};

/// Bridges a control adapter's synchronous read into the refresh contract.
struct AdapterTask(Arc<dyn ControlAdapter>);

impl RefreshTask for AdapterTask {
    fn refresh(&self) -> BoxFuture<'_, ControlResult<Payload>> {
        Box::pin(async move { self.0.read() })
    }
}

struct SamplerTask(Arc<dyn TelemetrySampler>);

impl RefreshTask for SamplerTask {
    fn refresh(&self) -> BoxFuture<'_, ControlResult<Payload>> {
        Box::pin(async move { self.0.sample() })
    }
}

struct SourceTask(Arc<dyn ExternalSource>);

impl RefreshTask for SourceTask {
    fn refresh(&self) -> BoxFuture<'_, ControlResult<Payload>> {
        self.0.fetch()
    }
}

/// Owns the tokio runtime and the coordinator; the synchronous facade used
/// by the CLI and the dashboard.
pub struct PanelRuntime {
    coordinator: Arc<Coordinator>,
    runtime: tokio::runtime::Runtime,
}

impl PanelRuntime {
    /// Build capabilities, register every quantity from the config's
    /// registry, and launch all refresh tasks.
    pub fn new(config: &PanelConfig) -> anyhow::Result<Self> {
        let registry = config.registry()?;
        Self::with_registry(&registry)
    }

    pub fn with_registry(registry: &Registry) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .thread_name("panel-worker")
            .build()?;

        let coordinator = Arc::new(Coordinator::new());
        let fetcher: Arc<dyn HttpFetch> = Arc::new(ReqwestFetcher::new()?);

        for entry in registry.entries() {
            let (task, adapter) = build_binding(entry, &fetcher)?;
            coordinator.register(entry.quantity.clone(), entry.policy.clone(), task, adapter)?;
        }
        coordinator.start(runtime.handle());

        Ok(Self {
            coordinator,
            runtime,
        })
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    pub fn get(&self, quantity: &QuantityId) -> Option<Arc<Sample>> {
        self.coordinator.get(quantity)
    }

    pub fn snapshot(&self) -> HashMap<QuantityId, Arc<Sample>> {
        self.coordinator.store().snapshot()
    }

    pub fn subscribe(&self, scope: SubscriptionScope) -> Subscription {
        self.coordinator.subscribe(scope)
    }

    pub fn set_control(&self, quantity: &QuantityId, value: f64) -> ControlResult<()> {
        self.coordinator.set_control(quantity, value)
    }

    pub fn quantities(&self) -> Vec<QuantityId> {
        self.coordinator.quantities()
    }

    pub fn is_disabled(&self, quantity: &QuantityId) -> bool {
        self.coordinator.is_disabled(quantity)
    }

    /// Stop all refresh tasks and wait for them to drain, bounded by the
    /// coordinator's grace period.
    pub fn shutdown(self) {
        self.runtime.block_on(self.coordinator.stop());
    }
}

fn build_binding(
    entry: &RegistryEntry,
    fetcher: &Arc<dyn HttpFetch>,
) -> ControlResult<(Arc<dyn RefreshTask>, Option<Arc<dyn ControlAdapter>>)> {
    Ok(match &entry.spec {
        QuantitySpec::Brightness => {
            let adapter: Arc<dyn ControlAdapter> = Arc::new(BacklightControl::new());
            (
                Arc::new(AdapterTask(adapter.clone())) as Arc<dyn RefreshTask>,
                Some(adapter),
            )
        }
        QuantitySpec::Volume => {
            let adapter: Arc<dyn ControlAdapter> = Arc::new(VolumeControl::new());
            (
                Arc::new(AdapterTask(adapter.clone())) as Arc<dyn RefreshTask>,
                Some(adapter),
            )
        }
        QuantitySpec::Cpu => (
            Arc::new(SamplerTask(Arc::new(CpuSampler::new()))) as Arc<dyn RefreshTask>,
            None,
        ),
        QuantitySpec::Memory => (
            Arc::new(SamplerTask(Arc::new(MemorySampler::new()))) as Arc<dyn RefreshTask>,
            None,
        ),
        QuantitySpec::Battery => (
            Arc::new(SamplerTask(Arc::new(BatterySampler::new()))) as Arc<dyn RefreshTask>,
            None,
        ),
        QuantitySpec::Weather {
            city,
            api_key,
            units,
        } => {
            let source = WeatherSource::new(
                fetcher.clone(),
                city,
                api_key,
                units,
                entry.policy.timeout,
            )?;
            (
                Arc::new(SourceTask(Arc::new(source))) as Arc<dyn RefreshTask>,
                None,
            )
        }
        QuantitySpec::News {
            api_key,
            country,
            max_headlines,
        } => {
            let source = NewsSource::new(
                fetcher.clone(),
                api_key,
                country,
                *max_headlines,
                entry.policy.timeout,
            )?;
            (
                Arc::new(SourceTask(Arc::new(source))) as Arc<dyn RefreshTask>,
                None,
            )
        }
    })
}
