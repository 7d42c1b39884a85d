//! Coordinator and ticker semantics, driven on a paused tokio clock with
//! scripted refresh tasks.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::time::{self, Instant};

use ncp::core::panel::{
    Coordinator, Payload, QuantityId, RefreshTask, SubscriptionScope,
};
use ncp::core::registry::RefreshPolicy;
use ncp::error::{ControlError, FailureKind};
use ncp::hw::ControlAdapter;

type TaskFn =
    Box<dyn Fn(u32) -> BoxFuture<'static, ncp::Result<Payload>> + Send + Sync + 'static>;

/// Scripted refresh task: runs a closure per call, counting calls and
/// tracking concurrent invocations.
struct ScriptedTask {
    calls: AtomicU32,
    in_flight: AtomicU32,
    max_in_flight: AtomicU32,
    call_times: Mutex<Vec<Instant>>,
    f: TaskFn,
}

impl ScriptedTask {
    fn new(f: TaskFn) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            in_flight: AtomicU32::new(0),
            max_in_flight: AtomicU32::new(0),
            call_times: Mutex::new(Vec::new()),
            f,
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn max_in_flight(&self) -> u32 {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().clone()
    }
}

struct InFlightGuard<'a>(&'a ScriptedTask);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RefreshTask for ScriptedTask {
    fn refresh(&self) -> BoxFuture<'_, ncp::Result<Payload>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().push(Instant::now());
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let guard = InFlightGuard(self);
        let fut = (self.f)(call);
        Box::pin(async move {
            let _guard = guard;
            fut.await
        })
    }
}

fn always_ok(value: f64) -> TaskFn {
    Box::new(move |_| Box::pin(async move { Ok(Payload::Percent(value)) }))
}

fn always_err(make: fn() -> ControlError) -> TaskFn {
    Box::new(move |_| Box::pin(async move { Err(make()) }))
}

fn policy(interval_ms: u64, timeout_ms: u64) -> RefreshPolicy {
    RefreshPolicy::new(
        Duration::from_millis(interval_ms),
        Duration::from_millis(timeout_ms),
    )
}

#[tokio::test(start_paused = true)]
async fn instant_sampler_accumulates_versions() {
    // cpu, interval=2s, timeout=1s, always succeeds instantly: after 5s the
    // store holds version >= 2 with no failures.
    let coordinator = Coordinator::new();
    let task = ScriptedTask::new(always_ok(42.0));
    let cpu = QuantityId::cpu();
    coordinator
        .register(cpu.clone(), policy(2_000, 1_000), task.clone(), None)
        .unwrap();

    let mut subscription = coordinator.subscribe(SubscriptionScope::All);
    coordinator.start(&Handle::current());

    time::sleep(Duration::from_secs(5)).await;

    let sample = coordinator.get(&cpu).expect("cpu reported");
    assert!(sample.version >= 2);
    assert!(sample.value.is_ready());
    assert!(sample.failure().is_none());

    // Versions observed through the subscription increase strictly.
    let mut versions = Vec::new();
    while let Some(event) = subscription.try_recv() {
        versions.push(event.version);
    }
    assert!(versions.len() >= 2);
    assert!(versions.windows(2).all(|w| w[1] > w[0]));

    coordinator.stop().await;
}

#[tokio::test(start_paused = true)]
async fn delayed_start_waits_one_interval() {
    let coordinator = Coordinator::new();
    let task = ScriptedTask::new(always_ok(7.0));
    let memory = QuantityId::memory();
    coordinator
        .register(
            memory.clone(),
            policy(2_000, 1_000).delayed_start(),
            task.clone(),
            None,
        )
        .unwrap();
    coordinator.start(&Handle::current());

    time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(task.calls(), 0);
    assert!(coordinator.get(&memory).is_none());

    time::sleep(Duration::from_millis(1_000)).await;
    assert_eq!(task.calls(), 1);
    assert!(coordinator.get(&memory).is_some());

    coordinator.stop().await;
}

#[tokio::test(start_paused = true)]
async fn slow_task_never_overlaps_itself() {
    // Each invocation takes most of the interval; ticks stay sequential and
    // at most one invocation is ever in flight.
    let coordinator = Coordinator::new();
    let task = ScriptedTask::new(Box::new(|_| {
        Box::pin(async {
            time::sleep(Duration::from_millis(800)).await;
            Ok(Payload::Percent(1.0))
        })
    }));
    coordinator
        .register(QuantityId::cpu(), policy(1_000, 900), task.clone(), None)
        .unwrap();
    coordinator.start(&Handle::current());

    time::sleep(Duration::from_secs(5)).await;
    coordinator.stop().await;

    assert!(task.calls() >= 3);
    assert_eq!(task.max_in_flight(), 1);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_retry_with_increasing_backoff() {
    let coordinator = Coordinator::new();
    let task = ScriptedTask::new(always_err(|| ControlError::transient("device busy")));
    let volume = QuantityId::volume();
    coordinator
        .register(
            volume.clone(),
            policy(10_000, 1_000).with_retries(3, Duration::from_millis(100)),
            task.clone(),
            None,
        )
        .unwrap();
    coordinator.start(&Handle::current());

    // Let the first tick finish all its attempts.
    time::sleep(Duration::from_secs(2)).await;

    assert_eq!(task.calls(), 4); // initial attempt + 3 retries
    let sample = coordinator.get(&volume).unwrap();
    assert_eq!(sample.failure(), Some(FailureKind::Transient));
    assert_eq!(sample.version, 1);

    // Backoff delays between attempts grow strictly.
    let times = task.call_times();
    let gaps: Vec<Duration> = times.windows(2).map(|w| w[1] - w[0]).collect();
    assert_eq!(gaps.len(), 3);
    assert!(gaps[1] > gaps[0]);
    assert!(gaps[2] > gaps[1]);

    coordinator.stop().await;
}

#[tokio::test(start_paused = true)]
async fn decode_failures_are_never_retried() {
    let coordinator = Coordinator::new();
    let task = ScriptedTask::new(always_err(|| ControlError::decode("bad schema")));
    let news = QuantityId::news();
    coordinator
        .register(
            news.clone(),
            policy(10_000, 1_000).with_retries(3, Duration::from_millis(100)),
            task.clone(),
            None,
        )
        .unwrap();
    coordinator.start(&Handle::current());

    time::sleep(Duration::from_secs(2)).await;

    // Retry count stays zero: one call for the one completed tick.
    assert_eq!(task.calls(), 1);
    let sample = coordinator.get(&news).unwrap();
    assert_eq!(sample.failure(), Some(FailureKind::Decode));

    coordinator.stop().await;
}

#[tokio::test(start_paused = true)]
async fn rate_limited_exhausts_retries_then_restarts_next_tick() {
    // Permanently rate-limited feed: each tick burns its whole retry budget,
    // records one Remote failure, and the next scheduled tick starts over.
    let coordinator = Coordinator::new();
    let task = ScriptedTask::new(always_err(|| ControlError::rate_limited("HTTP 429")));
    let weather = QuantityId::weather("London");
    coordinator
        .register(
            weather.clone(),
            policy(10_000, 1_000).with_retries(3, Duration::from_millis(100)),
            task.clone(),
            None,
        )
        .unwrap();
    coordinator.start(&Handle::current());

    time::sleep(Duration::from_secs(5)).await;
    assert_eq!(task.calls(), 4);
    let sample = coordinator.get(&weather).unwrap();
    assert_eq!(sample.failure(), Some(FailureKind::Remote));
    assert_eq!(sample.version, 1);

    // Second scheduled tick runs the same cycle again.
    time::sleep(Duration::from_secs(10)).await;
    assert_eq!(task.calls(), 8);
    assert_eq!(coordinator.get(&weather).unwrap().version, 2);

    coordinator.stop().await;
}

#[tokio::test(start_paused = true)]
async fn timeout_counts_as_an_attempt() {
    let coordinator = Coordinator::new();
    let task = ScriptedTask::new(Box::new(|_| {
        Box::pin(async {
            time::sleep(Duration::from_secs(3_600)).await;
            Ok(Payload::Percent(0.0))
        })
    }));
    let battery = QuantityId::battery();
    coordinator
        .register(
            battery.clone(),
            policy(10_000, 500).with_retries(1, Duration::from_millis(100)),
            task.clone(),
            None,
        )
        .unwrap();
    coordinator.start(&Handle::current());

    time::sleep(Duration::from_secs(3)).await;

    assert_eq!(task.calls(), 2); // initial attempt + 1 retry, both timed out
    let sample = coordinator.get(&battery).unwrap();
    assert_eq!(sample.failure(), Some(FailureKind::Timeout));

    coordinator.stop().await;
}

#[tokio::test(start_paused = true)]
async fn unsupported_disables_the_quantity() {
    let coordinator = Coordinator::new();
    let task = ScriptedTask::new(always_err(|| ControlError::unsupported("no battery")));
    let battery = QuantityId::battery();
    coordinator
        .register(
            battery.clone(),
            policy(1_000, 500).with_retries(3, Duration::from_millis(50)),
            task.clone(),
            None,
        )
        .unwrap();
    coordinator.start(&Handle::current());

    time::sleep(Duration::from_secs(5)).await;

    // One attempt, no retries, no further scheduling.
    assert_eq!(task.calls(), 1);
    assert!(coordinator.is_disabled(&battery));
    let sample = coordinator.get(&battery).unwrap();
    assert_eq!(sample.failure(), Some(FailureKind::Unsupported));
    assert_eq!(sample.version, 1);

    coordinator.stop().await;
}

#[tokio::test(start_paused = true)]
async fn failed_tick_keeps_last_good_value() {
    // Succeed once, then fail: the failed Sample still carries the last
    // successful payload and its timestamp.
    let coordinator = Coordinator::new();
    let task = ScriptedTask::new(Box::new(|call| {
        Box::pin(async move {
            if call == 0 {
                Ok(Payload::Percent(55.0))
            } else {
                Err(ControlError::remote("service down"))
            }
        })
    }));
    let cpu = QuantityId::cpu();
    coordinator
        .register(cpu.clone(), policy(1_000, 500), task, None)
        .unwrap();
    coordinator.start(&Handle::current());

    time::sleep(Duration::from_millis(2_500)).await;
    coordinator.stop().await;

    let sample = coordinator.get(&cpu).unwrap();
    assert!(sample.version >= 2);
    assert_eq!(sample.failure(), Some(FailureKind::Remote));
    let (payload, _) = sample.latest_known().expect("stale value preserved");
    assert_eq!(payload.as_percent(), Some(55.0));
}

#[tokio::test(start_paused = true)]
async fn stop_returns_within_grace_even_with_pending_work() {
    let coordinator = Coordinator::new();
    let task = ScriptedTask::new(Box::new(|_| Box::pin(std::future::pending())));
    coordinator
        .register(QuantityId::news(), policy(10_000, 1_000), task, None)
        .unwrap();
    coordinator.start(&Handle::current());

    // Stop mid-attempt; the in-flight call is discarded, not awaited forever.
    time::sleep(Duration::from_millis(200)).await;
    let grace = coordinator.grace_timeout();
    let stopped_at = Instant::now();
    coordinator.stop().await;
    assert!(Instant::now() - stopped_at <= grace);
}

/// Fake control device shared between the adapter (write path) and the
/// refresh task (read path). Reads capture the device value when the read
/// begins, like a real driver round-trip.
struct FakeDevice {
    value: Mutex<f64>,
    read_delay: Duration,
}

impl FakeDevice {
    fn new(value: f64, read_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            value: Mutex::new(value),
            read_delay,
        })
    }
}

impl ControlAdapter for FakeDevice {
    fn read(&self) -> ncp::Result<Payload> {
        Ok(Payload::Percent(*self.value.lock()))
    }

    fn write(&self, value: f64) -> ncp::Result<()> {
        *self.value.lock() = value;
        Ok(())
    }
}

struct FakeDeviceTask(Arc<FakeDevice>);

impl RefreshTask for FakeDeviceTask {
    fn refresh(&self) -> BoxFuture<'_, ncp::Result<Payload>> {
        let captured = *self.0.value.lock();
        let delay = self.0.read_delay;
        Box::pin(async move {
            time::sleep(delay).await;
            Ok(Payload::Percent(captured))
        })
    }
}

#[tokio::test(start_paused = true)]
async fn write_invalidates_and_next_read_reconfirms() {
    let device = FakeDevice::new(30.0, Duration::from_millis(500));
    let coordinator = Coordinator::new();
    let brightness = QuantityId::brightness();
    coordinator
        .register(
            brightness.clone(),
            policy(2_000, 1_000),
            Arc::new(FakeDeviceTask(device.clone())),
            Some(device.clone()),
        )
        .unwrap();
    coordinator.start(&Handle::current());

    // First tick lands the pre-write value.
    time::sleep(Duration::from_secs(1)).await;
    assert_eq!(
        coordinator
            .get(&brightness)
            .unwrap()
            .current()
            .unwrap()
            .as_percent(),
        Some(30.0)
    );

    // Write mid-cycle: the nudged next read must reconfirm 70, and no later
    // Sample may show the stale pre-write value.
    coordinator.set_control(&brightness, 70.0).unwrap();
    time::sleep(Duration::from_secs(1)).await;

    let sample = coordinator.get(&brightness).unwrap();
    assert_eq!(sample.current().unwrap().as_percent(), Some(70.0));
    let reconfirmed_version = sample.version;

    time::sleep(Duration::from_secs(4)).await;
    let later = coordinator.get(&brightness).unwrap();
    assert!(later.version > reconfirmed_version);
    assert_eq!(later.current().unwrap().as_percent(), Some(70.0));

    coordinator.stop().await;
}

#[tokio::test(start_paused = true)]
async fn in_flight_read_from_before_a_write_is_discarded() {
    // A read that began before the write completes after it; its stale
    // result must never overwrite the just-applied value.
    let device = FakeDevice::new(30.0, Duration::from_millis(500));
    let coordinator = Coordinator::new();
    let brightness = QuantityId::brightness();
    coordinator
        .register(
            brightness.clone(),
            policy(2_000, 1_000),
            Arc::new(FakeDeviceTask(device.clone())),
            Some(device.clone()),
        )
        .unwrap();

    let mut subscription = coordinator.subscribe(SubscriptionScope::Quantity(brightness.clone()));
    coordinator.start(&Handle::current());

    // Tick 1 completes at t=0.5s with 30. Tick 2 starts at t=2.0s and is
    // mid-read when the write lands at t=2.2s.
    time::sleep(Duration::from_millis(2_200)).await;
    coordinator.set_control(&brightness, 90.0).unwrap();
    time::sleep(Duration::from_secs(2)).await;

    // Exactly two Samples were recorded: the initial 30 and the
    // reconfirmed 90. The stale in-flight read produced no notification.
    let mut events = 0;
    while let Some(event) = subscription.try_recv() {
        assert_eq!(event.quantity, brightness);
        events += 1;
    }
    assert_eq!(events, 2);

    let final_sample = coordinator.get(&brightness).unwrap();
    assert_eq!(final_sample.current().unwrap().as_percent(), Some(90.0));
    // The stale capture of 30 was discarded: version 2 is the reconfirmed 90.
    assert_eq!(final_sample.version, 2);

    coordinator.stop().await;
}

#[tokio::test(start_paused = true)]
async fn subscriptions_filter_by_quantity_and_broadcast_to_all() {
    let coordinator = Coordinator::new();
    let cpu = QuantityId::cpu();
    let memory = QuantityId::memory();
    coordinator
        .register(cpu.clone(), policy(1_000, 500), ScriptedTask::new(always_ok(10.0)), None)
        .unwrap();
    coordinator
        .register(
            memory.clone(),
            policy(1_000, 500),
            ScriptedTask::new(always_ok(20.0)),
            None,
        )
        .unwrap();

    let mut cpu_only = coordinator.subscribe(SubscriptionScope::Quantity(cpu.clone()));
    let mut all_a = coordinator.subscribe(SubscriptionScope::All);
    let mut all_b = coordinator.subscribe(SubscriptionScope::All);

    coordinator.start(&Handle::current());
    time::sleep(Duration::from_millis(2_500)).await;
    coordinator.stop().await;

    let mut cpu_events = 0;
    while let Some(event) = cpu_only.try_recv() {
        assert_eq!(event.quantity, cpu);
        cpu_events += 1;
    }
    assert!(cpu_events >= 2);

    // Both broadcast subscribers independently see every version bump.
    let mut seen_a = Vec::new();
    while let Some(event) = all_a.try_recv() {
        seen_a.push((event.quantity.clone(), event.version));
    }
    let mut seen_b = Vec::new();
    while let Some(event) = all_b.try_recv() {
        seen_b.push((event.quantity.clone(), event.version));
    }
    assert_eq!(seen_a, seen_b);
    assert!(seen_a.iter().any(|(q, _)| *q == memory));
}

#[tokio::test(start_paused = true)]
async fn registration_rejects_duplicates_and_late_entries() {
    let coordinator = Coordinator::new();
    coordinator
        .register(QuantityId::cpu(), policy(1_000, 500), ScriptedTask::new(always_ok(1.0)), None)
        .unwrap();
    assert!(coordinator
        .register(QuantityId::cpu(), policy(1_000, 500), ScriptedTask::new(always_ok(1.0)), None)
        .is_err());

    coordinator.start(&Handle::current());
    assert!(coordinator
        .register(
            QuantityId::memory(),
            policy(1_000, 500),
            ScriptedTask::new(always_ok(1.0)),
            None
        )
        .is_err());

    coordinator.stop().await;
}

#[tokio::test(start_paused = true)]
async fn set_control_rejects_non_controls() {
    let coordinator = Coordinator::new();
    coordinator
        .register(QuantityId::cpu(), policy(1_000, 500), ScriptedTask::new(always_ok(1.0)), None)
        .unwrap();
    coordinator.start(&Handle::current());

    assert!(coordinator.set_control(&QuantityId::cpu(), 50.0).is_err());
    assert!(coordinator
        .set_control(&QuantityId::brightness(), 50.0)
        .is_err());

    coordinator.stop().await;
}
