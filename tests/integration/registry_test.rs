//! Registry construction from configuration.

use std::time::Duration;

use ncp::core::config::PanelConfig;
use ncp::core::registry::{FirstTick, QuantitySpec, RefreshPolicy, Registry, RegistryEntry};
use ncp::core::panel::QuantityId;

#[test]
fn default_config_builds_a_valid_registry() {
    let registry = PanelConfig::default().registry().unwrap();
    assert_eq!(registry.len(), 5);
    for entry in registry.entries() {
        assert!(entry.policy.timeout < entry.policy.interval);
    }
}

#[test]
fn configured_feeds_join_the_registry_in_order() {
    let config: PanelConfig = serde_json::from_str(
        r#"{
            "weather": {"city": "Berlin", "api_key": "k", "interval_secs": 300, "timeout_secs": 5},
            "news": {"api_key": "k", "country": "de", "max_headlines": 5}
        }"#,
    )
    .unwrap();
    let registry = config.registry().unwrap();

    let quantities: Vec<&str> = registry
        .entries()
        .iter()
        .map(|e| e.quantity.as_str())
        .collect();
    assert_eq!(
        quantities,
        vec![
            "brightness",
            "volume",
            "cpu",
            "memory",
            "battery",
            "weather:Berlin",
            "news"
        ]
    );

    let weather = &registry.entries()[5];
    assert_eq!(weather.policy.interval, Duration::from_secs(300));
    assert_eq!(weather.policy.timeout, Duration::from_secs(5));
    assert!(matches!(
        &weather.spec,
        QuantitySpec::Weather { city, units, .. } if city == "Berlin" && units == "metric"
    ));
}

#[test]
fn controls_can_be_disabled() {
    let config: PanelConfig =
        serde_json::from_str(r#"{"controls": {"brightness": false, "volume": false}}"#).unwrap();
    let registry = config.registry().unwrap();
    assert!(registry
        .entries()
        .iter()
        .all(|e| !matches!(e.spec, QuantitySpec::Brightness | QuantitySpec::Volume)));
}

#[test]
fn stalled_fetch_cannot_outlive_its_interval() {
    // timeout >= interval is a configuration error, caught at load.
    let mut registry = Registry::new();
    let result = registry.push(RegistryEntry {
        quantity: QuantityId::cpu(),
        policy: RefreshPolicy::new(Duration::from_secs(1), Duration::from_secs(5)),
        spec: QuantitySpec::Cpu,
    });
    assert!(result.is_err());
    assert!(registry.is_empty());
}

#[test]
fn first_tick_defaults_to_immediate() {
    let policy = RefreshPolicy::new(Duration::from_secs(2), Duration::from_secs(1));
    assert_eq!(policy.first_tick, FirstTick::Immediate);
    assert_eq!(
        policy.delayed_start().first_tick,
        FirstTick::AfterInterval
    );
}
