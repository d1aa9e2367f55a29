//! # Diagnostics Surface
//!
//! Stats snapshots, configuration loading, metrics export and subscriber
//! initialization.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use relay_bus::{payload_types, BusConfig, Registry};
    use relay_telemetry::{
        encode_metrics, init_telemetry, register_metrics, TelemetryConfig, CHANNELS_ACTIVE,
    };

    use crate::fixtures::{Order, Refund};

    #[tokio::test]
    async fn test_stats_serialize_to_json() -> anyhow::Result<()> {
        let registry = Registry::new();
        registry.init_channel("orders", 8, payload_types![Order, Refund])?;
        registry.subscribe_fn("orders", Duration::from_millis(300), |_| false)?;
        registry.publish("orders", Order { id: 1 })?;

        let json = serde_json::to_value(registry.channel_stats("orders")?)?;
        assert_eq!(json["name"], "orders");
        assert_eq!(json["capacity"], 8);
        assert_eq!(json["listener_count"], 1);
        assert_eq!(json["next_sequence"], 1);
        assert_eq!(json["draining"], false);
        assert_eq!(json["allowed_types"].as_array().map(Vec::len), Some(2));

        registry.destroy_channel("orders").await?;
        Ok(())
    }

    #[test]
    fn test_config_from_json_fills_defaults() -> anyhow::Result<()> {
        let config = BusConfig::from_json(r#"{"grace_period_ms": 50, "verbose": false}"#)?;
        assert_eq!(config.grace_period(), Duration::from_millis(50));
        assert_eq!(config.listener_timeout_ms, relay_bus::DEFAULT_LISTENER_TIMEOUT_MS);
        assert_eq!(config.max_inflight_callbacks, None);

        let registry = Registry::with_config(config);
        assert!(!registry.is_verbose());
        Ok(())
    }

    #[tokio::test]
    async fn test_metrics_track_channel_activity() -> anyhow::Result<()> {
        register_metrics()?;
        let registry = Registry::new();
        registry.init_channel("metrics-flow", 4, payload_types![Order])?;
        registry.subscribe_fn("metrics-flow", Duration::from_millis(300), |_| false)?;

        registry.publish("metrics-flow", Order { id: 1 })?;
        registry.publish("metrics-flow", Order { id: 2 })?;
        assert!(registry.publish("metrics-flow", "wrong type").is_err());

        let text = encode_metrics()?;
        assert!(text.contains(r#"relay_messages_published_total{channel="metrics-flow"} 2"#));
        assert!(text.contains(r#"channel="metrics-flow",reason="type_not_allowed""#));
        assert!(CHANNELS_ACTIVE.get() >= 1);

        registry.destroy_channel("metrics-flow").await?;
        let text = encode_metrics()?;
        assert!(!text.contains(r#"relay_messages_published_total{channel="metrics-flow"}"#));
        assert!(!text.contains(r#"relay_publish_rejected_total{channel="metrics-flow""#));
        Ok(())
    }

    #[tokio::test]
    async fn test_rejections_cleared_on_destroy() -> anyhow::Result<()> {
        register_metrics()?;
        let registry = Registry::new();
        registry.init_channel("metrics-rejected", 1, payload_types![Order])?;
        assert!(registry.publish("metrics-rejected", Order { id: 1 }).is_err());
        assert!(encode_metrics()?
            .contains(r#"channel="metrics-rejected",reason="no_subscribers""#));

        registry.destroy_channel("metrics-rejected").await?;
        assert!(!encode_metrics()?.contains(r#"channel="metrics-rejected""#));
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_names_share_one_series() -> anyhow::Result<()> {
        register_metrics()?;
        let registry = Registry::new();
        for i in 0..5 {
            let name = format!("metrics-ghost-{i}");
            assert!(registry.publish(&name, Order { id: i }).is_err());
        }

        let text = encode_metrics()?;
        assert!(!text.contains("metrics-ghost-"));
        assert!(text.contains(r#"channel="_unknown",reason="not_found""#));
        Ok(())
    }

    #[test]
    fn test_init_telemetry_without_console() {
        // The only test in this binary that installs a global subscriber.
        let config = TelemetryConfig {
            console_output: false,
            ..TelemetryConfig::for_service("relay-tests")
        };
        let guard = init_telemetry(config);
        assert!(guard.is_ok());
    }
}
