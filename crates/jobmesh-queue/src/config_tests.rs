    use super::*;

    #[test]
    fn test_default_config() {
        let config = QueueConfig::default();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.max_queue_size, 10000);
        assert_eq!(config.delay_multiplier, 1.0);
        assert_eq!(config.heartbeat_interval_ms, 30_000);
        assert_eq!(config.max_timer_delay_ms, MAX_TIMER_DELAY_MS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let config: QueueConfig = serde_json::from_str(r#"{"concurrency": 2}"#).unwrap();
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.max_queue_size, 10000);
        assert_eq!(config.delay_multiplier, 1.0);
    }

    #[test]
    fn test_config_serialization() {
        let config = QueueConfig {
            delay_multiplier: 0.5,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: QueueConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_concurrency = QueueConfig {
            concurrency: 0,
            ..Default::default()
        };
        assert!(matches!(
            zero_concurrency.validate(),
            Err(QueueError::InvalidConfig(_))
        ));

        let zero_capacity = QueueConfig {
            max_queue_size: 0,
            ..Default::default()
        };
        assert!(zero_capacity.validate().is_err());

        let negative_multiplier = QueueConfig {
            delay_multiplier: -1.0,
            ..Default::default()
        };
        assert!(negative_multiplier.validate().is_err());

        let nan_multiplier = QueueConfig {
            delay_multiplier: f64::NAN,
            ..Default::default()
        };
        assert!(nan_multiplier.validate().is_err());
    }

    #[test]
    fn test_heartbeat_disabled() {
        let config = QueueConfig {
            heartbeat_interval_ms: 0,
            ..Default::default()
        };
        assert!(config.heartbeat_interval().is_none());
        assert_eq!(
            QueueConfig::default().heartbeat_interval(),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_retry_backoff() {
        let config = QueueConfig::default();
        assert_eq!(config.retry_backoff(1), Duration::from_secs(2));
        assert_eq!(config.retry_backoff(2), Duration::from_secs(4));
        assert_eq!(config.retry_backoff(3), Duration::from_secs(8));

        let fast = QueueConfig {
            delay_multiplier: 0.001,
            ..Default::default()
        };
        assert_eq!(fast.retry_backoff(1), Duration::from_millis(2));
    }

    #[test]
    fn test_scaled_delay_is_clamped() {
        let config = QueueConfig {
            max_timer_delay_ms: 1000,
            ..Default::default()
        };
        assert_eq!(config.scaled_delay(5000.0), Duration::from_millis(1000));
        assert_eq!(config.scaled_delay(0.0), Duration::from_millis(1));
    }
