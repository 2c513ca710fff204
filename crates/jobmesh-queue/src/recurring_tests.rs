    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};

    use parking_lot::Mutex;

    use crate::config::QueueConfig;
    use crate::cron::{CronEvaluator, StandardCron};
    use crate::handler::handler_fn;
    use crate::job::{ConsumeOptions, Job};
    use crate::queue::JobQueue;

    /// Cron evaluator returning preset offsets from `now`, one per call.
    struct ScriptedCron {
        offsets_ms: Mutex<VecDeque<i64>>,
        calls: AtomicU32,
    }

    impl ScriptedCron {
        fn new(offsets_ms: &[i64]) -> Arc<Self> {
            Arc::new(Self {
                offsets_ms: Mutex::new(offsets_ms.iter().copied().collect()),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl CronEvaluator for ScriptedCron {
        fn next_fire(
            &self,
            expression: &str,
            now: chrono::DateTime<Utc>,
        ) -> Result<chrono::DateTime<Utc>, QueueError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.offsets_ms.lock().pop_front() {
                Some(ms) => Ok(now + chrono::Duration::milliseconds(ms)),
                None => Err(QueueError::InvalidSchedule(format!(
                    "'{}' has no more fire times",
                    expression
                ))),
            }
        }

        fn validate(&self, _expression: &str) -> Result<(), QueueError> {
            Ok(())
        }
    }

    fn test_config() -> QueueConfig {
        QueueConfig {
            heartbeat_interval_ms: 0,
            delay_multiplier: 0.001,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_enqueues_immediately_then_repeats() {
        let queue = JobQueue::new(test_config()).unwrap();

        let id = queue
            .schedule_recurring("tick".to_string(), RecurringOptions::interval("tick", 10.0))
            .unwrap();
        assert_eq!(id, "tick");
        assert_eq!(queue.stats().pending, 1);

        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(queue.stats().pending, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_instances_are_named_after_schedule() {
        let queue = JobQueue::new(test_config()).unwrap();
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));

        let sink = seen.clone();
        queue.consume(
            handler_fn(move |job: Job<String>| {
                let sink = sink.clone();
                async move {
                    sink.lock().push(job.id.clone());
                    Ok(())
                }
            }),
            ConsumeOptions::new("g"),
        );
        queue
            .schedule_recurring("report".to_string(), RecurringOptions::interval("report", 10.0))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(15)).await;

        let seen = seen.lock().clone();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|id| id.starts_with("report:")));
        assert_ne!(seen[0], seen[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_purges_pending_instances() {
        let queue = JobQueue::new(test_config()).unwrap();
        queue
            .schedule_recurring("tick".to_string(), RecurringOptions::interval("tick", 10.0))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(15)).await;
        assert_eq!(queue.stats().pending, 2);

        assert!(queue.cancel_recurring("tick"));
        assert_eq!(queue.stats().pending, 0);
        assert!(queue.list_recurring_jobs().is_empty());
        assert!(queue.get_recurring_job_details("tick").is_none());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(queue.stats().pending, 0);

        assert!(!queue.cancel_recurring("tick"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_leaves_other_jobs() {
        let queue = JobQueue::new(test_config()).unwrap();
        queue
            .enqueue("plain".to_string(), EnqueueOptions::new().with_job_id("tick-like"))
            .unwrap();
        queue
            .schedule_recurring("tick".to_string(), RecurringOptions::interval("tick", 1000.0))
            .unwrap();
        assert_eq!(queue.stats().pending, 2);

        assert!(queue.cancel_recurring("tick"));
        assert_eq!(queue.stats().pending, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replace_discards_old_instances() {
        let queue = JobQueue::new(test_config()).unwrap();
        queue
            .schedule_recurring("r".to_string(), RecurringOptions::interval("r", 1000.0))
            .unwrap();
        queue
            .schedule_recurring(
                "r".to_string(),
                RecurringOptions::interval("r", 1000.0).with_priority(3),
            )
            .unwrap();
        assert_eq!(queue.stats().pending, 1);
        assert_eq!(queue.list_recurring_jobs(), vec!["r"]);
        assert_eq!(queue.get_recurring_job_details("r").unwrap().priority, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replace_delivers_new_payload_only() {
        let queue = JobQueue::new(test_config()).unwrap();
        queue
            .schedule_recurring("old".to_string(), RecurringOptions::interval("r", 1000.0))
            .unwrap();
        queue
            .schedule_recurring("new".to_string(), RecurringOptions::interval("r", 1000.0))
            .unwrap();

        let payloads = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = payloads.clone();
        queue.consume(
            handler_fn(move |job: Job<String>| {
                let sink = sink.clone();
                async move {
                    sink.lock().push(job.payload.as_ref().clone());
                    Ok(())
                }
            }),
            ConsumeOptions::new("g"),
        );
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(*payloads.lock(), vec!["new".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_interval_rejected() {
        let queue = JobQueue::new(test_config()).unwrap();
        for seconds in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let result =
                queue.schedule_recurring("x".to_string(), RecurringOptions::interval("x", seconds));
            assert!(matches!(result, Err(QueueError::InvalidSchedule(_))));
        }
        assert!(queue.list_recurring_jobs().is_empty());
        assert_eq!(queue.stats().pending, 0);
    }

    #[tokio::test]
    async fn test_invalid_cron_rejected() {
        let queue = JobQueue::new(test_config()).unwrap();
        let result = queue.schedule_recurring(
            "x".to_string(),
            RecurringOptions::cron("bad", "not a cron expression"),
        );
        assert!(matches!(result, Err(QueueError::InvalidSchedule(_))));
        assert!(queue.get_recurring_job_details("bad").is_none());
    }

    #[tokio::test]
    async fn test_invalid_replacement_keeps_existing_schedule() {
        let queue = JobQueue::new(test_config()).unwrap();
        queue
            .schedule_recurring("x".to_string(), RecurringOptions::interval("keep", 1000.0))
            .unwrap();
        assert!(queue
            .schedule_recurring("x".to_string(), RecurringOptions::interval("keep", 0.0))
            .is_err());

        let details = queue.get_recurring_job_details("keep").unwrap();
        assert!(details.enabled);
        assert_eq!(details.recurrence, Recurrence::Interval(1000.0));
        assert_eq!(queue.stats().pending, 1);
    }

    #[tokio::test]
    async fn test_list_and_details() {
        let queue = JobQueue::with_cron_evaluator(test_config(), Arc::new(StandardCron)).unwrap();
        queue
            .schedule_recurring(
                "nightly payload".to_string(),
                RecurringOptions::cron("nightly", "0 0 * * *").with_priority(5),
            )
            .unwrap();
        queue
            .schedule_recurring("beat".to_string(), RecurringOptions::interval("beat", 60.0))
            .unwrap();

        assert_eq!(queue.list_recurring_jobs(), vec!["beat", "nightly"]);

        let nightly = queue.get_recurring_job_details("nightly").unwrap();
        assert_eq!(*nightly.payload, "nightly payload");
        assert_eq!(nightly.priority, 5);
        assert_eq!(nightly.recurrence.cron_expression(), Some("0 0 * * *"));
        assert!(nightly.enabled);

        let beat = queue.get_recurring_job_details("beat").unwrap();
        assert_eq!(beat.recurrence.interval_seconds(), Some(60.0));

        assert!(queue.get_recurring_job_details("missing").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cron_fires_and_rearms() {
        let cron = ScriptedCron::new(&[20, 20, 1_000_000]);
        let queue = JobQueue::with_cron_evaluator(test_config(), cron.clone()).unwrap();

        queue
            .schedule_recurring("c".to_string(), RecurringOptions::cron("c", "scripted"))
            .unwrap();
        assert_eq!(queue.stats().pending, 0);

        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(queue.stats().pending, 1);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(queue.stats().pending, 2);
        assert_eq!(cron.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cron_long_wait_is_chunked() {
        let config = QueueConfig {
            max_timer_delay_ms: 30,
            ..test_config()
        };
        let cron = ScriptedCron::new(&[100, 20, 1_000_000]);
        let queue = JobQueue::with_cron_evaluator(config, cron.clone()).unwrap();

        queue
            .schedule_recurring("c".to_string(), RecurringOptions::cron("c", "scripted"))
            .unwrap();

        // First chunk expires at 30ms and only re-arms.
        tokio::time::sleep(Duration::from_millis(35)).await;
        assert_eq!(queue.stats().pending, 0);
        assert_eq!(cron.calls(), 2);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(queue.stats().pending, 1);
        assert_eq!(cron.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cron_disabled_when_evaluation_fails() {
        let cron = ScriptedCron::new(&[10]);
        let queue = JobQueue::with_cron_evaluator(test_config(), cron.clone()).unwrap();

        queue
            .schedule_recurring("c".to_string(), RecurringOptions::cron("c", "scripted"))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(15)).await;

        assert_eq!(queue.stats().pending, 1);
        assert!(queue.list_recurring_jobs().is_empty());
        assert!(!queue.get_recurring_job_details("c").unwrap().enabled);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cron.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_disables_schedules() {
        let queue = JobQueue::new(test_config()).unwrap();
        queue
            .schedule_recurring("tick".to_string(), RecurringOptions::interval("tick", 10.0))
            .unwrap();
        queue.stop().await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(queue.stats().pending, 1);
        assert!(queue.list_recurring_jobs().is_empty());
        assert!(!queue.get_recurring_job_details("tick").unwrap().enabled);

        assert_eq!(
            queue.schedule_recurring("tick".to_string(), RecurringOptions::interval("t2", 1.0)),
            Err(QueueError::Stopped)
        );
    }

    #[test]
    fn test_recurrence_serde() {
        let interval: Recurrence = serde_json::from_str(r#"{"interval":2.5}"#).unwrap();
        assert_eq!(interval, Recurrence::Interval(2.5));

        let cron: Recurrence = serde_json::from_str(r#"{"cron":"0 * * * *"}"#).unwrap();
        assert_eq!(cron.cron_expression(), Some("0 * * * *"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_cron_replacement_keeps_existing_schedule() {
        // Accepts every expression but has no fire times to offer.
        let cron = ScriptedCron::new(&[]);
        let queue = JobQueue::with_cron_evaluator(test_config(), cron.clone()).unwrap();

        queue
            .schedule_recurring("x".to_string(), RecurringOptions::interval("keep", 1000.0))
            .unwrap();
        assert_eq!(queue.stats().pending, 1);

        let result =
            queue.schedule_recurring("y".to_string(), RecurringOptions::cron("keep", "scripted"));
        assert!(matches!(result, Err(QueueError::InvalidSchedule(_))));
        assert_eq!(cron.calls(), 1);

        let details = queue.get_recurring_job_details("keep").unwrap();
        assert!(details.enabled);
        assert_eq!(details.recurrence, Recurrence::Interval(1000.0));
        assert_eq!(*details.payload, "x");
        assert_eq!(queue.stats().pending, 1);
        assert_eq!(queue.list_recurring_jobs(), vec!["keep"]);
    }
