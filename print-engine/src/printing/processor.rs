//! Print job processor
//!
//! One processor per device drains that device's slice of the queue:
//! 1. Pick the oldest ready `PENDING` job (jobs backing off are skipped)
//! 2. Probe the device; offline means the job stays `PENDING` and the
//!    processor waits with backoff
//! 3. Claim (`PRINTING`), send, then `COMPLETED` or `FAILED`
//!
//! Delivery errors never leave the processor; they are recorded on the job.
//! A queue store error stops the loop and marks the processor unhealthy.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::device::{DeviceErrorCode, DeviceHandle};
use super::job::JobStatus;
use super::retry::RetryPolicy;
use super::storage::{PrintQueueStore, QueueResult, QueueStoreError};
use crate::core::{EngineResult, PrintEngineError};
use crate::utils::logger::OPERATOR_TARGET;
use crate::utils::now_millis;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_PROTOCOL_ALERT_THRESHOLD: u32 = 3;

/// Shared liveness flag of a processor
#[derive(Debug, Clone)]
pub struct ProcessorHealth(Arc<AtomicBool>);

impl ProcessorHealth {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_healthy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn mark_unhealthy(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Outcome of one processing step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A job was handled (or lost a claim race); look again right away
    Worked,
    /// Nothing ready; wait at most this long or until a job is enqueued
    Idle(Duration),
    /// Device unreachable; wait this long
    Offline(Duration),
}

pub struct PrintJobProcessor {
    store: PrintQueueStore,
    device: Arc<DeviceHandle>,
    policy: RetryPolicy,
    poll_interval: Duration,
    protocol_alert_threshold: u32,
    health: ProcessorHealth,
    offline_streak: u32,
}

impl PrintJobProcessor {
    pub fn new(store: PrintQueueStore, device: Arc<DeviceHandle>, policy: RetryPolicy) -> Self {
        Self {
            store,
            device,
            policy,
            poll_interval: DEFAULT_POLL_INTERVAL,
            protocol_alert_threshold: DEFAULT_PROTOCOL_ALERT_THRESHOLD,
            health: ProcessorHealth::new(),
            offline_streak: 0,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_protocol_alert_threshold(mut self, threshold: u32) -> Self {
        self.protocol_alert_threshold = threshold.max(1);
        self
    }

    pub fn health(&self) -> ProcessorHealth {
        self.health.clone()
    }

    /// Run until shutdown, or until the queue store fails
    pub async fn run(mut self, shutdown: CancellationToken) -> EngineResult<()> {
        let device = self.device.name().to_string();
        tracing::info!(device = %device, "Print job processor started");

        match self.store.requeue_interrupted(Some(&device)) {
            Ok(ids) if !ids.is_empty() => {
                tracing::warn!(device = %device, count = ids.len(), "Recovered interrupted print jobs");
            }
            Ok(_) => {}
            Err(e) => return Err(self.stop_unhealthy(e)),
        }

        let job_available = self.store.job_available();
        loop {
            if shutdown.is_cancelled() {
                break;
            }

            // Register before looking, so an enqueue during the step is not missed
            let notified = job_available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.step().await {
                Ok(Step::Worked) => continue,
                Ok(Step::Idle(wait)) => {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(wait) => {}
                        _ = &mut notified => {}
                    }
                }
                Ok(Step::Offline(wait)) => {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
                Err(e) => return Err(self.stop_unhealthy(e)),
            }
        }

        tracing::info!(device = %device, "Print job processor stopped");
        Ok(())
    }

    /// Handle at most one job
    pub async fn step(&mut self) -> QueueResult<Step> {
        let device = self.device.name().to_string();
        let now = now_millis();

        let Some(job) = self.store.next_pending(&device, now)? else {
            let wait = match self.store.next_ready_at(&device)? {
                Some(at) if at > now => Duration::from_millis((at - now) as u64),
                Some(_) => Duration::from_millis(1),
                None => self.poll_interval,
            };
            return Ok(Step::Idle(wait.min(self.poll_interval)));
        };

        if !self.device.probe().await {
            self.offline_streak = self.offline_streak.saturating_add(1);
            let wait = self.policy.delay(self.offline_streak);
            tracing::debug!(
                device = %device,
                job_id = %job.id,
                wait_ms = wait.as_millis() as u64,
                "Device offline, job stays pending"
            );
            return Ok(Step::Offline(wait));
        }
        self.offline_streak = 0;

        let job = match self.store.mark_printing(&job.id) {
            Ok(job) => job,
            // Cancelled or claimed between the lookup and the claim
            Err(QueueStoreError::InvalidTransition { .. }) => return Ok(Step::Worked),
            Err(e) => return Err(e),
        };

        match self.device.send(&job.payload).await {
            Ok(()) => {
                self.store.mark_completed(&job.id)?;
                tracing::info!(
                    device = %device,
                    job_id = %job.id,
                    order_id = %job.order_id,
                    attempt = job.attempts,
                    "Print job completed"
                );
            }
            Err(err) => {
                let retry_delay = err
                    .is_transient()
                    .then(|| self.policy.delay(job.attempts));
                let updated = self.store.mark_failed(&job.id, &err, retry_delay)?;

                if updated.status == JobStatus::Failed {
                    tracing::error!(
                        target: OPERATOR_TARGET,
                        device = %device,
                        job_id = %updated.id,
                        order_id = %updated.order_id,
                        attempts = updated.attempts,
                        error = %err,
                        "Print job failed permanently, needs manual retry"
                    );
                } else {
                    tracing::warn!(
                        device = %device,
                        job_id = %updated.id,
                        attempt = updated.attempts,
                        retry_in_ms = retry_delay.unwrap_or_default().as_millis() as u64,
                        error = %err,
                        "Print attempt failed, will retry"
                    );
                }

                if err.code == DeviceErrorCode::Protocol
                    && updated.protocol_errors >= self.protocol_alert_threshold
                {
                    tracing::warn!(
                        target: OPERATOR_TARGET,
                        device = %device,
                        job_id = %updated.id,
                        protocol_errors = updated.protocol_errors,
                        error = %err,
                        "Printer keeps rejecting print data"
                    );
                }
            }
        }

        Ok(Step::Worked)
    }

    fn stop_unhealthy(&self, err: QueueStoreError) -> PrintEngineError {
        self.health.mark_unhealthy();
        tracing::error!(
            device = %self.device.name(),
            error = %err,
            "Print queue store unavailable, processor stopping"
        );
        PrintEngineError::QueueStoreUnavailable(err.to_string())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::printing::device::{DeviceDriver, DeviceError, Transport};
    use crate::printing::{NewPrintJob, PrintCommand, TargetKind};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted device: online flag, queued send outcomes, log of printed jobs
    pub(crate) struct MockDevice {
        name: String,
        pub online: AtomicBool,
        outcomes: Mutex<VecDeque<Result<(), DeviceError>>>,
        printed: Mutex<Vec<String>>,
    }

    impl MockDevice {
        pub(crate) fn new(name: &str, online: bool) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                online: AtomicBool::new(online),
                outcomes: Mutex::new(VecDeque::new()),
                printed: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn set_online(&self, online: bool) {
            self.online.store(online, Ordering::SeqCst);
        }

        pub(crate) fn push_outcome(&self, outcome: Result<(), DeviceError>) {
            self.outcomes.lock().unwrap().push_back(outcome);
        }

        /// First text line of every delivered payload
        pub(crate) fn printed(&self) -> Vec<String> {
            self.printed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DeviceDriver for MockDevice {
        fn name(&self) -> &str {
            &self.name
        }

        fn transport(&self) -> Transport {
            Transport::Spooler {
                queue: format!("mock-{}", self.name),
            }
        }

        async fn is_connected(&self) -> bool {
            self.online.load(Ordering::SeqCst)
        }

        async fn send(&self, commands: &[PrintCommand]) -> Result<(), DeviceError> {
            if !self.online.load(Ordering::SeqCst) {
                return Err(DeviceError::disconnected("mock offline"));
            }
            let scripted = self.outcomes.lock().unwrap().pop_front();
            if let Some(outcome) = scripted {
                outcome?;
            }
            let first_line = commands
                .iter()
                .find_map(|c| match c {
                    PrintCommand::Text { line } => Some(line.clone()),
                    _ => None,
                })
                .unwrap_or_default();
            self.printed.lock().unwrap().push(first_line);
            Ok(())
        }
    }

    fn job(order_id: &str) -> NewPrintJob {
        NewPrintJob {
            order_id: order_id.to_string(),
            template_id: "receipt".to_string(),
            target_kind: TargetKind::Receipt,
            device: "receipt".to_string(),
            payload: vec![
                PrintCommand::Text {
                    line: order_id.to_string(),
                },
                PrintCommand::Cut,
            ],
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
        }
    }

    fn processor(store: &PrintQueueStore, mock: &Arc<MockDevice>) -> PrintJobProcessor {
        let handle = Arc::new(DeviceHandle::new(mock.clone()));
        PrintJobProcessor::new(store.clone(), handle, fast_policy())
            .with_poll_interval(Duration::from_millis(20))
    }

    #[tokio::test]
    async fn test_prints_in_enqueue_order() {
        let store = PrintQueueStore::open_in_memory().unwrap();
        let mock = MockDevice::new("receipt", true);
        let mut processor = processor(&store, &mock);

        store.enqueue(job("A")).unwrap();
        store.enqueue(job("B")).unwrap();

        assert_eq!(processor.step().await.unwrap(), Step::Worked);
        assert_eq!(processor.step().await.unwrap(), Step::Worked);
        assert!(matches!(processor.step().await.unwrap(), Step::Idle(_)));

        assert_eq!(mock.printed(), vec!["A", "B"]);
        assert_eq!(store.stats().unwrap().completed, 2);
    }

    #[tokio::test]
    async fn test_offline_device_leaves_jobs_pending() {
        let store = PrintQueueStore::open_in_memory().unwrap();
        let mock = MockDevice::new("receipt", false);
        let mut processor = processor(&store, &mock);

        let a = store.enqueue(job("A")).unwrap();
        store.enqueue(job("B")).unwrap();

        let first = processor.step().await.unwrap();
        let second = processor.step().await.unwrap();
        match (first, second) {
            (Step::Offline(d1), Step::Offline(d2)) => assert!(d2 >= d1),
            other => panic!("expected offline steps, got {:?}", other),
        }
        let pending = store.list_pending(Some("receipt")).unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(store.get_job(&a.id).unwrap().unwrap().attempts, 0);

        mock.set_online(true);
        processor.step().await.unwrap();
        processor.step().await.unwrap();
        assert_eq!(mock.printed(), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_failure_retries_then_fails_terminally() {
        let store = PrintQueueStore::open_in_memory().unwrap().with_max_attempts(2);
        let mock = MockDevice::new("receipt", true);
        let mut processor = processor(&store, &mock);
        let a = store.enqueue(job("A")).unwrap();

        mock.push_outcome(Err(DeviceError::new(DeviceErrorCode::Protocol, "bad data")));
        mock.push_outcome(Err(DeviceError::new(DeviceErrorCode::Protocol, "bad data")));

        processor.step().await.unwrap();
        let after_first = store.get_job(&a.id).unwrap().unwrap();
        assert_eq!(after_first.status, JobStatus::Pending);
        assert_eq!(after_first.attempts, 1);

        tokio::time::sleep(Duration::from_millis(30)).await;
        processor.step().await.unwrap();
        let after_second = store.get_job(&a.id).unwrap().unwrap();
        assert_eq!(after_second.status, JobStatus::Failed);
        assert_eq!(after_second.protocol_errors, 2);
        assert!(mock.printed().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_error_is_not_retried() {
        let store = PrintQueueStore::open_in_memory().unwrap();
        let mock = MockDevice::new("receipt", true);
        let mut processor = processor(&store, &mock);
        let a = store.enqueue(job("A")).unwrap();

        mock.push_outcome(Err(DeviceError::new(
            DeviceErrorCode::Unsupported,
            "cutter missing",
        )));
        processor.step().await.unwrap();
        assert_eq!(
            store.get_job(&a.id).unwrap().unwrap().status,
            JobStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_backing_off_job_is_skipped() {
        let store = PrintQueueStore::open_in_memory().unwrap();
        let mock = MockDevice::new("receipt", true);
        let mut processor = processor(&store, &mock);
        let a = store.enqueue(job("A")).unwrap();
        store.enqueue(job("B")).unwrap();

        mock.push_outcome(Err(DeviceError::new(DeviceErrorCode::Timeout, "slow")));
        processor.step().await.unwrap(); // A fails, backs off
        processor.step().await.unwrap(); // B prints
        assert_eq!(mock.printed(), vec!["B"]);

        tokio::time::sleep(Duration::from_millis(30)).await;
        processor.step().await.unwrap();
        assert_eq!(mock.printed(), vec!["B", "A"]);
        assert_eq!(
            store.get_job(&a.id).unwrap().unwrap().status,
            JobStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_run_drains_after_reconnect_and_stops() {
        let store = PrintQueueStore::open_in_memory().unwrap();
        let mock = MockDevice::new("receipt", false);
        let processor = processor(&store, &mock);
        let health = processor.health();

        store.enqueue(job("A")).unwrap();
        store.enqueue(job("B")).unwrap();

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(processor.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(mock.printed().is_empty());
        mock.set_online(true);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while mock.printed().len() < 2 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(mock.printed(), vec!["A", "B"]);

        shutdown.cancel();
        task.await.unwrap().unwrap();
        assert!(health.is_healthy());
    }
}
