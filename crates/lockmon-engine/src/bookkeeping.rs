//! Fire-and-forget recording and notification.
//!
//! Decisions never wait on storage or mail delivery. The coordinator hands
//! each job to a bounded channel and moves on; a separate worker records the
//! event, evaluates the [`NotificationPolicy`] and hands the resulting
//! notifications to the [`Notifier`]. A full or closed channel means the job
//! is dropped and logged.

use std::sync::Arc;

use chrono::{Local, NaiveTime};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::meta::ReaderMeta;
use lockmon_core::{Error, Result};
use lockmon_credentials::{AccessEvent, DeviceReport, EventRecorder, NotificationPolicy, Notifier};

/// Work handed to the bookkeeping worker.
#[derive(Debug, Clone)]
pub enum BookkeepingJob {
    /// A session reached a decision.
    Access(AccessEvent),
    /// A device reported status or registration data.
    Device(DeviceReport),
}

impl From<&ReaderMeta> for DeviceReport {
    fn from(meta: &ReaderMeta) -> Self {
        let status = meta.status.clone().unwrap_or_default();
        DeviceReport {
            address: meta.address,
            serial: meta.serial.clone(),
            firmware_version: meta.firmware_version.clone(),
            temperature: status.temperature,
            validations: status.validations,
            denied: status.denied,
            at: meta.last_seen,
        }
    }
}

/// Sending side of the bookkeeping channel.
#[derive(Debug, Clone)]
pub struct Bookkeeper {
    tx: mpsc::Sender<BookkeepingJob>,
}

impl Bookkeeper {
    /// Create a bookkeeper and the worker that drains it.
    ///
    /// The worker must be spawned by the caller; it finishes once every
    /// `Bookkeeper` clone is dropped.
    pub fn new(capacity: usize, worker: BookkeepingWorker) -> (Self, BookkeepingTask) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Bookkeeper { tx }, BookkeepingTask { rx, worker })
    }

    /// Hand `job` to the worker without waiting.
    ///
    /// # Errors
    /// Returns `Error::AsyncDispatchUnavailable` if the channel is full or the
    /// worker is gone.
    pub fn submit(&self, job: BookkeepingJob) -> Result<()> {
        self.tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                Error::AsyncDispatchUnavailable("bookkeeping queue full".into())
            }
            mpsc::error::TrySendError::Closed(_) => {
                Error::AsyncDispatchUnavailable("bookkeeping worker stopped".into())
            }
        })
    }

    /// [`submit`](Self::submit), logging instead of failing.
    pub fn dispatch(&self, job: BookkeepingJob) {
        if let Err(e) = self.submit(job) {
            warn!(error = %e, "bookkeeping job dropped");
        }
    }
}

/// Collaborators and rules used by the worker.
pub struct BookkeepingWorker {
    recorder: Arc<dyn EventRecorder>,
    notifier: Arc<dyn Notifier>,
    policy: NotificationPolicy,
    clock: fn() -> NaiveTime,
}

impl BookkeepingWorker {
    pub fn new(
        recorder: Arc<dyn EventRecorder>,
        notifier: Arc<dyn Notifier>,
        policy: NotificationPolicy,
    ) -> Self {
        BookkeepingWorker {
            recorder,
            notifier,
            policy,
            clock: local_time,
        }
    }

    /// Replace the local time-of-day source used for business hours.
    pub fn with_clock(mut self, clock: fn() -> NaiveTime) -> Self {
        self.clock = clock;
        self
    }

    /// Process one job. Failures are logged and never propagated.
    pub fn handle(&self, job: &BookkeepingJob) {
        match job {
            BookkeepingJob::Access(event) => {
                if let Err(e) = self.recorder.record(event) {
                    warn!(address = %event.address, error = %e, "failed to record access event");
                }
                for notification in self.policy.evaluate(event, (self.clock)()) {
                    debug!(%notification, "notifying");
                    if let Err(e) = self.notifier.notify(&notification) {
                        warn!(%notification, error = %e, "notification not delivered");
                    }
                }
            }
            BookkeepingJob::Device(report) => {
                if let Err(e) = self.recorder.record_device(report) {
                    warn!(address = %report.address, error = %e, "failed to record device state");
                }
            }
        }
    }
}

impl std::fmt::Debug for BookkeepingWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookkeepingWorker")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

fn local_time() -> NaiveTime {
    Local::now().time()
}

/// Receiving side, run with [`BookkeepingTask::run`].
#[derive(Debug)]
pub struct BookkeepingTask {
    rx: mpsc::Receiver<BookkeepingJob>,
    worker: BookkeepingWorker,
}

impl BookkeepingTask {
    /// Handle jobs until every sender is gone.
    pub async fn run(mut self) {
        while let Some(job) = self.rx.recv().await {
            self.worker.handle(&job);
        }
        debug!("bookkeeping worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{RecordingNotifier, RecordingRecorder};
    use chrono::{TimeZone, Utc};
    use lockmon_core::{ReaderAddress, SensorId, UserId};
    use lockmon_credentials::{AccessWindow, EventKind, Notification};

    fn denied_event() -> AccessEvent {
        AccessEvent {
            address: ReaderAddress::new(2),
            sensor: SensorId::new(2),
            user: Some(UserId::new(11)),
            credential: None,
            kind: EventKind::Denied,
            at: Utc.with_ymd_and_hms(2026, 1, 10, 23, 0, 0).unwrap(),
        }
    }

    fn midnight() -> NaiveTime {
        NaiveTime::from_hms_opt(0, 30, 0).unwrap()
    }

    #[test]
    fn test_worker_records_and_notifies() {
        let recorder = Arc::new(RecordingRecorder::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let policy = NotificationPolicy {
            business_hours: Some(AccessWindow::parse("08:00", "18:00").unwrap()),
            ..NotificationPolicy::default()
        };
        let worker = BookkeepingWorker::new(recorder.clone(), notifier.clone(), policy)
            .with_clock(midnight);

        worker.handle(&BookkeepingJob::Access(denied_event()));

        assert_eq!(recorder.events(), vec![denied_event()]);
        let sent = notifier.notifications();
        assert_eq!(sent.len(), 2);
        assert!(matches!(sent[0], Notification::Denied { .. }));
        assert!(matches!(sent[1], Notification::AfterHours { .. }));
    }

    #[test]
    fn test_recorder_failure_does_not_stop_notifications() {
        let recorder = Arc::new(RecordingRecorder::failing());
        let notifier = Arc::new(RecordingNotifier::new());
        let worker =
            BookkeepingWorker::new(recorder.clone(), notifier.clone(), NotificationPolicy::default());

        worker.handle(&BookkeepingJob::Access(denied_event()));

        assert!(recorder.events().is_empty());
        assert_eq!(notifier.notifications().len(), 1);
    }

    #[test]
    fn test_full_channel_is_dispatch_unavailable() {
        let worker = BookkeepingWorker::new(
            Arc::new(RecordingRecorder::new()),
            Arc::new(RecordingNotifier::new()),
            NotificationPolicy::default(),
        );
        let (bookkeeper, _task) = Bookkeeper::new(1, worker);

        bookkeeper.submit(BookkeepingJob::Access(denied_event())).unwrap();
        assert!(matches!(
            bookkeeper.submit(BookkeepingJob::Access(denied_event())),
            Err(Error::AsyncDispatchUnavailable(_))
        ));
        // Logged and swallowed
        bookkeeper.dispatch(BookkeepingJob::Access(denied_event()));
    }

    #[test]
    fn test_closed_channel_is_dispatch_unavailable() {
        let worker = BookkeepingWorker::new(
            Arc::new(RecordingRecorder::new()),
            Arc::new(RecordingNotifier::new()),
            NotificationPolicy::default(),
        );
        let (bookkeeper, task) = Bookkeeper::new(4, worker);
        drop(task);

        assert!(matches!(
            bookkeeper.submit(BookkeepingJob::Access(denied_event())),
            Err(Error::AsyncDispatchUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_task_drains_until_senders_dropped() {
        let recorder = Arc::new(RecordingRecorder::new());
        let worker = BookkeepingWorker::new(
            recorder.clone(),
            Arc::new(RecordingNotifier::new()),
            NotificationPolicy::default(),
        );
        let (bookkeeper, task) = Bookkeeper::new(8, worker);
        let handle = tokio::spawn(task.run());

        let mut meta = ReaderMeta::new(ReaderAddress::new(4));
        meta.serial = Some("77".into());
        bookkeeper.dispatch(BookkeepingJob::Access(denied_event()));
        bookkeeper.dispatch(BookkeepingJob::Device(DeviceReport::from(&meta)));
        drop(bookkeeper);

        handle.await.unwrap();
        assert_eq!(recorder.events().len(), 1);
        assert_eq!(recorder.devices()[0].serial.as_deref(), Some("77"));
    }
}
