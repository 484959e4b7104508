//! Background tasks driving the examiner.
//!
//! Three long-running loops share one cancellation token:
//!
//! - the confirmation drain, ticking every `confirm_interval`
//! - the nightly refresh of every active category
//! - the event dispatcher feeding detections and lifecycle events in

use std::sync::Arc;
use std::time::Duration;

use catwatch_core::ExaminerEvent;
use chrono::{DateTime, Local, TimeZone};
use rand::Rng;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::examiner::CategoryExaminer;

/// Buffered events between ingress and the dispatcher.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Detections examined concurrently by the dispatcher.
pub const MAX_CONCURRENT_DETECTIONS: usize = 64;

/// Next time strictly after `now` when the local clock reads `hour:00`.
///
/// Days where that hour does not exist (a DST gap) are skipped. Returns `None`
/// for an hour outside 0-23.
pub fn next_nightly_run<Tz: TimeZone>(now: &DateTime<Tz>, hour: u32) -> Option<DateTime<Tz>> {
    let tz = now.timezone();
    let mut date = now.date_naive();

    for _ in 0..3 {
        let naive = date.and_hms_opt(hour, 0, 0)?;
        if let Some(candidate) = tz.from_local_datetime(&naive).earliest() {
            if candidate > *now {
                return Some(candidate);
            }
        }
        date = date.succ_opt()?;
    }
    None
}

/// Uniformly random delay in `[0, max)`.
pub fn random_jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
}

/// Spawns the confirmation drain loop.
pub fn spawn_confirm_loop(examiner: Arc<CategoryExaminer>, token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = examiner.config().confirm_interval();
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let report = examiner.confirm_job().await;
                    if report.candidates > 0 {
                        debug!(
                            "Confirmed {} candidates in {} categories ({} requeued, {} dropped)",
                            report.candidates,
                            report.categories,
                            report.requeued,
                            report.dropped
                        );
                    }
                }
            }
        }

        debug!("Confirmation loop stopped");
    })
}

/// Spawns the nightly refresh loop.
pub fn spawn_nightly_refresh(examiner: Arc<CategoryExaminer>, token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let hour = examiner.config().refresh_hour;
        let jitter = examiner.config().refresh_jitter();

        loop {
            let now = Local::now();
            let Some(next) = next_nightly_run(&now, hour) else {
                error!("Cannot schedule nightly refresh at hour {}", hour);
                break;
            };
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO) + random_jitter(jitter);
            info!("Next nightly category refresh in {}s", wait.as_secs());

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            let reports = examiner.refresh_all().await;
            let changed = reports.iter().filter(|report| report.changed).count();
            info!(
                "Nightly refresh finished: {} categories, {} changed",
                reports.len(),
                changed
            );
        }

        debug!("Nightly refresh loop stopped");
    })
}

/// Spawns the dispatcher consuming `events`.
///
/// Detections run as their own tasks, at most
/// [`MAX_CONCURRENT_DETECTIONS`] at a time, so lifecycle events are never
/// stuck behind a slow local filter.
pub fn spawn_event_dispatcher(
    examiner: Arc<CategoryExaminer>,
    mut events: mpsc::Receiver<ExaminerEvent>,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let detections = Arc::new(Semaphore::new(MAX_CONCURRENT_DETECTIONS));

        loop {
            let event = tokio::select! {
                _ = token.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            trace!(kind = event.kind(), "Dispatching event");
            if !matches!(event, ExaminerEvent::DomainDetected { .. }) {
                examiner.handle_event(event).await;
                continue;
            }

            let permit = tokio::select! {
                _ = token.cancelled() => break,
                permit = detections.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            let examiner = examiner.clone();
            tokio::spawn(async move {
                examiner.handle_event(event).await;
                drop(permit);
            });
        }

        debug!("Event dispatcher stopped");
    })
}

/// The running examiner with its background tasks.
pub struct ExaminerService {
    examiner: Arc<CategoryExaminer>,
    events: mpsc::Sender<ExaminerEvent>,
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl ExaminerService {
    /// Starts every background task. They stop when the examiner's shutdown
    /// token is cancelled.
    pub fn start(examiner: Arc<CategoryExaminer>) -> Self {
        let token = examiner.shutdown_token().clone();
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let handles = vec![
            spawn_confirm_loop(examiner.clone(), token.clone()),
            spawn_nightly_refresh(examiner.clone(), token.clone()),
            spawn_event_dispatcher(examiner.clone(), rx, token.clone()),
        ];
        info!("Category examiner started");

        Self {
            examiner,
            events: tx,
            token,
            handles,
        }
    }

    /// Sender feeding the event dispatcher.
    pub fn events(&self) -> mpsc::Sender<ExaminerEvent> {
        self.events.clone()
    }

    pub fn examiner(&self) -> &Arc<CategoryExaminer> {
        &self.examiner
    }

    /// Cancels the background tasks and waits for them to finish.
    pub async fn shutdown(self) {
        self.token.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Examiner task failed: {}", e);
            }
        }
        info!("Category examiner stopped");
    }
}
