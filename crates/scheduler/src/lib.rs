//! Generic daily job scheduler.
//!
//! Each registered [`Job`] declares a target run time of day ("HH:MM"); the
//! scheduler owns one independent tokio task per job. A task waits until the
//! next occurrence of its target time, fires the job, then recomputes a fresh
//! wait from the current moment, so the schedule self-corrects after slow
//! runs or clock adjustments instead of drifting like a fixed-interval timer.
//!
//! Shutdown is cooperative: a broadcast signal reaches every job task, which
//! observes it only between waits (never mid-run) and exits.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Wait applied when a job's schedule string cannot be parsed, so the job is
/// re-checked instead of never running.
const FALLBACK_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// A named job with a fixed daily run time.
#[async_trait]
pub trait Job: Send + Sync {
    /// Unique job name, used for logging and registration.
    fn name(&self) -> &str;

    /// Target daily run time as "HH:MM" (24-hour clock).
    fn schedule(&self) -> &str;

    /// Executes one run of the job. Errors are logged by the scheduler and
    /// never disturb the schedule itself.
    async fn run(&self, now: DateTime<Utc>) -> Result<()>;
}

/// Parses a "HH:MM" schedule string into a time of day.
pub fn parse_schedule(schedule: &str) -> Result<NaiveTime> {
    let parts: Vec<&str> = schedule.split(':').collect();
    if parts.len() != 2 {
        return Err(anyhow!("invalid schedule '{}': expected \"HH:MM\"", schedule));
    }
    let hour: u32 = parts[0]
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid hour in schedule '{}'", schedule))?;
    let minute: u32 = parts[1]
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid minute in schedule '{}'", schedule))?;
    NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| anyhow!("schedule '{}' is out of range", schedule))
}

/// Duration from `now` until the next occurrence of `target`: today if the
/// time is still ahead, otherwise tomorrow. The result is always strictly in
/// the future, so a run that overshoots its own slot re-arms for the next day.
pub fn duration_until_next(target: NaiveTime, now: DateTime<Utc>) -> Duration {
    let now_naive = now.naive_utc();
    let mut next = now_naive.date().and_time(target);
    if next <= now_naive {
        next += chrono::Duration::days(1);
    }
    (next - now_naive).to_std().unwrap_or(Duration::ZERO)
}

/// Scheduler owning a set of jobs and their background tasks.
pub struct Scheduler {
    jobs: Vec<Arc<dyn Job>>,
    shutdown_tx: broadcast::Sender<()>,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            jobs: Vec::new(),
            shutdown_tx,
            handles: Vec::new(),
        }
    }

    /// Registers a job. Must be called before [`start`](Self::start); job
    /// names are unique and duplicates are ignored with a warning.
    pub fn register(&mut self, job: Arc<dyn Job>) {
        if !self.handles.is_empty() {
            warn!("Cannot register job '{}' after scheduler start", job.name());
            return;
        }
        if self.jobs.iter().any(|j| j.name() == job.name()) {
            warn!("Job '{}' is already registered, ignoring", job.name());
            return;
        }
        info!(
            "Registered job '{}' with daily schedule {}",
            job.name(),
            job.schedule()
        );
        self.jobs.push(job);
    }

    /// Spawns one background task per registered job.
    pub fn start(&mut self) {
        info!("Starting scheduler with {} job(s)", self.jobs.len());
        for job in &self.jobs {
            let job = job.clone();
            let shutdown_rx = self.shutdown_tx.subscribe();
            self.handles.push(tokio::spawn(job_loop(job, shutdown_rx)));
        }
    }

    /// Broadcasts the shutdown signal and waits for every job task to exit,
    /// bounded by `timeout` overall.
    pub async fn stop(&mut self, timeout: Duration) {
        info!("Stopping scheduler ({} job task(s))", self.handles.len());
        // Send may fail only when no task is subscribed anymore.
        let _ = self.shutdown_tx.send(());

        let deadline = Instant::now() + timeout;
        for handle in self.handles.drain(..) {
            match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Job task panicked during shutdown: {}", e),
                Err(_) => {
                    warn!("Job task did not stop within the shutdown timeout");
                }
            }
        }
        info!("Scheduler stopped");
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-job task: wait until the next occurrence of the job's target time,
/// fire, recompute, repeat until the shutdown signal arrives.
async fn job_loop(job: Arc<dyn Job>, mut shutdown_rx: broadcast::Receiver<()>) {
    info!(
        "Job '{}' scheduled daily at {}",
        job.name(),
        job.schedule()
    );

    loop {
        // Recompute the wait from the current moment on every iteration.
        let wait = match parse_schedule(job.schedule()) {
            Ok(target) => duration_until_next(target, Utc::now()),
            Err(e) => {
                warn!(
                    "Job '{}' has an invalid schedule ({}), re-checking in one hour",
                    job.name(),
                    e
                );
                FALLBACK_INTERVAL
            }
        };
        debug!(
            "Job '{}' sleeping for {}s until next run",
            job.name(),
            wait.as_secs()
        );

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                let now = Utc::now();
                info!("Firing job '{}'", job.name());
                if let Err(e) = job.run(now).await {
                    error!("Job '{}' run failed: {}", job.name(), e);
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Job '{}' received shutdown signal, exiting", job.name());
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_parse_schedule_valid() {
        assert_eq!(
            parse_schedule("06:00").unwrap(),
            NaiveTime::from_hms_opt(6, 0, 0).unwrap()
        );
        assert_eq!(
            parse_schedule("23:59").unwrap(),
            NaiveTime::from_hms_opt(23, 59, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_schedule_invalid() {
        assert!(parse_schedule("").is_err());
        assert!(parse_schedule("12").is_err());
        assert!(parse_schedule("12:00:00").is_err());
        assert!(parse_schedule("ab:cd").is_err());
        assert!(parse_schedule("24:00").is_err());
        assert!(parse_schedule("12:60").is_err());
    }

    #[test]
    fn test_duration_until_next_later_today() {
        let now = Utc.with_ymd_and_hms(2024, 3, 11, 5, 0, 0).unwrap();
        let target = NaiveTime::from_hms_opt(6, 0, 0).unwrap();
        assert_eq!(duration_until_next(target, now), Duration::from_secs(3600));
    }

    #[test]
    fn test_duration_until_next_already_passed_is_tomorrow() {
        let now = Utc.with_ymd_and_hms(2024, 3, 11, 7, 0, 0).unwrap();
        let target = NaiveTime::from_hms_opt(6, 0, 0).unwrap();
        assert_eq!(
            duration_until_next(target, now),
            Duration::from_secs(23 * 3600)
        );
    }

    #[test]
    fn test_duration_until_next_is_strictly_future() {
        // Exactly at the target time the next fire is tomorrow, never "now":
        // this is what keeps an overrunning job from double-firing.
        let now = Utc.with_ymd_and_hms(2024, 3, 11, 6, 0, 0).unwrap();
        let target = NaiveTime::from_hms_opt(6, 0, 0).unwrap();
        let wait = duration_until_next(target, now);
        assert!(wait > Duration::ZERO);
        assert_eq!(wait, Duration::from_secs(24 * 3600));
    }

    struct CountingJob {
        name: String,
        schedule: String,
        runs: AtomicUsize,
    }

    #[async_trait]
    impl Job for CountingJob {
        fn name(&self) -> &str {
            &self.name
        }

        fn schedule(&self) -> &str {
            &self.schedule
        }

        async fn run(&self, _now: DateTime<Utc>) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_fires_and_rearms() {
        let job = Arc::new(CountingJob {
            name: "counting".to_string(),
            schedule: "06:00".to_string(),
            runs: AtomicUsize::new(0),
        });

        let mut scheduler = Scheduler::new();
        scheduler.register(job.clone());
        scheduler.start();

        // Two virtual days are enough for at least two fires.
        tokio::time::sleep(Duration::from_secs(2 * 24 * 3600)).await;
        scheduler.stop(Duration::from_secs(5)).await;

        assert!(job.runs.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_schedule_falls_back_instead_of_crashing() {
        let job = Arc::new(CountingJob {
            name: "broken-schedule".to_string(),
            schedule: "not-a-time".to_string(),
            runs: AtomicUsize::new(0),
        });

        let mut scheduler = Scheduler::new();
        scheduler.register(job.clone());
        scheduler.start();

        // The job runs on the one-hour fallback interval.
        tokio::time::sleep(Duration::from_secs(3 * 3600 + 60)).await;
        scheduler.stop(Duration::from_secs(5)).await;

        assert!(job.runs.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn test_stop_is_cooperative_and_bounded() {
        let job = Arc::new(CountingJob {
            name: "idle".to_string(),
            schedule: "06:00".to_string(),
            runs: AtomicUsize::new(0),
        });

        let mut scheduler = Scheduler::new();
        scheduler.register(job);
        scheduler.start();

        let started = std::time::Instant::now();
        scheduler.stop(Duration::from_secs(5)).await;
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_ignored() {
        let first = Arc::new(CountingJob {
            name: "dup".to_string(),
            schedule: "06:00".to_string(),
            runs: AtomicUsize::new(0),
        });
        let second = Arc::new(CountingJob {
            name: "dup".to_string(),
            schedule: "07:00".to_string(),
            runs: AtomicUsize::new(0),
        });

        let mut scheduler = Scheduler::new();
        scheduler.register(first);
        scheduler.register(second);
        assert_eq!(scheduler.jobs.len(), 1);
    }
}
