use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use landroid_common::{MowerConfig, SyncError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The two periodic jobs of an attached device.
#[async_trait]
pub trait ScheduledWork: Send + Sync {
    fn is_attached(&self) -> bool;
    async fn refresh_liveness(&self) -> Result<(), SyncError>;
    async fn poll(&self) -> Result<(), SyncError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Job {
    Liveness,
    Poll,
}

impl Job {
    fn as_str(self) -> &'static str {
        match self {
            Self::Liveness => "liveness",
            Self::Poll => "poll",
        }
    }
}

/// Liveness and poll timers, started and cancelled together. Dropping it cancels both.
pub struct Scheduler {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn start(config: &MowerConfig, work: Arc<dyn ScheduledWork>) -> Self {
        let cancel = CancellationToken::new();
        let tasks = vec![
            tokio::spawn(run_job(
                Job::Liveness,
                Duration::from_secs(config.liveness_offset_secs),
                Duration::from_secs(config.liveness_interval_secs),
                Arc::clone(&work),
                cancel.clone(),
            )),
            tokio::spawn(run_job(
                Job::Poll,
                Duration::from_secs(config.poll_offset_secs),
                Duration::from_secs(config.poll_interval_secs),
                work,
                cancel.clone(),
            )),
        ];
        info!(
            liveness_secs = config.liveness_interval_secs,
            poll_secs = config.poll_interval_secs,
            "timers started"
        );
        Self { cancel, tasks }
    }

    /// Token that trips when the timers are stopped.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// No wakeup happens after this returns. A job already past its attached check may
    /// still complete.
    pub fn stop(&mut self) {
        self.cancel.cancel();
        self.tasks.clear();
        info!("timers stopped");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Fixed delay: the next wait starts after the previous run finished.
async fn run_job(
    job: Job,
    offset: Duration,
    interval: Duration,
    work: Arc<dyn ScheduledWork>,
    cancel: CancellationToken,
) {
    let mut delay = offset;
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
        delay = interval;

        if cancel.is_cancelled() || !work.is_attached() {
            break;
        }
        let result = match job {
            Job::Liveness => work.refresh_liveness().await,
            Job::Poll => work.poll().await,
        };
        if let Err(err) = result {
            warn!(job = job.as_str(), error = %err, "scheduled job failed, retrying next cycle");
        }
    }
    debug!(job = job.as_str(), "timer exited");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct CountingWork {
        detached: AtomicBool,
        liveness: AtomicUsize,
        polls: AtomicUsize,
        fail_liveness: AtomicBool,
    }

    #[async_trait]
    impl ScheduledWork for CountingWork {
        fn is_attached(&self) -> bool {
            !self.detached.load(Ordering::SeqCst)
        }

        async fn refresh_liveness(&self) -> Result<(), SyncError> {
            self.liveness.fetch_add(1, Ordering::SeqCst);
            if self.fail_liveness.load(Ordering::SeqCst) {
                return Err(SyncError::RegistryFailure("registry down".to_string()));
            }
            Ok(())
        }

        async fn poll(&self) -> Result<(), SyncError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn config() -> MowerConfig {
        MowerConfig {
            liveness_interval_secs: 100,
            liveness_offset_secs: 5,
            poll_interval_secs: 300,
            poll_offset_secs: 10,
            ..MowerConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn offsets_then_fixed_delay() {
        let work = Arc::new(CountingWork::default());
        let _scheduler = Scheduler::start(&config(), work.clone());

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(work.liveness.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(work.liveness.load(Ordering::SeqCst), 1);
        assert_eq!(work.polls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(100)).await;
        assert_eq!(work.liveness.load(Ordering::SeqCst), 2);
        assert_eq!(work.polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_do_not_stop_the_timer() {
        let work = Arc::new(CountingWork::default());
        work.fail_liveness.store(true, Ordering::SeqCst);
        let _scheduler = Scheduler::start(&config(), work.clone());

        tokio::time::sleep(Duration::from_secs(306)).await;

        assert_eq!(work.liveness.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn no_wakeups_after_stop() {
        let work = Arc::new(CountingWork::default());
        let mut scheduler = Scheduler::start(&config(), work.clone());

        tokio::time::sleep(Duration::from_secs(11)).await;
        let liveness = work.liveness.load(Ordering::SeqCst);
        let polls = work.polls.load(Ordering::SeqCst);
        assert_eq!((liveness, polls), (1, 1));

        scheduler.stop();
        assert!(scheduler.token().is_cancelled());
        tokio::time::sleep(Duration::from_secs(10_000)).await;

        assert_eq!(work.liveness.load(Ordering::SeqCst), liveness);
        assert_eq!(work.polls.load(Ordering::SeqCst), polls);
    }

    #[tokio::test(start_paused = true)]
    async fn detached_work_is_skipped() {
        let work = Arc::new(CountingWork::default());
        let _scheduler = Scheduler::start(&config(), work.clone());
        work.detached.store(true, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(1_000)).await;

        assert_eq!(work.liveness.load(Ordering::SeqCst), 0);
        assert_eq!(work.polls.load(Ordering::SeqCst), 0);
    }
}
