//! One cancellable scheduler for every periodic job in the process.
//!
//! Each job gets its own task: an interval tick (first tick immediate) or an
//! explicit trigger runs the job once. Shutdown is observed between runs; a
//! run that is already in flight finishes before its task exits.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[async_trait::async_trait]
pub trait PeriodicJob: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self) -> anyhow::Result<()>;
}

/// Handle for firing a job outside its cadence.
#[derive(Clone)]
pub struct JobHandle {
    name: &'static str,
    trigger: Arc<Notify>,
}

impl JobHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Request an immediate run. Triggers that arrive while the job is
    /// running collapse into a single follow-up run.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }
}

pub struct Scheduler {
    shutdown: watch::Sender<bool>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        let (shutdown, _rx) = watch::channel(false);
        Self {
            shutdown,
            tasks: Vec::new(),
        }
    }

    pub fn job_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn spawn(&mut self, job: Arc<dyn PeriodicJob>, period: Duration) -> JobHandle {
        let name = job.name();
        let trigger = Arc::new(Notify::new());
        let handle = JobHandle {
            name,
            trigger: Arc::clone(&trigger),
        };

        let mut shutdown = self.shutdown.subscribe();
        let period = period.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(job = name, period_secs = period.as_secs_f64(), "job scheduled");

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {}
                    _ = trigger.notified() => {}
                }
                if *shutdown.borrow() {
                    break;
                }
                if let Err(err) = job.run().await {
                    tracing::warn!(job = name, error = %format!("{err:#}"), "job run failed");
                }
            }
            tracing::info!(job = name, "job stopped");
        });

        self.tasks.push((name, task));
        handle
    }

    /// Cancel pending timers and wait for every job task to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for (name, task) in self.tasks {
            if let Err(err) = task.await {
                tracing::error!(job = name, error = %err, "job task panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct Counter {
        runs: AtomicUsize,
        delay: Duration,
        finished: AtomicBool,
    }

    impl Counter {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                runs: AtomicUsize::new(0),
                delay,
                finished: AtomicBool::new(false),
            })
        }
    }

    #[async_trait::async_trait]
    impl PeriodicJob for Counter {
        fn name(&self) -> &'static str {
            "counter"
        }

        async fn run(&self) -> anyhow::Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.finished.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_immediately_then_on_cadence_and_on_trigger() {
        let job = Counter::new(Duration::ZERO);
        let mut sched = Scheduler::new();
        let handle = sched.spawn(job.clone(), Duration::from_secs(60));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);

        handle.trigger();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 3);

        sched.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_lets_the_in_flight_run_finish() {
        let job = Counter::new(Duration::from_secs(5));
        let mut sched = Scheduler::new();
        sched.spawn(job.clone(), Duration::from_secs(60));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
        assert!(!job.finished.load(Ordering::SeqCst));

        sched.shutdown().await;
        assert!(job.finished.load(Ordering::SeqCst));
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
    }
}
