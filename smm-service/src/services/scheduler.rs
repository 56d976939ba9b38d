//! Interval-driven background sweeps.

use crate::services::error::FulfillmentError;
use crate::services::rate_sync::RateSynchronizer;
use crate::services::reconciler::StatusReconciler;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// A unit of periodic work.
#[async_trait]
pub trait Sweep: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn run_once(&self) -> Result<(), FulfillmentError>;
}

#[async_trait]
impl Sweep for StatusReconciler {
    fn name(&self) -> &'static str {
        "status_reconciler"
    }

    async fn run_once(&self) -> Result<(), FulfillmentError> {
        self.run().await.map(|_| ())
    }
}

#[async_trait]
impl Sweep for RateSynchronizer {
    fn name(&self) -> &'static str {
        "rate_sync"
    }

    async fn run_once(&self) -> Result<(), FulfillmentError> {
        self.run().await.map(|_| ())
    }
}

pub struct Scheduler {
    jobs: Vec<(Arc<dyn Sweep>, Duration)>,
    shutdown_token: CancellationToken,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            jobs: Vec::new(),
            shutdown_token: CancellationToken::new(),
        }
    }

    pub fn with_job(mut self, sweep: Arc<dyn Sweep>, every: Duration) -> Self {
        self.jobs.push((sweep, every));
        self
    }

    /// Spawn one loop per job. The first run happens one interval after start.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        self.jobs
            .iter()
            .map(|(sweep, every)| {
                let sweep = sweep.clone();
                let every = *every;
                let shutdown = self.shutdown_token.clone();

                tracing::info!(job = sweep.name(), interval_secs = every.as_secs(), "Starting scheduled job");

                tokio::spawn(async move {
                    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                    loop {
                        tokio::select! {
                            _ = shutdown.cancelled() => {
                                tracing::info!(job = sweep.name(), "Scheduled job shutting down");
                                break;
                            }
                            _ = ticker.tick() => {
                                if let Err(e) = sweep.run_once().await {
                                    tracing::error!(job = sweep.name(), error = %e, "Scheduled job failed");
                                }
                            }
                        }
                    }
                })
            })
            .collect()
    }

    pub fn shutdown(&self) {
        tracing::info!("Stopping scheduled jobs");
        self.shutdown_token.cancel();
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
