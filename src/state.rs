use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::config::Config;
use crate::lifecycle::StatusChange;
use crate::models::driver::Driver;
use crate::models::job::Job;
use crate::models::proof::ProofOfHandoff;
use crate::models::rule::DispatchRule;
use crate::observability::metrics::Metrics;

pub struct AppState {
    pub jobs: DashMap<Uuid, Job>,
    pub drivers: DashMap<Uuid, Driver>,
    pub rules: DashMap<Uuid, DispatchRule>,
    pub proofs: DashMap<Uuid, ProofOfHandoff>,
    pub job_tx: mpsc::Sender<Uuid>,
    pub status_events_tx: broadcast::Sender<StatusChange>,
    pub metrics: Metrics,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> (Self, mpsc::Receiver<Uuid>) {
        let (job_tx, job_rx) = mpsc::channel(config.job_queue_size);
        let (status_events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);

        (
            Self {
                jobs: DashMap::new(),
                drivers: DashMap::new(),
                rules: DashMap::new(),
                proofs: DashMap::new(),
                job_tx,
                status_events_tx,
                metrics: Metrics::new(),
                config,
            },
            job_rx,
        )
    }

    /// Count of a driver's jobs in active (non-terminal, assigned) states.
    /// Derived on demand; the atomic assignment write is the real guard.
    pub fn driver_workload(&self, driver_id: Uuid) -> u32 {
        self.jobs
            .iter()
            .filter(|entry| {
                let job = entry.value();
                job.assigned_driver == Some(driver_id) && job.status.is_active()
            })
            .count() as u32
    }
}
