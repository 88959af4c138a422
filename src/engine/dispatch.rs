use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::engine::queue::enqueue_job;
use crate::engine::rules::best_rule;
use crate::engine::selection::{eligible_drivers, select_driver};
use crate::error::AppError;
use crate::lifecycle;
use crate::models::job::{Job, JobStatus};
use crate::models::rule::DispatchRule;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct AssignmentOutcome {
    pub job_id: Uuid,
    pub tracking_id: String,
    pub driver_id: Uuid,
    pub rule: String,
}

#[derive(Debug, Serialize)]
pub struct BatchItem {
    pub job_id: Uuid,
    pub assigned_driver: Option<Uuid>,
    pub error: Option<String>,
}

/// Dispatch one pending job: match a rule, select a driver, and hand the
/// assignment write to the lifecycle module. Pure decision up to that write.
pub fn dispatch_job(state: &AppState, job_id: Uuid) -> Result<AssignmentOutcome, AppError> {
    let job = state
        .jobs
        .get(&job_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("job {job_id} not found")))?;

    if job.status != JobStatus::Pending {
        return Err(AppError::BadRequest(format!(
            "job {} is not pending",
            job.tracking_id
        )));
    }

    let rules: Vec<DispatchRule> = state.rules.iter().map(|e| e.value().clone()).collect();
    let rule = best_rule(&job, &rules)
        .cloned()
        .unwrap_or_else(|| DispatchRule::fallback(&job, state.config.default_max_concurrent));

    let pool: Vec<_> = state
        .drivers
        .iter()
        .map(|entry| {
            let driver = entry.value().clone();
            let workload = state.driver_workload(driver.id);
            (driver, workload)
        })
        .collect();

    let candidates = eligible_drivers(&job, &rule, &pool);
    let driver_id = select_driver(&candidates).ok_or(AppError::NoEligibleDriver)?;

    let vehicle = state
        .drivers
        .get(&driver_id)
        .map(|entry| entry.value().vehicle_type)
        .ok_or_else(|| AppError::Internal(format!("selected driver {driver_id} vanished")))?;

    let assigned = lifecycle::assign(state, job_id, driver_id, vehicle)?;
    record_driver_load(state, driver_id, &rule);

    Ok(AssignmentOutcome {
        job_id: assigned.id,
        tracking_id: assigned.tracking_id,
        driver_id,
        rule: rule.name,
    })
}

/// Batch dispatch over every pending job, oldest first. Each assignment is
/// written before the next job is considered and workloads are re-derived
/// per job, so a driver's count inside the batch is always current and
/// never exceeds their ceiling. One job's failure never stops the rest.
pub fn run_dispatch_batch(state: &AppState) -> Vec<BatchItem> {
    let mut pending: Vec<Job> = state
        .jobs
        .iter()
        .filter(|entry| entry.value().status == JobStatus::Pending)
        .map(|entry| entry.value().clone())
        .collect();
    pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    let mut results = Vec::with_capacity(pending.len());

    for job in pending {
        match dispatch_job(state, job.id) {
            Ok(outcome) => {
                results.push(BatchItem {
                    job_id: job.id,
                    assigned_driver: Some(outcome.driver_id),
                    error: None,
                });
            }
            Err(err) => {
                warn!(job_id = %job.id, error = %err, "batch dispatch skipped job");
                results.push(BatchItem {
                    job_id: job.id,
                    assigned_driver: None,
                    error: Some(err.to_string()),
                });
            }
        }
    }

    results
}

/// Background loop consuming the pending-job queue. Jobs with no eligible
/// driver are re-queued after a backoff and stay Pending in the meantime.
pub async fn run_dispatch_loop(state: Arc<AppState>, mut job_rx: mpsc::Receiver<Uuid>) {
    info!("dispatch loop started");

    let backoff = Duration::from_millis(state.config.dispatch_retry_ms);

    while let Some(job_id) = job_rx.recv().await {
        state.metrics.jobs_in_queue.dec();

        let start = Instant::now();
        let outcome = dispatch_job(&state, job_id);
        let elapsed = start.elapsed().as_secs_f64();

        match outcome {
            Ok(assignment) => {
                observe(&state, "success", elapsed);
                info!(
                    job_id = %assignment.job_id,
                    driver_id = %assignment.driver_id,
                    rule = %assignment.rule,
                    "job dispatched"
                );
            }
            Err(AppError::NoEligibleDriver) => {
                observe(&state, "no_driver", elapsed);
                warn!(job_id = %job_id, "no eligible driver; re-queueing job");
                sleep(backoff).await;

                // The job may have been cancelled or manually assigned while
                // we slept; only a still-pending job goes back on the queue.
                let still_pending = state
                    .jobs
                    .get(&job_id)
                    .map(|entry| entry.value().status == JobStatus::Pending)
                    .unwrap_or(false);
                if still_pending {
                    if let Err(err) = enqueue_job(&state, job_id).await {
                        error!(job_id = %job_id, error = %err, "failed to re-queue job");
                    }
                }
            }
            Err(AppError::ConcurrentAssignment) => {
                observe(&state, "conflict", elapsed);
                info!(job_id = %job_id, "job assigned elsewhere; skipping");
            }
            Err(err) => {
                observe(&state, "error", elapsed);
                error!(job_id = %job_id, error = %err, "failed to dispatch job");
            }
        }
    }

    warn!("dispatch loop stopped: queue channel closed");
}

fn observe(state: &AppState, outcome: &str, elapsed: f64) {
    state
        .metrics
        .dispatch_latency_seconds
        .with_label_values(&[outcome])
        .observe(elapsed);
    state
        .metrics
        .dispatch_total
        .with_label_values(&[outcome])
        .inc();
}

fn record_driver_load(state: &AppState, driver_id: Uuid, rule: &DispatchRule) {
    let load = state.driver_workload(driver_id);
    let ceiling = rule.criteria.max_concurrent.max(1);
    state
        .metrics
        .driver_load
        .with_label_values(&[&driver_id.to_string()])
        .set(load as f64 / ceiling as f64);
}
