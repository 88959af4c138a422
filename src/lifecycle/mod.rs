use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver::VehicleType;
use crate::models::job::{Job, JobStatus, TrackingEvent};
use crate::state::AppState;

/// Emitted on every accepted transition for the notification collaborator.
/// How (or whether) it is delivered is not this module's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange {
    pub job_id: Uuid,
    pub tracking_id: String,
    pub from: JobStatus,
    pub to: JobStatus,
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

pub fn successors(status: JobStatus) -> &'static [JobStatus] {
    use JobStatus::*;
    match status {
        PaymentPending => &[Pending, PaymentFailed, Cancelled],
        PaymentFailed => &[PaymentPending, Cancelled],
        Pending => &[Assigned, Cancelled],
        Assigned => &[PickedUp, Cancelled, FailedDelivery],
        PickedUp => &[InTransit, Cancelled, FailedDelivery],
        InTransit => &[OutForDelivery, Delivered, Cancelled, FailedDelivery],
        OutForDelivery => &[Delivered, FailedDelivery, Cancelled],
        FailedDelivery => &[OutForDelivery, Cancelled, Refunded],
        Delivered | Cancelled | Refunded => &[],
    }
}

/// Validate and apply one edge on a job the caller holds exclusively.
/// Appends the tracking-history entry; never touches prior entries.
pub fn apply(
    job: &mut Job,
    target: JobStatus,
    actor: &str,
    note: Option<String>,
    location: Option<String>,
) -> Result<StatusChange, AppError> {
    let from = job.status;

    // A no-op edge is an error, not a silent accept; downstream consumers
    // would otherwise infer a fresh event from a repeat.
    if target == from || !successors(from).contains(&target) {
        return Err(AppError::InvalidTransition { from, to: target });
    }

    match target {
        JobStatus::Assigned if job.assigned_driver.is_none() => {
            return Err(AppError::InvalidTransition { from, to: target });
        }
        JobStatus::PickedUp if !job.pickup_verified => {
            return Err(AppError::InvalidTransition { from, to: target });
        }
        JobStatus::Delivered if !job.delivery_verified => {
            return Err(AppError::InvalidTransition { from, to: target });
        }
        _ => {}
    }

    let now = Utc::now();
    job.status = target;
    job.updated_at = now;
    job.history.push(TrackingEvent {
        status: target,
        location,
        note: note.clone(),
        actor: actor.to_string(),
        at: now,
    });

    Ok(StatusChange {
        job_id: job.id,
        tracking_id: job.tracking_id.clone(),
        from,
        to: target,
        note,
        at: now,
    })
}

/// Transition a stored job. The DashMap entry is held exclusively for the
/// whole check-then-write, so concurrent attempts serialize per job.
pub fn transition(
    state: &AppState,
    job_id: Uuid,
    target: JobStatus,
    actor: &str,
    note: Option<String>,
    location: Option<String>,
) -> Result<Job, AppError> {
    let (job, change) = {
        let mut entry = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| AppError::NotFound(format!("job {job_id} not found")))?;

        let change = apply(entry.value_mut(), target, actor, note, location)?;
        (entry.value().clone(), change)
    };

    publish(state, &change);
    Ok(job)
}

/// Atomic assignment write: only a job still Pending with no driver can be
/// claimed. A concurrent loser observes the changed state and backs off.
pub fn assign(
    state: &AppState,
    job_id: Uuid,
    driver_id: Uuid,
    vehicle: VehicleType,
) -> Result<Job, AppError> {
    let (job, change) = {
        let mut entry = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| AppError::NotFound(format!("job {job_id} not found")))?;
        let job = entry.value_mut();

        if job.status != JobStatus::Pending || job.assigned_driver.is_some() {
            return Err(AppError::ConcurrentAssignment);
        }

        job.assigned_driver = Some(driver_id);
        job.assigned_vehicle = Some(vehicle);

        let change = apply(
            job,
            JobStatus::Assigned,
            "dispatch",
            Some(format!("assigned to driver {driver_id}")),
            None,
        )?;
        (job.clone(), change)
    };

    info!(job_id = %job_id, driver_id = %driver_id, "job assigned");
    publish(state, &change);
    Ok(job)
}

pub fn cancel(state: &AppState, job_id: Uuid, reason: &str) -> Result<Job, AppError> {
    transition(
        state,
        job_id,
        JobStatus::Cancelled,
        "dispatcher",
        Some(reason.to_string()),
        None,
    )
}

pub(crate) fn publish(state: &AppState, change: &StatusChange) {
    state
        .metrics
        .status_transitions_total
        .with_label_values(&[status_label(change.to)])
        .inc();

    // Receivers may lag or be absent; neither blocks the transition.
    let _ = state.status_events_tx.send(change.clone());

    info!(
        job_id = %change.job_id,
        from = ?change.from,
        to = ?change.to,
        "status changed"
    );
}

pub fn status_label(status: JobStatus) -> &'static str {
    use JobStatus::*;
    match status {
        PaymentPending => "payment_pending",
        PaymentFailed => "payment_failed",
        Refunded => "refunded",
        Pending => "pending",
        Assigned => "assigned",
        PickedUp => "picked_up",
        InTransit => "in_transit",
        OutForDelivery => "out_for_delivery",
        Delivered => "delivered",
        FailedDelivery => "failed_delivery",
        Cancelled => "cancelled",
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{apply, successors};
    use crate::error::AppError;
    use crate::models::job::{
        generate_code, generate_tracking_id, Address, Job, JobStatus, Priority, ServiceType,
    };

    fn address(city: &str) -> Address {
        Address {
            street: "1 Test St".to_string(),
            city: city.to_string(),
            state: "HH".to_string(),
            postal_code: "20095".to_string(),
            coordinates: None,
        }
    }

    fn job(status: JobStatus) -> Job {
        let now = Utc::now();
        Job {
            id: Uuid::new_v4(),
            tracking_id: generate_tracking_id(),
            service_type: ServiceType::Express,
            status,
            priority: Priority::Normal,
            pickup: address("Hamburg"),
            delivery: address("Berlin"),
            weight_kg: 2.0,
            item_count: 1,
            dimensions: None,
            assigned_driver: None,
            assigned_vehicle: None,
            pickup_code: generate_code('P'),
            delivery_code: generate_code('D'),
            pickup_verified: false,
            delivery_verified: false,
            total_amount: 12.5,
            history: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn terminal_states_have_no_successors() {
        assert!(successors(JobStatus::Delivered).is_empty());
        assert!(successors(JobStatus::Cancelled).is_empty());
        assert!(successors(JobStatus::Refunded).is_empty());
    }

    #[test]
    fn failed_delivery_permits_retry() {
        assert!(successors(JobStatus::FailedDelivery).contains(&JobStatus::OutForDelivery));
    }

    #[test]
    fn self_transition_is_rejected_and_history_untouched() {
        let mut j = job(JobStatus::Pending);
        let err = apply(&mut j, JobStatus::Pending, "test", None, None).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
        assert!(j.history.is_empty());
        assert_eq!(j.status, JobStatus::Pending);
    }

    #[test]
    fn skipping_states_is_rejected() {
        let mut j = job(JobStatus::Pending);
        let err = apply(&mut j, JobStatus::Delivered, "test", None, None).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[test]
    fn assigned_requires_a_driver_on_the_job() {
        let mut j = job(JobStatus::Pending);
        let err = apply(&mut j, JobStatus::Assigned, "test", None, None).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));

        j.assigned_driver = Some(Uuid::new_v4());
        apply(&mut j, JobStatus::Assigned, "test", None, None).unwrap();
        assert_eq!(j.status, JobStatus::Assigned);
    }

    #[test]
    fn picked_up_requires_verified_code() {
        let mut j = job(JobStatus::Assigned);
        j.assigned_driver = Some(Uuid::new_v4());

        let err = apply(&mut j, JobStatus::PickedUp, "driver", None, None).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));

        j.pickup_verified = true;
        apply(&mut j, JobStatus::PickedUp, "driver", None, None).unwrap();
        assert_eq!(j.status, JobStatus::PickedUp);
    }

    #[test]
    fn delivered_requires_verified_delivery_code() {
        let mut j = job(JobStatus::OutForDelivery);
        j.assigned_driver = Some(Uuid::new_v4());
        j.pickup_verified = true;

        let err = apply(&mut j, JobStatus::Delivered, "driver", None, None).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));

        j.delivery_verified = true;
        apply(&mut j, JobStatus::Delivered, "driver", None, None).unwrap();
        assert_eq!(j.status, JobStatus::Delivered);
    }

    #[test]
    fn every_transition_appends_history() {
        let mut j = job(JobStatus::Pending);
        j.assigned_driver = Some(Uuid::new_v4());
        j.pickup_verified = true;
        j.delivery_verified = true;

        let path = [
            JobStatus::Assigned,
            JobStatus::PickedUp,
            JobStatus::InTransit,
            JobStatus::OutForDelivery,
            JobStatus::Delivered,
        ];
        for target in path {
            apply(&mut j, target, "test", None, None).unwrap();
        }

        assert_eq!(j.history.len(), path.len());
        let recorded: Vec<_> = j.history.iter().map(|e| e.status).collect();
        assert_eq!(recorded, path);
    }

    #[test]
    fn cancel_is_reachable_from_any_non_terminal_state() {
        for status in [
            JobStatus::PaymentPending,
            JobStatus::PaymentFailed,
            JobStatus::Pending,
            JobStatus::Assigned,
            JobStatus::PickedUp,
            JobStatus::InTransit,
            JobStatus::OutForDelivery,
            JobStatus::FailedDelivery,
        ] {
            assert!(
                successors(status).contains(&JobStatus::Cancelled),
                "{status:?} should permit cancellation"
            );
        }
    }
}
