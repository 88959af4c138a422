use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::lifecycle;
use crate::models::job::{Job, JobStatus};
use crate::models::proof::{ProofKind, ProofOfHandoff, ProofOutcome};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct PickupRequest {
    pub code: String,
    pub signature: Option<String>,
    pub photo: Option<String>,
    pub sender_name: Option<String>,
    pub sender_phone: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryRequest {
    pub code: String,
    pub recipient_name: String,
    pub recipient_phone: Option<String>,
    pub id_number: Option<String>,
    pub signature: Option<String>,
    pub photo: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

/// Pickup protocol: assignment check, code check, proof capture, transition.
/// The job entry is held exclusively throughout, so two simultaneous
/// attempts cannot both consume the code.
pub fn record_pickup(
    state: &AppState,
    job_id: Uuid,
    driver_id: Uuid,
    request: PickupRequest,
) -> Result<Job, AppError> {
    let (job, change, proof) = {
        let mut entry = state.jobs.get_mut(&job_id).ok_or(AppError::NotAssigned)?;
        let job = entry.value_mut();

        if job.assigned_driver != Some(driver_id) {
            return Err(AppError::NotAssigned);
        }

        // Consumed codes never verify again; an exact mismatch consumes
        // nothing and the driver may retry.
        if job.pickup_verified || request.code != job.pickup_code {
            return Err(AppError::InvalidCode);
        }
        job.pickup_verified = true;

        let proof = ProofOfHandoff {
            id: Uuid::new_v4(),
            job_id,
            driver_id,
            kind: ProofKind::Pickup,
            outcome: ProofOutcome::Completed,
            recipient_name: request.sender_name,
            recipient_phone: request.sender_phone,
            id_number: None,
            signature: request.signature,
            photo: request.photo,
            location: request.location.clone(),
            notes: request.notes,
            failure_reason: None,
            captured_at: Utc::now(),
        };

        let change = lifecycle::apply(
            job,
            JobStatus::PickedUp,
            "driver",
            Some("pickup verified".to_string()),
            request.location,
        )
        .inspect_err(|_| {
            // The transition guard refused; hand the code back untouched.
            job.pickup_verified = false;
        })?;
        (job.clone(), change, proof)
    };

    state.proofs.insert(proof.id, proof);
    lifecycle::publish(state, &change);
    info!(job_id = %job_id, driver_id = %driver_id, "pickup recorded");
    Ok(job)
}

/// Delivery protocol, symmetric to pickup plus recipient identity. When the
/// proof policy is enforcing, a completion without a signature is rejected
/// before anything is consumed; otherwise the absence is merely recorded.
pub fn record_delivery(
    state: &AppState,
    job_id: Uuid,
    driver_id: Uuid,
    request: DeliveryRequest,
) -> Result<Job, AppError> {
    let (job, change, proof) = {
        let mut entry = state.jobs.get_mut(&job_id).ok_or(AppError::NotAssigned)?;
        let job = entry.value_mut();

        if job.assigned_driver != Some(driver_id) {
            return Err(AppError::NotAssigned);
        }

        if job.delivery_verified || request.code != job.delivery_code {
            return Err(AppError::InvalidCode);
        }

        if state.config.enforce_proof_requirements && request.signature.is_none() {
            return Err(AppError::BadRequest(
                "signature is required for delivery".to_string(),
            ));
        }
        job.delivery_verified = true;

        let proof = ProofOfHandoff {
            id: Uuid::new_v4(),
            job_id,
            driver_id,
            kind: ProofKind::Delivery,
            outcome: ProofOutcome::Completed,
            recipient_name: Some(request.recipient_name),
            recipient_phone: request.recipient_phone,
            id_number: request.id_number,
            signature: request.signature,
            photo: request.photo,
            location: request.location.clone(),
            notes: request.notes,
            failure_reason: None,
            captured_at: Utc::now(),
        };

        let change = lifecycle::apply(
            job,
            JobStatus::Delivered,
            "driver",
            Some("delivery verified".to_string()),
            request.location,
        )
        .inspect_err(|_| {
            // The transition guard refused; hand the code back untouched.
            job.delivery_verified = false;
        })?;
        (job.clone(), change, proof)
    };

    state.proofs.insert(proof.id, proof);
    lifecycle::publish(state, &change);
    info!(job_id = %job_id, driver_id = %driver_id, "delivery recorded");
    Ok(job)
}

/// Failed attempt: records a Failed proof and moves the job to
/// FailedDelivery. The delivery code is untouched and stays valid for the
/// next attempt.
pub fn mark_delivery_failed(
    state: &AppState,
    job_id: Uuid,
    driver_id: Uuid,
    reason: String,
    notes: Option<String>,
    photo: Option<String>,
) -> Result<Job, AppError> {
    let (job, change, proof) = {
        let mut entry = state.jobs.get_mut(&job_id).ok_or(AppError::NotAssigned)?;
        let job = entry.value_mut();

        if job.assigned_driver != Some(driver_id) {
            return Err(AppError::NotAssigned);
        }

        let proof = ProofOfHandoff {
            id: Uuid::new_v4(),
            job_id,
            driver_id,
            kind: ProofKind::Delivery,
            outcome: ProofOutcome::Failed,
            recipient_name: None,
            recipient_phone: None,
            id_number: None,
            signature: None,
            photo,
            location: None,
            notes,
            failure_reason: Some(reason.clone()),
            captured_at: Utc::now(),
        };

        let change = lifecycle::apply(
            job,
            JobStatus::FailedDelivery,
            "driver",
            Some(reason),
            None,
        )?;
        (job.clone(), change, proof)
    };

    state.proofs.insert(proof.id, proof);
    lifecycle::publish(state, &change);
    info!(job_id = %job_id, driver_id = %driver_id, "delivery marked failed");
    Ok(job)
}

/// Schedule a new attempt after a failed delivery. No codes are regenerated.
pub fn retry_delivery(state: &AppState, job_id: Uuid) -> Result<Job, AppError> {
    lifecycle::transition(
        state,
        job_id,
        JobStatus::OutForDelivery,
        "dispatcher",
        Some("delivery retry scheduled".to_string()),
        None,
    )
}

/// Append to a proof's notes. Everything else on the record is immutable.
pub fn amend_proof_notes(
    state: &AppState,
    proof_id: Uuid,
    addition: &str,
) -> Result<ProofOfHandoff, AppError> {
    let mut proof = state
        .proofs
        .get_mut(&proof_id)
        .ok_or_else(|| AppError::NotFound(format!("proof {proof_id} not found")))?;

    proof.amend_notes(addition);
    Ok(proof.clone())
}
