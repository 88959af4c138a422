use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::dispatch::{dispatch_job, run_dispatch_batch, AssignmentOutcome, BatchItem};
use crate::engine::queue::enqueue_job;
use crate::error::AppError;
use crate::lifecycle;
use crate::models::job::{
    generate_code, generate_tracking_id, Address, Job, JobStatus, Priority, ServiceType,
    TrackingEvent,
};
use crate::models::proof::ProofOfHandoff;
use crate::state::AppState;
use crate::verification;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs", post(create_job))
        .route("/jobs/:id", get(get_job))
        .route("/jobs/:id/dispatch", post(dispatch_one))
        .route("/dispatch/run", post(dispatch_batch))
        .route("/jobs/:id/confirm-payment", post(confirm_payment))
        .route("/jobs/:id/pickup", post(record_pickup))
        .route("/jobs/:id/transit", post(mark_in_transit))
        .route("/jobs/:id/out-for-delivery", post(mark_out_for_delivery))
        .route("/jobs/:id/delivery", post(record_delivery))
        .route("/jobs/:id/delivery/failed", post(mark_delivery_failed))
        .route("/jobs/:id/delivery/retry", post(retry_delivery))
        .route("/jobs/:id/cancel", post(cancel_job))
        .route("/jobs/:id/proofs", get(list_proofs))
        .route("/proofs/:id/notes", patch(amend_proof_notes))
}

#[derive(Deserialize)]
pub struct CreateJobRequest {
    pub service_type: ServiceType,
    pub priority: Priority,
    pub pickup: Address,
    pub delivery: Address,
    pub weight_kg: f64,
    pub item_count: u32,
    pub dimensions: Option<String>,
    pub total_amount: f64,
    #[serde(default)]
    pub payment_pending: bool,
}

#[derive(Deserialize)]
pub struct DriverAction<T> {
    pub driver_id: Uuid,
    #[serde(flatten)]
    pub body: T,
}

#[derive(Deserialize)]
pub struct FailDeliveryRequest {
    pub reason: String,
    pub notes: Option<String>,
    pub photo: Option<String>,
}

#[derive(Deserialize)]
pub struct CancelRequest {
    pub reason: String,
}

#[derive(Deserialize)]
pub struct TransitRequest {
    pub driver_id: Uuid,
    pub location: Option<String>,
}

#[derive(Deserialize)]
pub struct AmendNotesRequest {
    pub notes: String,
}

async fn create_job(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateJobRequest>,
) -> Result<Json<Job>, AppError> {
    if payload.weight_kg <= 0.0 {
        return Err(AppError::BadRequest("weight must be > 0".to_string()));
    }
    if payload.item_count == 0 {
        return Err(AppError::BadRequest("item count must be > 0".to_string()));
    }

    let status = if payload.payment_pending {
        JobStatus::PaymentPending
    } else {
        JobStatus::Pending
    };

    let now = Utc::now();
    let job = Job {
        id: Uuid::new_v4(),
        tracking_id: generate_tracking_id(),
        service_type: payload.service_type,
        status,
        priority: payload.priority,
        pickup: payload.pickup,
        delivery: payload.delivery,
        weight_kg: payload.weight_kg,
        item_count: payload.item_count,
        dimensions: payload.dimensions,
        assigned_driver: None,
        assigned_vehicle: None,
        pickup_code: generate_code('P'),
        delivery_code: generate_code('D'),
        pickup_verified: false,
        delivery_verified: false,
        total_amount: payload.total_amount,
        history: vec![TrackingEvent {
            status,
            location: None,
            note: Some("job created".to_string()),
            actor: "system".to_string(),
            at: now,
        }],
        created_at: now,
        updated_at: now,
    };

    state.jobs.insert(job.id, job.clone());
    if job.status == JobStatus::Pending {
        enqueue_job(&state, job.id).await?;
    }

    Ok(Json(job))
}

async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(tracking_id): Path<String>,
) -> Result<Json<Job>, AppError> {
    let job = state
        .jobs
        .iter()
        .find(|entry| entry.value().tracking_id == tracking_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("job {tracking_id} not found")))?;

    Ok(Json(job))
}

async fn dispatch_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<AssignmentOutcome>, AppError> {
    let outcome = dispatch_job(&state, id)?;
    Ok(Json(outcome))
}

async fn dispatch_batch(State(state): State<Arc<AppState>>) -> Json<Vec<BatchItem>> {
    Json(run_dispatch_batch(&state))
}

async fn confirm_payment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>, AppError> {
    let job = lifecycle::transition(
        &state,
        id,
        JobStatus::Pending,
        "system",
        Some("payment confirmed".to_string()),
        None,
    )?;
    enqueue_job(&state, job.id).await?;
    Ok(Json(job))
}

async fn record_pickup(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DriverAction<verification::PickupRequest>>,
) -> Result<Json<Job>, AppError> {
    let job = verification::record_pickup(&state, id, payload.driver_id, payload.body)?;
    Ok(Json(job))
}

async fn mark_in_transit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TransitRequest>,
) -> Result<Json<Job>, AppError> {
    require_assigned_driver(&state, id, payload.driver_id)?;
    let job = lifecycle::transition(
        &state,
        id,
        JobStatus::InTransit,
        "driver",
        None,
        payload.location,
    )?;
    Ok(Json(job))
}

async fn mark_out_for_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TransitRequest>,
) -> Result<Json<Job>, AppError> {
    require_assigned_driver(&state, id, payload.driver_id)?;
    let job = lifecycle::transition(
        &state,
        id,
        JobStatus::OutForDelivery,
        "driver",
        None,
        payload.location,
    )?;
    Ok(Json(job))
}

async fn record_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DriverAction<verification::DeliveryRequest>>,
) -> Result<Json<Job>, AppError> {
    let job = verification::record_delivery(&state, id, payload.driver_id, payload.body)?;
    Ok(Json(job))
}

async fn mark_delivery_failed(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DriverAction<FailDeliveryRequest>>,
) -> Result<Json<Job>, AppError> {
    let job = verification::mark_delivery_failed(
        &state,
        id,
        payload.driver_id,
        payload.body.reason,
        payload.body.notes,
        payload.body.photo,
    )?;
    Ok(Json(job))
}

async fn retry_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>, AppError> {
    let job = verification::retry_delivery(&state, id)?;
    Ok(Json(job))
}

async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelRequest>,
) -> Result<Json<Job>, AppError> {
    let job = lifecycle::cancel(&state, id, &payload.reason)?;
    Ok(Json(job))
}

async fn list_proofs(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> Json<Vec<ProofOfHandoff>> {
    let mut proofs: Vec<ProofOfHandoff> = state
        .proofs
        .iter()
        .filter(|entry| entry.value().job_id == job_id)
        .map(|entry| entry.value().clone())
        .collect();
    proofs.sort_by(|a, b| a.captured_at.cmp(&b.captured_at));

    Json(proofs)
}

async fn amend_proof_notes(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AmendNotesRequest>,
) -> Result<Json<ProofOfHandoff>, AppError> {
    let proof = verification::amend_proof_notes(&state, id, &payload.notes)?;
    Ok(Json(proof))
}

fn require_assigned_driver(
    state: &AppState,
    job_id: Uuid,
    driver_id: Uuid,
) -> Result<(), AppError> {
    let entry = state.jobs.get(&job_id).ok_or(AppError::NotAssigned)?;
    if entry.value().assigned_driver != Some(driver_id) {
        return Err(AppError::NotAssigned);
    }
    Ok(())
}
