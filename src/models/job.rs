use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::driver::{GeoPoint, VehicleType};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ServiceType {
    Economy,
    Standard,
    Express,
    SameDay,
    Overnight,
    Urgent,
    Moving,
    Furniture,
    LoadTransport,
}

impl ServiceType {
    /// Vehicle types able to carry this kind of job when no rule says otherwise.
    pub fn compatible_vehicles(&self) -> &'static [VehicleType] {
        match self {
            ServiceType::Moving | ServiceType::Furniture | ServiceType::LoadTransport => {
                &[VehicleType::Van, VehicleType::Truck]
            }
            _ => &[
                VehicleType::Bike,
                VehicleType::Car,
                VehicleType::Van,
                VehicleType::Truck,
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Normal,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobStatus {
    PaymentPending,
    PaymentFailed,
    Refunded,
    Pending,
    Assigned,
    PickedUp,
    InTransit,
    OutForDelivery,
    Delivered,
    FailedDelivery,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Delivered | JobStatus::Cancelled | JobStatus::Refunded
        )
    }

    /// Statuses that count toward a driver's active workload.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            JobStatus::Assigned
                | JobStatus::PickedUp
                | JobStatus::InTransit
                | JobStatus::OutForDelivery
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub coordinates: Option<GeoPoint>,
}

/// One entry in a job's append-only tracking history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub status: JobStatus,
    pub location: Option<String>,
    pub note: Option<String>,
    pub actor: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub tracking_id: String,
    pub service_type: ServiceType,
    pub status: JobStatus,
    pub priority: Priority,
    pub pickup: Address,
    pub delivery: Address,
    pub weight_kg: f64,
    pub item_count: u32,
    pub dimensions: Option<String>,
    pub assigned_driver: Option<Uuid>,
    pub assigned_vehicle: Option<VehicleType>,
    pub pickup_code: String,
    pub delivery_code: String,
    pub pickup_verified: bool,
    pub delivery_verified: bool,
    pub total_amount: f64,
    pub history: Vec<TrackingEvent>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Human-facing tracking identifier, e.g. `CD-3F2A9C01D4`.
pub fn generate_tracking_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("CD-{}", &hex[..10].to_uppercase())
}

/// Single-use verification code: a prefix plus six digits drawn from v4 bits.
pub fn generate_code(prefix: char) -> String {
    let n = Uuid::new_v4().as_u128() % 1_000_000;
    format!("{prefix}{n:06}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_id_has_expected_shape() {
        let id = generate_tracking_id();
        assert!(id.starts_with("CD-"));
        assert_eq!(id.len(), 13);
    }

    #[test]
    fn codes_carry_prefix_and_six_digits() {
        let code = generate_code('P');
        assert_eq!(code.len(), 7);
        assert!(code.starts_with('P'));
        assert!(code[1..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn moving_jobs_need_large_vehicles() {
        assert!(!ServiceType::Moving
            .compatible_vehicles()
            .contains(&VehicleType::Bike));
        assert!(ServiceType::Express
            .compatible_vehicles()
            .contains(&VehicleType::Bike));
    }
}
