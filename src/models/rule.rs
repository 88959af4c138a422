use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::driver::VehicleType;
use crate::models::job::{Job, Priority, ServiceType};

/// Applicability predicate. Empty lists match anything.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RuleMatch {
    #[serde(default)]
    pub service_types: Vec<ServiceType>,
    #[serde(default)]
    pub cities: Vec<String>,
    #[serde(default)]
    pub min_priority: Option<Priority>,
}

impl RuleMatch {
    pub fn accepts(&self, job: &Job) -> bool {
        if !self.service_types.is_empty() && !self.service_types.contains(&job.service_type) {
            return false;
        }

        if !self.cities.is_empty() {
            let pickup_city = job.pickup.city.to_lowercase();
            if !self.cities.iter().any(|c| c.to_lowercase() == pickup_city) {
                return false;
            }
        }

        if let Some(min) = self.min_priority {
            if job.priority < min {
                return false;
            }
        }

        true
    }
}

/// Driver filter applied once a rule has matched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionCriteria {
    #[serde(default)]
    pub min_rating: f64,
    #[serde(default)]
    pub radius_km: Option<f64>,
    pub max_concurrent: u32,
    #[serde(default)]
    pub vehicle_types: Vec<VehicleType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRule {
    pub id: Uuid,
    pub name: String,
    pub active: bool,
    pub priority: i32,
    pub match_on: RuleMatch,
    pub criteria: SelectionCriteria,
    pub created_at: DateTime<Utc>,
}

impl DispatchRule {
    /// System fallback when no configured rule matches: any online driver
    /// with a compatible vehicle, capped only by the configured default load.
    pub fn fallback(job: &Job, default_max_concurrent: u32) -> Self {
        Self {
            id: Uuid::nil(),
            name: "default".to_string(),
            active: true,
            priority: i32::MIN,
            match_on: RuleMatch::default(),
            criteria: SelectionCriteria {
                min_rating: 0.0,
                radius_km: None,
                max_concurrent: default_max_concurrent,
                vehicle_types: job.service_type.compatible_vehicles().to_vec(),
            },
            created_at: Utc::now(),
        }
    }
}
