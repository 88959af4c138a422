use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::geo::haversine_km;
use crate::models::driver::{Driver, DriverStatus};
use crate::models::job::Job;
use crate::models::rule::DispatchRule;

/// A driver paired with the workload snapshot used for this selection pass.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub driver_id: Uuid,
    pub workload: u32,
    pub distance_km: Option<f64>,
    pub last_online_at: DateTime<Utc>,
}

/// Apply a rule's driver criteria to the pool. Side-effect free; workloads
/// are whatever snapshot the caller derived.
pub fn eligible_drivers(
    job: &Job,
    rule: &DispatchRule,
    pool: &[(Driver, u32)],
) -> Vec<Candidate> {
    let pickup = job.pickup.coordinates;

    pool.iter()
        .filter(|(driver, workload)| {
            driver.status == DriverStatus::Online
                && driver.rating >= rule.criteria.min_rating
                && driver.capacity_kg >= job.weight_kg
                && *workload < rule.criteria.max_concurrent
                // The job's own vehicle requirement holds no matter how
                // permissive the rule is.
                && job
                    .service_type
                    .compatible_vehicles()
                    .contains(&driver.vehicle_type)
                && (rule.criteria.vehicle_types.is_empty()
                    || rule.criteria.vehicle_types.contains(&driver.vehicle_type))
        })
        .filter_map(|(driver, workload)| {
            let distance_km = match (pickup, driver.location) {
                (Some(p), Some(d)) => Some(haversine_km(&d, &p)),
                _ => None,
            };

            if let (Some(radius), Some(distance)) = (rule.criteria.radius_km, distance_km) {
                if distance > radius {
                    return None;
                }
            }

            Some(Candidate {
                driver_id: driver.id,
                workload: *workload,
                distance_km,
                last_online_at: driver.last_online_at,
            })
        })
        .collect()
}

/// Rank candidates and return the single best driver, or `None` when the
/// pool is empty. Closest first; unknown distances sort after every known
/// one; then lightest load, then longest-online.
pub fn select_driver(candidates: &[Candidate]) -> Option<Uuid> {
    candidates
        .iter()
        .min_by(|a, b| {
            compare_distance(a.distance_km, b.distance_km)
                .then(a.workload.cmp(&b.workload))
                .then(a.last_online_at.cmp(&b.last_online_at))
        })
        .map(|candidate| candidate.driver_id)
}

fn compare_distance(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
