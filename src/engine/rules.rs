use crate::models::job::Job;
use crate::models::rule::DispatchRule;

/// Pick the best-matching active rule for a job: highest priority score,
/// ties broken by newest rule. `None` means fall back to the system default.
pub fn best_rule<'a>(job: &Job, rules: &'a [DispatchRule]) -> Option<&'a DispatchRule> {
    rules
        .iter()
        .filter(|rule| rule.active && rule.match_on.accepts(job))
        .max_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(a.created_at.cmp(&b.created_at))
        })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::best_rule;
    use crate::models::job::{
        generate_code, generate_tracking_id, Address, Job, JobStatus, Priority, ServiceType,
    };
    use crate::models::rule::{DispatchRule, RuleMatch, SelectionCriteria};

    fn job(service_type: ServiceType, city: &str, priority: Priority) -> Job {
        let now = Utc::now();
        let address = |city: &str| Address {
            street: "1 Test St".to_string(),
            city: city.to_string(),
            state: "HH".to_string(),
            postal_code: "20095".to_string(),
            coordinates: None,
        };
        Job {
            id: Uuid::new_v4(),
            tracking_id: generate_tracking_id(),
            service_type,
            status: JobStatus::Pending,
            priority,
            pickup: address(city),
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
            total_amount: 10.0,
            history: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    fn rule(name: &str, priority: i32, match_on: RuleMatch, age_minutes: i64) -> DispatchRule {
        DispatchRule {
            id: Uuid::new_v4(),
            name: name.to_string(),
            active: true,
            priority,
            match_on,
            criteria: SelectionCriteria {
                min_rating: 0.0,
                radius_km: None,
                max_concurrent: 3,
                vehicle_types: vec![],
            },
            created_at: Utc::now() - Duration::minutes(age_minutes),
        }
    }

    #[test]
    fn inactive_rules_never_match() {
        let j = job(ServiceType::Express, "Hamburg", Priority::Normal);
        let mut r = rule("express", 10, RuleMatch::default(), 0);
        r.active = false;

        assert!(best_rule(&j, &[r]).is_none());
    }

    #[test]
    fn service_type_filter_applies() {
        let j = job(ServiceType::Moving, "Hamburg", Priority::Normal);
        let r = rule(
            "express-only",
            10,
            RuleMatch {
                service_types: vec![ServiceType::Express],
                ..Default::default()
            },
            0,
        );

        assert!(best_rule(&j, &[r]).is_none());
    }

    #[test]
    fn city_match_is_case_insensitive() {
        let j = job(ServiceType::Express, "Hamburg", Priority::Normal);
        let r = rule(
            "hamburg",
            10,
            RuleMatch {
                cities: vec!["HAMBURG".to_string()],
                ..Default::default()
            },
            0,
        );

        assert_eq!(best_rule(&j, &[r]).unwrap().name, "hamburg");
    }

    #[test]
    fn min_priority_excludes_lower_priority_jobs() {
        let normal = job(ServiceType::Express, "Hamburg", Priority::Normal);
        let urgent = job(ServiceType::Express, "Hamburg", Priority::Urgent);
        let r = rule(
            "urgent-lane",
            10,
            RuleMatch {
                min_priority: Some(Priority::High),
                ..Default::default()
            },
            0,
        );

        assert!(best_rule(&normal, std::slice::from_ref(&r)).is_none());
        assert!(best_rule(&urgent, &[r]).is_some());
    }

    #[test]
    fn highest_priority_rule_wins() {
        let j = job(ServiceType::Express, "Hamburg", Priority::Normal);
        let low = rule("low", 1, RuleMatch::default(), 0);
        let high = rule("high", 99, RuleMatch::default(), 0);

        assert_eq!(best_rule(&j, &[low, high]).unwrap().name, "high");
    }

    #[test]
    fn ties_break_toward_newest_rule() {
        let j = job(ServiceType::Express, "Hamburg", Priority::Normal);
        let older = rule("older", 5, RuleMatch::default(), 60);
        let newer = rule("newer", 5, RuleMatch::default(), 1);

        assert_eq!(best_rule(&j, &[older, newer]).unwrap().name, "newer");
    }
}
