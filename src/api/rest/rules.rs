use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{patch, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::rule::{DispatchRule, RuleMatch, SelectionCriteria};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rules", post(create_rule).get(list_rules))
        .route("/rules/:id/active", patch(set_rule_active))
}

#[derive(Deserialize)]
pub struct CreateRuleRequest {
    pub name: String,
    pub priority: i32,
    #[serde(default)]
    pub match_on: RuleMatch,
    pub criteria: SelectionCriteria,
}

#[derive(Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

async fn create_rule(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateRuleRequest>,
) -> Result<Json<DispatchRule>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    if payload.criteria.max_concurrent == 0 {
        return Err(AppError::BadRequest(
            "max_concurrent must be > 0".to_string(),
        ));
    }

    let rule = DispatchRule {
        id: Uuid::new_v4(),
        name: payload.name,
        active: true,
        priority: payload.priority,
        match_on: payload.match_on,
        criteria: payload.criteria,
        created_at: Utc::now(),
    };

    state.rules.insert(rule.id, rule.clone());
    Ok(Json(rule))
}

async fn list_rules(State(state): State<Arc<AppState>>) -> Json<Vec<DispatchRule>> {
    let rules = state
        .rules
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(rules)
}

async fn set_rule_active(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetActiveRequest>,
) -> Result<Json<DispatchRule>, AppError> {
    let mut rule = state
        .rules
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("rule {} not found", id)))?;

    rule.active = payload.active;
    Ok(Json(rule.clone()))
}
