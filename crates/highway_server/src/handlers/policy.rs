//! Policy administration handlers.
//!
//! GET    /api/v1/policy/rules                          current engine rule set
//! POST   /api/v1/policy/roles/:role/subjects           assign a subject to a role
//! DELETE /api/v1/policy/roles/:role/subjects/:subject  revoke
//! POST   /api/v1/policy/reload                         reload the engine from the store

use axum::{extract::Path, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};

use highway_core::policy::engine::PolicyRuleSet;
use highway_core::PolicyRuntime;

use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub subject: String,
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub rules: usize,
    pub assignments: usize,
}

pub async fn list_rules(
    Extension(runtime): Extension<PolicyRuntime>,
) -> Result<Json<PolicyRuleSet>, AppError> {
    Ok(Json(runtime.engine().rules()?))
}

pub async fn assign_subject(
    Extension(runtime): Extension<PolicyRuntime>,
    Path(role): Path<String>,
    Json(body): Json<AssignRequest>,
) -> Result<StatusCode, AppError> {
    let inserted = runtime.assign_role(body.subject.trim(), &role).await?;
    Ok(if inserted {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    })
}

pub async fn revoke_subject(
    Extension(runtime): Extension<PolicyRuntime>,
    Path((role, subject)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    if runtime.revoke_role(&subject, &role).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(highway_core::HighwayError::NotFound(format!(
            "subject '{subject}' is not assigned to role '{role}'"
        ))
        .into())
    }
}

pub async fn reload(
    Extension(runtime): Extension<PolicyRuntime>,
) -> Result<Json<ReloadResponse>, AppError> {
    let rules = runtime.reload().await?;
    Ok(Json(ReloadResponse {
        rules: rules.rules.len(),
        assignments: rules.assignments.len(),
    }))
}
