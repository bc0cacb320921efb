//! Domain handlers.
//!
//! GET    /api/v1/domains               list (filters, ordering, paging, fields)
//! GET    /api/v1/domains/:id           one live domain
//! POST   /api/v1/domains               create
//! PUT    /api/v1/domains/:id           partial update
//! DELETE /api/v1/domains/:id           soft delete
//! PATCH  /api/v1/domains/:id/enable    status = enabled
//! PATCH  /api/v1/domains/:id/disable   status = disabled

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

use highway_core::service::DomainService;
use highway_core::types::{Domain, DomainPatch, DomainQueryParam, QueryResult, Status};

use crate::error::AppError;
use crate::handlers::ListQuery;
use crate::middleware::enforcement::subject_id;
use crate::middleware::jwt::Subject;

#[derive(Debug, Deserialize)]
pub struct CreateDomainRequest {
    pub name: String,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub memo: Option<String>,
    /// Defaults to the caller.
    #[serde(default)]
    pub maintainer_id: Option<u64>,
}

impl CreateDomainRequest {
    fn into_domain(self, caller: Option<u64>) -> Domain {
        Domain {
            name: self.name.trim().to_string(),
            status: self.status.unwrap_or_default(),
            memo: self.memo,
            maintainer_id: self.maintainer_id.or(caller).unwrap_or_default(),
            ..Domain::default()
        }
    }
}

fn query_param(q: &ListQuery) -> Result<DomainQueryParam, AppError> {
    Ok(DomainQueryParam {
        pagination: q.pagination(),
        ids: q.ids()?,
        name: None,
        query_value: q.query_value(),
        status: q.status()?,
    })
}

pub async fn list_domains(
    Extension(service): Extension<DomainService>,
    Query(q): Query<ListQuery>,
) -> Result<Json<QueryResult<Domain>>, AppError> {
    let result = service.query(&query_param(&q)?, &q.options()?).await?;
    Ok(Json(result))
}

pub async fn get_domain(
    Extension(service): Extension<DomainService>,
    Path(id): Path<u64>,
) -> Result<Json<Domain>, AppError> {
    Ok(Json(service.get(id).await?))
}

pub async fn create_domain(
    Extension(service): Extension<DomainService>,
    subject: Option<Extension<Subject>>,
    Json(body): Json<CreateDomainRequest>,
) -> Result<(StatusCode, Json<Domain>), AppError> {
    let created = service.create(body.into_domain(subject_id(subject))).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_domain(
    Extension(service): Extension<DomainService>,
    Path(id): Path<u64>,
    Json(patch): Json<DomainPatch>,
) -> Result<Json<Domain>, AppError> {
    Ok(Json(service.update(id, patch).await?))
}

pub async fn delete_domain(
    Extension(service): Extension<DomainService>,
    Path(id): Path<u64>,
) -> Result<StatusCode, AppError> {
    service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn enable_domain(
    Extension(service): Extension<DomainService>,
    Path(id): Path<u64>,
) -> Result<StatusCode, AppError> {
    service.update_status(id, Status::Enabled).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn disable_domain(
    Extension(service): Extension<DomainService>,
    Path(id): Path<u64>,
) -> Result<StatusCode, AppError> {
    service.update_status(id, Status::Disabled).await?;
    Ok(StatusCode::NO_CONTENT)
}
