//! Menu and menu-action handlers.
//!
//! GET    /api/v1/menus                              list
//! POST   /api/v1/menus                              create (with optional actions)
//! GET    /api/v1/menus/:id                          one menu with its actions
//! PUT    /api/v1/menus/:id                          partial update
//! DELETE /api/v1/menus/:id                          delete menu and its actions
//! GET    /api/v1/menus/:id/actions                  actions of a menu
//! POST   /api/v1/menus/:id/actions                  add an action
//! PUT    /api/v1/menus/:id/actions/:action_id       rename an action
//! DELETE /api/v1/menus/:id/actions/:action_id       remove an action

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

use highway_core::service::MenuService;
use highway_core::types::{Menu, MenuAction, MenuPatch, MenuQueryParam, QueryResult, Status};

use crate::error::AppError;
use crate::handlers::ListQuery;

#[derive(Debug, Deserialize)]
pub struct MenuActionRequest {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateMenuRequest {
    pub name: String,
    #[serde(default)]
    pub sequence: i32,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub router: Option<String>,
    #[serde(default)]
    pub parent_id: Option<u64>,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub actions: Vec<MenuActionRequest>,
}

impl CreateMenuRequest {
    fn into_menu(self) -> Menu {
        Menu {
            name: self.name.trim().to_string(),
            sequence: self.sequence,
            icon: self.icon,
            router: self.router,
            parent_id: self.parent_id,
            status: self.status.unwrap_or_default(),
            memo: self.memo,
            actions: self
                .actions
                .into_iter()
                .map(|a| MenuAction {
                    code: a.code,
                    name: a.name,
                    ..MenuAction::default()
                })
                .collect(),
            ..Menu::default()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateMenuActionRequest {
    /// When present it must equal the current code.
    #[serde(default)]
    pub code: Option<String>,
    pub name: String,
}

pub async fn list_menus(
    Extension(service): Extension<MenuService>,
    Query(q): Query<ListQuery>,
) -> Result<Json<QueryResult<Menu>>, AppError> {
    let params = MenuQueryParam {
        pagination: q.pagination(),
        ids: q.ids()?,
        query_value: q.query_value(),
        status: q.status()?,
        parent_id: q.parent_id,
        ..MenuQueryParam::default()
    };
    Ok(Json(service.query(&params, &q.options()?).await?))
}

pub async fn create_menu(
    Extension(service): Extension<MenuService>,
    Json(body): Json<CreateMenuRequest>,
) -> Result<(StatusCode, Json<Menu>), AppError> {
    let created = service.create(body.into_menu()).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_menu(
    Extension(service): Extension<MenuService>,
    Path(id): Path<u64>,
) -> Result<Json<Menu>, AppError> {
    Ok(Json(service.get(id).await?))
}

pub async fn update_menu(
    Extension(service): Extension<MenuService>,
    Path(id): Path<u64>,
    Json(patch): Json<MenuPatch>,
) -> Result<Json<Menu>, AppError> {
    Ok(Json(service.update(id, patch).await?))
}

pub async fn delete_menu(
    Extension(service): Extension<MenuService>,
    Path(id): Path<u64>,
) -> Result<StatusCode, AppError> {
    service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_actions(
    Extension(service): Extension<MenuService>,
    Path(id): Path<u64>,
) -> Result<Json<Vec<MenuAction>>, AppError> {
    // 404 for an unknown menu rather than an empty list
    service.get(id).await?;
    Ok(Json(service.list_actions(id).await?))
}

pub async fn create_action(
    Extension(service): Extension<MenuService>,
    Path(id): Path<u64>,
    Json(body): Json<MenuActionRequest>,
) -> Result<(StatusCode, Json<MenuAction>), AppError> {
    let action = service.create_action(id, &body.code, &body.name).await?;
    Ok((StatusCode::CREATED, Json(action)))
}

pub async fn update_action(
    Extension(service): Extension<MenuService>,
    Path((id, action_id)): Path<(u64, u64)>,
    Json(body): Json<UpdateMenuActionRequest>,
) -> Result<Json<MenuAction>, AppError> {
    let action = service
        .update_action(id, action_id, body.code.as_deref(), &body.name)
        .await?;
    Ok(Json(action))
}

pub async fn delete_action(
    Extension(service): Extension<MenuService>,
    Path((id, action_id)): Path<(u64, u64)>,
) -> Result<StatusCode, AppError> {
    service.delete_action(id, action_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
