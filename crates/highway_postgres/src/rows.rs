//! Row types and explicit row ↔ entity conversion.
//!
//! Ids are BIGINT on the wire and `u64` in the model; every crossing goes
//! through `to_db_id` / `from_db_id` so a negative or oversized id is an error
//! rather than a silent wrap.

use chrono::{DateTime, Utc};

use highway_core::policy::bootstrap::{CreatorObject, CreatorRole};
use highway_core::types::{Domain, Menu, MenuAction, Status, Stored};
use highway_core::HighwayError;

pub(crate) fn to_db_id(id: u64) -> Result<i64, HighwayError> {
    i64::try_from(id).map_err(|_| HighwayError::InvalidInput(format!("id {id} out of range")))
}

pub(crate) fn from_db_id(id: i64) -> Result<u64, String> {
    u64::try_from(id).map_err(|_| format!("negative id {id} in database"))
}

fn status(v: i32) -> Result<Status, String> {
    Status::from_i32(v).ok_or_else(|| format!("invalid status {v} in database"))
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct DomainRow {
    pub id: i64,
    pub name: String,
    pub status: i32,
    pub memo: Option<String>,
    pub maintainer_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

pub(crate) const DOMAIN_COLUMNS: &str =
    "id, name, status, memo, maintainer_id, created_at, updated_at, deleted_at";

impl TryFrom<DomainRow> for Stored<Domain> {
    type Error = String;

    fn try_from(r: DomainRow) -> Result<Self, Self::Error> {
        let domain = Domain {
            id: from_db_id(r.id)?,
            name: r.name,
            status: status(r.status)?,
            memo: r.memo,
            maintainer_id: from_db_id(r.maintainer_id)?,
            created_at: Some(r.created_at),
            updated_at: Some(r.updated_at),
        };
        Ok(Stored::from_parts(domain, r.deleted_at))
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct MenuRow {
    pub id: i64,
    pub name: String,
    pub sequence: i32,
    pub icon: Option<String>,
    pub router: Option<String>,
    pub parent_id: Option<i64>,
    pub parent_path: String,
    pub status: i32,
    pub memo: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) const MENU_COLUMNS: &str =
    "id, name, sequence, icon, router, parent_id, parent_path, status, memo, created_at, updated_at";

impl TryFrom<MenuRow> for Menu {
    type Error = String;

    fn try_from(r: MenuRow) -> Result<Self, Self::Error> {
        Ok(Menu {
            id: from_db_id(r.id)?,
            name: r.name,
            sequence: r.sequence,
            icon: r.icon,
            router: r.router,
            parent_id: r.parent_id.map(from_db_id).transpose()?,
            parent_path: r.parent_path,
            status: status(r.status)?,
            memo: r.memo,
            created_at: Some(r.created_at),
            updated_at: Some(r.updated_at),
            actions: Vec::new(),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct MenuActionRow {
    pub id: i64,
    pub menu_id: i64,
    pub code: String,
    pub name: String,
}

pub(crate) const MENU_ACTION_COLUMNS: &str = "id, menu_id, code, name";

impl TryFrom<MenuActionRow> for MenuAction {
    type Error = String;

    fn try_from(r: MenuActionRow) -> Result<Self, Self::Error> {
        Ok(MenuAction {
            id: from_db_id(r.id)?,
            menu_id: from_db_id(r.menu_id)?,
            code: r.code,
            name: r.name,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PolicyObjectRow {
    pub name: String,
    pub object_type: String,
    pub description: String,
}

impl From<PolicyObjectRow> for CreatorObject {
    fn from(r: PolicyObjectRow) -> Self {
        CreatorObject {
            name: r.name,
            object_type: r.object_type,
            description: r.description,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PolicyRoleRow {
    pub name: String,
    pub description: String,
}

impl From<PolicyRoleRow> for CreatorRole {
    fn from(r: PolicyRoleRow) -> Self {
        CreatorRole {
            name: r.name,
            description: r.description,
        }
    }
}

/// Convert a batch of rows, failing on the first bad one.
pub(crate) fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, HighwayError>
where
    R: TryInto<T, Error = String>,
{
    rows.into_iter()
        .map(|r| {
            r.try_into()
                .map_err(|e: String| HighwayError::Internal(anyhow::anyhow!(e)))
        })
        .collect()
}
