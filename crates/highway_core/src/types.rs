//! Entity model for the admin console.
//! Pure value types; no sqlx, no DB dependencies. The postgres adapter maps
//! its rows onto these with explicit conversion functions.

// Field enums use `from_str() -> Option<Self>` so unknown names can be
// reported together as an InvalidInput error.
#![allow(clippy::should_implement_trait)]

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HighwayError;

// ── Status ────────────────────────────────────────────────────

/// Enablement status shared by domains and menus (1: enabled, 2: disabled).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Status {
    #[default]
    Enabled,
    Disabled,
}

impl Status {
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Enabled => 1,
            Self::Disabled => 2,
        }
    }

    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            1 => Some(Self::Enabled),
            2 => Some(Self::Disabled),
            _ => None,
        }
    }
}

impl TryFrom<i32> for Status {
    type Error = String;

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        Self::from_i32(v).ok_or_else(|| format!("status must be 1 or 2, got {v}"))
    }
}

impl From<Status> for i32 {
    fn from(s: Status) -> i32 {
        s.as_i32()
    }
}

// ── Soft delete ───────────────────────────────────────────────

/// A stored row as seen at the repository boundary. Persisted as a nullable
/// `deleted_at` timestamp.
#[derive(Debug, Clone, PartialEq)]
pub enum Stored<T> {
    Active(T),
    Deleted(T, DateTime<Utc>),
}

impl<T> Stored<T> {
    pub fn from_parts(record: T, deleted_at: Option<DateTime<Utc>>) -> Self {
        match deleted_at {
            None => Self::Active(record),
            Some(at) => Self::Deleted(record, at),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    pub fn active(&self) -> Option<&T> {
        match self {
            Self::Active(r) => Some(r),
            Self::Deleted(..) => None,
        }
    }

    pub fn into_active(self) -> Option<T> {
        match self {
            Self::Active(r) => Some(r),
            Self::Deleted(..) => None,
        }
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Active(_) => None,
            Self::Deleted(_, at) => Some(*at),
        }
    }
}

// ── Query contract ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderField {
    pub key: String,
    pub direction: OrderDirection,
}

impl OrderField {
    pub fn new(key: impl Into<String>, direction: OrderDirection) -> Self {
        Self {
            key: key.into(),
            direction,
        }
    }

    /// Parse `name:desc,id` into order fields. A key without a suffix is ascending.
    pub fn parse_list(s: &str) -> Result<Vec<Self>, HighwayError> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                let (key, dir) = match part.split_once(':') {
                    Some((k, d)) => (k.trim(), d.trim()),
                    None => (part, "asc"),
                };
                let direction = match dir.to_ascii_lowercase().as_str() {
                    "asc" => OrderDirection::Asc,
                    "desc" => OrderDirection::Desc,
                    other => {
                        return Err(HighwayError::InvalidInput(format!(
                            "unknown order direction '{other}' for '{key}'"
                        )))
                    }
                };
                Ok(Self::new(key, direction))
            })
            .collect()
    }
}

/// Caller-supplied query options. Both parts are optional; an empty order
/// list means insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub order_fields: Vec<OrderField>,
    pub select_fields: Vec<String>,
}

/// Paging input. `pagination = false` returns every matching row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationParam {
    pub pagination: bool,
    pub only_count: bool,
    pub current: u32,
    pub page_size: u32,
}

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

impl Default for PaginationParam {
    fn default() -> Self {
        Self {
            pagination: true,
            only_count: false,
            current: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PaginationParam {
    pub fn all() -> Self {
        Self {
            pagination: false,
            ..Self::default()
        }
    }

    pub fn page(current: u32, page_size: u32) -> Self {
        Self {
            current,
            page_size,
            ..Self::default()
        }
    }

    pub fn current(&self) -> u32 {
        self.current.max(1)
    }

    pub fn page_size(&self) -> u32 {
        match self.page_size {
            0 => DEFAULT_PAGE_SIZE,
            n => n.min(MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.current() - 1) * u64::from(self.page_size())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationResult {
    pub total: u64,
    pub current: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult<T> {
    pub data: Vec<T>,
    pub page: Option<PaginationResult>,
}

impl<T> QueryResult<T> {
    pub fn total(&self) -> u64 {
        match &self.page {
            Some(p) => p.total,
            None => self.data.len() as u64,
        }
    }
}

/// Apply the pagination contract to an already filtered and ordered list.
pub fn paginate<T>(rows: Vec<T>, param: &PaginationParam) -> QueryResult<T> {
    let total = rows.len() as u64;
    if param.only_count {
        return QueryResult {
            data: Vec::new(),
            page: Some(PaginationResult {
                total,
                current: param.current(),
                page_size: param.page_size(),
            }),
        };
    }
    if !param.pagination {
        return QueryResult {
            data: rows,
            page: None,
        };
    }
    let data = rows
        .into_iter()
        .skip(param.offset() as usize)
        .take(param.page_size() as usize)
        .collect();
    QueryResult {
        data,
        page: Some(PaginationResult {
            total,
            current: param.current(),
            page_size: param.page_size(),
        }),
    }
}

// ── Domain ────────────────────────────────────────────────────

/// Tenant/partition unit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Domain {
    pub id: u64,
    pub name: String,
    pub status: Status,
    pub memo: Option<String>,
    pub maintainer_id: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Partial update for a domain: only the `Some` fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DomainPatch {
    pub name: Option<String>,
    pub status: Option<Status>,
    pub memo: Option<String>,
    pub maintainer_id: Option<u64>,
}

impl DomainPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.status.is_none()
            && self.memo.is_none()
            && self.maintainer_id.is_none()
    }

    pub fn apply_to(&self, d: &mut Domain) {
        if let Some(v) = &self.name {
            d.name = v.clone();
        }
        if let Some(v) = self.status {
            d.status = v;
        }
        if let Some(v) = &self.memo {
            d.memo = Some(v.clone());
        }
        if let Some(v) = self.maintainer_id {
            d.maintainer_id = v;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainQueryParam {
    pub pagination: PaginationParam,
    pub ids: Vec<u64>,
    pub name: Option<String>,
    /// Case-preserving substring match against the name.
    pub query_value: Option<String>,
    pub status: Option<Status>,
}

impl DomainQueryParam {
    pub fn matches(&self, d: &Domain) -> bool {
        (self.ids.is_empty() || self.ids.contains(&d.id))
            && self.name.as_deref().map_or(true, |n| d.name == n)
            && self.status.map_or(true, |s| d.status == s)
            && self
                .query_value
                .as_deref()
                .map_or(true, |q| d.name.contains(q))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainField {
    Id,
    Name,
    Status,
    Memo,
    MaintainerId,
    CreatedAt,
    UpdatedAt,
}

impl DomainField {
    pub const ALL: [Self; 7] = [
        Self::Id,
        Self::Name,
        Self::Status,
        Self::Memo,
        Self::MaintainerId,
        Self::CreatedAt,
        Self::UpdatedAt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Status => "status",
            Self::Memo => "memo",
            Self::MaintainerId => "maintainer_id",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == s)
    }

    /// Resolve caller-supplied field names; an empty list selects every field.
    pub fn resolve(names: &[String]) -> Result<Vec<Self>, HighwayError> {
        resolve_fields(names, &Self::ALL, Self::from_str, "domain")
    }

    /// Reset the fields that were not selected to their defaults.
    pub fn project(d: Domain, fields: &[Self]) -> Domain {
        if fields.len() == Self::ALL.len() {
            return d;
        }
        let keep = |f: Self| fields.contains(&f);
        Domain {
            id: d.id,
            name: if keep(Self::Name) { d.name } else { String::new() },
            status: if keep(Self::Status) {
                d.status
            } else {
                Status::default()
            },
            memo: d.memo.filter(|_| keep(Self::Memo)),
            maintainer_id: if keep(Self::MaintainerId) {
                d.maintainer_id
            } else {
                0
            },
            created_at: d.created_at.filter(|_| keep(Self::CreatedAt)),
            updated_at: d.updated_at.filter(|_| keep(Self::UpdatedAt)),
        }
    }
}

pub trait DomainsExt {
    fn to_names(&self) -> Vec<String>;
    fn to_map(&self) -> HashMap<u64, Domain>;
}

impl DomainsExt for [Domain] {
    fn to_names(&self) -> Vec<String> {
        self.iter().map(|d| d.name.clone()).collect()
    }

    fn to_map(&self) -> HashMap<u64, Domain> {
        self.iter().map(|d| (d.id, d.clone())).collect()
    }
}

// ── Menu ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Menu {
    pub id: u64,
    pub name: String,
    pub sequence: i32,
    pub icon: Option<String>,
    pub router: Option<String>,
    pub parent_id: Option<u64>,
    pub parent_path: String,
    pub status: Status,
    pub memo: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub actions: Vec<MenuAction>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MenuPatch {
    pub name: Option<String>,
    pub sequence: Option<i32>,
    pub icon: Option<String>,
    pub router: Option<String>,
    pub status: Option<Status>,
    pub memo: Option<String>,
}

impl MenuPatch {
    pub fn apply_to(&self, m: &mut Menu) {
        if let Some(v) = &self.name {
            m.name = v.clone();
        }
        if let Some(v) = self.sequence {
            m.sequence = v;
        }
        if let Some(v) = &self.icon {
            m.icon = Some(v.clone());
        }
        if let Some(v) = &self.router {
            m.router = Some(v.clone());
        }
        if let Some(v) = self.status {
            m.status = v;
        }
        if let Some(v) = &self.memo {
            m.memo = Some(v.clone());
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuQueryParam {
    pub pagination: PaginationParam,
    pub ids: Vec<u64>,
    pub name: Option<String>,
    pub query_value: Option<String>,
    pub status: Option<Status>,
    pub parent_id: Option<u64>,
    /// Menus whose parent path starts with this prefix (a subtree).
    pub prefix_parent_path: Option<String>,
}

impl MenuQueryParam {
    pub fn matches(&self, m: &Menu) -> bool {
        (self.ids.is_empty() || self.ids.contains(&m.id))
            && self.name.as_deref().map_or(true, |n| m.name == n)
            && self.status.map_or(true, |s| m.status == s)
            && self.parent_id.map_or(true, |p| m.parent_id == Some(p))
            && self
                .prefix_parent_path
                .as_deref()
                .map_or(true, |p| m.parent_path.starts_with(p))
            && self
                .query_value
                .as_deref()
                .map_or(true, |q| m.name.contains(q))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MenuField {
    Id,
    Name,
    Sequence,
    Icon,
    Router,
    ParentId,
    ParentPath,
    Status,
    Memo,
    CreatedAt,
    UpdatedAt,
}

impl MenuField {
    pub const ALL: [Self; 11] = [
        Self::Id,
        Self::Name,
        Self::Sequence,
        Self::Icon,
        Self::Router,
        Self::ParentId,
        Self::ParentPath,
        Self::Status,
        Self::Memo,
        Self::CreatedAt,
        Self::UpdatedAt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Sequence => "sequence",
            Self::Icon => "icon",
            Self::Router => "router",
            Self::ParentId => "parent_id",
            Self::ParentPath => "parent_path",
            Self::Status => "status",
            Self::Memo => "memo",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == s)
    }

    pub fn resolve(names: &[String]) -> Result<Vec<Self>, HighwayError> {
        resolve_fields(names, &Self::ALL, Self::from_str, "menu")
    }

    pub fn project(m: Menu, fields: &[Self]) -> Menu {
        if fields.len() == Self::ALL.len() {
            return m;
        }
        let keep = |f: Self| fields.contains(&f);
        Menu {
            id: m.id,
            name: if keep(Self::Name) { m.name } else { String::new() },
            sequence: if keep(Self::Sequence) { m.sequence } else { 0 },
            icon: m.icon.filter(|_| keep(Self::Icon)),
            router: m.router.filter(|_| keep(Self::Router)),
            parent_id: m.parent_id.filter(|_| keep(Self::ParentId)),
            parent_path: if keep(Self::ParentPath) {
                m.parent_path
            } else {
                String::new()
            },
            status: if keep(Self::Status) {
                m.status
            } else {
                Status::default()
            },
            memo: m.memo.filter(|_| keep(Self::Memo)),
            created_at: m.created_at.filter(|_| keep(Self::CreatedAt)),
            updated_at: m.updated_at.filter(|_| keep(Self::UpdatedAt)),
            actions: m.actions,
        }
    }
}

pub trait MenusExt {
    fn to_names(&self) -> Vec<String>;
    fn to_map(&self) -> HashMap<u64, Menu>;
}

impl MenusExt for [Menu] {
    fn to_names(&self) -> Vec<String> {
        self.iter().map(|m| m.name.clone()).collect()
    }

    fn to_map(&self) -> HashMap<u64, Menu> {
        self.iter().map(|m| (m.id, m.clone())).collect()
    }
}

/// Parent path of a child: the parent's own path with the parent id appended.
pub fn join_parent_path(parent_path: &str, parent_id: u64) -> String {
    if parent_path.is_empty() {
        parent_id.to_string()
    } else {
        format!("{parent_path}/{parent_id}")
    }
}

// ── MenuAction ────────────────────────────────────────────────

/// Named operation on a menu. `(menu_id, code)` is unique within a menu.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MenuAction {
    pub id: u64,
    pub menu_id: u64,
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuActionQueryParam {
    pub pagination: PaginationParam,
    pub ids: Vec<u64>,
    pub menu_ids: Vec<u64>,
    pub code: Option<String>,
}

impl MenuActionQueryParam {
    pub fn for_menu(menu_id: u64) -> Self {
        Self {
            pagination: PaginationParam::all(),
            menu_ids: vec![menu_id],
            ..Self::default()
        }
    }

    pub fn matches(&self, a: &MenuAction) -> bool {
        (self.ids.is_empty() || self.ids.contains(&a.id))
            && (self.menu_ids.is_empty() || self.menu_ids.contains(&a.menu_id))
            && self.code.as_deref().map_or(true, |c| a.code == c)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MenuActionField {
    Id,
    MenuId,
    Code,
    Name,
}

impl MenuActionField {
    pub const ALL: [Self; 4] = [Self::Id, Self::MenuId, Self::Code, Self::Name];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::MenuId => "menu_id",
            Self::Code => "code",
            Self::Name => "name",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == s)
    }

    pub fn resolve(names: &[String]) -> Result<Vec<Self>, HighwayError> {
        resolve_fields(names, &Self::ALL, Self::from_str, "menu action")
    }
}

fn resolve_fields<F: Copy + PartialEq>(
    names: &[String],
    all: &[F],
    parse: fn(&str) -> Option<F>,
    entity: &str,
) -> Result<Vec<F>, HighwayError> {
    if names.is_empty() {
        return Ok(all.to_vec());
    }
    let mut fields = Vec::with_capacity(names.len());
    let mut unknown = Vec::new();
    for name in names {
        match parse(name) {
            Some(f) if !fields.contains(&f) => fields.push(f),
            Some(_) => {}
            None => unknown.push(name.as_str()),
        }
    }
    if !unknown.is_empty() {
        return Err(HighwayError::InvalidInput(format!(
            "unknown {entity} field(s): {}",
            unknown.join(", ")
        )));
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_i32() {
        assert_eq!(Status::from_i32(1), Some(Status::Enabled));
        assert_eq!(Status::from_i32(2), Some(Status::Disabled));
        assert_eq!(Status::from_i32(0), None);
        assert_eq!(i32::from(Status::Disabled), 2);
    }

    #[test]
    fn status_rejects_out_of_range_json() {
        let err = serde_json::from_str::<Status>("3").unwrap_err();
        assert!(err.to_string().contains("status must be 1 or 2"));
    }

    #[test]
    fn parse_order_list() {
        let fields = OrderField::parse_list("name:desc, id").unwrap();
        assert_eq!(
            fields,
            vec![
                OrderField::new("name", OrderDirection::Desc),
                OrderField::new("id", OrderDirection::Asc),
            ]
        );
        assert!(OrderField::parse_list("name:sideways").is_err());
    }

    #[test]
    fn pagination_clamps_and_offsets() {
        let p = PaginationParam::page(3, 500);
        assert_eq!(p.page_size(), MAX_PAGE_SIZE);
        assert_eq!(p.offset(), 200);
        assert_eq!(PaginationParam::page(0, 0).offset(), 0);
    }

    #[test]
    fn paginate_reports_total_and_slices() {
        let rows: Vec<u32> = (1..=25).collect();
        let r = paginate(rows.clone(), &PaginationParam::page(3, 10));
        assert_eq!(r.data, vec![21, 22, 23, 24, 25]);
        assert_eq!(r.total(), 25);

        let all = paginate(rows.clone(), &PaginationParam::all());
        assert_eq!(all.data.len(), 25);
        assert!(all.page.is_none());

        let count = paginate(
            rows,
            &PaginationParam {
                only_count: true,
                ..PaginationParam::default()
            },
        );
        assert!(count.data.is_empty());
        assert_eq!(count.total(), 25);
    }

    #[test]
    fn domain_query_filters_are_conjunctive() {
        let d = Domain {
            id: 4,
            name: "OrderDesk".into(),
            status: Status::Enabled,
            ..Domain::default()
        };
        let mut q = DomainQueryParam {
            query_value: Some("Desk".into()),
            ..DomainQueryParam::default()
        };
        assert!(q.matches(&d));
        q.status = Some(Status::Disabled);
        assert!(!q.matches(&d));
        q.status = None;
        q.query_value = Some("desk".into());
        assert!(!q.matches(&d), "substring match is case-preserving");
        q.query_value = None;
        q.ids = vec![1, 2];
        assert!(!q.matches(&d));
    }

    #[test]
    fn resolve_rejects_unknown_fields() {
        let err = DomainField::resolve(&["name".into(), "password".into()]).unwrap_err();
        assert!(matches!(err, HighwayError::InvalidInput(m) if m.contains("password")));
        assert_eq!(DomainField::resolve(&[]).unwrap().len(), DomainField::ALL.len());
    }

    #[test]
    fn project_keeps_id_and_selected_fields() {
        let d = Domain {
            id: 9,
            name: "billing".into(),
            status: Status::Disabled,
            memo: Some("memo".into()),
            maintainer_id: 3,
            ..Domain::default()
        };
        let p = DomainField::project(d, &[DomainField::Name]);
        assert_eq!(p.id, 9);
        assert_eq!(p.name, "billing");
        assert_eq!(p.memo, None);
        assert_eq!(p.maintainer_id, 0);
    }

    #[test]
    fn stored_tags_soft_deleted_rows() {
        let now = Utc::now();
        let s = Stored::from_parts(1u8, Some(now));
        assert!(!s.is_active());
        assert_eq!(s.deleted_at(), Some(now));
        assert_eq!(Stored::from_parts(1u8, None).into_active(), Some(1));
    }

    #[test]
    fn parent_path_joins() {
        assert_eq!(join_parent_path("", 3), "3");
        assert_eq!(join_parent_path("3", 8), "3/8");
    }
}
