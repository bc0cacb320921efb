//! Postgres implementations of the highway_core storage ports.
//!
//! Each adapter is a newtype wrapping PgPool. All SQL is runtime-checked
//! (sqlx::query, not sqlx::query!) so building needs no live database.
//! Filters, ordering and paging are assembled with `QueryBuilder`; column
//! names only ever come from the field enums, values are always bound.

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;

use highway_core::policy::bootstrap::{CreatorObject, CreatorRole};
use highway_core::policy::engine::{PolicyRule, PolicyRuleSet, RoleAssignment};
use highway_core::ports::{DomainStore, MenuActionStore, MenuStore, PolicyStore, Result};
use highway_core::types::*;
use highway_core::HighwayError;

use crate::rows::*;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Map a write error: constraint violations become `Conflict` / `InvalidInput`,
/// everything else is a `StoreFailure` tagged with `context`.
fn write_err(context: &str, e: sqlx::Error) -> HighwayError {
    let code = e
        .as_database_error()
        .and_then(|d| d.code())
        .map(|c| c.into_owned());
    match code.as_deref() {
        Some(UNIQUE_VIOLATION) => HighwayError::Conflict(format!("{context}: duplicate key")),
        Some(FOREIGN_KEY_VIOLATION) => {
            HighwayError::InvalidInput(format!("{context}: referenced row does not exist"))
        }
        _ => HighwayError::store(context, anyhow!(e)),
    }
}

fn read_err(context: &'static str) -> impl FnOnce(sqlx::Error) -> HighwayError {
    move |e| HighwayError::store(context, anyhow!(e))
}

fn db_ids(ids: &[u64]) -> Result<Vec<i64>> {
    ids.iter().map(|&id| to_db_id(id)).collect()
}

/// Append `ORDER BY` from already-validated field names, defaulting to id.
fn push_order(qb: &mut QueryBuilder<'_, Postgres>, order: &[(&'static str, OrderDirection)]) {
    qb.push(" ORDER BY ");
    if order.is_empty() {
        qb.push("id ASC");
        return;
    }
    let mut sep = qb.separated(", ");
    for (column, dir) in order {
        sep.push(format!("{column} {}", dir.as_sql()));
    }
}

fn push_page(qb: &mut QueryBuilder<'_, Postgres>, page: &PaginationParam) {
    if page.pagination {
        qb.push(" LIMIT ")
            .push_bind(i64::from(page.page_size()))
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);
    }
}

fn order_columns<F>(
    order: &[OrderField],
    parse: fn(&str) -> Option<F>,
    name: fn(&F) -> &'static str,
) -> Result<Vec<(&'static str, OrderDirection)>> {
    order
        .iter()
        .map(|o| {
            parse(&o.key)
                .map(|f| (name(&f), o.direction))
                .ok_or_else(|| HighwayError::InvalidInput(format!("unknown order field '{}'", o.key)))
        })
        .collect()
}

/// Count + page in two round trips; `only_count` skips the row fetch.
async fn run_paged<R, T>(
    pool: &PgPool,
    context: &'static str,
    page: &PaginationParam,
    mut count: QueryBuilder<'_, Postgres>,
    mut rows: QueryBuilder<'_, Postgres>,
) -> Result<QueryResult<T>>
where
    R: for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin,
    R: TryInto<T, Error = String>,
{
    let total: i64 = if page.pagination || page.only_count {
        count
            .build_query_scalar()
            .fetch_one(pool)
            .await
            .map_err(read_err(context))?
    } else {
        0
    };
    let result_page = PaginationResult {
        total: total.max(0) as u64,
        current: page.current(),
        page_size: page.page_size(),
    };
    if page.only_count {
        return Ok(QueryResult {
            data: Vec::new(),
            page: Some(result_page),
        });
    }
    push_page(&mut rows, page);
    let fetched: Vec<R> = rows
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(read_err(context))?;
    let data = convert_all(fetched)?;
    Ok(QueryResult {
        data,
        page: page.pagination.then_some(result_page),
    })
}

// ── PgDomainStore ─────────────────────────────────────────────

/// Postgres-backed domain store with soft delete via `deleted_at`.
pub struct PgDomainStore {
    pool: PgPool,
}

impl PgDomainStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, p: &DomainQueryParam) -> Result<()> {
        qb.push(" WHERE deleted_at IS NULL");
        if !p.ids.is_empty() {
            qb.push(" AND id = ANY(").push_bind(db_ids(&p.ids)?).push(")");
        }
        if let Some(name) = &p.name {
            qb.push(" AND name = ").push_bind(name.clone());
        }
        if let Some(q) = &p.query_value {
            qb.push(" AND strpos(name, ").push_bind(q.clone()).push(") > 0");
        }
        if let Some(status) = p.status {
            qb.push(" AND status = ").push_bind(status.as_i32());
        }
        Ok(())
    }
}

/// Domain rows arrive with `deleted_at`; live queries only ever see active ones.
struct LiveDomain(Domain);

impl TryFrom<DomainRow> for LiveDomain {
    type Error = String;

    fn try_from(r: DomainRow) -> std::result::Result<Self, String> {
        let stored: Stored<Domain> = r.try_into()?;
        stored
            .into_active()
            .map(LiveDomain)
            .ok_or_else(|| "deleted domain in live result".to_string())
    }
}

#[async_trait]
impl DomainStore for PgDomainStore {
    async fn query(
        &self,
        params: &DomainQueryParam,
        opts: &QueryOptions,
    ) -> Result<QueryResult<Domain>> {
        let fields = DomainField::resolve(&opts.select_fields)?;
        let order = order_columns(&opts.order_fields, DomainField::from_str, DomainField::as_str)?;

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM domains");
        Self::push_filter(&mut count, params)?;
        let mut rows = QueryBuilder::new(format!("SELECT {DOMAIN_COLUMNS} FROM domains"));
        Self::push_filter(&mut rows, params)?;
        push_order(&mut rows, &order);

        let result: QueryResult<LiveDomain> = run_paged::<DomainRow, LiveDomain>(
            &self.pool,
            "domain query",
            &params.pagination,
            count,
            rows,
        )
        .await?;
        Ok(QueryResult {
            data: result
                .data
                .into_iter()
                .map(|LiveDomain(d)| DomainField::project(d, &fields))
                .collect(),
            page: result.page,
        })
    }

    async fn get(&self, id: u64) -> Result<Option<Domain>> {
        let row = sqlx::query_as::<_, DomainRow>(&format!(
            "SELECT {DOMAIN_COLUMNS} FROM domains WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(to_db_id(id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(read_err("domain get"))?;
        row.map(|r| {
            Stored::<Domain>::try_from(r)
                .map(Stored::into_active)
                .map_err(|e: String| HighwayError::Internal(anyhow!(e)))
        })
        .transpose()
        .map(Option::flatten)
    }

    async fn create(&self, item: &Domain) -> Result<u64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO domains (name, status, memo, maintainer_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&item.name)
        .bind(item.status.as_i32())
        .bind(&item.memo)
        .bind(to_db_id(item.maintainer_id)?)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| write_err("domain create", e))?;
        debug!(id, name = %item.name, "Inserted domain");
        from_db_id(id).map_err(|e| HighwayError::Internal(anyhow!(e)))
    }

    async fn update(&self, id: u64, patch: &DomainPatch) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE domains SET
                name          = COALESCE($2, name),
                status        = COALESCE($3, status),
                memo          = COALESCE($4, memo),
                maintainer_id = COALESCE($5, maintainer_id),
                updated_at    = now()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(to_db_id(id)?)
        .bind(&patch.name)
        .bind(patch.status.map(Status::as_i32))
        .bind(&patch.memo)
        .bind(patch.maintainer_id.map(to_db_id).transpose()?)
        .execute(&self.pool)
        .await
        .map_err(|e| write_err("domain update", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, id: u64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE domains SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(to_db_id(id)?)
        .execute(&self.pool)
        .await
        .map_err(|e| write_err("domain delete", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn update_status(&self, id: u64, status: Status) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE domains SET status = $2, updated_at = now() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(to_db_id(id)?)
        .bind(status.as_i32())
        .execute(&self.pool)
        .await
        .map_err(|e| write_err("domain update_status", e))?;
        Ok(result.rows_affected() == 1)
    }
}

// ── PgMenuStore ───────────────────────────────────────────────

pub struct PgMenuStore {
    pool: PgPool,
}

impl PgMenuStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, p: &MenuQueryParam) -> Result<()> {
        qb.push(" WHERE TRUE");
        if !p.ids.is_empty() {
            qb.push(" AND id = ANY(").push_bind(db_ids(&p.ids)?).push(")");
        }
        if let Some(name) = &p.name {
            qb.push(" AND name = ").push_bind(name.clone());
        }
        if let Some(q) = &p.query_value {
            qb.push(" AND strpos(name, ").push_bind(q.clone()).push(") > 0");
        }
        if let Some(status) = p.status {
            qb.push(" AND status = ").push_bind(status.as_i32());
        }
        if let Some(parent) = p.parent_id {
            qb.push(" AND parent_id = ").push_bind(to_db_id(parent)?);
        }
        if let Some(prefix) = &p.prefix_parent_path {
            qb.push(" AND starts_with(parent_path, ")
                .push_bind(prefix.clone())
                .push(")");
        }
        Ok(())
    }
}

#[async_trait]
impl MenuStore for PgMenuStore {
    async fn query(
        &self,
        params: &MenuQueryParam,
        opts: &QueryOptions,
    ) -> Result<QueryResult<Menu>> {
        let fields = MenuField::resolve(&opts.select_fields)?;
        let order = order_columns(&opts.order_fields, MenuField::from_str, MenuField::as_str)?;

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM menus");
        Self::push_filter(&mut count, params)?;
        let mut rows = QueryBuilder::new(format!("SELECT {MENU_COLUMNS} FROM menus"));
        Self::push_filter(&mut rows, params)?;
        push_order(&mut rows, &order);

        let result = run_paged::<MenuRow, Menu>(
            &self.pool,
            "menu query",
            &params.pagination,
            count,
            rows,
        )
        .await?;
        Ok(QueryResult {
            data: result
                .data
                .into_iter()
                .map(|m| MenuField::project(m, &fields))
                .collect(),
            page: result.page,
        })
    }

    async fn get(&self, id: u64) -> Result<Option<Menu>> {
        let row = sqlx::query_as::<_, MenuRow>(&format!(
            "SELECT {MENU_COLUMNS} FROM menus WHERE id = $1"
        ))
        .bind(to_db_id(id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(read_err("menu get"))?;
        row.map(|r| {
            r.try_into()
                .map_err(|e: String| HighwayError::Internal(anyhow!(e)))
        })
        .transpose()
    }

    async fn create(&self, item: &Menu) -> Result<u64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO menus (name, sequence, icon, router, parent_id, parent_path, status, memo)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(&item.name)
        .bind(item.sequence)
        .bind(&item.icon)
        .bind(&item.router)
        .bind(item.parent_id.map(to_db_id).transpose()?)
        .bind(&item.parent_path)
        .bind(item.status.as_i32())
        .bind(&item.memo)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| write_err("menu create", e))?;
        from_db_id(id).map_err(|e| HighwayError::Internal(anyhow!(e)))
    }

    async fn update(&self, id: u64, patch: &MenuPatch) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE menus SET
                name       = COALESCE($2, name),
                sequence   = COALESCE($3, sequence),
                icon       = COALESCE($4, icon),
                router     = COALESCE($5, router),
                status     = COALESCE($6, status),
                memo       = COALESCE($7, memo),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(to_db_id(id)?)
        .bind(&patch.name)
        .bind(patch.sequence)
        .bind(&patch.icon)
        .bind(&patch.router)
        .bind(patch.status.map(Status::as_i32))
        .bind(&patch.memo)
        .execute(&self.pool)
        .await
        .map_err(|e| write_err("menu update", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, id: u64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM menus WHERE id = $1")
            .bind(to_db_id(id)?)
            .execute(&self.pool)
            .await
            .map_err(|e| write_err("menu delete", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn update_status(&self, id: u64, status: Status) -> Result<bool> {
        let result =
            sqlx::query("UPDATE menus SET status = $2, updated_at = now() WHERE id = $1")
                .bind(to_db_id(id)?)
                .bind(status.as_i32())
                .execute(&self.pool)
                .await
                .map_err(|e| write_err("menu update_status", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn count(&self) -> Result<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM menus")
            .fetch_one(&self.pool)
            .await
            .map_err(read_err("menu count"))?;
        Ok(n.max(0) as u64)
    }
}

// ── PgMenuActionStore ─────────────────────────────────────────

pub struct PgMenuActionStore {
    pool: PgPool,
}

impl PgMenuActionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, p: &MenuActionQueryParam) -> Result<()> {
        qb.push(" WHERE TRUE");
        if !p.ids.is_empty() {
            qb.push(" AND id = ANY(").push_bind(db_ids(&p.ids)?).push(")");
        }
        if !p.menu_ids.is_empty() {
            qb.push(" AND menu_id = ANY(")
                .push_bind(db_ids(&p.menu_ids)?)
                .push(")");
        }
        if let Some(code) = &p.code {
            qb.push(" AND code = ").push_bind(code.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl MenuActionStore for PgMenuActionStore {
    async fn query(
        &self,
        params: &MenuActionQueryParam,
        opts: &QueryOptions,
    ) -> Result<QueryResult<MenuAction>> {
        MenuActionField::resolve(&opts.select_fields)?;
        let order = order_columns(
            &opts.order_fields,
            MenuActionField::from_str,
            MenuActionField::as_str,
        )?;

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM menu_actions");
        Self::push_filter(&mut count, params)?;
        let mut rows =
            QueryBuilder::new(format!("SELECT {MENU_ACTION_COLUMNS} FROM menu_actions"));
        Self::push_filter(&mut rows, params)?;
        push_order(&mut rows, &order);

        run_paged::<MenuActionRow, MenuAction>(
            &self.pool,
            "menu action query",
            &params.pagination,
            count,
            rows,
        )
        .await
    }

    async fn get(&self, id: u64) -> Result<Option<MenuAction>> {
        let row = sqlx::query_as::<_, MenuActionRow>(&format!(
            "SELECT {MENU_ACTION_COLUMNS} FROM menu_actions WHERE id = $1"
        ))
        .bind(to_db_id(id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(read_err("menu action get"))?;
        row.map(|r| {
            r.try_into()
                .map_err(|e: String| HighwayError::Internal(anyhow!(e)))
        })
        .transpose()
    }

    async fn create(&self, item: &MenuAction) -> Result<u64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO menu_actions (menu_id, code, name) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(to_db_id(item.menu_id)?)
        .bind(&item.code)
        .bind(&item.name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| write_err("menu action create", e))?;
        from_db_id(id).map_err(|e| HighwayError::Internal(anyhow!(e)))
    }

    async fn update_name(&self, id: u64, name: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE menu_actions SET name = $2 WHERE id = $1")
            .bind(to_db_id(id)?)
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| write_err("menu action update", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, id: u64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM menu_actions WHERE id = $1")
            .bind(to_db_id(id)?)
            .execute(&self.pool)
            .await
            .map_err(|e| write_err("menu action delete", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_by_menu(&self, menu_id: u64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM menu_actions WHERE menu_id = $1")
            .bind(to_db_id(menu_id)?)
            .execute(&self.pool)
            .await
            .map_err(|e| write_err("menu action delete_by_menu", e))?;
        Ok(result.rows_affected())
    }
}

// ── PgPolicyStore ─────────────────────────────────────────────

/// Durable policy storage. Upserts report whether a new row was inserted
/// via `xmax = 0`, which only holds for freshly inserted tuples.
pub struct PgPolicyStore {
    pool: PgPool,
}

impl PgPolicyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PolicyStore for PgPolicyStore {
    async fn upsert_object(&self, object: &CreatorObject) -> Result<bool> {
        let inserted: bool = sqlx::query_scalar(
            r#"
            INSERT INTO policy_objects (name, object_type, description)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO UPDATE SET
                object_type = EXCLUDED.object_type,
                description = EXCLUDED.description
            RETURNING (xmax = 0)
            "#,
        )
        .bind(&object.name)
        .bind(&object.object_type)
        .bind(&object.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| write_err("policy object upsert", e))?;
        Ok(inserted)
    }

    async fn upsert_role(&self, role: &CreatorRole) -> Result<bool> {
        let inserted: bool = sqlx::query_scalar(
            r#"
            INSERT INTO policy_roles (name, description)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET description = EXCLUDED.description
            RETURNING (xmax = 0)
            "#,
        )
        .bind(&role.name)
        .bind(&role.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| write_err("policy role upsert", e))?;
        Ok(inserted)
    }

    async fn upsert_rule(&self, role: &str, object: &str, action: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO policy_rules (role, object, action)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(role)
        .bind(object)
        .bind(action)
        .execute(&self.pool)
        .await
        .map_err(|e| write_err("policy rule upsert", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn assign_role(&self, assignment: &RoleAssignment) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO role_assignments (subject, role) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(&assignment.subject)
        .bind(&assignment.role)
        .execute(&self.pool)
        .await
        .map_err(|e| write_err("role assignment", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn revoke_role(&self, assignment: &RoleAssignment) -> Result<bool> {
        let result = sqlx::query("DELETE FROM role_assignments WHERE subject = $1 AND role = $2")
            .bind(&assignment.subject)
            .bind(&assignment.role)
            .execute(&self.pool)
            .await
            .map_err(|e| write_err("role revocation", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_objects(&self) -> Result<Vec<CreatorObject>> {
        let rows = sqlx::query_as::<_, PolicyObjectRow>(
            "SELECT name, object_type, description FROM policy_objects ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(read_err("policy object list"))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_roles(&self) -> Result<Vec<CreatorRole>> {
        let rows = sqlx::query_as::<_, PolicyRoleRow>(
            "SELECT name, description FROM policy_roles ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(read_err("policy role list"))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn load_rules(&self) -> Result<PolicyRuleSet> {
        let rules: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT role, object, action FROM policy_rules ORDER BY role, object, action",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(read_err("policy rule load"))?;
        let assignments: Vec<(String, String)> =
            sqlx::query_as("SELECT subject, role FROM role_assignments ORDER BY subject, role")
                .fetch_all(&self.pool)
                .await
                .map_err(read_err("role assignment load"))?;
        Ok(PolicyRuleSet {
            rules: rules
                .into_iter()
                .map(|(role, object, action)| PolicyRule::new(role, object, action))
                .collect(),
            assignments: assignments
                .into_iter()
                .map(|(subject, role)| RoleAssignment::new(subject, role))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_by_defaults_to_id() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT id FROM domains");
        push_order(&mut qb, &[]);
        assert_eq!(qb.sql(), "SELECT id FROM domains ORDER BY id ASC");
    }

    #[test]
    fn order_by_uses_whitelisted_columns() {
        let order = order_columns(
            &OrderField::parse_list("name:desc,id").unwrap(),
            DomainField::from_str,
            DomainField::as_str,
        )
        .unwrap();
        let mut qb = QueryBuilder::<Postgres>::new("SELECT id FROM domains");
        push_order(&mut qb, &order);
        assert_eq!(qb.sql(), "SELECT id FROM domains ORDER BY name DESC, id ASC");
    }

    #[test]
    fn unknown_order_field_is_rejected() {
        let err = order_columns(
            &[OrderField::new("name; DROP TABLE domains", OrderDirection::Asc)],
            DomainField::from_str,
            DomainField::as_str,
        )
        .unwrap_err();
        assert!(matches!(err, HighwayError::InvalidInput(_)));
    }

    #[test]
    fn domain_filter_binds_every_value() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM domains");
        PgDomainStore::push_filter(
            &mut qb,
            &DomainQueryParam {
                ids: vec![1, 2],
                query_value: Some("bill".into()),
                status: Some(Status::Enabled),
                ..DomainQueryParam::default()
            },
        )
        .unwrap();
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM domains WHERE deleted_at IS NULL AND id = ANY($1) \
             AND strpos(name, $2) > 0 AND status = $3"
        );
    }
}
