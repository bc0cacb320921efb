//! In-memory implementations of the storage ports.
//!
//! Each table sits behind one `tokio::sync::RwLock`, so a write such as
//! `update_status` is never observed half-applied by a concurrent query.
//! Used by tests and by `database.backend = "memory"` development runs.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::HighwayError;
use crate::policy::bootstrap::{CreatorObject, CreatorRole};
use crate::policy::engine::{PolicyRule, PolicyRuleSet, RoleAssignment};
use crate::ports::{DomainStore, MenuActionStore, MenuStore, PolicyStore, Result};
use crate::types::*;

fn resolve_order<F>(
    order: &[OrderField],
    parse: fn(&str) -> Option<F>,
) -> Result<Vec<(F, OrderDirection)>> {
    order
        .iter()
        .map(|o| {
            parse(&o.key)
                .map(|f| (f, o.direction))
                .ok_or_else(|| HighwayError::InvalidInput(format!("unknown order field '{}'", o.key)))
        })
        .collect()
}

fn sort_rows<T, F: Copy>(rows: &mut [T], order: &[(F, OrderDirection)], cmp: fn(&T, &T, F) -> Ordering) {
    if order.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        order
            .iter()
            .map(|(f, dir)| match dir {
                OrderDirection::Asc => cmp(a, b, *f),
                OrderDirection::Desc => cmp(b, a, *f),
            })
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

// ── Domains ───────────────────────────────────────────────────

#[derive(Default)]
struct DomainTable {
    rows: Vec<Stored<Domain>>,
    next_id: u64,
}

impl DomainTable {
    fn live_mut(&mut self, id: u64) -> Option<&mut Domain> {
        self.rows.iter_mut().find_map(|s| match s {
            Stored::Active(d) if d.id == id => Some(d),
            _ => None,
        })
    }

    fn name_taken(&self, name: &str, except: Option<u64>) -> bool {
        self.rows
            .iter()
            .filter_map(Stored::active)
            .any(|d| d.name == name && Some(d.id) != except)
    }
}

fn compare_domain(a: &Domain, b: &Domain, f: DomainField) -> Ordering {
    match f {
        DomainField::Id => a.id.cmp(&b.id),
        DomainField::Name => a.name.cmp(&b.name),
        DomainField::Status => a.status.as_i32().cmp(&b.status.as_i32()),
        DomainField::Memo => a.memo.cmp(&b.memo),
        DomainField::MaintainerId => a.maintainer_id.cmp(&b.maintainer_id),
        DomainField::CreatedAt => a.created_at.cmp(&b.created_at),
        DomainField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
    }
}

#[derive(Default)]
pub struct MemoryDomainStore {
    table: RwLock<DomainTable>,
}

impl MemoryDomainStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every row including soft-deleted ones, for audit views and tests.
    pub async fn all_rows(&self) -> Vec<Stored<Domain>> {
        self.table.read().await.rows.clone()
    }
}

#[async_trait]
impl DomainStore for MemoryDomainStore {
    async fn query(
        &self,
        params: &DomainQueryParam,
        opts: &QueryOptions,
    ) -> Result<QueryResult<Domain>> {
        let fields = DomainField::resolve(&opts.select_fields)?;
        let order = resolve_order(&opts.order_fields, DomainField::from_str)?;

        let table = self.table.read().await;
        let mut rows: Vec<Domain> = table
            .rows
            .iter()
            .filter_map(Stored::active)
            .filter(|d| params.matches(d))
            .cloned()
            .collect();
        drop(table);

        sort_rows(&mut rows, &order, compare_domain);
        let rows = rows
            .into_iter()
            .map(|d| DomainField::project(d, &fields))
            .collect();
        Ok(paginate(rows, &params.pagination))
    }

    async fn get(&self, id: u64) -> Result<Option<Domain>> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .iter()
            .filter_map(Stored::active)
            .find(|d| d.id == id)
            .cloned())
    }

    async fn create(&self, item: &Domain) -> Result<u64> {
        let mut table = self.table.write().await;
        if table.name_taken(&item.name, None) {
            return Err(HighwayError::Conflict(format!(
                "domain name '{}' already exists",
                item.name
            )));
        }
        table.next_id += 1;
        let now = Utc::now();
        let row = Domain {
            id: table.next_id,
            created_at: Some(now),
            updated_at: Some(now),
            ..item.clone()
        };
        let id = row.id;
        table.rows.push(Stored::Active(row));
        Ok(id)
    }

    async fn update(&self, id: u64, patch: &DomainPatch) -> Result<bool> {
        let mut table = self.table.write().await;
        if let Some(name) = &patch.name {
            if table.name_taken(name, Some(id)) {
                return Err(HighwayError::Conflict(format!(
                    "domain name '{name}' already exists"
                )));
            }
        }
        match table.live_mut(id) {
            Some(d) => {
                patch.apply_to(d);
                d.updated_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: u64) -> Result<bool> {
        let mut table = self.table.write().await;
        let Some(pos) = table
            .rows
            .iter()
            .position(|s| s.active().is_some_and(|d| d.id == id))
        else {
            return Ok(false);
        };
        let row = table.rows.remove(pos);
        if let Some(d) = row.into_active() {
            table.rows.insert(pos, Stored::Deleted(d, Utc::now()));
        }
        Ok(true)
    }

    async fn update_status(&self, id: u64, status: Status) -> Result<bool> {
        let mut table = self.table.write().await;
        match table.live_mut(id) {
            Some(d) => {
                d.status = status;
                d.updated_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ── Menus ─────────────────────────────────────────────────────

#[derive(Default)]
struct MenuTable {
    rows: BTreeMap<u64, Menu>,
    next_id: u64,
}

fn compare_menu(a: &Menu, b: &Menu, f: MenuField) -> Ordering {
    match f {
        MenuField::Id => a.id.cmp(&b.id),
        MenuField::Name => a.name.cmp(&b.name),
        MenuField::Sequence => a.sequence.cmp(&b.sequence),
        MenuField::Icon => a.icon.cmp(&b.icon),
        MenuField::Router => a.router.cmp(&b.router),
        MenuField::ParentId => a.parent_id.cmp(&b.parent_id),
        MenuField::ParentPath => a.parent_path.cmp(&b.parent_path),
        MenuField::Status => a.status.as_i32().cmp(&b.status.as_i32()),
        MenuField::Memo => a.memo.cmp(&b.memo),
        MenuField::CreatedAt => a.created_at.cmp(&b.created_at),
        MenuField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
    }
}

#[derive(Default)]
pub struct MemoryMenuStore {
    table: RwLock<MenuTable>,
}

impl MemoryMenuStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MenuStore for MemoryMenuStore {
    async fn query(
        &self,
        params: &MenuQueryParam,
        opts: &QueryOptions,
    ) -> Result<QueryResult<Menu>> {
        let fields = MenuField::resolve(&opts.select_fields)?;
        let order = resolve_order(&opts.order_fields, MenuField::from_str)?;

        let mut rows: Vec<Menu> = self
            .table
            .read()
            .await
            .rows
            .values()
            .filter(|m| params.matches(m))
            .cloned()
            .collect();
        sort_rows(&mut rows, &order, compare_menu);
        let rows = rows
            .into_iter()
            .map(|m| MenuField::project(m, &fields))
            .collect();
        Ok(paginate(rows, &params.pagination))
    }

    async fn get(&self, id: u64) -> Result<Option<Menu>> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn create(&self, item: &Menu) -> Result<u64> {
        let mut table = self.table.write().await;
        table.next_id += 1;
        let now = Utc::now();
        let row = Menu {
            id: table.next_id,
            created_at: Some(now),
            updated_at: Some(now),
            actions: Vec::new(),
            ..item.clone()
        };
        let id = row.id;
        table.rows.insert(id, row);
        Ok(id)
    }

    async fn update(&self, id: u64, patch: &MenuPatch) -> Result<bool> {
        let mut table = self.table.write().await;
        match table.rows.get_mut(&id) {
            Some(m) => {
                patch.apply_to(m);
                m.updated_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: u64) -> Result<bool> {
        Ok(self.table.write().await.rows.remove(&id).is_some())
    }

    async fn update_status(&self, id: u64, status: Status) -> Result<bool> {
        let mut table = self.table.write().await;
        match table.rows.get_mut(&id) {
            Some(m) => {
                m.status = status;
                m.updated_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.table.read().await.rows.len() as u64)
    }
}

// ── Menu actions ──────────────────────────────────────────────

#[derive(Default)]
struct MenuActionTable {
    rows: BTreeMap<u64, MenuAction>,
    next_id: u64,
}

fn compare_action(a: &MenuAction, b: &MenuAction, f: MenuActionField) -> Ordering {
    match f {
        MenuActionField::Id => a.id.cmp(&b.id),
        MenuActionField::MenuId => a.menu_id.cmp(&b.menu_id),
        MenuActionField::Code => a.code.cmp(&b.code),
        MenuActionField::Name => a.name.cmp(&b.name),
    }
}

#[derive(Default)]
pub struct MemoryMenuActionStore {
    table: RwLock<MenuActionTable>,
}

impl MemoryMenuActionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MenuActionStore for MemoryMenuActionStore {
    async fn query(
        &self,
        params: &MenuActionQueryParam,
        opts: &QueryOptions,
    ) -> Result<QueryResult<MenuAction>> {
        let fields = MenuActionField::resolve(&opts.select_fields)?;
        let order = resolve_order(&opts.order_fields, MenuActionField::from_str)?;

        let mut rows: Vec<MenuAction> = self
            .table
            .read()
            .await
            .rows
            .values()
            .filter(|a| params.matches(a))
            .cloned()
            .collect();
        sort_rows(&mut rows, &order, compare_action);
        let keep = |f: MenuActionField| fields.contains(&f);
        let rows = rows
            .into_iter()
            .map(|a| MenuAction {
                id: a.id,
                menu_id: if keep(MenuActionField::MenuId) { a.menu_id } else { 0 },
                code: if keep(MenuActionField::Code) { a.code } else { String::new() },
                name: if keep(MenuActionField::Name) { a.name } else { String::new() },
            })
            .collect();
        Ok(paginate(rows, &params.pagination))
    }

    async fn get(&self, id: u64) -> Result<Option<MenuAction>> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn create(&self, item: &MenuAction) -> Result<u64> {
        let mut table = self.table.write().await;
        table.next_id += 1;
        let row = MenuAction {
            id: table.next_id,
            ..item.clone()
        };
        let id = row.id;
        table.rows.insert(id, row);
        Ok(id)
    }

    async fn update_name(&self, id: u64, name: &str) -> Result<bool> {
        let mut table = self.table.write().await;
        match table.rows.get_mut(&id) {
            Some(a) => {
                a.name = name.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: u64) -> Result<bool> {
        Ok(self.table.write().await.rows.remove(&id).is_some())
    }

    async fn delete_by_menu(&self, menu_id: u64) -> Result<u64> {
        let mut table = self.table.write().await;
        let before = table.rows.len();
        table.rows.retain(|_, a| a.menu_id != menu_id);
        Ok((before - table.rows.len()) as u64)
    }
}

// ── Policy ────────────────────────────────────────────────────

#[derive(Default)]
struct PolicyTables {
    objects: BTreeMap<String, CreatorObject>,
    roles: BTreeMap<String, CreatorRole>,
    rules: BTreeSet<PolicyRule>,
    assignments: BTreeSet<RoleAssignment>,
}

#[derive(Default)]
pub struct MemoryPolicyStore {
    tables: RwLock<PolicyTables>,
}

impl MemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn upsert_object(&self, object: &CreatorObject) -> Result<bool> {
        let mut t = self.tables.write().await;
        Ok(t.objects
            .insert(object.name.clone(), object.clone())
            .is_none())
    }

    async fn upsert_role(&self, role: &CreatorRole) -> Result<bool> {
        let mut t = self.tables.write().await;
        Ok(t.roles.insert(role.name.clone(), role.clone()).is_none())
    }

    async fn upsert_rule(&self, role: &str, object: &str, action: &str) -> Result<bool> {
        let mut t = self.tables.write().await;
        Ok(t.rules.insert(PolicyRule::new(role, object, action)))
    }

    async fn assign_role(&self, assignment: &RoleAssignment) -> Result<bool> {
        Ok(self.tables.write().await.assignments.insert(assignment.clone()))
    }

    async fn revoke_role(&self, assignment: &RoleAssignment) -> Result<bool> {
        Ok(self.tables.write().await.assignments.remove(assignment))
    }

    async fn list_objects(&self) -> Result<Vec<CreatorObject>> {
        Ok(self.tables.read().await.objects.values().cloned().collect())
    }

    async fn list_roles(&self) -> Result<Vec<CreatorRole>> {
        Ok(self.tables.read().await.roles.values().cloned().collect())
    }

    async fn load_rules(&self) -> Result<PolicyRuleSet> {
        let t = self.tables.read().await;
        Ok(PolicyRuleSet {
            rules: t.rules.iter().cloned().collect(),
            assignments: t.assignments.iter().cloned().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn domain(name: &str) -> Domain {
        Domain {
            name: name.into(),
            status: Status::Enabled,
            ..Domain::default()
        }
    }

    #[tokio::test]
    async fn soft_deleted_domains_are_hidden_but_kept() {
        let store = MemoryDomainStore::new();
        let id = store.create(&domain("ops")).await.unwrap();
        assert!(store.delete(id).await.unwrap());

        assert_eq!(store.get(id).await.unwrap(), None);
        let q = store
            .query(&DomainQueryParam::default(), &QueryOptions::default())
            .await
            .unwrap();
        assert!(q.data.is_empty());

        let rows = store.all_rows().await;
        assert_eq!(rows.len(), 1);
        assert!(rows[0].deleted_at().is_some());
        assert!(!store.delete(id).await.unwrap(), "already deleted");
    }

    #[tokio::test]
    async fn name_can_be_reused_after_soft_delete() {
        let store = MemoryDomainStore::new();
        let id = store.create(&domain("ops")).await.unwrap();
        let dup = store.create(&domain("ops")).await.unwrap_err();
        assert!(matches!(dup, HighwayError::Conflict(_)));

        store.delete(id).await.unwrap();
        let again = store.create(&domain("ops")).await.unwrap();
        assert_ne!(again, id);
    }

    #[tokio::test]
    async fn rename_onto_live_name_conflicts() {
        let store = MemoryDomainStore::new();
        store.create(&domain("a")).await.unwrap();
        let b = store.create(&domain("b")).await.unwrap();
        let patch = DomainPatch {
            name: Some("a".into()),
            ..DomainPatch::default()
        };
        assert!(matches!(
            store.update(b, &patch).await,
            Err(HighwayError::Conflict(_))
        ));
        let patch = DomainPatch {
            memo: Some("kept".into()),
            ..DomainPatch::default()
        };
        assert!(store.update(b, &patch).await.unwrap());
        let got = store.get(b).await.unwrap().unwrap();
        assert_eq!(got.name, "b");
        assert_eq!(got.memo.as_deref(), Some("kept"));
    }

    #[tokio::test]
    async fn query_orders_pages_and_selects() {
        let store = MemoryDomainStore::new();
        for name in ["delta", "alpha", "charlie", "bravo"] {
            store.create(&domain(name)).await.unwrap();
        }

        let insertion = store
            .query(&DomainQueryParam::default(), &QueryOptions::default())
            .await
            .unwrap();
        assert_eq!(
            insertion.data.to_names(),
            vec!["delta", "alpha", "charlie", "bravo"]
        );

        let opts = QueryOptions {
            order_fields: vec![OrderField::new("name", OrderDirection::Desc)],
            select_fields: vec!["name".into()],
        };
        let params = DomainQueryParam {
            pagination: PaginationParam::page(1, 3),
            ..DomainQueryParam::default()
        };
        let page = store.query(&params, &opts).await.unwrap();
        assert_eq!(page.data.to_names(), vec!["delta", "charlie", "bravo"]);
        assert_eq!(page.total(), 4);
        assert!(page.data.iter().all(|d| d.created_at.is_none()));

        let bad = QueryOptions {
            order_fields: vec![OrderField::new("password", OrderDirection::Asc)],
            ..QueryOptions::default()
        };
        assert!(store.query(&params, &bad).await.is_err());
    }

    #[tokio::test]
    async fn id_list_filter_selects_any_listed() {
        let store = MemoryDomainStore::new();
        let a = store.create(&domain("a")).await.unwrap();
        store.create(&domain("b")).await.unwrap();
        let c = store.create(&domain("c")).await.unwrap();
        let params = DomainQueryParam {
            ids: vec![a, c, 999],
            ..DomainQueryParam::default()
        };
        let q = store.query(&params, &QueryOptions::default()).await.unwrap();
        assert_eq!(q.data.to_names(), vec!["a", "c"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn status_updates_are_atomic_for_readers() {
        let store = Arc::new(MemoryDomainStore::new());
        let mut ids = Vec::new();
        for i in 0..20 {
            ids.push(store.create(&domain(&format!("d{i}"))).await.unwrap());
        }

        let writer = {
            let store = Arc::clone(&store);
            let ids = ids.clone();
            tokio::spawn(async move {
                for round in 0..50 {
                    let status = if round % 2 == 0 {
                        Status::Disabled
                    } else {
                        Status::Enabled
                    };
                    for id in &ids {
                        store.update_status(*id, status).await.unwrap();
                    }
                }
            })
        };

        for _ in 0..50 {
            let q = store
                .query(&DomainQueryParam::default(), &QueryOptions::default())
                .await
                .unwrap();
            assert_eq!(q.data.len(), 20);
            for d in &q.data {
                assert!(matches!(d.status, Status::Enabled | Status::Disabled));
                assert!(d.updated_at >= d.created_at);
            }
        }
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn delete_by_menu_only_touches_that_menu() {
        let store = MemoryMenuActionStore::new();
        for (menu_id, code) in [(1, "add"), (1, "edit"), (2, "add")] {
            store
                .create(&MenuAction {
                    menu_id,
                    code: code.into(),
                    name: code.into(),
                    ..MenuAction::default()
                })
                .await
                .unwrap();
        }
        assert_eq!(store.delete_by_menu(1).await.unwrap(), 2);
        let left = store
            .query(&MenuActionQueryParam::default(), &QueryOptions::default())
            .await
            .unwrap();
        assert_eq!(left.data.len(), 1);
        assert_eq!(left.data[0].menu_id, 2);
    }

    #[tokio::test]
    async fn policy_upserts_report_new_rows_once() {
        let store = MemoryPolicyStore::new();
        let role = CreatorRole {
            name: "admin".into(),
            description: "first".into(),
        };
        assert!(store.upsert_role(&role).await.unwrap());
        let renamed = CreatorRole {
            description: "second".into(),
            ..role
        };
        assert!(!store.upsert_role(&renamed).await.unwrap());
        assert_eq!(store.list_roles().await.unwrap()[0].description, "second");

        assert!(store.upsert_rule("admin", "order", "GET").await.unwrap());
        assert!(!store.upsert_rule("admin", "order", "GET").await.unwrap());

        let a = RoleAssignment::new("42", "admin");
        assert!(store.assign_role(&a).await.unwrap());
        assert!(!store.assign_role(&a).await.unwrap());
        assert!(store.revoke_role(&a).await.unwrap());
        assert!(store.load_rules().await.unwrap().assignments.is_empty());
    }
}
