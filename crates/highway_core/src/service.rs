//! Entity services: input validation and invariants that sit above the stores.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::HighwayError;
use crate::ports::{DomainStore, MenuActionStore, MenuStore};
use crate::types::*;

fn require_name(name: &str, what: &str) -> Result<(), HighwayError> {
    if name.trim().is_empty() {
        return Err(HighwayError::InvalidInput(format!("{what} name must not be empty")));
    }
    Ok(())
}

fn require_code(code: &str) -> Result<(), HighwayError> {
    if code.trim().is_empty() {
        return Err(HighwayError::InvalidInput("action code must not be empty".into()));
    }
    Ok(())
}

/// Every action of one menu needs a code and a name; codes may not repeat.
fn check_actions<'a>(
    menu: &str,
    actions: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Result<(), HighwayError> {
    let mut seen = HashSet::new();
    for (code, name) in actions {
        require_code(code)?;
        require_name(name, "action")?;
        if !seen.insert(code) {
            return Err(HighwayError::InvalidInput(format!(
                "menu '{menu}' lists action '{code}' more than once"
            )));
        }
    }
    Ok(())
}

// ── Domains ───────────────────────────────────────────────────

#[derive(Clone)]
pub struct DomainService {
    store: Arc<dyn DomainStore>,
}

impl DomainService {
    pub fn new(store: Arc<dyn DomainStore>) -> Self {
        Self { store }
    }

    pub async fn query(
        &self,
        params: &DomainQueryParam,
        opts: &QueryOptions,
    ) -> Result<QueryResult<Domain>, HighwayError> {
        self.store.query(params, opts).await
    }

    pub async fn get(&self, id: u64) -> Result<Domain, HighwayError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| HighwayError::NotFound(format!("domain {id}")))
    }

    pub async fn create(&self, item: Domain) -> Result<Domain, HighwayError> {
        require_name(&item.name, "domain")?;
        let id = self.store.create(&item).await?;
        info!(id, name = %item.name, "Domain created");
        self.get(id).await
    }

    pub async fn update(&self, id: u64, patch: DomainPatch) -> Result<Domain, HighwayError> {
        if let Some(name) = &patch.name {
            require_name(name, "domain")?;
        }
        if !patch.is_empty() && !self.store.update(id, &patch).await? {
            return Err(HighwayError::NotFound(format!("domain {id}")));
        }
        self.get(id).await
    }

    pub async fn delete(&self, id: u64) -> Result<(), HighwayError> {
        if !self.store.delete(id).await? {
            return Err(HighwayError::NotFound(format!("domain {id}")));
        }
        info!(id, "Domain soft-deleted");
        Ok(())
    }

    pub async fn update_status(&self, id: u64, status: Status) -> Result<(), HighwayError> {
        if !self.store.update_status(id, status).await? {
            return Err(HighwayError::NotFound(format!("domain {id}")));
        }
        Ok(())
    }
}

// ── Menus ─────────────────────────────────────────────────────

/// One node of a menu seed file.
#[derive(Debug, Clone, Deserialize)]
pub struct MenuSeed {
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub router: Option<String>,
    #[serde(default)]
    pub sequence: i32,
    #[serde(default)]
    pub actions: Vec<MenuActionSeed>,
    #[serde(default)]
    pub children: Vec<MenuSeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MenuActionSeed {
    pub code: String,
    pub name: String,
}

/// Reject a seed tree that could only be written in part.
fn check_seeds(seeds: &[MenuSeed]) -> Result<(), HighwayError> {
    for seed in seeds {
        require_name(&seed.name, "menu")?;
        check_actions(
            &seed.name,
            seed.actions.iter().map(|a| (a.code.as_str(), a.name.as_str())),
        )?;
        check_seeds(&seed.children)?;
    }
    Ok(())
}

#[derive(Clone)]
pub struct MenuService {
    menus: Arc<dyn MenuStore>,
    actions: Arc<dyn MenuActionStore>,
}

impl MenuService {
    pub fn new(menus: Arc<dyn MenuStore>, actions: Arc<dyn MenuActionStore>) -> Self {
        Self { menus, actions }
    }

    pub async fn query(
        &self,
        params: &MenuQueryParam,
        opts: &QueryOptions,
    ) -> Result<QueryResult<Menu>, HighwayError> {
        self.menus.query(params, opts).await
    }

    /// A menu with its actions attached.
    pub async fn get(&self, id: u64) -> Result<Menu, HighwayError> {
        let mut menu = self
            .menus
            .get(id)
            .await?
            .ok_or_else(|| HighwayError::NotFound(format!("menu {id}")))?;
        menu.actions = self.list_actions(id).await?;
        Ok(menu)
    }

    /// Create a menu with its actions. Nothing is left behind on failure.
    pub async fn create(&self, item: Menu) -> Result<Menu, HighwayError> {
        require_name(&item.name, "menu")?;
        check_actions(
            &item.name,
            item.actions.iter().map(|a| (a.code.as_str(), a.name.as_str())),
        )?;
        let parent_path = match item.parent_id {
            Some(pid) => {
                let parent = self
                    .menus
                    .get(pid)
                    .await?
                    .ok_or_else(|| HighwayError::InvalidInput(format!("parent menu {pid} not found")))?;
                join_parent_path(&parent.parent_path, parent.id)
            }
            None => String::new(),
        };
        let actions = item.actions.clone();
        let id = self
            .menus
            .create(&Menu {
                parent_path,
                ..item
            })
            .await?;
        for a in actions {
            if let Err(e) = self.create_action(id, &a.code, &a.name).await {
                self.discard(&[id]).await;
                return Err(e);
            }
        }
        self.get(id).await
    }

    /// Best-effort removal of menus written by a failed create or seed,
    /// newest first.
    async fn discard(&self, ids: &[u64]) {
        for &id in ids.iter().rev() {
            let removed = match self.actions.delete_by_menu(id).await {
                Ok(_) => self.menus.delete(id).await,
                Err(e) => Err(e),
            };
            if let Err(e) = removed {
                warn!(menu_id = id, error = %e, "Failed to roll back menu");
            }
        }
    }

    pub async fn update(&self, id: u64, patch: MenuPatch) -> Result<Menu, HighwayError> {
        if let Some(name) = &patch.name {
            require_name(name, "menu")?;
        }
        if !self.menus.update(id, &patch).await? {
            return Err(HighwayError::NotFound(format!("menu {id}")));
        }
        self.get(id).await
    }

    /// Delete a menu and its actions. Menus with children cannot be deleted.
    pub async fn delete(&self, id: u64) -> Result<(), HighwayError> {
        let children = self
            .menus
            .query(
                &MenuQueryParam {
                    pagination: PaginationParam {
                        only_count: true,
                        ..PaginationParam::default()
                    },
                    parent_id: Some(id),
                    ..MenuQueryParam::default()
                },
                &QueryOptions::default(),
            )
            .await?;
        if children.total() > 0 {
            return Err(HighwayError::Conflict(format!(
                "menu {id} still has {} child menu(s)",
                children.total()
            )));
        }
        self.actions.delete_by_menu(id).await?;
        if !self.menus.delete(id).await? {
            return Err(HighwayError::NotFound(format!("menu {id}")));
        }
        Ok(())
    }

    pub async fn update_status(&self, id: u64, status: Status) -> Result<(), HighwayError> {
        if !self.menus.update_status(id, status).await? {
            return Err(HighwayError::NotFound(format!("menu {id}")));
        }
        Ok(())
    }

    pub async fn list_actions(&self, menu_id: u64) -> Result<Vec<MenuAction>, HighwayError> {
        let opts = QueryOptions {
            order_fields: vec![OrderField::new("id", OrderDirection::Asc)],
            ..QueryOptions::default()
        };
        Ok(self
            .actions
            .query(&MenuActionQueryParam::for_menu(menu_id), &opts)
            .await?
            .data)
    }

    /// Add an action; `(menu_id, code)` must be unique within the menu.
    pub async fn create_action(
        &self,
        menu_id: u64,
        code: &str,
        name: &str,
    ) -> Result<MenuAction, HighwayError> {
        require_code(code)?;
        require_name(name, "action")?;
        if self.menus.get(menu_id).await?.is_none() {
            return Err(HighwayError::NotFound(format!("menu {menu_id}")));
        }
        let existing = self
            .actions
            .query(
                &MenuActionQueryParam {
                    code: Some(code.to_string()),
                    ..MenuActionQueryParam::for_menu(menu_id)
                },
                &QueryOptions::default(),
            )
            .await?;
        if !existing.data.is_empty() {
            return Err(HighwayError::Conflict(format!(
                "menu {menu_id} already has action '{code}'"
            )));
        }
        let item = MenuAction {
            id: 0,
            menu_id,
            code: code.to_string(),
            name: name.to_string(),
        };
        let id = self.actions.create(&item).await?;
        Ok(MenuAction { id, ..item })
    }

    /// Rename an action. A differing `code` is rejected: codes are immutable.
    pub async fn update_action(
        &self,
        menu_id: u64,
        action_id: u64,
        code: Option<&str>,
        name: &str,
    ) -> Result<MenuAction, HighwayError> {
        require_name(name, "action")?;
        let current = self.action_of(menu_id, action_id).await?;
        if let Some(code) = code {
            if code != current.code {
                return Err(HighwayError::InvalidInput(format!(
                    "action code '{}' is immutable",
                    current.code
                )));
            }
        }
        if !self.actions.update_name(action_id, name).await? {
            return Err(HighwayError::NotFound(format!(
                "action {action_id} of menu {menu_id}"
            )));
        }
        Ok(MenuAction {
            name: name.to_string(),
            ..current
        })
    }

    pub async fn delete_action(&self, menu_id: u64, action_id: u64) -> Result<(), HighwayError> {
        self.action_of(menu_id, action_id).await?;
        self.actions.delete(action_id).await?;
        Ok(())
    }

    async fn action_of(&self, menu_id: u64, action_id: u64) -> Result<MenuAction, HighwayError> {
        self.actions
            .get(action_id)
            .await?
            .filter(|a| a.menu_id == menu_id)
            .ok_or_else(|| HighwayError::NotFound(format!("action {action_id} of menu {menu_id}")))
    }

    /// Seed the menu tree from a YAML file. Skipped when any menu exists.
    /// The whole tree is checked before the first write, and a failed seed
    /// removes what it created. Returns the number of menus created.
    pub async fn init_data(&self, path: impl AsRef<Path>) -> Result<usize, HighwayError> {
        let path = path.as_ref();
        if self.menus.count().await? > 0 {
            info!(path = %path.display(), "Menus already present, skipping menu seed");
            return Ok(0);
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let seeds: Vec<MenuSeed> = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        check_seeds(&seeds)?;

        let mut created = Vec::new();
        let mut stack: Vec<(Option<u64>, MenuSeed)> =
            seeds.into_iter().rev().map(|s| (None, s)).collect();
        while let Some((parent_id, seed)) = stack.pop() {
            let menu = match self
                .create(Menu {
                    name: seed.name,
                    icon: seed.icon,
                    router: seed.router,
                    sequence: seed.sequence,
                    parent_id,
                    status: Status::Enabled,
                    actions: seed
                        .actions
                        .into_iter()
                        .map(|a| MenuAction {
                            code: a.code,
                            name: a.name,
                            ..MenuAction::default()
                        })
                        .collect(),
                    ..Menu::default()
                })
                .await
            {
                Ok(menu) => menu,
                Err(e) => {
                    self.discard(&created).await;
                    return Err(e);
                }
            };
            created.push(menu.id);
            stack.extend(seed.children.into_iter().rev().map(|c| (Some(menu.id), c)));
        }
        info!(path = %path.display(), menus = created.len(), "Menu data initialised");
        Ok(created.len())
    }
}
