//! Storage port traits.
//! Implemented by highway_postgres (and `memory` for tests); core logic
//! depends only on these traits.

use async_trait::async_trait;

use crate::error::HighwayError;
use crate::policy::bootstrap::{CreatorObject, CreatorRole};
use crate::policy::engine::{PolicyRuleSet, RoleAssignment};
use crate::types::*;

pub type Result<T> = std::result::Result<T, HighwayError>;

/// Persistence for domains. Soft-deleted rows are invisible to `query` and
/// `get`; name uniqueness only holds among rows that are not deleted.
#[async_trait]
pub trait DomainStore: Send + Sync {
    async fn query(
        &self,
        params: &DomainQueryParam,
        opts: &QueryOptions,
    ) -> Result<QueryResult<Domain>>;

    /// `Ok(None)` means not found; it is not an error.
    async fn get(&self, id: u64) -> Result<Option<Domain>>;

    /// Insert a new domain and return its assigned id.
    async fn create(&self, item: &Domain) -> Result<u64>;

    /// Apply the non-empty fields of `patch`. Returns false if no live row matched.
    async fn update(&self, id: u64, patch: &DomainPatch) -> Result<bool>;

    /// Soft delete. Returns false if no live row matched.
    async fn delete(&self, id: u64) -> Result<bool>;

    async fn update_status(&self, id: u64, status: Status) -> Result<bool>;
}

#[async_trait]
pub trait MenuStore: Send + Sync {
    async fn query(&self, params: &MenuQueryParam, opts: &QueryOptions)
        -> Result<QueryResult<Menu>>;

    async fn get(&self, id: u64) -> Result<Option<Menu>>;

    async fn create(&self, item: &Menu) -> Result<u64>;

    async fn update(&self, id: u64, patch: &MenuPatch) -> Result<bool>;

    /// Removes the menu row only; actions are removed by the caller.
    async fn delete(&self, id: u64) -> Result<bool>;

    async fn update_status(&self, id: u64, status: Status) -> Result<bool>;

    async fn count(&self) -> Result<u64>;
}

#[async_trait]
pub trait MenuActionStore: Send + Sync {
    async fn query(
        &self,
        params: &MenuActionQueryParam,
        opts: &QueryOptions,
    ) -> Result<QueryResult<MenuAction>>;

    async fn get(&self, id: u64) -> Result<Option<MenuAction>>;

    async fn create(&self, item: &MenuAction) -> Result<u64>;

    /// Only the name is mutable; the code is fixed at creation.
    async fn update_name(&self, id: u64, name: &str) -> Result<bool>;

    async fn delete(&self, id: u64) -> Result<bool>;

    async fn delete_by_menu(&self, menu_id: u64) -> Result<u64>;
}

/// Durable policy storage. Every write is an upsert by natural key, so
/// seeding can run against an already-seeded store.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Returns true if a new row was inserted.
    async fn upsert_object(&self, object: &CreatorObject) -> Result<bool>;

    async fn upsert_role(&self, role: &CreatorRole) -> Result<bool>;

    /// Natural key is `(role, object, action)`.
    async fn upsert_rule(&self, role: &str, object: &str, action: &str) -> Result<bool>;

    async fn assign_role(&self, assignment: &RoleAssignment) -> Result<bool>;

    async fn revoke_role(&self, assignment: &RoleAssignment) -> Result<bool>;

    async fn list_objects(&self) -> Result<Vec<CreatorObject>>;

    async fn list_roles(&self) -> Result<Vec<CreatorRole>>;

    /// Everything the policy engine needs, in its shape.
    async fn load_rules(&self) -> Result<PolicyRuleSet>;
}
