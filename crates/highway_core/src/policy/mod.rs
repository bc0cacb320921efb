//! Authorization core: bootstrap loader, policy engine, seeding and the
//! runtime that binds the engine to its durable store.

pub mod bootstrap;
pub mod engine;
pub mod seed;

use std::sync::Arc;

use tracing::info;

use crate::error::HighwayError;
use crate::ports::PolicyStore;

use bootstrap::DefaultPolicy;
use engine::{PolicyEngine, PolicyRuleSet, RoleAssignment};
use seed::SeedReport;

/// Owns the shared engine and the store behind it. Request workers only ever
/// hold the engine; mutations go through here and end with a reload.
#[derive(Clone)]
pub struct PolicyRuntime {
    engine: Arc<dyn PolicyEngine>,
    store: Arc<dyn PolicyStore>,
}

impl PolicyRuntime {
    pub fn new(engine: Arc<dyn PolicyEngine>, store: Arc<dyn PolicyStore>) -> Self {
        Self { engine, store }
    }

    pub fn engine(&self) -> Arc<dyn PolicyEngine> {
        Arc::clone(&self.engine)
    }

    pub fn store(&self) -> &dyn PolicyStore {
        self.store.as_ref()
    }

    /// Seed the store from a default policy, then refresh the engine.
    pub async fn seed(&self, policy: &DefaultPolicy) -> Result<SeedReport, HighwayError> {
        let report = seed::seed_default_policy(self.store.as_ref(), policy).await?;
        self.reload().await?;
        Ok(report)
    }

    /// Pull the full rule set from the store into the engine.
    pub async fn reload(&self) -> Result<PolicyRuleSet, HighwayError> {
        let rules = self.store.load_rules().await?;
        self.engine.load(rules.clone())?;
        info!(
            rules = rules.rules.len(),
            assignments = rules.assignments.len(),
            "Policy engine loaded"
        );
        Ok(rules)
    }

    /// Assign `subject` to `role`. The role must exist in the store.
    pub async fn assign_role(&self, subject: &str, role: &str) -> Result<bool, HighwayError> {
        if subject.is_empty() {
            return Err(HighwayError::InvalidInput("subject must not be empty".into()));
        }
        let known = self.store.list_roles().await?;
        if !known.iter().any(|r| r.name == role) {
            return Err(HighwayError::NotFound(format!("role '{role}'")));
        }
        let inserted = self
            .store
            .assign_role(&RoleAssignment::new(subject, role))
            .await?;
        self.reload().await?;
        Ok(inserted)
    }

    pub async fn revoke_role(&self, subject: &str, role: &str) -> Result<bool, HighwayError> {
        let removed = self
            .store
            .revoke_role(&RoleAssignment::new(subject, role))
            .await?;
        self.reload().await?;
        Ok(removed)
    }
}
