//! Seeding: validate a `DefaultPolicy` and write it through a `PolicyStore`.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::HighwayError;
use crate::ports::PolicyStore;

use super::bootstrap::DefaultPolicy;

/// Counts of rows newly inserted by one seeding run. A re-run against an
/// already-seeded store reports zeros.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub objects: usize,
    pub roles: usize,
    pub rules: usize,
}

impl SeedReport {
    pub fn is_noop(&self) -> bool {
        self.objects == 0 && self.roles == 0 && self.rules == 0
    }
}

/// Check that names are non-empty and that every policy references a declared
/// object and role. All problems are reported at once.
pub fn validate(policy: &DefaultPolicy) -> Result<(), HighwayError> {
    let mut problems = Vec::new();

    let objects: HashSet<&str> = policy.objects().iter().map(|o| o.name.as_str()).collect();
    let roles: HashSet<&str> = policy.roles().iter().map(|r| r.name.as_str()).collect();

    if objects.contains("") {
        problems.push("creator_object with empty name".to_string());
    }
    if roles.contains("") {
        problems.push("creator_role with empty name".to_string());
    }

    for (i, p) in policy.policies().iter().enumerate() {
        if !objects.contains(p.object.as_str()) {
            problems.push(format!(
                "creator_policy[{i}] references unknown object '{}'",
                p.object
            ));
        }
        if !roles.contains(p.role.as_str()) {
            problems.push(format!(
                "creator_policy[{i}] references unknown role '{}'",
                p.role
            ));
        }
        if p.action.iter().any(|a| a.is_empty()) {
            problems.push(format!("creator_policy[{i}] has an empty action"));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(HighwayError::InvalidInput(problems.join("; ")))
    }
}

/// Validate, then upsert objects, roles and one rule per action.
/// Nothing is written when validation fails.
pub async fn seed_default_policy(
    store: &dyn PolicyStore,
    policy: &DefaultPolicy,
) -> Result<SeedReport, HighwayError> {
    validate(policy)?;

    let mut report = SeedReport::default();
    for object in policy.objects() {
        if store.upsert_object(object).await? {
            report.objects += 1;
        }
    }
    for role in policy.roles() {
        if store.upsert_role(role).await? {
            report.roles += 1;
        }
    }
    for p in policy.policies() {
        for action in &p.action {
            if store.upsert_rule(&p.role, &p.object, action).await? {
                debug!(role = %p.role, object = %p.object, action = %action, "Seeded rule");
                report.rules += 1;
            }
        }
    }

    info!(
        objects = report.objects,
        roles = report.roles,
        rules = report.rules,
        "Default policy seeded"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryPolicyStore;
    use crate::policy::bootstrap::{CreatorObject, CreatorPolicy, CreatorRole};

    fn scenario() -> DefaultPolicy {
        DefaultPolicy {
            creator_object: vec![CreatorObject {
                name: "order".into(),
                object_type: "resource".into(),
                description: String::new(),
            }],
            creator_role: vec![CreatorRole {
                name: "admin".into(),
                description: String::new(),
            }],
            creator_policy: vec![CreatorPolicy {
                object: "order".into(),
                role: "admin".into(),
                action: vec!["GET".into(), "POST".into()],
            }],
        }
    }

    #[tokio::test]
    async fn seeding_twice_is_idempotent() {
        let store = MemoryPolicyStore::new();
        let first = seed_default_policy(&store, &scenario()).await.unwrap();
        assert_eq!(
            first,
            SeedReport {
                objects: 1,
                roles: 1,
                rules: 2
            }
        );

        let second = seed_default_policy(&store, &scenario()).await.unwrap();
        assert!(second.is_noop());
        assert_eq!(store.load_rules().await.unwrap().rules.len(), 2);
    }

    #[tokio::test]
    async fn dangling_references_write_nothing() {
        let mut policy = scenario();
        policy.creator_policy.push(CreatorPolicy {
            object: "invoice".into(),
            role: "clerk".into(),
            action: vec!["GET".into()],
        });
        let store = MemoryPolicyStore::new();
        let err = seed_default_policy(&store, &policy).await.unwrap_err();
        match err {
            HighwayError::InvalidInput(msg) => {
                assert!(msg.contains("unknown object 'invoice'"));
                assert!(msg.contains("unknown role 'clerk'"));
            }
            other => panic!("expected InvalidInput, got {other:?}"),
        }
        assert!(store.list_objects().await.unwrap().is_empty());
        assert!(store.load_rules().await.unwrap().rules.is_empty());
    }

    #[test]
    fn empty_names_are_rejected() {
        let mut policy = scenario();
        policy.creator_role.push(CreatorRole::default());
        assert!(validate(&policy).is_err());
    }

    #[test]
    fn empty_policy_is_valid() {
        assert!(validate(&DefaultPolicy::default()).is_ok());
    }
}
