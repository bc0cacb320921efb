//! In-memory RBAC policy engine.
//!
//! Requests are `(subject, object, action)` triples. A request is allowed when
//! the subject, or any role reachable from it through role assignments, holds
//! a rule whose object pattern matches the object and whose action matches the
//! action. Evaluation reads only the in-memory rule cache.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::HighwayError;

/// Role hierarchies deeper than this are cut off during evaluation.
pub const MAX_ROLE_DEPTH: usize = 10;

/// Wildcard accepted in the action position of a rule.
pub const ANY_ACTION: &str = "*";

/// A permission grant: `subject` (usually a role) may perform `action` on
/// objects matching `object`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolicyRule {
    pub subject: String,
    pub object: String,
    pub action: String,
}

impl PolicyRule {
    pub fn new(
        subject: impl Into<String>,
        object: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            object: object.into(),
            action: action.into(),
        }
    }
}

/// Grouping: `subject` inherits every grant of `role`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub subject: String,
    pub role: String,
}

impl RoleAssignment {
    pub fn new(subject: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            role: role.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRuleSet {
    pub rules: Vec<PolicyRule>,
    pub assignments: Vec<RoleAssignment>,
}

/// Decision function consulted by the enforcement gate. One instance is shared
/// by every request worker.
pub trait PolicyEngine: Send + Sync {
    fn enforce(&self, subject: &str, object: &str, action: &str) -> Result<bool, HighwayError>;

    /// Replace the whole rule set. Readers see either the old or the new set.
    fn load(&self, rules: PolicyRuleSet) -> Result<(), HighwayError>;

    fn rules(&self) -> Result<PolicyRuleSet, HighwayError>;
}

#[derive(Default)]
struct Compiled {
    grants: HashMap<String, Vec<(String, String)>>,
    parents: HashMap<String, Vec<String>>,
    source: PolicyRuleSet,
}

impl Compiled {
    fn build(mut source: PolicyRuleSet) -> Self {
        source.rules.sort();
        source.rules.dedup();
        source.assignments.sort();
        source.assignments.dedup();

        let mut grants: HashMap<String, Vec<(String, String)>> = HashMap::new();
        for r in &source.rules {
            grants
                .entry(r.subject.clone())
                .or_default()
                .push((r.object.clone(), r.action.clone()));
        }
        let mut parents: HashMap<String, Vec<String>> = HashMap::new();
        for a in &source.assignments {
            parents
                .entry(a.subject.clone())
                .or_default()
                .push(a.role.clone());
        }
        Self {
            grants,
            parents,
            source,
        }
    }

    /// The subject itself plus every role reachable from it, breadth first.
    fn principals<'a>(&'a self, subject: &'a str) -> Vec<&'a str> {
        let mut seen: HashSet<&str> = HashSet::from([subject]);
        let mut out = vec![subject];
        let mut queue = VecDeque::from([(subject, 0usize)]);
        while let Some((current, depth)) = queue.pop_front() {
            if depth >= MAX_ROLE_DEPTH {
                continue;
            }
            for role in self.parents.get(current).into_iter().flatten() {
                if seen.insert(role.as_str()) {
                    out.push(role.as_str());
                    queue.push_back((role.as_str(), depth + 1));
                }
            }
        }
        out
    }

    fn allows(&self, subject: &str, object: &str, action: &str) -> bool {
        self.principals(subject).into_iter().any(|p| {
            self.grants.get(p).is_some_and(|grants| {
                grants
                    .iter()
                    .any(|(pattern, act)| key_match(object, pattern) && action_match(action, act))
            })
        })
    }
}

/// In-memory engine guarded by a read-write lock; reloads swap the compiled
/// rule set in one write.
#[derive(Default)]
pub struct RbacEngine {
    inner: RwLock<Compiled>,
}

impl RbacEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: PolicyRuleSet) -> Self {
        Self {
            inner: RwLock::new(Compiled::build(rules)),
        }
    }
}

impl PolicyEngine for RbacEngine {
    fn enforce(&self, subject: &str, object: &str, action: &str) -> Result<bool, HighwayError> {
        let compiled = self
            .inner
            .read()
            .map_err(|_| HighwayError::EnforcementFailure("policy engine lock poisoned".into()))?;
        Ok(compiled.allows(subject, object, action))
    }

    fn load(&self, rules: PolicyRuleSet) -> Result<(), HighwayError> {
        let compiled = Compiled::build(rules);
        let mut guard = self
            .inner
            .write()
            .map_err(|_| HighwayError::EnforcementFailure("policy engine lock poisoned".into()))?;
        *guard = compiled;
        Ok(())
    }

    fn rules(&self) -> Result<PolicyRuleSet, HighwayError> {
        let compiled = self
            .inner
            .read()
            .map_err(|_| HighwayError::EnforcementFailure("policy engine lock poisoned".into()))?;
        Ok(compiled.source.clone())
    }
}

/// Match a request object against a rule pattern.
///
/// Segments are `/`-separated. `:name` matches exactly one non-empty segment.
/// A segment ending in `*` matches one segment starting with its prefix; in
/// the last position it also swallows everything after that segment. The
/// object must still have a segment there, so `/a/*` does not match `/a`
/// while `/a*` does.
pub fn key_match(object: &str, pattern: &str) -> bool {
    if object == pattern {
        return true;
    }
    let mut pattern_segs = pattern.split('/').peekable();
    let mut object_segs = object.split('/');
    loop {
        match (pattern_segs.next(), object_segs.next()) {
            (None, None) => return true,
            (Some(p), Some(o)) if p.ends_with('*') => {
                if !o.starts_with(&p[..p.len() - 1]) {
                    return false;
                }
                if pattern_segs.peek().is_none() {
                    return true;
                }
            }
            (Some(p), Some(o)) => {
                if p.starts_with(':') {
                    if o.is_empty() {
                        return false;
                    }
                } else if p != o {
                    return false;
                }
            }
            _ => return false,
        }
    }
}

pub fn action_match(action: &str, pattern: &str) -> bool {
    pattern == ANY_ACTION || pattern == action
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> RbacEngine {
        RbacEngine::with_rules(PolicyRuleSet {
            rules: vec![
                PolicyRule::new("admin", "order", "GET"),
                PolicyRule::new("admin", "order", "POST"),
                PolicyRule::new("auditor", "/api/v1/domains*", "GET"),
                PolicyRule::new("operator", "/api/v1/menus/:id", "*"),
            ],
            assignments: vec![
                RoleAssignment::new("42", "admin"),
                RoleAssignment::new("admin", "auditor"),
                RoleAssignment::new("9", "operator"),
            ],
        })
    }

    #[test]
    fn role_member_is_allowed_granted_actions_only() {
        let e = scenario();
        assert!(e.enforce("42", "order", "GET").unwrap());
        assert!(e.enforce("42", "order", "POST").unwrap());
        assert!(!e.enforce("42", "order", "DELETE").unwrap());
        assert!(!e.enforce("7", "order", "GET").unwrap());
    }

    #[test]
    fn inherited_roles_grant_transitively() {
        let e = scenario();
        assert!(e.enforce("42", "/api/v1/domains", "GET").unwrap());
        assert!(e.enforce("42", "/api/v1/domains/3", "GET").unwrap());
        assert!(!e.enforce("42", "/api/v1/domains/3", "PUT").unwrap());
    }

    #[test]
    fn parameter_segments_and_action_wildcard() {
        let e = scenario();
        assert!(e.enforce("9", "/api/v1/menus/5", "DELETE").unwrap());
        assert!(!e.enforce("9", "/api/v1/menus", "GET").unwrap());
        assert!(!e.enforce("9", "/api/v1/menus/5/actions", "GET").unwrap());
    }

    #[test]
    fn role_cycles_terminate() {
        let e = RbacEngine::with_rules(PolicyRuleSet {
            rules: vec![PolicyRule::new("b", "x", "GET")],
            assignments: vec![
                RoleAssignment::new("a", "b"),
                RoleAssignment::new("b", "a"),
            ],
        });
        assert!(e.enforce("a", "x", "GET").unwrap());
        assert!(!e.enforce("a", "y", "GET").unwrap());
    }

    #[test]
    fn hierarchy_deeper_than_limit_is_cut_off() {
        let assignments: Vec<RoleAssignment> = (0..=MAX_ROLE_DEPTH)
            .map(|i| RoleAssignment::new(format!("r{i}"), format!("r{}", i + 1)))
            .collect();
        let top = format!("r{}", MAX_ROLE_DEPTH + 1);
        let e = RbacEngine::with_rules(PolicyRuleSet {
            rules: vec![
                PolicyRule::new(top, "deep", "GET"),
                PolicyRule::new(format!("r{MAX_ROLE_DEPTH}"), "shallow", "GET"),
            ],
            assignments,
        });
        assert!(e.enforce("r0", "shallow", "GET").unwrap());
        assert!(!e.enforce("r0", "deep", "GET").unwrap());
    }

    #[test]
    fn decisions_are_deterministic() {
        let e = scenario();
        let first: Vec<bool> = (0..50)
            .map(|_| e.enforce("42", "order", "GET").unwrap())
            .collect();
        assert!(first.iter().all(|b| *b));
    }

    #[test]
    fn load_replaces_rule_set() {
        let e = scenario();
        e.load(PolicyRuleSet::default()).unwrap();
        assert!(!e.enforce("42", "order", "GET").unwrap());
        assert!(e.rules().unwrap().rules.is_empty());
    }

    #[test]
    fn rules_snapshot_is_sorted_and_deduplicated() {
        let e = RbacEngine::with_rules(PolicyRuleSet {
            rules: vec![
                PolicyRule::new("b", "x", "GET"),
                PolicyRule::new("a", "x", "GET"),
                PolicyRule::new("b", "x", "GET"),
            ],
            assignments: vec![],
        });
        let rules = e.rules().unwrap().rules;
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].subject, "a");
    }

    #[test]
    fn key_match_cases() {
        assert!(key_match("order", "order"));
        assert!(key_match("/api/v1/domains/7", "/api/v1/domains/:id"));
        assert!(!key_match("/api/v1/domains/", "/api/v1/domains/:id"));
        assert!(key_match("/api/v1/domains/7/enable", "/api/v1/domains/*"));
        assert!(key_match("/api/v1/domainsX", "/api/v1/domains*"));
        assert!(key_match("/anything/at/all", "*"));
        assert!(!key_match("/api/v2/domains", "/api/v1/*"));
        assert!(!key_match("order", "orders"));
    }

    #[test]
    fn star_only_swallows_the_tail_in_last_position() {
        assert!(!key_match("/api/x/secrets", "/api/*/items"));
        assert!(key_match("/api/x/items", "/api/*/items"));
        assert!(!key_match("/api/x/y/items", "/api/*/items"));
        assert!(key_match("/api/v7/items", "/api/v*/items"));
        assert!(!key_match("/api/w7/items", "/api/v*/items"));
        assert!(!key_match("/api/v1/domains", "/api/v1/domains/*"));
        assert!(key_match("/api/v1/domains/", "/api/v1/domains/*"));
        assert!(key_match("/api/v1/domains", "/api/v1/domains*"));
    }
}
