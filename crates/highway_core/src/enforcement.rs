//! Request-time enforcement gate.
//!
//! Maps `(subject, resource path, method)` onto allow / `NoPermission` /
//! `EnforcementFailure`. Any engine error is a denial; the gate never fails open.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::HighwayError;
use crate::policy::engine::PolicyEngine;

/// Route predicate `(path, method) -> skip`. Evaluated before subject extraction.
pub type Skipper = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// Skip every request whose path starts with one of `prefixes`.
pub fn allow_path_prefix_skipper<I, S>(prefixes: I) -> Skipper
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let prefixes: Vec<String> = prefixes.into_iter().map(Into::into).collect();
    Arc::new(move |path, _method| prefixes.iter().any(|p| path.starts_with(p.as_str())))
}

/// Skip requests with one of the given methods (e.g. `OPTIONS` preflight).
pub fn allow_method_skipper<I, S>(methods: I) -> Skipper
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let methods: Vec<String> = methods.into_iter().map(Into::into).collect();
    Arc::new(move |_path, method| methods.iter().any(|m| m.eq_ignore_ascii_case(method)))
}

/// How a request got past the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Enforcement is switched off.
    Disabled,
    /// A skip predicate matched; no subject lookup happened.
    Skipped,
    /// The policy engine allowed the request.
    Allowed,
}

#[derive(Clone)]
pub struct EnforcementGate {
    engine: Arc<dyn PolicyEngine>,
    enabled: bool,
    skippers: Vec<Skipper>,
}

impl fmt::Debug for EnforcementGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnforcementGate")
            .field("enabled", &self.enabled)
            .field("skippers", &self.skippers.len())
            .finish()
    }
}

impl EnforcementGate {
    pub fn new(engine: Arc<dyn PolicyEngine>) -> Self {
        Self {
            engine,
            enabled: true,
            skippers: Vec::new(),
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_skipper(mut self, skipper: Skipper) -> Self {
        self.skippers.push(skipper);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn should_skip(&self, path: &str, method: &str) -> bool {
        self.skippers.iter().any(|s| s(path, method))
    }

    /// Decide a single triple. Disabled gates allow without consulting the engine.
    pub fn authorize(&self, subject_id: u64, path: &str, method: &str) -> Result<(), HighwayError> {
        if !self.enabled {
            return Ok(());
        }
        let subject = subject_id.to_string();
        match self.engine.enforce(&subject, path, method) {
            Ok(true) => Ok(()),
            Ok(false) => {
                debug!(subject = %subject, path, method, "Request denied by policy");
                Err(HighwayError::NoPermission)
            }
            Err(HighwayError::EnforcementFailure(msg)) => {
                warn!(subject = %subject, path, method, error = %msg, "Policy evaluation failed");
                Err(HighwayError::EnforcementFailure(msg))
            }
            Err(e) => {
                warn!(subject = %subject, path, method, error = %e, "Policy evaluation failed");
                Err(HighwayError::EnforcementFailure(e.to_string()))
            }
        }
    }

    /// Full gate flow for one request: disabled check, skip predicates, then
    /// subject extraction and the policy decision. `subject` is only called
    /// when a decision is actually needed.
    pub fn check<F>(&self, path: &str, method: &str, subject: F) -> Result<GateOutcome, HighwayError>
    where
        F: FnOnce() -> Result<u64, HighwayError>,
    {
        if !self.enabled {
            return Ok(GateOutcome::Disabled);
        }
        if self.should_skip(path, method) {
            return Ok(GateOutcome::Skipped);
        }
        let subject_id = subject()?;
        self.authorize(subject_id, path, method)?;
        Ok(GateOutcome::Allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::engine::{PolicyRule, PolicyRuleSet, RbacEngine, RoleAssignment};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Engine stub that counts calls and returns a fixed answer.
    struct StubEngine {
        calls: AtomicUsize,
        answer: fn() -> Result<bool, HighwayError>,
    }

    impl StubEngine {
        fn new(answer: fn() -> Result<bool, HighwayError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                answer,
            })
        }
    }

    impl PolicyEngine for StubEngine {
        fn enforce(&self, _: &str, _: &str, _: &str) -> Result<bool, HighwayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.answer)()
        }

        fn load(&self, _: PolicyRuleSet) -> Result<(), HighwayError> {
            Ok(())
        }

        fn rules(&self) -> Result<PolicyRuleSet, HighwayError> {
            Ok(PolicyRuleSet::default())
        }
    }

    fn scenario_gate() -> EnforcementGate {
        let engine = RbacEngine::with_rules(PolicyRuleSet {
            rules: vec![
                PolicyRule::new("admin", "order", "GET"),
                PolicyRule::new("admin", "order", "POST"),
            ],
            assignments: vec![RoleAssignment::new("42", "admin")],
        });
        EnforcementGate::new(Arc::new(engine))
    }

    #[test]
    fn scenario_decisions() {
        let gate = scenario_gate();
        assert!(gate.authorize(42, "order", "GET").is_ok());
        assert!(matches!(
            gate.authorize(42, "order", "DELETE"),
            Err(HighwayError::NoPermission)
        ));
        assert!(matches!(
            gate.authorize(7, "order", "GET"),
            Err(HighwayError::NoPermission)
        ));
    }

    #[test]
    fn uncovered_triples_are_denied() {
        let gate = EnforcementGate::new(Arc::new(RbacEngine::new()));
        for (sub, path, method) in [(1, "/", "GET"), (0, "order", "POST"), (u64::MAX, "", "")] {
            assert!(matches!(
                gate.authorize(sub, path, method),
                Err(HighwayError::NoPermission)
            ));
        }
    }

    #[test]
    fn engine_errors_fail_closed() {
        let engine = StubEngine::new(|| Err(HighwayError::Internal(anyhow::anyhow!("store down"))));
        let gate = EnforcementGate::new(engine.clone());
        let err = gate.authorize(42, "order", "GET").unwrap_err();
        assert!(matches!(err, HighwayError::EnforcementFailure(m) if m.contains("store down")));

        let engine = StubEngine::new(|| Err(HighwayError::EnforcementFailure("poisoned".into())));
        let gate = EnforcementGate::new(engine);
        assert!(matches!(
            gate.authorize(42, "order", "GET"),
            Err(HighwayError::EnforcementFailure(_))
        ));
    }

    #[test]
    fn disabled_gate_never_consults_engine() {
        let engine = StubEngine::new(|| Ok(false));
        let gate = EnforcementGate::new(engine.clone()).enabled(false);
        assert!(gate.authorize(7, "order", "DELETE").is_ok());
        let outcome = gate
            .check("order", "DELETE", || panic!("subject must not be extracted"))
            .unwrap();
        assert_eq!(outcome, GateOutcome::Disabled);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn skipped_paths_bypass_subject_and_engine() {
        let engine = StubEngine::new(|| Ok(false));
        let gate = EnforcementGate::new(engine.clone())
            .with_skipper(allow_path_prefix_skipper(["/api/v1/pub/"]))
            .with_skipper(allow_method_skipper(["OPTIONS"]));

        let outcome = gate
            .check("/api/v1/pub/login", "POST", || {
                panic!("subject must not be extracted")
            })
            .unwrap();
        assert_eq!(outcome, GateOutcome::Skipped);
        let outcome = gate
            .check("/api/v1/domains", "options", || panic!("no subject"))
            .unwrap();
        assert_eq!(outcome, GateOutcome::Skipped);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn check_propagates_subject_errors_without_deciding() {
        let engine = StubEngine::new(|| Ok(true));
        let gate = EnforcementGate::new(engine.clone());
        let err = gate
            .check("/api/v1/domains", "GET", || {
                Err(HighwayError::Unauthorized("missing subject".into()))
            })
            .unwrap_err();
        assert!(matches!(err, HighwayError::Unauthorized(_)));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);

        let outcome = gate.check("/api/v1/domains", "GET", || Ok(1)).unwrap();
        assert_eq!(outcome, GateOutcome::Allowed);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn identical_triples_get_identical_decisions() {
        let gate = scenario_gate();
        for _ in 0..100 {
            assert!(gate.authorize(42, "order", "POST").is_ok());
            assert!(gate.authorize(42, "order", "PATCH").is_err());
        }
    }
}
