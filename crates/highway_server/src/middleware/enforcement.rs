//! Enforcement middleware: the gate in front of every protected route.
//!
//! Order per request: disabled check, skip predicates, subject extraction,
//! policy decision. The subject is attached as an extension for handlers.

use axum::{extract::Request, middleware::Next, response::Response, Extension};
use tracing::debug;

use highway_core::{EnforcementGate, GateOutcome};

use crate::error::AppError;
use crate::middleware::jwt::{JwtConfig, Subject};

pub async fn enforce(
    Extension(gate): Extension<EnforcementGate>,
    Extension(jwt): Extension<JwtConfig>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let path = req.uri().path().to_owned();
    let method = req.method().as_str().to_owned();

    let mut subject = None;
    let outcome = gate.check(&path, &method, || {
        let s = jwt.subject(req.headers())?;
        subject = Some(s);
        Ok(s.0)
    })?;

    // With the gate off, still identify the caller when the request says who it is.
    if outcome == GateOutcome::Disabled {
        subject = jwt.subject(req.headers()).ok();
    }
    debug!(path = %path, method = %method, ?outcome, "Request passed enforcement");

    if let Some(s) = subject {
        req.extensions_mut().insert(s);
    }
    Ok(next.run(req).await)
}

/// The caller's subject id, if the gate identified one.
pub fn subject_id(subject: Option<Extension<Subject>>) -> Option<u64> {
    subject.map(|Extension(Subject(id))| id)
}
