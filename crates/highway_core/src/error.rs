use thiserror::Error;

#[derive(Debug, Error)]
pub enum HighwayError {
    #[error("not found: {0}")]
    NotFound(String),

    /// The policy engine evaluated the request and denied it.
    #[error("no permission")]
    NoPermission,

    /// The policy engine could not render a decision. Always treated as a denial.
    #[error("enforcement failure: {0}")]
    EnforcementFailure(String),

    #[error("store failure ({context}): {source}")]
    StoreFailure {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

impl HighwayError {
    /// Wrap a storage-layer failure with the call site that produced it.
    pub fn store(context: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::StoreFailure {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::NoPermission => 403,
            Self::EnforcementFailure(_) => 500,
            Self::StoreFailure { .. } => 500,
            Self::InvalidInput(_) => 400,
            Self::Conflict(_) => 409,
            Self::Unauthorized(_) => 401,
            Self::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code rendered at the HTTP boundary.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::NoPermission => "no_permission",
            Self::EnforcementFailure(_) => "enforcement_failure",
            Self::StoreFailure { .. } => "store_failure",
            Self::InvalidInput(_) => "invalid_input",
            Self::Conflict(_) => "conflict",
            Self::Unauthorized(_) => "unauthorized",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_no_permission_is_forbidden() {
        assert_eq!(HighwayError::NoPermission.http_status(), 403);
    }

    #[test]
    fn enforcement_failure_is_distinct_from_denial() {
        let e = HighwayError::EnforcementFailure("engine poisoned".into());
        assert_eq!(e.http_status(), 500);
        assert_ne!(e.code(), HighwayError::NoPermission.code());
    }

    #[test]
    fn http_status_invalid_input() {
        assert_eq!(HighwayError::InvalidInput("x".into()).http_status(), 400);
    }

    #[test]
    fn http_status_conflict() {
        assert_eq!(HighwayError::Conflict("x".into()).http_status(), 409);
    }

    #[test]
    fn display_store_failure_carries_context() {
        let e = HighwayError::store("domain.update id=7", anyhow::anyhow!("connection reset"));
        assert_eq!(
            e.to_string(),
            "store failure (domain.update id=7): connection reset"
        );
        assert_eq!(e.code(), "store_failure");
    }

    #[test]
    fn display_not_found() {
        let e = HighwayError::NotFound("domain 3".into());
        assert_eq!(e.to_string(), "not found: domain 3");
    }
}
