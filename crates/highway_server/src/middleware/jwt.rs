//! JWT authentication: turns request headers into the numeric subject id
//! the enforcement gate evaluates.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use highway_core::HighwayError;

/// Header carrying the subject when authentication is switched off.
pub const SUBJECT_HEADER: &str = "x-subject-id";

/// The authenticated principal, attached to the request as an extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subject(pub u64);

#[derive(Debug, Deserialize)]
struct JwtClaims {
    sub: String,
}

#[derive(Clone)]
pub struct JwtConfig {
    key: Option<DecodingKey>,
    validation: Validation,
}

impl JwtConfig {
    /// HS256 with the given secret. `exp` is required and checked.
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            key: Some(DecodingKey::from_secret(secret)),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// No token verification; the subject comes from `X-Subject-Id`.
    /// Development only.
    pub fn disabled() -> Self {
        Self {
            key: None,
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.key.is_some()
    }

    pub fn subject(&self, headers: &HeaderMap) -> Result<Subject, HighwayError> {
        match &self.key {
            Some(key) => {
                let token = headers
                    .get(AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.strip_prefix("Bearer "))
                    .ok_or_else(|| HighwayError::Unauthorized("missing bearer token".into()))?;
                let data = decode::<JwtClaims>(token, key, &self.validation)
                    .map_err(|e| HighwayError::Unauthorized(format!("invalid token: {e}")))?;
                parse_subject(&data.claims.sub)
            }
            None => {
                let raw = headers
                    .get(SUBJECT_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| {
                        HighwayError::Unauthorized(format!("missing {SUBJECT_HEADER} header"))
                    })?;
                parse_subject(raw)
            }
        }
    }
}

fn parse_subject(raw: &str) -> Result<Subject, HighwayError> {
    raw.trim()
        .parse()
        .map(Subject)
        .map_err(|_| HighwayError::Unauthorized(format!("subject '{raw}' is not a numeric id")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    const SECRET: &[u8] = b"unit-test-secret";

    #[derive(Serialize)]
    struct Claims<'a> {
        sub: &'a str,
        exp: u64,
    }

    fn token(sub: &str, exp: u64) -> String {
        encode(
            &Header::default(),
            &Claims { sub, exp },
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap()
    }

    fn bearer(t: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, format!("Bearer {t}").parse().unwrap());
        h
    }

    const FAR_FUTURE: u64 = 4_102_444_800; // 2100-01-01

    #[test]
    fn valid_token_yields_subject() {
        let jwt = JwtConfig::from_secret(SECRET);
        assert_eq!(jwt.subject(&bearer(&token("42", FAR_FUTURE))).unwrap(), Subject(42));
    }

    #[test]
    fn bad_tokens_are_unauthorized() {
        let jwt = JwtConfig::from_secret(SECRET);
        for headers in [
            HeaderMap::new(),
            bearer("not-a-jwt"),
            bearer(&token("42", 1)),
            bearer(&token("alice", FAR_FUTURE)),
        ] {
            assert!(matches!(
                jwt.subject(&headers),
                Err(HighwayError::Unauthorized(_))
            ));
        }
    }

    #[test]
    fn disabled_auth_reads_header() {
        let jwt = JwtConfig::disabled();
        let mut h = HeaderMap::new();
        h.insert(SUBJECT_HEADER, "7".parse().unwrap());
        assert_eq!(jwt.subject(&h).unwrap(), Subject(7));
        assert!(jwt.subject(&HeaderMap::new()).is_err());
    }
}
