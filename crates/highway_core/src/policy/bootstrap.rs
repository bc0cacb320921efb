//! Default-policy bootstrap loader.
//!
//! Reads a declarative policy file into `DefaultPolicy`. Pure read + parse:
//! no cross-referential validation happens here (see `seed::validate`).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// A protectable resource class.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CreatorObject {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub object_type: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CreatorRole {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Binds a role to an object for a set of actions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CreatorPolicy {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub action: Vec<String>,
}

/// The three seed collections of one bootstrap file. Missing sections are empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DefaultPolicy {
    #[serde(default)]
    pub creator_object: Vec<CreatorObject>,
    #[serde(default)]
    pub creator_role: Vec<CreatorRole>,
    #[serde(default)]
    pub creator_policy: Vec<CreatorPolicy>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to read policy file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported policy file extension '{extension}' ({path})")]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("failed to decode policy file {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Encodings accepted by the loader, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PolicyFormat {
    Toml,
}

impl PolicyFormat {
    fn from_path(path: &Path) -> Result<Self, BootstrapError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        match extension {
            "toml" => Ok(Self::Toml),
            _ => Err(BootstrapError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension: extension.to_string(),
            }),
        }
    }
}

impl DefaultPolicy {
    /// Load a default policy file. The extension is checked before the file is
    /// opened, so an unsupported format never touches the filesystem.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BootstrapError> {
        let path = path.as_ref();
        let format = PolicyFormat::from_path(path)?;

        let content = std::fs::read_to_string(path).map_err(|source| BootstrapError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let policy = match format {
            PolicyFormat::Toml => Self::from_toml_str(&content).map_err(|source| {
                BootstrapError::Decode {
                    path: path.to_path_buf(),
                    source,
                }
            })?,
        };

        info!(
            path = %path.display(),
            objects = policy.creator_object.len(),
            roles = policy.creator_role.len(),
            policies = policy.creator_policy.len(),
            "Loaded default policy"
        );
        Ok(policy)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn objects(&self) -> &[CreatorObject] {
        &self.creator_object
    }

    pub fn roles(&self) -> &[CreatorRole] {
        &self.creator_role
    }

    pub fn policies(&self) -> &[CreatorPolicy] {
        &self.creator_policy
    }

    pub fn is_empty(&self) -> bool {
        self.creator_object.is_empty()
            && self.creator_role.is_empty()
            && self.creator_policy.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const SAMPLE: &str = r#"
[[creator_object]]
name = "order"
type = "resource"
description = "customer orders"

[[creator_object]]
name = "/api/v1/domains*"
type = "api"

[[creator_role]]
name = "admin"
description = "administrators"

[[creator_policy]]
object = "order"
role = "admin"
action = ["GET", "POST"]
"#;

    fn write_file(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn loads_all_three_sections() {
        let f = write_file(".toml", SAMPLE);
        let p = DefaultPolicy::load(f.path()).unwrap();
        assert_eq!(p.objects().len(), 2);
        assert_eq!(p.objects()[0].object_type, "resource");
        assert_eq!(p.objects()[1].description, "");
        assert_eq!(p.roles()[0].name, "admin");
        assert_eq!(
            p.policies()[0],
            CreatorPolicy {
                object: "order".into(),
                role: "admin".into(),
                action: vec!["GET".into(), "POST".into()],
            }
        );
    }

    #[test]
    fn loading_twice_is_structurally_equal() {
        let f = write_file(".toml", SAMPLE);
        let a = DefaultPolicy::load(f.path()).unwrap();
        let b = DefaultPolicy::load(f.path()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn missing_sections_are_empty() {
        let f = write_file(".toml", "[[creator_role]]\nname = \"viewer\"\n");
        let p = DefaultPolicy::load(f.path()).unwrap();
        assert!(p.objects().is_empty());
        assert!(p.policies().is_empty());
        assert_eq!(p.roles().len(), 1);

        let empty = write_file(".toml", "");
        assert!(DefaultPolicy::load(empty.path()).unwrap().is_empty());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let f = write_file(
            ".toml",
            "owner = \"ops\"\n[[creator_role]]\nname = \"viewer\"\ncolour = \"blue\"\n",
        );
        let p = DefaultPolicy::load(f.path()).unwrap();
        assert_eq!(p.roles()[0].name, "viewer");
    }

    #[test]
    fn unsupported_extension_fails_before_reading() {
        for suffix in [".yaml", ".json", ".conf", ""] {
            let f = write_file(suffix, SAMPLE);
            let err = DefaultPolicy::load(f.path()).unwrap_err();
            assert!(
                matches!(err, BootstrapError::UnsupportedFormat { .. }),
                "{suffix}: {err}"
            );
        }
        // Nonexistent file with a bad extension still reports the format.
        let err = DefaultPolicy::load("/nonexistent/policy.ini").unwrap_err();
        assert!(matches!(err, BootstrapError::UnsupportedFormat { .. }));
    }

    #[test]
    fn missing_file_is_read_failure() {
        let err = DefaultPolicy::load("/nonexistent/policy.toml").unwrap_err();
        assert!(matches!(err, BootstrapError::Read { .. }));
    }

    #[test]
    fn malformed_document_is_decode_failure() {
        let f = write_file(".toml", "[[creator_policy]]\naction = \"GET\"\n");
        let err = DefaultPolicy::load(f.path()).unwrap_err();
        assert!(matches!(err, BootstrapError::Decode { .. }), "{err}");

        let f = write_file(".toml", "creator_object = [ {name = ");
        let err = DefaultPolicy::load(f.path()).unwrap_err();
        assert!(matches!(err, BootstrapError::Decode { .. }));
    }
}
