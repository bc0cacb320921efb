//! Application configuration.
//!
//! Loaded from one file whose extension selects the decoder (`.toml`,
//! `.yaml`/`.yml`, `.json`). Every section has defaults, so a file only needs
//! the keys it changes. Environment overrides are applied on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use highway_postgres::{mask_database_url, DatabaseConfig};

pub const ENV_DATABASE_URL: &str = "HIGHWAY_DATABASE_URL";
pub const ENV_JWT_SECRET: &str = "HIGHWAY_JWT_SECRET";
pub const ENV_HTTP_PORT: &str = "HIGHWAY_HTTP_PORT";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub run_mode: RunMode,
    pub http: HttpConfig,
    pub log: LogConfig,
    pub monitor: MonitorConfig,
    pub database: DbConfig,
    pub auth: AuthConfig,
    pub enforcement: EnforcementConfig,
    pub menu: MenuConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Debug,
    Release,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 10088,
            shutdown_timeout_secs: 30,
            read_timeout_secs: 60,
        }
    }
}

impl HttpConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
    pub output: LogOutput,
    pub output_file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Text,
            output: LogOutput::Stdout,
            output_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub enable: bool,
    pub addr: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enable: false,
            addr: "127.0.0.1:16060".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Postgres,
    /// In-process stores; state is lost on exit.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub backend: StoreBackend,
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        let d = DatabaseConfig::default();
        Self {
            backend: StoreBackend::Postgres,
            url: d.database_url,
            max_connections: d.max_connections,
            min_connections: d.min_connections,
            acquire_timeout_secs: d.acquire_timeout.as_secs(),
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
        }
    }
}

impl DbConfig {
    /// Pool settings; a zero timeout disables that limit.
    pub fn pool_config(&self) -> DatabaseConfig {
        let opt = |secs: u64| (secs > 0).then(|| Duration::from_secs(secs));
        DatabaseConfig {
            database_url: self.url.clone(),
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            acquire_timeout: Duration::from_secs(self.acquire_timeout_secs),
            idle_timeout: opt(self.idle_timeout_secs),
            max_lifetime: opt(self.max_lifetime_secs),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub enable: bool,
    pub jwt_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnforcementConfig {
    pub enable: bool,
    pub default_policy_file: Option<PathBuf>,
    pub seed_on_boot: bool,
    pub skip_path_prefixes: Vec<String>,
    /// Subject to role grants applied on every boot, after the policy is
    /// seeded. Without one, no subject can reach the policy routes.
    pub bootstrap_assignments: Vec<BootstrapAssignment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapAssignment {
    pub subject: String,
    pub role: String,
}

impl Default for EnforcementConfig {
    fn default() -> Self {
        Self {
            enable: true,
            default_policy_file: None,
            seed_on_boot: true,
            skip_path_prefixes: Vec::new(),
            bootstrap_assignments: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuConfig {
    pub enable: bool,
    pub data: Option<PathBuf>,
}

impl AppConfig {
    /// Read and decode a config file. The extension picks the format.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = match ext.as_str() {
            "toml" => toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?,
            "yaml" | "yml" => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?,
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?,
            other => bail!(
                "unsupported config format '{other}' for {}",
                path.display()
            ),
        };
        Ok(config)
    }

    /// Apply `HIGHWAY_*` overrides through a lookup function, so callers
    /// decide where variables come from.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_DATABASE_URL) {
            self.database.url = url;
        }
        if let Some(secret) = lookup(ENV_JWT_SECRET) {
            self.auth.jwt_secret = secret;
        }
        if let Some(port) = lookup(ENV_HTTP_PORT) {
            self.http.port = port
                .parse()
                .with_context(|| format!("{ENV_HTTP_PORT}={port} is not a port number"))?;
        }
        Ok(())
    }

    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|k| std::env::var(k).ok())
    }

    /// Cross-field checks that decoding alone cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.auth.enable && self.auth.jwt_secret.is_empty() {
            bail!("auth.enable is set but auth.jwt_secret is empty");
        }
        if self.log.output == LogOutput::File && self.log.output_file.is_none() {
            bail!("log.output = \"file\" requires log.output_file");
        }
        if self.menu.enable && self.menu.data.is_none() {
            bail!("menu.enable is set but menu.data is empty");
        }
        for a in &self.enforcement.bootstrap_assignments {
            if a.subject.trim().is_empty() || a.role.trim().is_empty() {
                bail!("enforcement.bootstrap_assignments entries need a subject and a role");
            }
        }
        Ok(())
    }

    /// The config as JSON with the database password and JWT secret masked.
    pub fn to_masked_json(&self) -> Result<String> {
        let mut masked = self.clone();
        masked.database.url = mask_database_url(&masked.database.url);
        if !masked.auth.jwt_secret.is_empty() {
            masked.auth.jwt_secret = "***".into();
        }
        serde_json::to_string(&masked).context("failed to serialize config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    fn write(suffix: &str, body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f
    }

    #[test]
    fn toml_yaml_and_json_decode_the_same() {
        let toml = write(
            ".toml",
            "run_mode = \"release\"\n[http]\nport = 9000\n[enforcement]\nskip_path_prefixes = [\"/api/v1/pub/\"]\n",
        );
        let yaml = write(
            ".yaml",
            "run_mode: release\nhttp:\n  port: 9000\nenforcement:\n  skip_path_prefixes: [\"/api/v1/pub/\"]\n",
        );
        let json = write(
            ".json",
            r#"{"run_mode":"release","http":{"port":9000},"enforcement":{"skip_path_prefixes":["/api/v1/pub/"]}}"#,
        );
        for f in [&toml, &yaml, &json] {
            let c = AppConfig::load(f.path()).unwrap();
            assert_eq!(c.run_mode, RunMode::Release);
            assert_eq!(c.http.port, 9000);
            assert_eq!(c.http.host, "0.0.0.0");
            assert_eq!(c.enforcement.skip_path_prefixes, vec!["/api/v1/pub/"]);
            assert!(c.enforcement.enable);
        }
    }

    #[test]
    fn bootstrap_assignments_parse_and_validate() {
        let f = write(
            ".toml",
            r#"
[enforcement]
bootstrap_assignments = [
    { subject = "1", role = "admin" },
    { subject = "ops", role = "viewer" },
]
"#,
        );
        let mut c = AppConfig::load(f.path()).unwrap();
        assert_eq!(
            c.enforcement.bootstrap_assignments,
            vec![
                BootstrapAssignment {
                    subject: "1".into(),
                    role: "admin".into(),
                },
                BootstrapAssignment {
                    subject: "ops".into(),
                    role: "viewer".into(),
                },
            ]
        );
        assert!(c.validate().is_ok());

        c.enforcement.bootstrap_assignments[1].role = String::new();
        assert!(c.validate().is_err());
    }

    #[test]
    fn unknown_extension_fails() {
        let f = write(".ini", "port=1");
        let err = AppConfig::load(f.path()).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = [
            (ENV_DATABASE_URL, "postgresql://u:p@db/highway"),
            (ENV_JWT_SECRET, "s3cret"),
            (ENV_HTTP_PORT, "8081"),
        ]
        .into_iter()
        .collect();
        let mut c = AppConfig::default();
        c.apply_env_with(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(c.database.url, "postgresql://u:p@db/highway");
        assert_eq!(c.auth.jwt_secret, "s3cret");
        assert_eq!(c.http.port, 8081);

        let err = c
            .apply_env_with(|k| (k == ENV_HTTP_PORT).then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_HTTP_PORT));
    }

    #[test]
    fn masked_json_hides_secrets() {
        let mut c = AppConfig::default();
        c.database.url = "postgresql://admin:hunter2@db:5432/highway".into();
        c.auth.jwt_secret = "topsecret".into();
        let json = c.to_masked_json().unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("topsecret"));
    }

    #[test]
    fn validate_catches_inconsistent_sections() {
        let mut c = AppConfig::default();
        assert!(c.validate().is_ok());
        c.auth.enable = true;
        assert!(c.validate().is_err());
        c.auth.jwt_secret = "x".into();
        c.log.output = LogOutput::File;
        assert!(c.validate().is_err());
    }

    #[test]
    fn zero_timeouts_disable_limits() {
        let c = DbConfig {
            idle_timeout_secs: 0,
            ..DbConfig::default()
        };
        let pool = c.pool_config();
        assert_eq!(pool.idle_timeout, None);
        assert_eq!(pool.max_lifetime, Some(Duration::from_secs(1800)));
    }
}
