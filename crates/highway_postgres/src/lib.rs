//! highway_postgres: sqlx adapters for the highway_core storage ports,
//! plus pool construction and schema bootstrap.

mod rows;
pub mod store;

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};

pub use store::{PgDomainStore, PgMenuActionStore, PgMenuStore, PgPolicyStore};

const SCHEMA_SQL: &str = include_str!("../migrations/0001_init.sql");

/// Connection pool settings.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: "postgresql://localhost:5432/highway".to_string(),
            max_connections: 10,
            min_connections: 0,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            max_lifetime: Some(Duration::from_secs(1800)),
        }
    }
}

/// Open a pool and verify it with a round trip.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    info!(
        url = %mask_database_url(&config.database_url),
        max_connections = config.max_connections,
        "Connecting to database"
    );

    let mut options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout);
    if let Some(idle) = config.idle_timeout {
        options = options.idle_timeout(idle);
    }
    if let Some(lifetime) = config.max_lifetime {
        options = options.max_lifetime(lifetime);
    }

    let pool = options
        .connect(&config.database_url)
        .await
        .map_err(|e| {
            warn!("Failed to connect to database: {}", e);
            e
        })
        .context("failed to connect to database")?;

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .context("database ping failed")?;

    info!("Database connection pool created successfully");
    Ok(pool)
}

/// Create tables and indexes if they are missing. Safe to run on every boot.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(pool)
        .await
        .context("failed to apply schema")?;
    info!("Database schema verified");
    Ok(())
}

/// All port implementations over one pool.
pub struct PgStores {
    pub domains: PgDomainStore,
    pub menus: PgMenuStore,
    pub menu_actions: PgMenuActionStore,
    pub policy: PgPolicyStore,
}

impl PgStores {
    pub fn new(pool: PgPool) -> Self {
        Self {
            domains: PgDomainStore::new(pool.clone()),
            menus: PgMenuStore::new(pool.clone()),
            menu_actions: PgMenuActionStore::new(pool.clone()),
            policy: PgPolicyStore::new(pool),
        }
    }
}

/// Mask the password in a database URL for logging.
pub fn mask_database_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) if parsed.password().is_some() => {
            let mut masked = parsed.clone();
            let _ = masked.set_password(Some("***"));
            masked.to_string()
        }
        Ok(parsed) => parsed.to_string(),
        Err(_) if url.len() > 20 => {
            let head: String = url.chars().take(10).collect();
            let tail: String = url
                .chars()
                .rev()
                .take(10)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            format!("{head}***{tail}")
        }
        Err(_) => "***".to_string(),
    }
}
