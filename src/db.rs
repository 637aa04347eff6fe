use anyhow::{Context, Result};
use directories::ProjectDirs;
use sqlx::{any::AnyConnectOptions, AnyPool, ConnectOptions, migrate::Migrator};
use sqlx::any::AnyPoolOptions;
use std::{path::PathBuf, str::FromStr};
use std::sync::Once;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::dao;
use crate::mapping::{category_insert_from, item_insert_from, SourceConfiguration};
use crate::storage::{ConfigChange, ConfigStore, ContentStore, ResponseCache};
use crate::types::{CanonicalCategory, CanonicalItem};

// Ensure drivers are installed exactly once for sqlx::any
static INSTALL_DRIVERS: Once = Once::new();

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const CHANGE_FEED_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct Database {
    pool: AnyPool,
    changes: broadcast::Sender<ConfigChange>,
}

impl Database {
    // If database_url is None, use a SQLite file in the user's data directory.
    pub async fn connect(database_url: Option<&str>) -> Result<Self> {
        INSTALL_DRIVERS.call_once(sqlx::any::install_default_drivers);

        let url = match database_url {
            Some(u) if !u.trim().is_empty() => u.to_string(),
            _ => default_sqlite_url()?,
        };

        let opts = AnyConnectOptions::from_str(&url)
            .with_context(|| format!("invalid database URL: {url}"))?;
        // Quiet by default; callers can enable SQLX_LOG if they want
        let opts = opts.disable_statement_logging();

        let pool = AnyPoolOptions::new()
            .max_connections(10)
            .connect_with(opts)
            .await
            .with_context(|| format!("failed to connect to database: {url}"))?;

        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        debug!(url = %url, "connected to database");
        Ok(Self { pool, changes })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.context("running migrations")
    }

    pub fn pool(&self) -> &AnyPool { &self.pool }

    /// Persist a source configuration under a fresh revision and notify subscribers.
    pub async fn save_configuration(&self, source: &SourceConfiguration) -> Result<String> {
        if let Some(cfg) = &source.content_type_config {
            cfg.validate().with_context(|| format!("refusing to save invalid configuration for {}", source.source_id))?;
        }
        let revision = uuid::Uuid::new_v4().to_string();
        let mut stored = source.clone();
        stored.revision = Some(revision.clone());
        let row = dao::SourceConfigInsert {
            source_id: stored.source_id.clone(),
            name: stored.name.clone(),
            payload: serde_json::to_string(&stored)?,
            revision: revision.clone(),
        };
        dao::upsert_source_config(&self.pool, &row).await?;
        info!(source_id = %source.source_id, revision = %revision, "saved source configuration");
        // no receivers is fine
        let _ = self.changes.send(ConfigChange::Saved { source_id: source.source_id.clone() });
        Ok(revision)
    }

    pub async fn delete_configuration(&self, source_id: &str) -> Result<bool> {
        let removed = dao::delete_source_config(&self.pool, source_id).await? > 0;
        if removed {
            info!(source_id, "deleted source configuration");
            let _ = self.changes.send(ConfigChange::Deleted { source_id: source_id.to_string() });
        }
        Ok(removed)
    }

    pub async fn list_configurations(&self) -> Result<Vec<(String, String)>> {
        dao::list_source_configs(&self.pool).await
    }

    pub async fn clear_cache_prefix(&self, prefix: Option<&str>) -> Result<u64> {
        let result = if let Some(p) = prefix {
            let like = format!("{}%", p);
            sqlx::query("DELETE FROM response_cache WHERE key LIKE ?")
                .bind(like)
                .execute(&self.pool)
                .await?
        } else {
            sqlx::query("DELETE FROM response_cache")
                .execute(&self.pool)
                .await?
        };
        Ok(result.rows_affected())
    }

    pub async fn vacuum(&self) -> Result<()> {
        sqlx::query("VACUUM").execute(&self.pool).await.context("vacuuming database")?;
        info!("database vacuumed");
        Ok(())
    }
}

#[async_trait::async_trait]
impl ConfigStore for Database {
    async fn get_configuration_for_source(&self, source_id: &str) -> Result<Option<SourceConfiguration>> {
        let Some((payload, revision)) = dao::get_source_config(&self.pool, source_id).await? else {
            return Ok(None);
        };
        let mut source: SourceConfiguration = serde_json::from_str(&payload)
            .with_context(|| format!("decoding stored configuration for {source_id}"))?;
        source.revision = Some(revision);
        Ok(Some(source))
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<ConfigChange>> { Some(self.changes.subscribe()) }
}

#[async_trait::async_trait]
impl ContentStore for Database {
    async fn upsert_categories(&self, source_id: &str, categories: &[CanonicalCategory]) -> Result<()> {
        let rows: Vec<_> = categories.iter().map(|c| category_insert_from(source_id, c)).collect();
        dao::upsert_categories(&self.pool, &rows).await
    }

    async fn upsert_items(&self, source_id: &str, items: &[CanonicalItem]) -> Result<()> {
        let rows: Vec<_> = items.iter().map(|i| item_insert_from(source_id, i)).collect();
        dao::upsert_items(&self.pool, &rows).await
    }
}

#[async_trait::async_trait]
impl ResponseCache for Database {
    async fn get_cache(&self, key: &str, now: i64) -> Result<Option<String>> {
        let row = sqlx::query_scalar::<_, String>(
            "SELECT payload FROM response_cache WHERE key = ? AND expires_at > ?",
        )
        .bind(key)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn put_cache(&self, key: &str, payload: &str, expires_at: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO response_cache(key, payload, expires_at) VALUES (?, ?, ?)\n             ON CONFLICT(key) DO UPDATE SET payload=excluded.payload, expires_at=excluded.expires_at",
        )
        .bind(key)
        .bind(payload)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn default_sqlite_url() -> Result<String> {
    let proj = ProjectDirs::from("dev", "minisite", "minisite")
        .context("unable to determine data directory for default sqlite path")?;
    let mut path: PathBuf = proj.data_dir().to_path_buf();
    std::fs::create_dir_all(&path).with_context(|| format!("creating data dir: {}", path.display()))?;
    path.push("minisite.db");
    Ok(sqlite_url_for(&path))
}

/// `sqlite://` URL for a file path, creating the file on first connect.
pub fn sqlite_url_for(path: &std::path::Path) -> String {
    // Encode spaces in the path for a valid sqlite URL
    let path_str = path.to_string_lossy().replace(' ', "%20");
    format!("sqlite://{path_str}?mode=rwc")
}
