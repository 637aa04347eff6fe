use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::mapping::SourceConfiguration;
use crate::types::{CanonicalCategory, CanonicalItem};

/// Emitted by a configuration store whenever a source's configuration changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigChange {
    Saved { source_id: String },
    Deleted { source_id: String },
}

impl ConfigChange {
    pub fn source_id(&self) -> &str {
        match self {
            Self::Saved { source_id } | Self::Deleted { source_id } => source_id,
        }
    }
}

/// Persisted per-source mapping configurations.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_configuration_for_source(&self, source_id: &str) -> Result<Option<SourceConfiguration>>;

    /// Change feed. Stores that publish nothing leave invalidation to `clear_cache` callers.
    fn subscribe(&self) -> Option<broadcast::Receiver<ConfigChange>> { None }
}

/// Persisted canonical records.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn upsert_categories(&self, source_id: &str, categories: &[CanonicalCategory]) -> Result<()>;
    async fn upsert_items(&self, source_id: &str, items: &[CanonicalItem]) -> Result<()>;
}

/// Expiring cache of raw fetched documents.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get_cache(&self, key: &str, now: i64) -> Result<Option<String>>;
    async fn put_cache(&self, key: &str, payload: &str, expires_at: i64) -> Result<()>;
}
