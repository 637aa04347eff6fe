use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::Database;
use crate::fetch::{DocumentFetcher, HttpFetcher};
use crate::mapping::SourceConfiguration;
use crate::registry::ParserRegistry;
use crate::settings::Settings;
use crate::storage::{ConfigStore, ContentStore, ResponseCache};
use crate::types::{CanonicalCategory, CanonicalItem, ParsedResponse};

/// Outcome of loading one listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    /// The source has a mapping configuration; the document was normalized.
    Custom(ParsedResponse),
    /// No mapping configured; the raw document is left to the app's default decoder.
    Default(String),
}

/// Aggregator owns the database, the parser registry and a fetcher, and runs
/// fetch → parse → persist for listing pages.
pub struct Aggregator {
    db: Database,
    registry: ParserRegistry,
    fetcher: Arc<dyn DocumentFetcher>,
    response_ttl_secs: i64,
}

impl Aggregator {
    pub async fn connect(settings: &Settings, run_migrations: bool) -> Result<Self> {
        let db = Database::connect(settings.database_url.as_deref()).await?;
        if run_migrations { db.run_migrations().await?; }
        let fetcher = HttpFetcher::new(&settings.user_agent, settings.request_timeout())?;
        Ok(Self::with_parts(db, Arc::new(fetcher), settings.response_ttl_secs))
    }

    pub fn with_parts(db: Database, fetcher: Arc<dyn DocumentFetcher>, response_ttl_secs: i64) -> Self {
        let registry = ParserRegistry::new(Arc::new(db.clone()));
        Self { db, registry, fetcher, response_ttl_secs }
    }

    pub fn database(&self) -> &Database { &self.db }
    pub fn registry(&self) -> &ParserRegistry { &self.registry }

    /// Fetch (or reuse a cached copy of) a listing document and decode it for `source_id`.
    /// The raw document is cached only once it decoded cleanly.
    pub async fn load_listing(&self, source_id: &str, url: &str, refresh: bool) -> Result<Listing> {
        let key = format!("{}|list|{}", source_id, url);
        let now = current_epoch();
        let cached = if refresh {
            None
        } else {
            match self.db.get_cache(&key, now).await {
                Ok(hit) => hit,
                Err(e) => {
                    warn!(source_id, error = %e, "response cache read failed; fetching");
                    None
                }
            }
        };
        let from_cache = cached.is_some();
        let document = match cached {
            Some(doc) => doc,
            None => self.fetcher.fetch_document(url).await.with_context(|| format!("fetching listing for source {source_id}"))?,
        };

        let listing = match self.registry.get_parser(source_id).await? {
            Some(parser) => {
                let parsed = parser
                    .parse(&document)
                    .with_context(|| format!("listing for source {source_id} could not be loaded"))?;
                self.persist(source_id, &parsed).await;
                info!(
                    source_id,
                    items = parsed.items.len(),
                    categories = parsed.categories.len(),
                    skipped = parsed.skipped_items,
                    from_cache,
                    "loaded custom listing"
                );
                Listing::Custom(parsed)
            }
            None => Listing::Default(document.clone()),
        };

        if !from_cache {
            if let Err(e) = self.db.put_cache(&key, &document, now + self.response_ttl_secs).await {
                warn!(source_id, error = %e, "failed to cache listing document");
            }
        }
        Ok(listing)
    }

    /// Load several `(source_id, url)` listings concurrently; results keep input order.
    pub async fn refresh_sources(&self, targets: &[(String, String)], refresh: bool) -> Vec<(String, Result<Listing>)> {
        let loads = targets.iter().map(|(source_id, url)| async move {
            (source_id.clone(), self.load_listing(source_id, url, refresh).await)
        });
        futures::future::join_all(loads).await
    }

    async fn persist(&self, source_id: &str, parsed: &ParsedResponse) {
        if !parsed.categories.is_empty() {
            if let Err(e) = self.db.upsert_categories(source_id, &parsed.categories).await {
                warn!(source_id, error = %e, "failed to store categories");
            }
        }
        if !parsed.items.is_empty() {
            if let Err(e) = self.db.upsert_items(source_id, &parsed.items).await {
                warn!(source_id, error = %e, "failed to store items");
            }
        }
    }

    // --- configuration management ---

    /// Saving publishes a change event, so the registry drops its stale parser.
    pub async fn save_configuration(&self, source: &SourceConfiguration) -> Result<String> {
        self.db.save_configuration(source).await
    }

    pub async fn delete_configuration(&self, source_id: &str) -> Result<bool> {
        self.db.delete_configuration(source_id).await
    }

    pub async fn get_configuration(&self, source_id: &str) -> Result<Option<SourceConfiguration>> {
        self.db.get_configuration_for_source(source_id).await
    }

    pub async fn list_configurations(&self) -> Result<Vec<(String, String)>> { self.db.list_configurations().await }

    // --- stored content ---

    pub async fn list_items(&self, source_id: &str, category_id: Option<i64>) -> Result<Vec<CanonicalItem>> {
        crate::dao::list_items(self.db.pool(), source_id, category_id).await
    }

    pub async fn list_categories(&self, source_id: &str) -> Result<Vec<CanonicalCategory>> {
        crate::dao::list_categories(self.db.pool(), source_id).await
    }

    pub async fn clear_response_cache(&self, prefix: Option<&str>) -> Result<u64> { self.db.clear_cache_prefix(prefix).await }
    pub async fn vacuum_db(&self) -> Result<()> { self.db.vacuum().await }
}

fn current_epoch() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
