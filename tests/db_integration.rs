//! Integration tests for the SQLite-backed stores and the listing facade.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use minisite::db::{sqlite_url_for, Database};
use minisite::fetch::DocumentFetcher;
use minisite::prelude::*;
use minisite::storage::ResponseCache;

async fn temp_db() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let url = sqlite_url_for(&dir.path().join("test.db"));
    let db = Database::connect(Some(&url)).await.unwrap();
    db.run_migrations().await.unwrap();
    (dir, db)
}

/// Serves a fixed body and counts requests.
struct StaticFetcher {
    body: String,
    calls: AtomicUsize,
}

impl StaticFetcher {
    fn new(body: &str) -> Arc<Self> { Arc::new(Self { body: body.to_string(), calls: AtomicUsize::new(0) }) }
    fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

#[async_trait]
impl DocumentFetcher for StaticFetcher {
    async fn fetch_document(&self, _url: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.body.clone())
    }
}

const LISTING: &str = r#"{
    "page": 1, "pagecount": 1, "limit": 20, "total": 2,
    "list": [
        {"vod_id": 11, "vod_name": "First", "type_id": 2, "vod_remarks": "HD"},
        {"vod_id": 12, "vod_name": "Second", "type_id": 3}
    ],
    "class": [{"type_id": 2, "type_name": "Movies"}, {"type_id": 3, "type_name": "Series"}]
}"#;

#[tokio::test]
async fn test_configuration_roundtrip_assigns_revisions() {
    let (_dir, db) = temp_db().await;
    let source = SourceConfiguration::new("alpha", "Alpha", Some(movie_template()));

    let r1 = db.save_configuration(&source).await.unwrap();
    let stored = db.get_configuration_for_source("alpha").await.unwrap().unwrap();
    assert_eq!(stored.revision.as_deref(), Some(r1.as_str()));
    assert_eq!(stored.content_type_config, Some(movie_template()));

    let r2 = db.save_configuration(&source).await.unwrap();
    assert_ne!(r1, r2);
    assert_eq!(db.list_configurations().await.unwrap(), vec![("alpha".to_string(), "Alpha".to_string())]);

    assert!(db.delete_configuration("alpha").await.unwrap());
    assert!(!db.delete_configuration("alpha").await.unwrap());
    assert!(db.get_configuration_for_source("alpha").await.unwrap().is_none());
}

#[tokio::test]
async fn test_invalid_configuration_is_not_saved() {
    let (_dir, db) = temp_db().await;
    let cfg = movie_template().with_mapping(FieldMapping::new("other", "vod_name"));
    let source = SourceConfiguration::new("beta", "Beta", Some(cfg));

    assert!(db.save_configuration(&source).await.is_err());
    assert!(db.get_configuration_for_source("beta").await.unwrap().is_none());
}

#[tokio::test]
async fn test_response_cache_respects_expiry() {
    let (_dir, db) = temp_db().await;
    db.put_cache("k1", "payload", 100).await.unwrap();

    assert_eq!(db.get_cache("k1", 99).await.unwrap().as_deref(), Some("payload"));
    assert!(db.get_cache("k1", 100).await.unwrap().is_none());

    db.put_cache("k2", "other", 100).await.unwrap();
    assert_eq!(db.clear_cache_prefix(Some("k1")).await.unwrap(), 1);
    assert_eq!(db.clear_cache_prefix(None).await.unwrap(), 1);
}

#[tokio::test]
async fn test_custom_listing_is_parsed_and_stored() {
    let (_dir, db) = temp_db().await;
    let fetcher = StaticFetcher::new(LISTING);
    let agg = Aggregator::with_parts(db, fetcher.clone(), 600);
    agg.save_configuration(&SourceConfiguration::new("alpha", "Alpha", Some(movie_template()))).await.unwrap();

    let listing = agg.load_listing("alpha", "https://alpha.example/api?ac=list", false).await.unwrap();
    let Listing::Custom(parsed) = listing else { panic!("expected a custom listing") };
    assert_eq!(parsed.items.len(), 2);
    assert_eq!(parsed.categories.len(), 2);

    let stored = agg.list_items("alpha", None).await.unwrap();
    assert_eq!(stored, parsed.items);
    let in_series = agg.list_items("alpha", Some(3)).await.unwrap();
    assert_eq!(in_series.len(), 1);
    assert_eq!(in_series[0].name, "Second");
    let categories = agg.list_categories("alpha").await.unwrap();
    assert_eq!(categories, parsed.categories);

    // second load is served from the response cache
    agg.load_listing("alpha", "https://alpha.example/api?ac=list", false).await.unwrap();
    assert_eq!(fetcher.calls(), 1);
    agg.load_listing("alpha", "https://alpha.example/api?ac=list", true).await.unwrap();
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn test_unconfigured_source_gets_raw_document() {
    let (_dir, db) = temp_db().await;
    let agg = Aggregator::with_parts(db, StaticFetcher::new(LISTING), 600);

    let listing = agg.load_listing("plain", "https://plain.example/list", false).await.unwrap();
    assert_eq!(listing, Listing::Default(LISTING.to_string()));
    assert!(agg.list_items("plain", None).await.unwrap().is_empty());
}

/// Saving through the aggregator makes the registry pick up the new mapping.
#[tokio::test]
async fn test_saved_configuration_replaces_cached_parser() {
    let (_dir, db) = temp_db().await;
    let agg = Aggregator::with_parts(db, StaticFetcher::new(LISTING), 600);
    agg.save_configuration(&SourceConfiguration::new("alpha", "Alpha", Some(movie_template()))).await.unwrap();
    let before = agg.registry().get_parser("alpha").await.unwrap().unwrap();

    let mut edited = movie_template();
    edited.field_mappings.retain(|m| m.target_field != "vod_tag");
    edited.field_mappings.push(FieldMapping::new("missing_key", "vod_tag").required());
    let revision = agg.save_configuration(&SourceConfiguration::new("alpha", "Alpha", Some(edited))).await.unwrap();
    let after = agg.registry().get_parser("alpha").await.unwrap().unwrap();

    assert_ne!(before.revision(), after.revision());
    assert_eq!(after.revision(), Some(revision.as_str()));

    let err = agg.load_listing("alpha", "https://alpha.example/list", true).await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<ParseError>(),
        Some(&ParseError::RequiredFieldMissing { source_field: "missing_key".into() })
    );

    agg.delete_configuration("alpha").await.unwrap();
    assert!(agg.registry().get_parser("alpha").await.unwrap().is_none());
}

/// A listing that fails to parse is not cached.
#[tokio::test]
async fn test_failed_parse_is_not_cached() {
    let (_dir, db) = temp_db().await;
    let fetcher = StaticFetcher::new("<html>maintenance</html>");
    let agg = Aggregator::with_parts(db, fetcher.clone(), 600);
    agg.save_configuration(&SourceConfiguration::new("alpha", "Alpha", Some(movie_template()))).await.unwrap();

    for _ in 0..2 {
        let err = agg.load_listing("alpha", "https://alpha.example/list", false).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<ParseError>(), Some(ParseError::MalformedDocument { .. })));
    }
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn test_refresh_sources_keeps_order() {
    let (_dir, db) = temp_db().await;
    let agg = Aggregator::with_parts(db, StaticFetcher::new(LISTING), 600);
    agg.save_configuration(&SourceConfiguration::new("alpha", "Alpha", Some(movie_template()))).await.unwrap();

    let targets = vec![
        ("alpha".to_string(), "https://alpha.example/list".to_string()),
        ("plain".to_string(), "https://plain.example/list".to_string()),
    ];
    let results = agg.refresh_sources(&targets, false).await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, "alpha");
    assert!(matches!(results[0].1, Ok(Listing::Custom(_))));
    assert!(matches!(results[1].1, Ok(Listing::Default(_))));
}

/// VACUUM reports failures instead of swallowing them.
#[tokio::test]
async fn test_vacuum_surfaces_errors() {
    let (_dir, db) = temp_db().await;
    db.vacuum().await.unwrap();

    db.pool().close().await;
    let err = db.vacuum().await.unwrap_err();
    assert!(format!("{err:#}").contains("vacuuming database"), "{err:#}");
}

/// An unreadable response cache degrades to a live fetch.
#[tokio::test]
async fn test_cache_read_failure_falls_back_to_fetch() {
    let (_dir, db) = temp_db().await;
    sqlx::query("DROP TABLE response_cache").execute(db.pool()).await.unwrap();
    let fetcher = StaticFetcher::new(LISTING);
    let agg = Aggregator::with_parts(db, fetcher.clone(), 600);

    let listing = agg.load_listing("plain", "https://plain.example/list", false).await.unwrap();
    assert_eq!(listing, Listing::Default(LISTING.to_string()));
    assert_eq!(fetcher.calls(), 1);
}
