//! Integration tests for the parser registry and its cache behavior.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, oneshot, Notify};

use minisite::prelude::*;

/// In-memory configuration store that counts lookups and can publish changes.
struct MemoryStore {
    configs: Mutex<HashMap<String, SourceConfiguration>>,
    lookups: AtomicUsize,
    feed: Option<broadcast::Sender<ConfigChange>>,
    /// One lookup of the named source holds its result until released.
    hold: Mutex<Option<(String, oneshot::Receiver<()>)>>,
    held: Notify,
}

impl MemoryStore {
    fn new(with_feed: bool) -> Self {
        Self {
            configs: Mutex::new(HashMap::new()),
            lookups: AtomicUsize::new(0),
            feed: with_feed.then(|| broadcast::channel(8).0),
            hold: Mutex::new(None),
            held: Notify::new(),
        }
    }

    fn hold_next_lookup(&self, source_id: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.hold.lock().unwrap() = Some((source_id.to_string(), rx));
        tx
    }

    fn put(&self, source: SourceConfiguration) {
        let id = source.source_id.clone();
        self.configs.lock().unwrap().insert(id.clone(), source);
        if let Some(tx) = &self.feed {
            let _ = tx.send(ConfigChange::Saved { source_id: id });
        }
    }

    fn lookups(&self) -> usize { self.lookups.load(Ordering::SeqCst) }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn get_configuration_for_source(&self, source_id: &str) -> Result<Option<SourceConfiguration>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let found = self.configs.lock().unwrap().get(source_id).cloned();
        let gate = {
            let mut hold = self.hold.lock().unwrap();
            match hold.take() {
                Some((id, rx)) if id == source_id => Some(rx),
                other => {
                    *hold = other;
                    None
                }
            }
        };
        if let Some(rx) = gate {
            self.held.notify_one();
            let _ = rx.await;
        }
        Ok(found)
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<ConfigChange>> { self.feed.as_ref().map(|tx| tx.subscribe()) }
}

struct FailingStore;

#[async_trait]
impl ConfigStore for FailingStore {
    async fn get_configuration_for_source(&self, _source_id: &str) -> Result<Option<SourceConfiguration>> {
        anyhow::bail!("store offline")
    }
}

fn source(id: &str, revision: &str, list_path: &str) -> SourceConfiguration {
    let mut s = SourceConfiguration::new(id, id, Some(movie_template()));
    if let Some(cfg) = s.content_type_config.as_mut() {
        cfg.list_response_path = list_path.to_string();
    }
    s.revision = Some(revision.to_string());
    s
}

#[tokio::test]
async fn test_cache_hit_skips_store() {
    let store = Arc::new(MemoryStore::new(false));
    store.put(source("alpha", "r1", "list"));
    let registry = ParserRegistry::new(store.clone());

    let first = registry.get_parser("alpha").await.unwrap().expect("configured");
    let second = registry.get_parser("alpha").await.unwrap().expect("configured");

    assert_eq!(store.lookups(), 1);
    assert_eq!(first.revision(), Some("r1"));
    assert_eq!(second.source_id(), "alpha");
    assert_eq!(registry.cached_sources(), vec!["alpha".to_string()]);
}

/// Absent configurations are a normal `None`, and are not cached.
#[tokio::test]
async fn test_unconfigured_sources_return_none() {
    let store = Arc::new(MemoryStore::new(false));
    store.put(SourceConfiguration::new("plain", "Plain site", None));
    let registry = ParserRegistry::new(store.clone());

    assert!(registry.get_parser("missing").await.unwrap().is_none());
    assert!(registry.get_parser("plain").await.unwrap().is_none());
    assert!(registry.get_parser("plain").await.unwrap().is_none());
    assert!(registry.is_empty());
    assert_eq!(store.lookups(), 3);
}

#[tokio::test]
async fn test_clear_cache_single_and_all() {
    let store = Arc::new(MemoryStore::new(false));
    store.put(source("a", "1", "list"));
    store.put(source("b", "1", "list"));
    let registry = ParserRegistry::new(store.clone());
    registry.get_parser("a").await.unwrap();
    registry.get_parser("b").await.unwrap();
    assert_eq!(registry.len(), 2);

    assert_eq!(registry.clear_cache(Some("a")), 1);
    assert_eq!(registry.clear_cache(Some("a")), 0);
    assert_eq!(registry.cached_sources(), vec!["b".to_string()]);

    assert_eq!(registry.clear_cache(None), 1);
    assert!(registry.is_empty());
}

/// Without a change feed, an edited configuration is only seen after `clear_cache`.
#[tokio::test]
async fn test_stale_until_cleared_without_feed() {
    let store = Arc::new(MemoryStore::new(false));
    store.put(source("site", "r1", "list"));
    let registry = ParserRegistry::new(store.clone());
    registry.get_parser("site").await.unwrap();

    store.put(source("site", "r2", "data"));
    let stale = registry.get_parser("site").await.unwrap().unwrap();
    assert_eq!(stale.revision(), Some("r1"));

    registry.clear_cache(Some("site"));
    let fresh = registry.get_parser("site").await.unwrap().unwrap();
    assert_eq!(fresh.revision(), Some("r2"));
    assert_eq!(fresh.config().list_response_path, "data");
}

/// With a change feed, edits evict the cached parser on the next lookup.
#[tokio::test]
async fn test_change_feed_invalidates() {
    let store = Arc::new(MemoryStore::new(true));
    store.put(source("site", "r1", "list"));
    store.put(source("other", "r1", "list"));
    let registry = ParserRegistry::new(store.clone());
    registry.get_parser("site").await.unwrap();
    registry.get_parser("other").await.unwrap();

    store.put(source("site", "r2", "data"));
    let parser = registry.get_parser("site").await.unwrap().unwrap();

    assert_eq!(parser.revision(), Some("r2"));
    let doc = r#"{"data":[{"vod_id":1,"vod_name":"x"}]}"#;
    assert_eq!(parser.parse(doc).unwrap().items.len(), 1);
    // untouched source stays cached
    assert_eq!(store.lookups(), 3);
    registry.get_parser("other").await.unwrap();
    assert_eq!(store.lookups(), 3);
}

/// An edit saved while a lookup is still fetching must not leave the old parser cached,
/// even when another lookup drains the change event first.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_edit_during_fetch_is_not_cached_stale() {
    let store = Arc::new(MemoryStore::new(true));
    let registry = Arc::new(ParserRegistry::new(store.clone()));
    store.put(source("site", "r1", "list"));
    store.put(source("other", "r1", "list"));
    let release = store.hold_next_lookup("site");

    let pending = tokio::spawn({
        let registry = registry.clone();
        async move { registry.get_parser("site").await.unwrap().unwrap() }
    });
    store.held.notified().await;

    store.put(source("site", "r2", "data"));
    registry.get_parser("other").await.unwrap();
    release.send(()).unwrap();

    let raced = pending.await.unwrap();
    assert_eq!(raced.revision(), Some("r1"));
    assert_eq!(registry.cached_sources(), vec!["other".to_string()]);

    let fresh = registry.get_parser("site").await.unwrap().unwrap();
    assert_eq!(fresh.revision(), Some("r2"));
    assert_eq!(registry.get_parser("site").await.unwrap().unwrap().revision(), Some("r2"));
}

/// `clear_cache` during a fetch also keeps the fetched parser out of the cache.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_clear_during_fetch_skips_insert() {
    let store = Arc::new(MemoryStore::new(false));
    store.put(source("site", "r1", "list"));
    let registry = Arc::new(ParserRegistry::new(store.clone()));
    let release = store.hold_next_lookup("site");

    let pending = tokio::spawn({
        let registry = registry.clone();
        async move { registry.get_parser("site").await.unwrap() }
    });
    store.held.notified().await;
    assert_eq!(registry.clear_cache(None), 0);
    release.send(()).unwrap();

    assert!(pending.await.unwrap().is_some());
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_invalid_configuration_is_an_error() {
    let store = Arc::new(MemoryStore::new(false));
    let mut bad = source("bad", "r1", "list");
    if let Some(cfg) = bad.content_type_config.as_mut() {
        cfg.field_mappings.push(FieldMapping::new("dup", "vod_id"));
    }
    store.put(bad);
    let registry = ParserRegistry::new(store);

    let err = registry.get_parser("bad").await.unwrap_err();
    assert!(err.downcast_ref::<ConfigError>().is_some(), "{err:#}");
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_store_failure_propagates() {
    let registry = ParserRegistry::new(Arc::new(FailingStore));
    let err = registry.get_parser("any").await.unwrap_err();
    assert!(format!("{err:#}").contains("store offline"));
}

/// Concurrent lookups for different sources do not interfere.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_lookups() {
    let store = Arc::new(MemoryStore::new(false));
    for i in 0..8 {
        store.put(source(&format!("s{i}"), "r1", "list"));
    }
    let registry = Arc::new(ParserRegistry::new(store.clone()));

    let mut handles = Vec::new();
    for i in 0..32 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            let id = format!("s{}", i % 8);
            let parser = registry.get_parser(&id).await.unwrap().unwrap();
            assert_eq!(parser.source_id(), id);
        }));
    }
    for h in handles {
        h.await.unwrap();
    }
    assert_eq!(registry.len(), 8);
    assert!(store.lookups() >= 8);
}
