use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};

use crate::parser::SourceParser;
use crate::storage::{ConfigChange, ConfigStore};

/// Cached parsers plus invalidation counters.
///
/// Every eviction bumps a generation (per source, or the shared epoch when
/// everything is dropped) so a lookup that fetched before the eviction can tell
/// its configuration may be stale.
#[derive(Default)]
struct CacheState {
    parsers: HashMap<String, SourceParser>,
    generations: HashMap<String, u64>,
    epoch: u64,
}

impl CacheState {
    fn stamp(&self, source_id: &str) -> (u64, u64) {
        (self.epoch, self.generations.get(source_id).copied().unwrap_or(0))
    }
}

/// Resolves source ids to prepared parsers and memoizes them.
///
/// Concurrent misses for the same source may each fetch and build a parser;
/// construction is side-effect free, so the last insert wins harmlessly. A
/// parser is only cached if its source was not invalidated while it was
/// being fetched.
pub struct ParserRegistry {
    store: Arc<dyn ConfigStore>,
    cache: RwLock<CacheState>,
    changes: Mutex<Option<broadcast::Receiver<ConfigChange>>>,
}

impl ParserRegistry {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        let changes = store.subscribe();
        Self { store, cache: RwLock::new(CacheState::default()), changes: Mutex::new(changes) }
    }

    /// Parser for `source_id`, or `None` when the source has no custom configuration.
    pub async fn get_parser(&self, source_id: &str) -> Result<Option<SourceParser>> {
        self.apply_pending_changes();
        let (hit, stamp) = {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            (cache.parsers.get(source_id).cloned(), cache.stamp(source_id))
        };
        if hit.is_some() {
            return Ok(hit);
        }

        let stored = self
            .store
            .get_configuration_for_source(source_id)
            .await
            .with_context(|| format!("loading configuration for source {source_id}"))?;
        let Some(source) = stored else {
            debug!(source_id, "no stored configuration; default decoding applies");
            return Ok(None);
        };
        let Some(config) = source.content_type_config else {
            debug!(source_id, "configuration has no content-type mapping; default decoding applies");
            return Ok(None);
        };
        config.validate().with_context(|| format!("invalid configuration for source {source_id}"))?;

        let parser = SourceParser::new(source_id, config, source.revision);

        // events published during the fetch must be seen before deciding to cache
        self.apply_pending_changes();
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if cache.stamp(source_id) != stamp {
            debug!(source_id, "configuration changed during lookup; parser not cached");
            return Ok(Some(parser));
        }
        info!(source_id, revision = parser.revision().unwrap_or("-"), "built parser");
        cache.parsers.insert(source_id.to_string(), parser.clone());
        Ok(Some(parser))
    }

    /// Evict one source, or every source when `source_id` is `None`. Returns the number evicted.
    pub fn clear_cache(&self, source_id: Option<&str>) -> usize {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let evicted = match source_id {
            Some(id) => {
                *cache.generations.entry(id.to_string()).or_default() += 1;
                usize::from(cache.parsers.remove(id).is_some())
            }
            None => {
                cache.epoch += 1;
                cache.generations.clear();
                let n = cache.parsers.len();
                cache.parsers.clear();
                n
            }
        };
        debug!(source_id = source_id.unwrap_or("*"), evicted, "cleared parser cache");
        evicted
    }

    pub fn cached_sources(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.cache.read().unwrap_or_else(PoisonError::into_inner).parsers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize { self.cache.read().unwrap_or_else(PoisonError::into_inner).parsers.len() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    fn apply_pending_changes(&self) {
        let mut guard = self.changes.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(rx) = guard.as_mut() else { return };
        let mut closed = false;
        loop {
            match rx.try_recv() {
                Ok(change) => {
                    self.clear_cache(Some(change.source_id()));
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Lagged(missed)) => {
                    warn!(missed, "configuration change feed lagged; dropping all cached parsers");
                    self.clear_cache(None);
                }
                Err(TryRecvError::Closed) => {
                    closed = true;
                    break;
                }
            }
        }
        if closed {
            *guard = None;
        }
    }
}
