/// API response cache with absolute expiry
///
/// Keys are the hex SHA-256 of `endpoint|canonical-json(params)`. Expiry is
/// checked lazily on read (an expired hit is deleted and reported as a miss) and
/// swept in bulk by `cleanup`.

use std::ops::Bound;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use crate::types::InsightError;
use super::collection::{Document, IndexKey};
use super::database::API_CACHE;
use super::LocalStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCacheEntry {
    pub id: String,
    pub cache_key: String,
    pub response: Json,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub access_count: u64,
}

impl ApiCacheEntry {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCacheStats {
    pub entries: usize,
    pub expired: usize,
    pub total_hits: u64,
}

#[derive(Debug, Clone)]
pub struct ApiCache {
    store: LocalStore,
}

impl ApiCache {
    pub(crate) const fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// Deterministic key for an endpoint and its parameters.
    ///
    /// Object keys are serialized in sorted order, so parameter order does not
    /// change the key.
    #[must_use]
    pub fn cache_key(endpoint: &str, params: &Json) -> String {
        let mut hasher = Sha256::new();
        hasher.update(endpoint.as_bytes());
        hasher.update(b"|");
        hasher.update(canonical_json(params).as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Cached response, counting the hit. Expired entries are deleted and miss.
    pub fn get(&self, key: &str) -> Result<Option<Json>, InsightError> {
        let now = self.store.now();
        let mut db = self.store.lock()?;
        db.mutate(API_CACHE, |collection| {
            let Some(doc) = collection.get(key) else {
                return Ok(None);
            };
            let mut entry: ApiCacheEntry = doc.decode()?;
            if entry.is_expired(now) {
                collection.remove(key);
                debug!(key, "cache entry expired on read");
                return Ok(None);
            }
            entry.access_count += 1;
            let response = entry.response.clone();
            collection.put(Document::new(entry.id.clone(), serde_json::to_value(&entry)?));
            Ok(Some(response))
        })
    }

    /// Stores a response expiring `ttl_minutes` from now.
    pub fn set(&self, key: &str, response: Json, ttl_minutes: u32) -> Result<ApiCacheEntry, InsightError> {
        let now = self.store.now();
        let entry = ApiCacheEntry {
            id: key.to_string(),
            cache_key: key.to_string(),
            response,
            created_at: now,
            expires_at: now + Duration::minutes(i64::from(ttl_minutes)),
            access_count: 0,
        };
        let body = serde_json::to_value(&entry)?;
        let mut db = self.store.lock()?;
        db.mutate(API_CACHE, |collection| {
            collection.put(Document::new(entry.id.clone(), body));
            Ok(())
        })?;
        Ok(entry)
    }

    /// Miss -> `fetch` -> set. A failed fetch caches nothing.
    pub fn get_or_fetch<F>(&self, endpoint: &str, params: &Json, ttl_minutes: u32, fetch: F) -> Result<Json, InsightError>
    where
        F: FnOnce() -> Result<Json, InsightError>,
    {
        let key = Self::cache_key(endpoint, params);
        if let Some(hit) = self.get(&key)? {
            return Ok(hit);
        }
        let response = fetch()?;
        self.set(&key, response.clone(), ttl_minutes)?;
        Ok(response)
    }

    /// Removes every expired entry; returns the count.
    pub fn cleanup(&self) -> Result<usize, InsightError> {
        let now = self.store.now();
        let mut db = self.store.lock()?;
        let removed = db.mutate(API_CACHE, |collection| {
            let expired: Vec<String> = collection
                .range("expiresAt", Bound::Unbounded, Bound::Included(IndexKey::instant(now)))?
                .into_iter()
                .map(|doc| doc.id.clone())
                .collect();
            for id in &expired {
                collection.remove(id);
            }
            Ok(expired.len())
        })?;
        info!(removed, "api cache cleanup finished");
        Ok(removed)
    }

    /// Empties the cache unconditionally; returns how many entries were dropped.
    pub fn clear(&self) -> Result<usize, InsightError> {
        let mut db = self.store.lock()?;
        let removed = db.mutate(API_CACHE, |collection| Ok(collection.clear()))?;
        info!(removed, "api cache cleared");
        Ok(removed)
    }

    pub fn stats(&self) -> Result<ApiCacheStats, InsightError> {
        let now = self.store.now();
        let db = self.store.lock()?;
        let mut stats = ApiCacheStats::default();
        for doc in db.collection(API_CACHE)?.iter() {
            let entry: ApiCacheEntry = doc.decode()?;
            stats.entries += 1;
            stats.total_hits += entry.access_count;
            if entry.is_expired(now) {
                stats.expired += 1;
            }
        }
        Ok(stats)
    }
}

/// JSON text with object keys sorted at every level.
fn canonical_json(value: &Json) -> String {
    match value {
        Json::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{}:{}", Json::String(k.clone()), canonical_json(&map[k])))
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Json::Array(items) => {
            let items: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        scalar => scalar.to_string(),
    }
}
