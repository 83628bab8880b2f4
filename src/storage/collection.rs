/// Document collection with ordered secondary indexes
///
/// Documents are JSON objects keyed by id. Each secondary index maps the value at a JSON pointer to the ids
/// holding it; array values are indexed once per element (multi-entry).
/// RFC 3339 strings are indexed as instants so time ranges sort correctly.
/// Every change bumps `revision`, which tells the database whether a snapshot
/// needs rewriting.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use crate::types::InsightError;

/// Declared index: `name` over the value at `pointer` (e.g. `/metadata/name`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: &'static str,
    pub pointer: &'static str,
    pub multi_entry: bool,
}

impl IndexSpec {
    #[must_use]
    pub const fn new(name: &'static str, pointer: &'static str) -> Self {
        Self { name, pointer, multi_entry: false }
    }

    #[must_use]
    pub const fn multi(name: &'static str, pointer: &'static str) -> Self {
        Self { name, pointer, multi_entry: true }
    }
}

/// Ordered index key: null < bool < number < instant < text.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexKey {
    Null,
    Bool(bool),
    Number(f64),
    /// Microseconds since the epoch
    Instant(i64),
    Text(String),
}

impl IndexKey {
    const fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Number(_) => 2,
            Self::Instant(_) => 3,
            Self::Text(_) => 4,
        }
    }

    /// Key for a scalar JSON value; nested structures are not indexable.
    #[must_use]
    pub fn from_json(value: &Json) -> Option<Self> {
        match value {
            Json::Null => Some(Self::Null),
            Json::Bool(b) => Some(Self::Bool(*b)),
            Json::Number(n) => n.as_f64().map(Self::Number),
            Json::String(s) => Some(
                DateTime::parse_from_rfc3339(s)
                    .map_or_else(|_| Self::Text(s.clone()), |t| Self::Instant(t.timestamp_micros())),
            ),
            Json::Array(_) | Json::Object(_) => None,
        }
    }

    #[must_use]
    pub fn instant(at: DateTime<chrono::Utc>) -> Self {
        Self::Instant(at.timestamp_micros())
    }
}

impl Eq for IndexKey {}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Instant(a), Self::Instant(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl From<&str> for IndexKey {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub body: Json,
}

impl Document {
    #[must_use]
    pub const fn new(id: String, body: Json) -> Self {
        Self { id, body }
    }

    /// Deserializes the JSON body into a record type.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, InsightError> {
        Ok(T::deserialize(&self.body)?)
    }
}

#[derive(Debug, Clone)]
struct SecondaryIndex {
    spec: IndexSpec,
    entries: BTreeMap<IndexKey, BTreeSet<String>>,
}

impl SecondaryIndex {
    fn keys_for(&self, doc: &Document) -> Vec<IndexKey> {
        match doc.body.pointer(self.spec.pointer) {
            None => Vec::new(),
            Some(Json::Array(items)) if self.spec.multi_entry => {
                let mut keys: Vec<IndexKey> = items.iter().filter_map(IndexKey::from_json).collect();
                keys.sort();
                keys.dedup();
                keys
            }
            Some(value) => IndexKey::from_json(value).into_iter().collect(),
        }
    }

    fn insert(&mut self, doc: &Document) {
        for key in self.keys_for(doc) {
            self.entries.entry(key).or_default().insert(doc.id.clone());
        }
    }

    fn remove(&mut self, doc: &Document) {
        for key in self.keys_for(doc) {
            if let Some(ids) = self.entries.get_mut(&key) {
                ids.remove(&doc.id);
                if ids.is_empty() {
                    self.entries.remove(&key);
                }
            }
        }
    }
}

/// On-disk form of one document; the body is JSON text so the frame stays
/// independent of the body's shape.
#[derive(Debug, Serialize, Deserialize)]
struct StoredDocument {
    id: String,
    body: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct CollectionFrame {
    name: String,
    documents: Vec<StoredDocument>,
}

#[derive(Debug, Clone)]
pub struct Collection {
    name: String,
    documents: BTreeMap<String, Document>,
    indexes: Vec<SecondaryIndex>,
    revision: u64,
}

impl Collection {
    #[must_use]
    pub fn new(name: impl Into<String>, specs: Vec<IndexSpec>) -> Self {
        Self {
            name: name.into(),
            documents: BTreeMap::new(),
            indexes: specs
                .into_iter()
                .map(|spec| SecondaryIndex { spec, entries: BTreeMap::new() })
                .collect(),
            revision: 0,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Count of changes since the collection was opened.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Document> {
        self.documents.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    /// Inserts or replaces by id, keeping every index in step.
    pub fn put(&mut self, doc: Document) {
        if let Some(old) = self.documents.remove(&doc.id) {
            for index in &mut self.indexes {
                index.remove(&old);
            }
        }
        for index in &mut self.indexes {
            index.insert(&doc);
        }
        self.documents.insert(doc.id.clone(), doc);
        self.revision += 1;
    }

    pub fn remove(&mut self, id: &str) -> Option<Document> {
        let doc = self.documents.remove(id)?;
        for index in &mut self.indexes {
            index.remove(&doc);
        }
        self.revision += 1;
        Some(doc)
    }

    /// Removes every document; returns how many there were.
    pub fn clear(&mut self) -> usize {
        let count = self.documents.len();
        if count > 0 {
            self.documents.clear();
            for index in &mut self.indexes {
                index.entries.clear();
            }
            self.revision += 1;
        }
        count
    }

    fn index(&self, name: &str) -> Result<&SecondaryIndex, InsightError> {
        self.indexes
            .iter()
            .find(|i| i.spec.name == name)
            .ok_or_else(|| InsightError::StoreUnavailable(format!("collection '{}' has no index '{name}'", self.name)))
    }

    /// Documents whose indexed value lies in the range, in key order then id order.
    pub fn range(
        &self,
        index: &str,
        lower: Bound<IndexKey>,
        upper: Bound<IndexKey>,
    ) -> Result<Vec<&Document>, InsightError> {
        let index = self.index(index)?;
        if let (Bound::Included(l) | Bound::Excluded(l), Bound::Included(u) | Bound::Excluded(u)) = (&lower, &upper) {
            let open = matches!(lower, Bound::Excluded(_)) || matches!(upper, Bound::Excluded(_));
            // an empty range, which BTreeMap::range would reject
            if l > u || (l == u && open) {
                return Ok(Vec::new());
            }
        }
        let mut seen = BTreeSet::new();
        Ok(index
            .entries
            .range((lower, upper))
            .flat_map(|(_, ids)| ids.iter())
            .filter(|id| seen.insert(id.as_str()))
            .filter_map(|id| self.documents.get(id))
            .collect())
    }

    /// Documents whose indexed value equals `key`.
    pub fn lookup(&self, index: &str, key: &IndexKey) -> Result<Vec<&Document>, InsightError> {
        self.range(index, Bound::Included(key.clone()), Bound::Included(key.clone()))
    }

    /// Every indexed document ordered by the index, optionally descending.
    pub fn ordered_by(&self, index: &str, descending: bool) -> Result<Vec<&Document>, InsightError> {
        let mut docs = self.range(index, Bound::Unbounded, Bound::Unbounded)?;
        if descending {
            docs.reverse();
        }
        Ok(docs)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, InsightError> {
        let frame = CollectionFrame {
            name: self.name.clone(),
            documents: self
                .documents
                .values()
                .map(|doc| {
                    Ok(StoredDocument {
                        id: doc.id.clone(),
                        body: serde_json::to_string(&doc.body)?,
                    })
                })
                .collect::<Result<_, InsightError>>()?,
        };
        bincode::serialize(&frame).map_err(|e| InsightError::BinarySerialization(e.to_string()))
    }

    /// Rebuilds a collection (and its indexes) from a persisted frame.
    pub fn from_bytes(bytes: &[u8], specs: Vec<IndexSpec>) -> Result<Self, InsightError> {
        let frame: CollectionFrame =
            bincode::deserialize(bytes).map_err(|e| InsightError::BinarySerialization(e.to_string()))?;
        let mut collection = Self::new(frame.name, specs);
        for stored in frame.documents {
            let body = serde_json::from_str(&stored.body)?;
            collection.put(Document::new(stored.id, body));
        }
        collection.revision = 0;
        Ok(collection)
    }
}
