/// Dataset store - compressed tables with metadata and access accounting
///
/// Metadata lives in the document body. The compressed table is a payload file
/// per record version, so listing never touches row data and access accounting
/// rewrites metadata only. `save` is last-write-wins; `save_if_version` rejects
/// writes based on a stale version.

use std::ops::Bound;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use crate::types::{InsightError, Table, TableSource};
use super::collection::{Document, IndexKey};
use super::compression::{compress_with_stats, decompress};
use super::database::DATASETS;
use super::LocalStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetMetadata {
    pub name: String,
    /// Uncompressed JSON size in bytes
    pub size: usize,
    pub compressed_size: usize,
    pub row_count: usize,
    pub col_count: usize,
    pub columns: Vec<String>,
    pub source: TableSource,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Stored dataset record, without its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDataset {
    pub id: String,
    pub metadata: DatasetMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub access_count: u64,
    pub last_accessed_at: DateTime<Utc>,
    /// Starts at 1, incremented on every save
    pub version: u64,
}

#[derive(Debug, Clone)]
pub struct DatasetStore {
    store: LocalStore,
}

impl DatasetStore {
    pub(crate) const fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// Upserts by table id. Access accounting is reset only on first insert.
    pub fn save(&self, table: &Table, source: TableSource) -> Result<StoredDataset, InsightError> {
        self.write(table, source, Vec::new(), None)
    }

    pub fn save_with_tags(
        &self,
        table: &Table,
        source: TableSource,
        tags: Vec<String>,
    ) -> Result<StoredDataset, InsightError> {
        self.write(table, source, tags, None)
    }

    /// Saves only if the stored version equals `expected` (0 = must not exist yet).
    pub fn save_if_version(
        &self,
        table: &Table,
        source: TableSource,
        expected: u64,
    ) -> Result<StoredDataset, InsightError> {
        self.write(table, source, Vec::new(), Some(expected))
    }

    fn write(
        &self,
        table: &Table,
        source: TableSource,
        tags: Vec<String>,
        expected: Option<u64>,
    ) -> Result<StoredDataset, InsightError> {
        let (payload, stats) = compress_with_stats(table)?;
        let now = self.store.now();

        let mut db = self.store.lock()?;
        let existing: Option<StoredDataset> = db.collection(DATASETS)?.get(&table.id).map(Document::decode).transpose()?;
        let found = existing.as_ref().map_or(0, |r| r.version);
        if let Some(expected) = expected {
            if expected != found {
                return Err(InsightError::VersionConflict { id: table.id.clone(), expected, found });
            }
        }

        let tags = match (&existing, tags.is_empty()) {
            // keep earlier tags when the caller did not pass any
            (Some(old), true) => old.metadata.tags.clone(),
            _ => tags,
        };
        let metadata = DatasetMetadata {
            name: table.name.clone(),
            size: stats.original_size,
            compressed_size: stats.compressed_size,
            row_count: table.row_count(),
            col_count: table.col_count(),
            columns: table.columns.clone(),
            source,
            created_at: table.created_at,
            tags,
        };
        let record = match existing {
            Some(old) => StoredDataset {
                metadata,
                updated_at: now,
                version: old.version + 1,
                ..old
            },
            None => StoredDataset {
                id: table.id.clone(),
                metadata,
                created_at: now,
                updated_at: now,
                access_count: 0,
                last_accessed_at: now,
                version: 1,
            },
        };

        // new payload first; the record only points at it once both are on disk
        db.write_payload(DATASETS, &record.id, record.version, &payload)?;
        let body = serde_json::to_value(&record)?;
        let committed = db.mutate(DATASETS, |collection| {
            collection.put(Document::new(record.id.clone(), body));
            Ok(())
        });
        if let Err(e) = committed {
            db.remove_payload(DATASETS, &record.id, record.version);
            return Err(e);
        }
        if found > 0 {
            db.remove_payload(DATASETS, &record.id, found);
        }

        debug!(
            id = %record.id,
            version = record.version,
            rows = record.metadata.row_count,
            ratio = stats.ratio,
            "dataset saved"
        );
        Ok(record)
    }

    /// Decompresses the table and records the access; `None` if absent.
    ///
    /// A miss writes nothing; a hit rewrites the metadata snapshot only.
    pub fn load(&self, id: &str) -> Result<Option<Table>, InsightError> {
        let now = self.store.now();
        let mut db = self.store.lock()?;
        let Some(doc) = db.collection(DATASETS)?.get(id) else {
            return Ok(None);
        };
        let mut record: StoredDataset = doc.decode()?;
        let table: Table = decompress(&db.read_payload(DATASETS, id, record.version)?)?;

        record.access_count += 1;
        record.last_accessed_at = now;
        let body = serde_json::to_value(&record)?;
        db.mutate(DATASETS, |collection| {
            collection.put(Document::new(record.id.clone(), body));
            Ok(())
        })?;
        Ok(Some(table))
    }

    /// Record without payload or access accounting.
    pub fn get(&self, id: &str) -> Result<Option<StoredDataset>, InsightError> {
        let db = self.store.lock()?;
        db.collection(DATASETS)?.get(id).map(Document::decode).transpose()
    }

    /// All records, newest first. No payload is decompressed.
    pub fn list_metadata(&self) -> Result<Vec<StoredDataset>, InsightError> {
        let db = self.store.lock()?;
        db.collection(DATASETS)?
            .ordered_by("createdAt", true)?
            .into_iter()
            .map(Document::decode)
            .collect()
    }

    pub fn find_by_tag(&self, tag: &str) -> Result<Vec<StoredDataset>, InsightError> {
        let db = self.store.lock()?;
        db.collection(DATASETS)?
            .lookup("tags", &IndexKey::from(tag))?
            .into_iter()
            .map(Document::decode)
            .collect()
    }

    pub fn find_by_name(&self, name: &str) -> Result<Vec<StoredDataset>, InsightError> {
        let db = self.store.lock()?;
        db.collection(DATASETS)?
            .lookup("name", &IndexKey::from(name))?
            .into_iter()
            .map(Document::decode)
            .collect()
    }

    pub fn delete(&self, id: &str) -> Result<bool, InsightError> {
        let mut db = self.store.lock()?;
        if db.collection(DATASETS)?.get(id).is_none() {
            return Ok(false);
        }
        let removed: Option<StoredDataset> = db.mutate(DATASETS, |collection| {
            collection.remove(id).as_ref().map(Document::decode).transpose()
        })?;
        if let Some(record) = &removed {
            db.remove_payload(DATASETS, &record.id, record.version);
        }
        Ok(removed.is_some())
    }

    /// Deletes every dataset not accessed within `max_age_days`; returns the count.
    pub fn cleanup(&self, max_age_days: u32) -> Result<usize, InsightError> {
        let cutoff = self.store.now() - Duration::days(i64::from(max_age_days));
        self.cleanup_before(cutoff)
    }

    /// Deletes every dataset whose last access is strictly before `cutoff`.
    pub fn cleanup_before(&self, cutoff: DateTime<Utc>) -> Result<usize, InsightError> {
        let mut db = self.store.lock()?;
        let stale: Vec<StoredDataset> = db
            .collection(DATASETS)?
            .range("lastAccessedAt", Bound::Unbounded, Bound::Excluded(IndexKey::instant(cutoff)))?
            .into_iter()
            .map(Document::decode)
            .collect::<Result<_, _>>()?;
        if stale.is_empty() {
            return Ok(0);
        }

        db.mutate(DATASETS, |collection| {
            for record in &stale {
                collection.remove(&record.id);
            }
            Ok(())
        })?;
        for record in &stale {
            db.remove_payload(DATASETS, &record.id, record.version);
        }
        let removed = stale.len();
        info!(removed, %cutoff, "dataset cleanup finished");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ManualClock, DATABASE_NAME};
    use crate::types::{Row, Value};
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn create_test_table(name: &str) -> Table {
        Table::new(
            name,
            vec!["id".into(), "city".into()],
            vec![
                Row::from_pairs([("id", Value::Integer(1)), ("city", Value::from("Oslo"))]),
                Row::from_pairs([("id", Value::Integer(2)), ("city", Value::Null)]),
            ],
        )
    }

    fn open(temp_dir: &TempDir) -> (LocalStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = LocalStore::open_with_clock(temp_dir.path(), clock.clone()).unwrap();
        (store, clock)
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let (store, _) = open(&temp_dir);
        let datasets = store.datasets();
        let table = create_test_table("cities");

        let record = datasets.save(&table, TableSource::Upload).unwrap();
        assert_eq!(record.version, 1);
        assert_eq!(record.access_count, 0);
        assert_eq!(record.metadata.row_count, 2);
        assert!(record.metadata.compressed_size > 0);

        let loaded = datasets.load(&table.id).unwrap().unwrap();
        assert_eq!(loaded, table);
        assert_eq!(datasets.get(&table.id).unwrap().unwrap().access_count, 1);
        assert!(datasets.load("missing").unwrap().is_none());
    }

    #[test]
    fn test_resave_keeps_access_accounting() {
        let temp_dir = TempDir::new().unwrap();
        let (store, clock) = open(&temp_dir);
        let datasets = store.datasets();
        let mut table = create_test_table("cities");
        let first = datasets.save(&table, TableSource::Upload).unwrap();
        datasets.load(&table.id).unwrap();

        clock.advance(Duration::minutes(1));
        table.rows.pop();
        let second = datasets.save(&table, TableSource::Derived).unwrap();
        assert_eq!(second.version, 2);
        assert_eq!(second.access_count, 1);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at > first.updated_at);
        assert_eq!(second.metadata.row_count, 1);
    }

    #[test]
    fn test_save_if_version_rejects_stale_writes() {
        let temp_dir = TempDir::new().unwrap();
        let (store, _) = open(&temp_dir);
        let datasets = store.datasets();
        let table = create_test_table("cities");

        datasets.save_if_version(&table, TableSource::Upload, 0).unwrap();
        datasets.save_if_version(&table, TableSource::Upload, 1).unwrap();
        let err = datasets.save_if_version(&table, TableSource::Upload, 1).unwrap_err();
        assert!(matches!(err, InsightError::VersionConflict { expected: 1, found: 2, .. }));
    }

    #[test]
    fn test_cleanup_uses_last_access() {
        let temp_dir = TempDir::new().unwrap();
        let (store, clock) = open(&temp_dir);
        let datasets = store.datasets();
        let old = create_test_table("old");
        let used = create_test_table("used");
        datasets.save(&old, TableSource::Upload).unwrap();
        datasets.save(&used, TableSource::Upload).unwrap();

        clock.advance(Duration::days(10));
        datasets.load(&used.id).unwrap();
        clock.advance(Duration::days(25));

        assert_eq!(datasets.cleanup(30).unwrap(), 1);
        assert!(datasets.get(&old.id).unwrap().is_none());
        assert!(datasets.get(&used.id).unwrap().is_some());
    }

    #[test]
    fn test_list_tags_and_delete() {
        let temp_dir = TempDir::new().unwrap();
        let (store, clock) = open(&temp_dir);
        let datasets = store.datasets();
        let a = create_test_table("a");
        let b = create_test_table("b");
        datasets.save_with_tags(&a, TableSource::Upload, vec!["sales".into(), "q1".into()]).unwrap();
        clock.advance(Duration::seconds(1));
        datasets.save_with_tags(&b, TableSource::Upload, vec!["sales".into()]).unwrap();

        let names: Vec<String> = datasets.list_metadata().unwrap().into_iter().map(|r| r.metadata.name).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(datasets.find_by_tag("sales").unwrap().len(), 2);
        assert_eq!(datasets.find_by_tag("q1").unwrap()[0].id, a.id);
        assert_eq!(datasets.find_by_name("b").unwrap().len(), 1);

        assert!(datasets.delete(&a.id).unwrap());
        assert!(!datasets.delete(&a.id).unwrap());
        assert_eq!(datasets.list_metadata().unwrap().len(), 1);
    }

    fn payload_files(temp_dir: &TempDir) -> usize {
        let dir = temp_dir.path().join(DATABASE_NAME).join("payloads").join(DATASETS);
        fs::read_dir(dir).map_or(0, Iterator::count)
    }

    #[test]
    fn test_miss_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let (store, clock) = open(&temp_dir);
        let datasets = store.datasets();
        let table = create_test_table("cities");
        datasets.save(&table, TableSource::Upload).unwrap();

        let snapshot = temp_dir.path().join(DATABASE_NAME).join("datasets.bin");
        fs::remove_file(&snapshot).unwrap();
        clock.advance(Duration::days(40));
        assert!(datasets.load("missing").unwrap().is_none());
        assert!(!datasets.delete("missing").unwrap());
        assert_eq!(datasets.cleanup_before(Utc::now() - Duration::days(365)).unwrap(), 0);
        assert!(!snapshot.exists());

        datasets.load(&table.id).unwrap();
        assert!(snapshot.exists());
    }

    #[test]
    fn test_metadata_snapshot_excludes_row_data() {
        let temp_dir = TempDir::new().unwrap();
        let (store, _) = open(&temp_dir);
        let datasets = store.datasets();
        let rows = (0..5_000)
            .map(|i| Row::from_pairs([("id", Value::Integer(i)), ("city", Value::from(format!("city-{}", i * 7919 % 10_007)))]))
            .collect();
        let big = Table::new("big", vec!["id".into(), "city".into()], rows);
        let record = datasets.save(&big, TableSource::Upload).unwrap();
        datasets.load(&big.id).unwrap();

        let snapshot = temp_dir.path().join(DATABASE_NAME).join("datasets.bin");
        let snapshot_len = fs::metadata(snapshot).unwrap().len();
        assert!(snapshot_len < record.metadata.compressed_size as u64, "{snapshot_len} bytes");
    }

    #[test]
    fn test_payload_follows_the_record() {
        let temp_dir = TempDir::new().unwrap();
        let (store, clock) = open(&temp_dir);
        let datasets = store.datasets();
        let mut table = create_test_table("cities");

        datasets.save(&table, TableSource::Upload).unwrap();
        table.rows.pop();
        datasets.save(&table, TableSource::Upload).unwrap();
        assert_eq!(payload_files(&temp_dir), 1);
        assert_eq!(datasets.load(&table.id).unwrap().unwrap().row_count(), 1);

        assert!(datasets.delete(&table.id).unwrap());
        assert_eq!(payload_files(&temp_dir), 0);

        datasets.save(&table, TableSource::Upload).unwrap();
        clock.advance(Duration::days(31));
        assert_eq!(datasets.cleanup(30).unwrap(), 1);
        assert_eq!(payload_files(&temp_dir), 0);
    }

    #[test]
    fn test_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let table = create_test_table("persisted");
        {
            let (store, _) = open(&temp_dir);
            store.datasets().save(&table, TableSource::Upload).unwrap();
        }
        let (store, _) = open(&temp_dir);
        assert_eq!(store.datasets().load(&table.id).unwrap(), Some(table));
    }
}
