use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use crate::types::InsightError;
use super::collection::{Collection, IndexSpec};

pub const DATABASE_NAME: &str = "insightease-db";
pub const SCHEMA_VERSION: u32 = 1;

pub const DATASETS: &str = "datasets";
pub const OPERATION_CHAINS: &str = "operationChains";
pub const VISUALIZATIONS: &str = "visualizations";
pub const API_CACHE: &str = "apiCache";

const SCHEMA_FILE: &str = "schema.json";
const PAYLOAD_DIR: &str = "payloads";

/// Index declarations per collection (schema version 1).
fn index_specs(collection: &str) -> Vec<IndexSpec> {
    match collection {
        DATASETS => vec![
            IndexSpec::new("name", "/metadata/name"),
            IndexSpec::new("createdAt", "/createdAt"),
            IndexSpec::multi("tags", "/metadata/tags"),
            IndexSpec::new("lastAccessedAt", "/lastAccessedAt"),
        ],
        OPERATION_CHAINS => vec![
            IndexSpec::new("name", "/name"),
            IndexSpec::new("createdAt", "/createdAt"),
            IndexSpec::new("updatedAt", "/updatedAt"),
        ],
        VISUALIZATIONS => vec![
            IndexSpec::new("datasetId", "/datasetId"),
            IndexSpec::new("createdAt", "/createdAt"),
        ],
        API_CACHE => vec![
            IndexSpec::new("expiresAt", "/expiresAt"),
            IndexSpec::new("accessCount", "/accessCount"),
        ],
        _ => Vec::new(),
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SchemaFile {
    name: String,
    version: u32,
    collections: Vec<String>,
}

/// The single local database: four named collections persisted under
/// `<root>/insightease-db/`, one `<collection>.bin` snapshot each.
///
/// Large binary payloads live beside the snapshots in
/// `payloads/<collection>/<sha256(id)>.v<version>.lz4`, one immutable file per
/// record version, so rewriting a snapshot never copies them.
#[derive(Debug)]
pub struct LocalDatabase {
    dir: PathBuf,
    collections: HashMap<&'static str, Collection>,
}

impl LocalDatabase {
    pub const COLLECTIONS: [&'static str; 4] = [DATASETS, OPERATION_CHAINS, VISUALIZATIONS, API_CACHE];

    /// Opens (or creates) the database under `root`.
    ///
    /// A directory written with another schema version is rejected with
    /// `SchemaMismatch` rather than reinterpreted.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, InsightError> {
        let dir = root.as_ref().join(DATABASE_NAME);
        fs::create_dir_all(&dir)?;

        let schema_path = dir.join(SCHEMA_FILE);
        if schema_path.exists() {
            let schema: SchemaFile = serde_json::from_slice(&fs::read(&schema_path)?)?;
            if schema.version != SCHEMA_VERSION {
                return Err(InsightError::SchemaMismatch { found: schema.version, expected: SCHEMA_VERSION });
            }
        } else {
            let schema = SchemaFile {
                name: DATABASE_NAME.to_string(),
                version: SCHEMA_VERSION,
                collections: Self::COLLECTIONS.iter().map(ToString::to_string).collect(),
            };
            fs::write(&schema_path, serde_json::to_vec_pretty(&schema)?)?;
        }

        let mut collections = HashMap::new();
        for name in Self::COLLECTIONS {
            let path = Self::collection_path(&dir, name);
            let collection = if path.exists() {
                Collection::from_bytes(&fs::read(&path)?, index_specs(name))?
            } else {
                Collection::new(name, index_specs(name))
            };
            debug!(collection = name, documents = collection.len(), "collection loaded");
            collections.insert(name, collection);
        }

        info!(path = %dir.display(), version = SCHEMA_VERSION, "local database opened");
        Ok(Self { dir, collections })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn collection_path(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{name}.bin"))
    }

    pub fn collection(&self, name: &str) -> Result<&Collection, InsightError> {
        self.collections
            .get(name)
            .ok_or_else(|| InsightError::StoreUnavailable(format!("unknown collection '{name}'")))
    }

    pub fn collection_mut(&mut self, name: &str) -> Result<&mut Collection, InsightError> {
        self.collections
            .get_mut(name)
            .ok_or_else(|| InsightError::StoreUnavailable(format!("unknown collection '{name}'")))
    }

    /// Writes one collection snapshot (temp file, then rename).
    pub fn persist(&self, name: &str) -> Result<(), InsightError> {
        self.write_snapshot(name, self.collection(name)?)
    }

    fn write_snapshot(&self, name: &str, collection: &Collection) -> Result<(), InsightError> {
        let path = Self::collection_path(&self.dir, name);
        write_atomic(&path, &collection.to_bytes()?)
    }

    /// Applies `f` to a copy of a collection. The copy replaces the live
    /// collection only if `f` succeeds and, when it changed anything, only
    /// after the snapshot is on disk. An unchanged collection is not rewritten.
    pub fn mutate<R>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Collection) -> Result<R, InsightError>,
    ) -> Result<R, InsightError> {
        let current = self.collection(name)?;
        let revision = current.revision();
        let mut staged = current.clone();

        let result = f(&mut staged)?;
        if staged.revision() != revision {
            self.write_snapshot(name, &staged)?;
            *self.collection_mut(name)? = staged;
        }
        Ok(result)
    }

    fn payload_path(&self, collection: &str, id: &str, version: u64) -> PathBuf {
        let digest = hex::encode(Sha256::digest(id.as_bytes()));
        self.dir.join(PAYLOAD_DIR).join(collection).join(format!("{digest}.v{version}.lz4"))
    }

    pub fn write_payload(&self, collection: &str, id: &str, version: u64, bytes: &[u8]) -> Result<(), InsightError> {
        let path = self.payload_path(collection, id, version);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_atomic(&path, bytes)
    }

    pub fn read_payload(&self, collection: &str, id: &str, version: u64) -> Result<Vec<u8>, InsightError> {
        match fs::read(self.payload_path(collection, id, version)) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(InsightError::StoreUnavailable(format!(
                "payload of '{id}' (version {version}) is missing"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Best effort: a payload left behind is unreachable, not corrupting.
    pub fn remove_payload(&self, collection: &str, id: &str, version: u64) {
        match fs::remove_file(self.payload_path(collection, id, version)) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(collection, id, version, error = %e, "could not remove payload"),
        }
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), InsightError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::collection::Document;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_layout() {
        let temp_dir = TempDir::new().unwrap();
        let db = LocalDatabase::open(temp_dir.path()).unwrap();
        assert!(db.path().ends_with(DATABASE_NAME));
        assert!(db.path().join(SCHEMA_FILE).exists());
        for name in LocalDatabase::COLLECTIONS {
            assert!(db.collection(name).unwrap().is_empty());
        }
        assert!(db.collection("missing").is_err());
    }

    #[test]
    fn test_persist_and_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut db = LocalDatabase::open(temp_dir.path()).unwrap();
            db.mutate(OPERATION_CHAINS, |c| {
                c.put(Document::new("c1".into(), json!({"name": "chain", "updatedAt": "2024-01-01T00:00:00Z"})));
                Ok(())
            })
            .unwrap();
        }
        let db = LocalDatabase::open(temp_dir.path()).unwrap();
        let chains = db.collection(OPERATION_CHAINS).unwrap();
        assert_eq!(chains.len(), 1);
        assert_eq!(chains.lookup("name", &"chain".into()).unwrap().len(), 1);
    }

    #[test]
    fn test_unchanged_collection_is_not_rewritten() {
        let temp_dir = TempDir::new().unwrap();
        let mut db = LocalDatabase::open(temp_dir.path()).unwrap();
        let snapshot = db.path().join("operationChains.bin");

        let removed = db.mutate(OPERATION_CHAINS, |c| Ok(c.remove("absent").is_some())).unwrap();
        assert!(!removed);
        assert!(!snapshot.exists());

        db.mutate(OPERATION_CHAINS, |c| {
            c.put(Document::new("c1".into(), json!({"name": "chain"})));
            Ok(())
        })
        .unwrap();
        assert!(snapshot.exists());
    }

    #[test]
    fn test_failed_write_keeps_memory_in_step_with_disk() {
        let temp_dir = TempDir::new().unwrap();
        let mut db = LocalDatabase::open(temp_dir.path()).unwrap();
        // a directory in the way of the temp file makes the snapshot write fail
        let blocker = db.path().join("operationChains.bin.tmp");
        fs::create_dir(&blocker).unwrap();

        let put = |c: &mut Collection| {
            c.put(Document::new("c1".into(), json!({"name": "chain"})));
            Ok(())
        };
        assert!(matches!(db.mutate(OPERATION_CHAINS, put), Err(InsightError::Io(_))));
        assert!(db.collection(OPERATION_CHAINS).unwrap().get("c1").is_none());

        // a failing closure leaves the collection alone as well
        let failed: Result<(), _> = db.mutate(OPERATION_CHAINS, |c| {
            c.put(Document::new("c2".into(), json!({})));
            Err(InsightError::StoreUnavailable("stop".into()))
        });
        assert!(failed.is_err());
        assert!(db.collection(OPERATION_CHAINS).unwrap().is_empty());

        fs::remove_dir(&blocker).unwrap();
        db.mutate(OPERATION_CHAINS, put).unwrap();
        drop(db);
        let db = LocalDatabase::open(temp_dir.path()).unwrap();
        assert!(db.collection(OPERATION_CHAINS).unwrap().get("c1").is_some());
    }

    #[test]
    fn test_payload_files() {
        let temp_dir = TempDir::new().unwrap();
        let db = LocalDatabase::open(temp_dir.path()).unwrap();
        db.write_payload(DATASETS, "../odd id", 1, &[1, 2, 3]).unwrap();
        assert_eq!(db.read_payload(DATASETS, "../odd id", 1).unwrap(), vec![1, 2, 3]);
        assert!(matches!(db.read_payload(DATASETS, "../odd id", 2), Err(InsightError::StoreUnavailable(_))));

        db.remove_payload(DATASETS, "../odd id", 1);
        db.remove_payload(DATASETS, "../odd id", 1);
        assert!(db.read_payload(DATASETS, "../odd id", 1).is_err());
        assert_eq!(fs::read_dir(db.path().join(PAYLOAD_DIR).join(DATASETS)).unwrap().count(), 0);
    }

    #[test]
    fn test_schema_mismatch() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join(DATABASE_NAME);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(SCHEMA_FILE),
            serde_json::to_vec(&json!({"name": DATABASE_NAME, "version": 2, "collections": []})).unwrap(),
        )
        .unwrap();
        let err = LocalDatabase::open(temp_dir.path()).unwrap_err();
        assert!(matches!(err, InsightError::SchemaMismatch { found: 2, expected: 1 }));
    }
}
