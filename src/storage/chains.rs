/// Operation-chain store - uncompressed CRUD, listed most recently updated first
use tracing::debug;
use crate::types::{InsightError, OperationChain};
use super::collection::{Document, IndexKey};
use super::database::OPERATION_CHAINS;
use super::LocalStore;

#[derive(Debug, Clone)]
pub struct ChainStore {
    store: LocalStore,
}

impl ChainStore {
    pub(crate) const fn new(store: LocalStore) -> Self {
        Self { store }
    }

    pub fn save(&self, chain: &OperationChain) -> Result<(), InsightError> {
        let body = serde_json::to_value(chain)?;
        let mut db = self.store.lock()?;
        db.mutate(OPERATION_CHAINS, |collection| {
            collection.put(Document::new(chain.id.clone(), body));
            Ok(())
        })?;
        debug!(id = %chain.id, steps = chain.len(), "chain saved");
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<OperationChain>, InsightError> {
        let db = self.store.lock()?;
        db.collection(OPERATION_CHAINS)?.get(id).map(Document::decode).transpose()
    }

    pub fn list(&self) -> Result<Vec<OperationChain>, InsightError> {
        let db = self.store.lock()?;
        db.collection(OPERATION_CHAINS)?
            .ordered_by("updatedAt", true)?
            .into_iter()
            .map(Document::decode)
            .collect()
    }

    pub fn find_by_name(&self, name: &str) -> Result<Vec<OperationChain>, InsightError> {
        let db = self.store.lock()?;
        db.collection(OPERATION_CHAINS)?
            .lookup("name", &IndexKey::from(name))?
            .into_iter()
            .map(Document::decode)
            .collect()
    }

    pub fn delete(&self, id: &str) -> Result<bool, InsightError> {
        let mut db = self.store.lock()?;
        db.mutate(OPERATION_CHAINS, |collection| Ok(collection.remove(id).is_some()))
    }
}
