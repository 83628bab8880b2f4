use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::types::InsightError;
use super::collection::{Document, IndexKey};
use super::database::VISUALIZATIONS;
use super::LocalStore;

/// Saved chart definition over a stored dataset. Rendering happens elsewhere;
/// `config` is kept as opaque JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visualization {
    pub id: String,
    pub dataset_id: String,
    pub name: String,
    pub chart_type: String,
    pub config: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Visualization {
    #[must_use]
    pub fn new(
        dataset_id: impl Into<String>,
        name: impl Into<String>,
        chart_type: impl Into<String>,
        config: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            dataset_id: dataset_id.into(),
            name: name.into(),
            chart_type: chart_type.into(),
            config,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VisualizationStore {
    store: LocalStore,
}

impl VisualizationStore {
    pub(crate) const fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// Upsert; stamps `updated_at` with the store clock.
    pub fn save(&self, visualization: &Visualization) -> Result<Visualization, InsightError> {
        let mut saved = visualization.clone();
        saved.updated_at = self.store.now();
        let body = serde_json::to_value(&saved)?;
        let mut db = self.store.lock()?;
        db.mutate(VISUALIZATIONS, |collection| {
            collection.put(Document::new(saved.id.clone(), body));
            Ok(())
        })?;
        Ok(saved)
    }

    pub fn get(&self, id: &str) -> Result<Option<Visualization>, InsightError> {
        let db = self.store.lock()?;
        db.collection(VISUALIZATIONS)?.get(id).map(Document::decode).transpose()
    }

    /// Visualizations of one dataset, oldest first.
    pub fn list_for_dataset(&self, dataset_id: &str) -> Result<Vec<Visualization>, InsightError> {
        let db = self.store.lock()?;
        let mut out: Vec<Visualization> = db
            .collection(VISUALIZATIONS)?
            .lookup("datasetId", &IndexKey::from(dataset_id))?
            .into_iter()
            .map(Document::decode)
            .collect::<Result<_, _>>()?;
        out.sort_by_key(|v| v.created_at);
        Ok(out)
    }

    pub fn delete(&self, id: &str) -> Result<bool, InsightError> {
        let mut db = self.store.lock()?;
        db.mutate(VISUALIZATIONS, |collection| Ok(collection.remove(id).is_some()))
    }

    /// Removes every visualization of a dataset; returns the count.
    pub fn delete_for_dataset(&self, dataset_id: &str) -> Result<usize, InsightError> {
        let mut db = self.store.lock()?;
        db.mutate(VISUALIZATIONS, |collection| {
            let ids: Vec<String> = collection
                .lookup("datasetId", &IndexKey::from(dataset_id))?
                .into_iter()
                .map(|doc| doc.id.clone())
                .collect();
            for id in &ids {
                collection.remove(id);
            }
            Ok(ids.len())
        })
    }
}
