use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::vector_store::{
    BoxFuture, ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError, cosine_similarity,
    rank,
};

type Payload = HashMap<String, serde_json::Value>;

struct Collection {
    dimension: u64,
    points: BTreeMap<String, (Vec<f32>, Payload)>,
}

impl Collection {
    fn new(dimension: u64) -> Self {
        Self {
            dimension,
            points: BTreeMap::new(),
        }
    }

    fn insert(&mut self, point: VectorPoint) -> Result<(), VectorStoreError> {
        if point.vector.len() as u64 != self.dimension {
            return Err(VectorStoreError::Upsert(format!(
                "point {} has {} dimensions, collection expects {}",
                point.id,
                point.vector.len(),
                self.dimension
            )));
        }
        self.points.insert(point.id, (point.vector, point.payload));
        Ok(())
    }
}

/// Volatile chunk store for the `memory` backend and for tests.
///
/// Collections remember the vector size they were created with and reject
/// embeddings of any other length, so a model swap without a rebuild is
/// caught at upsert time instead of producing meaningless scores.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Collection>>, VectorStoreError> {
        self.collections
            .read()
            .map_err(|e| VectorStoreError::Connection(format!("store lock poisoned: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Collection>>, VectorStoreError> {
        self.collections
            .write()
            .map_err(|e| VectorStoreError::Connection(format!("store lock poisoned: {e}")))
    }
}

impl std::fmt::Debug for InMemoryVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let collections = self.read().map(|c| c.len()).unwrap_or_default();
        f.debug_struct("InMemoryVectorStore")
            .field("collections", &collections)
            .finish()
    }
}

impl VectorStore for InMemoryVectorStore {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let name = collection.to_owned();
        Box::pin(async move {
            self.write()?
                .entry(name)
                .or_insert_with(|| Collection::new(vector_size));
            Ok(())
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let name = collection.to_owned();
        Box::pin(async move { Ok(self.read()?.contains_key(&name)) })
    }

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let name = collection.to_owned();
        Box::pin(async move {
            self.write()?.remove(&name);
            Ok(())
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let name = collection.to_owned();
        Box::pin(async move {
            let mut collections = self.write()?;
            let target = collections
                .get_mut(&name)
                .ok_or_else(|| VectorStoreError::Upsert(format!("no collection named {name}")))?;
            points.into_iter().try_for_each(|p| target.insert(p))
        })
    }

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>> {
        let name = collection.to_owned();
        Box::pin(async move {
            let collections = self.read()?;
            let Some(source) = collections.get(&name) else {
                return Err(VectorStoreError::Search(format!("no collection named {name}")));
            };
            let scored = source
                .points
                .iter()
                .map(|(id, (stored, payload))| ScoredVectorPoint {
                    id: id.clone(),
                    score: cosine_similarity(&vector, stored),
                    payload: payload.clone(),
                })
                .collect();
            Ok(rank(scored, limit))
        })
    }

    fn count(&self, collection: &str) -> BoxFuture<'_, Result<u64, VectorStoreError>> {
        let name = collection.to_owned();
        Box::pin(async move {
            Ok(self
                .read()?
                .get(&name)
                .map_or(0, |c| c.points.len() as u64))
        })
    }

    fn flush(&self) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        Box::pin(async { Ok(()) })
    }
}
