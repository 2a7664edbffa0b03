use super::{assign_id, merge_fields, field_matches};
use crate::domain::model::{CollectionRef, Document, ID_FIELD};
use crate::domain::ports::{DocumentStore, StoreConnector};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Process-local document store. Clones share the same data, so a clone
/// handed out as a session sees every write made through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: Arc<Mutex<BTreeMap<CollectionRef, Vec<Document>>>>,
    open_sessions: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions handed out by `connect` and not yet closed.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreConnector for MemoryStore {
    async fn connect(&self) -> Result<Box<dyn DocumentStore>> {
        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn list_collections(&self, database: &str) -> Result<Vec<String>> {
        let collections = self.collections.lock().await;
        Ok(collections
            .keys()
            .filter(|c| c.database == database)
            .map(|c| c.name.clone())
            .collect())
    }

    async fn find_all(&self, collection: &CollectionRef) -> Result<Vec<Document>> {
        let collections = self.collections.lock().await;
        Ok(collections.get(collection).cloned().unwrap_or_default())
    }

    async fn drop_collection(&self, collection: &CollectionRef) -> Result<()> {
        self.collections.lock().await.remove(collection);
        Ok(())
    }

    async fn insert_many(&self, collection: &CollectionRef, docs: Vec<Document>) -> Result<usize> {
        let count = docs.len();
        let mut collections = self.collections.lock().await;
        let entry = collections.entry(collection.clone()).or_default();
        entry.extend(docs.into_iter().map(assign_id));
        Ok(count)
    }

    async fn rename_collection(&self, from: &CollectionRef, to: &CollectionRef) -> Result<()> {
        let mut collections = self.collections.lock().await;
        let docs = collections.remove(from).unwrap_or_default();
        collections.insert(to.clone(), docs);
        Ok(())
    }

    async fn insert_one(&self, collection: &CollectionRef, doc: Document) -> Result<String> {
        let doc = assign_id(doc);
        let id = doc
            .get(ID_FIELD)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let mut collections = self.collections.lock().await;
        collections.entry(collection.clone()).or_default().push(doc);
        Ok(id)
    }

    async fn update_one(
        &self,
        collection: &CollectionRef,
        id: &str,
        fields: Document,
    ) -> Result<u64> {
        let mut collections = self.collections.lock().await;
        let target = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| has_id(d, id)));
        match target {
            Some(doc) => {
                merge_fields(doc, fields);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_one(&self, collection: &CollectionRef, id: &str) -> Result<u64> {
        self.remove_first(collection, |d| has_id(d, id)).await
    }

    async fn delete_where(
        &self,
        collection: &CollectionRef,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<u64> {
        self.remove_first(collection, |d| field_matches(d, field, value))
            .await
    }

    async fn close(&self) -> Result<()> {
        // 只計數，不會低於零
        let _ = self
            .open_sessions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        Ok(())
    }
}

impl MemoryStore {
    async fn remove_first<F>(&self, collection: &CollectionRef, predicate: F) -> Result<u64>
    where
        F: Fn(&Document) -> bool + Send,
    {
        let mut collections = self.collections.lock().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        match docs.iter().position(|d| predicate(d)) {
            Some(index) => {
                docs.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

fn has_id(doc: &Document, id: &str) -> bool {
    doc.get(ID_FIELD).and_then(|v| v.as_str()) == Some(id)
}
