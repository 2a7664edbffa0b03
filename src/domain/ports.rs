use crate::domain::model::{CleanRecord, CollectionRef, Document, RawRecord};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Source of raw records for one run.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Human readable description of where records come from.
    fn describe(&self) -> String;

    /// Fetches the full record set. An empty vector is a valid, successful result.
    async fn extract(&self, store: &dyn DocumentStore) -> Result<Vec<RawRecord>>;
}

/// Total, 1:1 mapping from a raw record to a clean record.
pub trait Transformer: Send + Sync {
    type Output: CleanRecord;

    fn transform(&self, raw: &RawRecord) -> Self::Output;
}

/// One open session against a document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn ping(&self) -> Result<()>;

    async fn list_collections(&self, database: &str) -> Result<Vec<String>>;

    /// All documents of a collection, each carrying its `_id`. A missing
    /// collection reads as empty.
    async fn find_all(&self, collection: &CollectionRef) -> Result<Vec<Document>>;

    async fn drop_collection(&self, collection: &CollectionRef) -> Result<()>;

    /// Inserts in order and returns how many were written. On a mid-batch
    /// rejection the error is a `LoadError` carrying the count written so far.
    async fn insert_many(&self, collection: &CollectionRef, docs: Vec<Document>) -> Result<usize>;

    /// Moves `from` onto `to`, replacing `to` in one step.
    async fn rename_collection(&self, from: &CollectionRef, to: &CollectionRef) -> Result<()>;

    async fn insert_one(&self, collection: &CollectionRef, doc: Document) -> Result<String>;

    /// Merges `fields` into the document with the given id. Returns the
    /// number of matched documents.
    async fn update_one(
        &self,
        collection: &CollectionRef,
        id: &str,
        fields: Document,
    ) -> Result<u64>;

    async fn delete_one(&self, collection: &CollectionRef, id: &str) -> Result<u64>;

    /// Deletes the first document whose `field` equals `value`.
    async fn delete_where(
        &self,
        collection: &CollectionRef,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<u64>;

    async fn close(&self) -> Result<()>;
}

/// Opens store sessions; one session per pipeline run.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn DocumentStore>>;
}

/// Extract, transform and load contract of one refresh pipeline.
#[async_trait]
pub trait Pipeline: Send + Sync {
    fn name(&self) -> &str;

    fn target(&self) -> &CollectionRef;

    async fn extract(&self, store: &dyn DocumentStore) -> Result<Vec<RawRecord>>;

    fn transform(&self, data: &[RawRecord]) -> Result<Vec<Document>>;

    async fn load(
        &self,
        store: &dyn DocumentStore,
        docs: Vec<Document>,
    ) -> Result<crate::core::load::LoadOutcome>;

    /// Persists the raw records of this run, when the pipeline keeps a raw
    /// snapshot. Returns `None` when it does not.
    async fn snapshot_raw(
        &self,
        _store: &dyn DocumentStore,
        _raw: &[RawRecord],
    ) -> Result<Option<crate::core::load::LoadOutcome>> {
        Ok(None)
    }
}
