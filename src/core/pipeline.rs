use crate::core::load::{replace_collection, LoadOptions, LoadOutcome};
use crate::domain::model::{CleanRecord, CollectionRef, Document, RawRecord};
use crate::domain::ports::{DocumentStore, Extractor, Pipeline, Transformer};
use crate::utils::error::{EtlError, Result};
use serde_json::Value;

/// Field stamped on raw snapshot documents.
pub const INGESTED_AT_FIELD: &str = "ingested_at";

/// Extract → transform → full-refresh load into one target collection.
pub struct RefreshPipeline<T: Transformer> {
    name: String,
    extractor: Box<dyn Extractor>,
    transformer: T,
    target: CollectionRef,
    options: LoadOptions,
    raw_snapshot: Option<CollectionRef>,
}

impl<T: Transformer> RefreshPipeline<T> {
    pub fn new(
        name: impl Into<String>,
        extractor: Box<dyn Extractor>,
        transformer: T,
        target: CollectionRef,
    ) -> Self {
        Self {
            name: name.into(),
            extractor,
            transformer,
            target,
            options: LoadOptions::default(),
            raw_snapshot: None,
        }
    }

    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    /// Also keep the raw records of each run in `collection`.
    pub fn with_raw_snapshot(mut self, collection: CollectionRef) -> Self {
        self.raw_snapshot = Some(collection);
        self
    }
}

#[async_trait::async_trait]
impl<T: Transformer> Pipeline for RefreshPipeline<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn target(&self) -> &CollectionRef {
        &self.target
    }

    async fn extract(&self, store: &dyn DocumentStore) -> Result<Vec<RawRecord>> {
        tracing::debug!(pipeline = %self.name, source = %self.extractor.describe(), "extracting");
        self.extractor.extract(store).await
    }

    fn transform(&self, data: &[RawRecord]) -> Result<Vec<Document>> {
        data.iter()
            .map(|raw| {
                self.transformer
                    .transform(raw)
                    .to_document()
                    .map_err(|e| EtlError::TransformError {
                        message: e.to_string(),
                        record: raw.to_json(),
                    })
            })
            .collect()
    }

    async fn load(&self, store: &dyn DocumentStore, docs: Vec<Document>) -> Result<LoadOutcome> {
        replace_collection(store, &self.target, docs, &self.options).await
    }

    async fn snapshot_raw(
        &self,
        store: &dyn DocumentStore,
        raw: &[RawRecord],
    ) -> Result<Option<LoadOutcome>> {
        let Some(snapshot) = &self.raw_snapshot else {
            return Ok(None);
        };

        let ingested_at = Value::String(chrono::Utc::now().to_rfc3339());
        let docs = raw
            .iter()
            .map(|record| {
                let mut doc = record.data.clone();
                doc.insert(INGESTED_AT_FIELD.to_string(), ingested_at.clone());
                doc
            })
            .collect();

        replace_collection(store, snapshot, docs, &self.options)
            .await
            .map(Some)
    }
}
