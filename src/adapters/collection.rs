use crate::domain::model::{CollectionRef, RawRecord, ID_FIELD};
use crate::domain::ports::{DocumentStore, Extractor};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Reads raw records back from a store collection, e.g. a raw snapshot
/// written by an earlier run.
pub struct CollectionExtractor {
    source: CollectionRef,
}

impl CollectionExtractor {
    pub fn new(source: CollectionRef) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Extractor for CollectionExtractor {
    fn describe(&self) -> String {
        format!("collection {}", self.source)
    }

    async fn extract(&self, store: &dyn DocumentStore) -> Result<Vec<RawRecord>> {
        let docs = store.find_all(&self.source).await?;
        Ok(docs
            .into_iter()
            .map(|mut doc| {
                // 存放端的 id 不屬於上游資料
                doc.remove(ID_FIELD);
                RawRecord::new(doc)
            })
            .collect())
    }
}
