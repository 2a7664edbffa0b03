use super::{assign_id, field_matches, merge_fields};
use crate::domain::model::{CollectionRef, Document, ID_FIELD};
use crate::domain::ports::{DocumentStore, StoreConnector};
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Stores each collection as a JSON array in `<base>/<database>/<name>.json`.
///
/// Every write goes to a temporary file first and is renamed into place, so
/// a reader never sees a half-written collection file.
#[derive(Debug, Clone)]
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn collection_path(&self, collection: &CollectionRef) -> PathBuf {
        self.base_path
            .join(&collection.database)
            .join(format!("{}.json", collection.name))
    }

    async fn read_collection(&self, collection: &CollectionRef) -> Result<Vec<Document>> {
        match tokio::fs::read(self.collection_path(collection)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_collection(&self, collection: &CollectionRef, docs: &[Document]) -> Result<()> {
        let full_path = self.collection_path(collection);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp_path = full_path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(docs)?;
        tokio::fs::write(&tmp_path, data).await?;
        tokio::fs::rename(&tmp_path, &full_path).await?;
        Ok(())
    }
}

#[async_trait]
impl StoreConnector for FileStore {
    async fn connect(&self) -> Result<Box<dyn DocumentStore>> {
        tokio::fs::create_dir_all(&self.base_path).await?;
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn ping(&self) -> Result<()> {
        let meta = tokio::fs::metadata(&self.base_path).await?;
        if !meta.is_dir() {
            return Err(EtlError::store(format!(
                "{} is not a directory",
                self.base_path.display()
            )));
        }
        Ok(())
    }

    async fn list_collections(&self, database: &str) -> Result<Vec<String>> {
        let dir = self.base_path.join(database);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            if let Some(name) = file_name.to_str().and_then(|n| n.strip_suffix(".json")) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn find_all(&self, collection: &CollectionRef) -> Result<Vec<Document>> {
        self.read_collection(collection).await
    }

    async fn drop_collection(&self, collection: &CollectionRef) -> Result<()> {
        match tokio::fs::remove_file(self.collection_path(collection)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn insert_many(&self, collection: &CollectionRef, docs: Vec<Document>) -> Result<usize> {
        let count = docs.len();
        let mut existing = self.read_collection(collection).await?;
        existing.extend(docs.into_iter().map(assign_id));

        // 單檔寫入：要嘛全部成功，要嘛一筆都沒有
        self.write_collection(collection, &existing)
            .await
            .map_err(|e| EtlError::LoadError {
                collection: collection.to_string(),
                loaded: 0,
                message: e.to_string(),
            })?;
        Ok(count)
    }

    async fn rename_collection(&self, from: &CollectionRef, to: &CollectionRef) -> Result<()> {
        let from_path = self.collection_path(from);
        let to_path = self.collection_path(to);

        if let Some(parent) = to_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        match tokio::fs::rename(&from_path, &to_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => self.write_collection(to, &[]).await,
            Err(e) => Err(e.into()),
        }
    }

    async fn insert_one(&self, collection: &CollectionRef, doc: Document) -> Result<String> {
        let doc = assign_id(doc);
        let id = doc
            .get(ID_FIELD)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let mut existing = self.read_collection(collection).await?;
        existing.push(doc);
        self.write_collection(collection, &existing).await?;
        Ok(id)
    }

    async fn update_one(
        &self,
        collection: &CollectionRef,
        id: &str,
        fields: Document,
    ) -> Result<u64> {
        let mut docs = self.read_collection(collection).await?;
        let Some(doc) = docs
            .iter_mut()
            .find(|d| d.get(ID_FIELD).and_then(|v| v.as_str()) == Some(id))
        else {
            return Ok(0);
        };
        merge_fields(doc, fields);
        self.write_collection(collection, &docs).await?;
        Ok(1)
    }

    async fn delete_one(&self, collection: &CollectionRef, id: &str) -> Result<u64> {
        let id = serde_json::Value::String(id.to_string());
        self.delete_where(collection, ID_FIELD, &id).await
    }

    async fn delete_where(
        &self,
        collection: &CollectionRef,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<u64> {
        let mut docs = self.read_collection(collection).await?;
        let Some(index) = docs.iter().position(|d| field_matches(d, field, value)) else {
            return Ok(0);
        };
        docs.remove(index);
        self.write_collection(collection, &docs).await?;
        Ok(1)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
