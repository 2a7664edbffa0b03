//! MongoDB backend, reached through a `mongodb://` or `mongodb+srv://` URI.
//!
//! Documents written here get a string `_id`. Documents created elsewhere
//! with an `ObjectId` read back with the hex string as `_id`, and the
//! single-document operations accept either form.

use super::assign_id;
use crate::domain::model::{CollectionRef, Document, ID_FIELD};
use crate::domain::ports::{DocumentStore, StoreConnector};
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use mongodb::bson::{self, doc, oid::ObjectId, Bson};
use mongodb::error::ErrorKind;
use mongodb::{Client, Collection};
use serde_json::Value;

/// Server error code for a missing database or collection.
const NAMESPACE_NOT_FOUND: i32 = 26;

/// Connector for a MongoDB deployment.
#[derive(Debug, Clone)]
pub struct MongoStore {
    uri: String,
}

impl MongoStore {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }
}

#[async_trait]
impl StoreConnector for MongoStore {
    async fn connect(&self) -> Result<Box<dyn DocumentStore>> {
        let client = Client::with_uri_str(&self.uri).await?;
        tracing::debug!("MongoDB session opened");
        Ok(Box::new(MongoSession { client }))
    }
}

/// One client per run; the connection pool goes away with it.
pub struct MongoSession {
    client: Client,
}

impl MongoSession {
    fn collection(&self, collection: &CollectionRef) -> Collection<bson::Document> {
        self.client
            .database(&collection.database)
            .collection(&collection.name)
    }

    async fn admin_command(&self, command: bson::Document) -> mongodb::error::Result<bson::Document> {
        self.client.database("admin").run_command(command).await
    }

    async fn drop_if_exists(&self, collection: &CollectionRef) -> Result<()> {
        match self.collection(collection).drop().await {
            Ok(()) => Ok(()),
            Err(e) if is_namespace_missing(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn is_namespace_missing(e: &mongodb::error::Error) -> bool {
    matches!(e.kind.as_ref(), ErrorKind::Command(cmd) if cmd.code == NAMESPACE_NOT_FOUND)
}

/// ordered 寫入時，第一個錯誤的位置就是已寫入的筆數
fn inserted_before_failure(e: &mongodb::error::Error) -> usize {
    match e.kind.as_ref() {
        ErrorKind::InsertMany(failure) => failure
            .write_errors
            .as_ref()
            .and_then(|errors| errors.iter().map(|w| w.index).min())
            .unwrap_or(0),
        _ => 0,
    }
}

fn to_bson_document(doc: &Document) -> Result<bson::Document> {
    bson::to_document(doc).map_err(|e| EtlError::store(format!("cannot encode document: {}", e)))
}

fn to_bson(value: &Value) -> Result<Bson> {
    bson::to_bson(value).map_err(|e| EtlError::store(format!("cannot encode value: {}", e)))
}

fn from_bson_document(doc: bson::Document) -> Document {
    doc.into_iter()
        .map(|(key, value)| {
            let value = match value {
                Bson::ObjectId(oid) => Value::String(oid.to_hex()),
                other => other.into_relaxed_extjson(),
            };
            (key, value)
        })
        .collect()
}

fn id_filter(id: &str) -> bson::Document {
    match ObjectId::parse_str(id) {
        Ok(oid) => doc! { "_id": { "$in": [id, oid] } },
        Err(_) => doc! { "_id": id },
    }
}

#[async_trait]
impl DocumentStore for MongoSession {
    async fn ping(&self) -> Result<()> {
        self.admin_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    async fn list_collections(&self, database: &str) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .client
            .database(database)
            .list_collection_names()
            .await?
            .into_iter()
            .filter(|name| !name.starts_with("system."))
            .collect();
        names.sort();
        Ok(names)
    }

    async fn find_all(&self, collection: &CollectionRef) -> Result<Vec<Document>> {
        let mut cursor = self.collection(collection).find(doc! {}).await?;
        let mut docs = Vec::new();
        while cursor.advance().await? {
            docs.push(from_bson_document(cursor.deserialize_current()?));
        }
        Ok(docs)
    }

    async fn drop_collection(&self, collection: &CollectionRef) -> Result<()> {
        self.drop_if_exists(collection).await
    }

    async fn insert_many(&self, collection: &CollectionRef, docs: Vec<Document>) -> Result<usize> {
        if docs.is_empty() {
            return Ok(0);
        }

        let docs = docs
            .into_iter()
            .map(|doc| to_bson_document(&assign_id(doc)))
            .collect::<Result<Vec<_>>>()?;

        match self.collection(collection).insert_many(docs).ordered(true).await {
            Ok(result) => Ok(result.inserted_ids.len()),
            Err(e) => Err(EtlError::LoadError {
                collection: collection.to_string(),
                loaded: inserted_before_failure(&e),
                message: e.to_string(),
            }),
        }
    }

    async fn rename_collection(&self, from: &CollectionRef, to: &CollectionRef) -> Result<()> {
        let command = doc! {
            "renameCollection": from.to_string(),
            "to": to.to_string(),
            "dropTarget": true,
        };
        match self.admin_command(command).await {
            Ok(_) => Ok(()),
            // 來源不存在：目標換成空集合
            Err(e) if is_namespace_missing(&e) => self.drop_if_exists(to).await,
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
        self.collection(collection)
            .insert_one(to_bson_document(&doc)?)
            .await?;
        Ok(id)
    }

    async fn update_one(
        &self,
        collection: &CollectionRef,
        id: &str,
        mut fields: Document,
    ) -> Result<u64> {
        fields.remove(ID_FIELD);
        if fields.is_empty() {
            return Ok(self.collection(collection).count_documents(id_filter(id)).await?);
        }

        let set = to_bson_document(&fields)?;
        let result = self
            .collection(collection)
            .update_one(id_filter(id), doc! { "$set": set })
            .await?;
        Ok(result.matched_count)
    }

    async fn delete_one(&self, collection: &CollectionRef, id: &str) -> Result<u64> {
        let result = self.collection(collection).delete_one(id_filter(id)).await?;
        Ok(result.deleted_count)
    }

    async fn delete_where(
        &self,
        collection: &CollectionRef,
        field: &str,
        value: &Value,
    ) -> Result<u64> {
        let mut filter = bson::Document::new();
        filter.insert(field, to_bson(value)?);
        let result = self.collection(collection).delete_one(filter).await?;
        Ok(result.deleted_count)
    }

    async fn close(&self) -> Result<()> {
        tracing::debug!("MongoDB session closed");
        Ok(())
    }
}
