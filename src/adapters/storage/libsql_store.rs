//! libSQL backend: one table per collection, documents stored as JSON text.
//!
//! Table names are `<database>.<collection>`, always quoted. Both parts are
//! checked against the collection-name rules, which exclude `.`, so every
//! table maps back to exactly one database and collection.

use super::{assign_id, field_matches, merge_fields};
use crate::domain::model::{CollectionRef, Document, ID_FIELD};
use crate::domain::ports::{DocumentStore, StoreConnector};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::validate_collection_name;
use async_trait::async_trait;
use libsql::{params, Connection, Database};
use std::path::PathBuf;

/// Connector for a local libSQL database file.
#[derive(Debug, Clone)]
pub struct LibsqlStore {
    path: PathBuf,
}

impl LibsqlStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl StoreConnector for LibsqlStore {
    async fn connect(&self) -> Result<Box<dyn DocumentStore>> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let db = libsql::Builder::new_local(&self.path).build().await?;
        let conn = db.connect()?;
        tracing::debug!(path = %self.path.display(), "libSQL session opened");

        Ok(Box::new(LibsqlSession { _db: db, conn }))
    }
}

/// One open connection; dropped on `close`.
pub struct LibsqlSession {
    _db: Database,
    conn: Connection,
}

fn table_name(collection: &CollectionRef) -> Result<String> {
    validate_collection_name("database", &collection.database)?;
    validate_collection_name("collection", &collection.name)?;
    Ok(format!("{}.{}", collection.database, collection.name))
}

fn quoted(table: &str) -> String {
    format!("\"{}\"", table)
}

fn parse_body(body: &str) -> Result<Document> {
    Ok(serde_json::from_str(body)?)
}

impl LibsqlSession {
    async fn table_exists(&self, table: &str) -> Result<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
            )
            .await?;
        Ok(rows.next().await?.is_some())
    }

    async fn ensure_table(&self, table: &str) -> Result<()> {
        self.conn
            .execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY, body TEXT NOT NULL)",
                    quoted(table)
                ),
                params![],
            )
            .await?;
        Ok(())
    }

    async fn rows(&self, table: &str) -> Result<Vec<(String, Document)>> {
        if !self.table_exists(table).await? {
            return Ok(Vec::new());
        }

        let mut rows = self
            .conn
            .query(
                &format!("SELECT id, body FROM {} ORDER BY rowid", quoted(table)),
                params![],
            )
            .await?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            let id = row.get::<String>(0)?;
            let body = row.get::<String>(1)?;
            results.push((id, parse_body(&body)?));
        }
        Ok(results)
    }

    async fn insert_doc(&self, table: &str, doc: Document) -> Result<String> {
        let doc = assign_id(doc);
        let id = doc
            .get(ID_FIELD)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let body = serde_json::to_string(&doc)?;
        self.conn
            .execute(
                &format!("INSERT INTO {} (id, body) VALUES (?1, ?2)", quoted(table)),
                params![id.as_str(), body.as_str()],
            )
            .await?;
        Ok(id)
    }

    async fn delete_by_id(&self, table: &str, id: &str) -> Result<u64> {
        let affected = self
            .conn
            .execute(
                &format!("DELETE FROM {} WHERE id = ?1", quoted(table)),
                params![id],
            )
            .await?;
        Ok(affected)
    }
}

#[async_trait]
impl DocumentStore for LibsqlSession {
    async fn ping(&self) -> Result<()> {
        let mut rows = self.conn.query("SELECT 1", params![]).await?;
        rows.next()
            .await?
            .map(|_| ())
            .ok_or_else(|| EtlError::store("ping returned no rows"))
    }

    async fn list_collections(&self, database: &str) -> Result<Vec<String>> {
        validate_collection_name("database", database)?;
        let prefix = format!("{}.", database);
        let mut rows = self
            .conn
            .query(
                "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                params![],
            )
            .await?;

        let mut names = Vec::new();
        while let Some(row) = rows.next().await? {
            let table = row.get::<String>(0)?;
            if let Some(name) = table.strip_prefix(&prefix) {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    async fn find_all(&self, collection: &CollectionRef) -> Result<Vec<Document>> {
        let table = table_name(collection)?;
        Ok(self.rows(&table).await?.into_iter().map(|(_, doc)| doc).collect())
    }

    async fn drop_collection(&self, collection: &CollectionRef) -> Result<()> {
        let table = table_name(collection)?;
        self.conn
            .execute(&format!("DROP TABLE IF EXISTS {}", quoted(&table)), params![])
            .await?;
        Ok(())
    }

    async fn insert_many(&self, collection: &CollectionRef, docs: Vec<Document>) -> Result<usize> {
        let table = table_name(collection)?;
        self.ensure_table(&table).await?;

        // 逐筆寫入，失敗時回報已寫入的筆數
        let mut loaded = 0;
        for doc in docs {
            if let Err(e) = self.insert_doc(&table, doc).await {
                return Err(EtlError::LoadError {
                    collection: collection.to_string(),
                    loaded,
                    message: e.to_string(),
                });
            }
            loaded += 1;
        }
        Ok(loaded)
    }

    async fn rename_collection(&self, from: &CollectionRef, to: &CollectionRef) -> Result<()> {
        let from_table = table_name(from)?;
        let to_table = table_name(to)?;
        let from_exists = self.table_exists(&from_table).await?;

        let tx = self.conn.transaction().await?;
        tx.execute(&format!("DROP TABLE IF EXISTS {}", quoted(&to_table)), params![])
            .await?;
        if from_exists {
            tx.execute(
                &format!(
                    "ALTER TABLE {} RENAME TO {}",
                    quoted(&from_table),
                    quoted(&to_table)
                ),
                params![],
            )
            .await?;
        } else {
            tx.execute(
                &format!(
                    "CREATE TABLE {} (id TEXT PRIMARY KEY, body TEXT NOT NULL)",
                    quoted(&to_table)
                ),
                params![],
            )
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn insert_one(&self, collection: &CollectionRef, doc: Document) -> Result<String> {
        let table = table_name(collection)?;
        self.ensure_table(&table).await?;
        self.insert_doc(&table, doc).await
    }

    async fn update_one(
        &self,
        collection: &CollectionRef,
        id: &str,
        fields: Document,
    ) -> Result<u64> {
        let table = table_name(collection)?;
        let Some((_, mut doc)) = self.rows(&table).await?.into_iter().find(|(row_id, _)| row_id == id)
        else {
            return Ok(0);
        };

        merge_fields(&mut doc, fields);
        let body = serde_json::to_string(&doc)?;
        let affected = self
            .conn
            .execute(
                &format!("UPDATE {} SET body = ?1 WHERE id = ?2", quoted(&table)),
                params![body.as_str(), id],
            )
            .await?;
        Ok(affected)
    }

    async fn delete_one(&self, collection: &CollectionRef, id: &str) -> Result<u64> {
        let table = table_name(collection)?;
        if !self.table_exists(&table).await? {
            return Ok(0);
        }
        self.delete_by_id(&table, id).await
    }

    async fn delete_where(
        &self,
        collection: &CollectionRef,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<u64> {
        let table = table_name(collection)?;
        let matched = self
            .rows(&table)
            .await?
            .into_iter()
            .find(|(_, doc)| field_matches(doc, field, value));

        match matched {
            Some((id, _)) => self.delete_by_id(&table, &id).await,
            None => Ok(0),
        }
    }

    async fn close(&self) -> Result<()> {
        tracing::debug!("libSQL session closed");
        Ok(())
    }
}
