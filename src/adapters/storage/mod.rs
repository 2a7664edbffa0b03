//! Document store backends and the URI-based connector factory.

pub mod file;
#[cfg(feature = "libsql-store")]
pub mod libsql_store;
pub mod memory;
#[cfg(feature = "mongodb-store")]
pub mod mongo;

use crate::domain::model::{Document, ID_FIELD};
use crate::domain::ports::StoreConnector;
use crate::utils::error::{EtlError, Result};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

pub use file::FileStore;
#[cfg(feature = "libsql-store")]
pub use libsql_store::LibsqlStore;
pub use memory::MemoryStore;
#[cfg(feature = "mongodb-store")]
pub use mongo::MongoStore;

/// Builds a connector from a store URI.
///
/// Supported schemes: `memory://`, `file://<directory>`, `libsql://<database file>`
/// (feature `libsql-store`) and `mongodb://` / `mongodb+srv://` (feature
/// `mongodb-store`). MongoDB URIs are handed to the driver unchanged.
pub fn connector_from_uri(uri: &str) -> Result<Arc<dyn StoreConnector>> {
    let (scheme, rest) = uri.split_once("://").ok_or_else(|| {
        EtlError::InvalidConfigValueError {
            field: "store.uri".to_string(),
            value: uri.to_string(),
            reason: "expected <scheme>://<location>".to_string(),
        }
    })?;

    match scheme {
        "memory" => Ok(Arc::new(MemoryStore::new())),
        "file" => Ok(Arc::new(FileStore::new(non_empty_location(uri, rest)?))),
        #[cfg(feature = "libsql-store")]
        "libsql" => Ok(Arc::new(LibsqlStore::new(non_empty_location(uri, rest)?))),
        #[cfg(feature = "mongodb-store")]
        "mongodb" | "mongodb+srv" => {
            non_empty_location(uri, rest)?;
            Ok(Arc::new(MongoStore::new(uri)))
        }
        other => Err(EtlError::InvalidConfigValueError {
            field: "store.uri".to_string(),
            value: uri.to_string(),
            reason: format!("unsupported store scheme '{}'", other),
        }),
    }
}

fn non_empty_location<'a>(uri: &str, location: &'a str) -> Result<&'a str> {
    if location.trim().is_empty() {
        return Err(EtlError::InvalidConfigValueError {
            field: "store.uri".to_string(),
            value: uri.to_string(),
            reason: "store location cannot be empty".to_string(),
        });
    }
    Ok(location)
}

/// Gives the document a fresh `_id` unless it already has one.
pub(crate) fn assign_id(mut doc: Document) -> Document {
    if !matches!(doc.get(ID_FIELD), Some(Value::String(_))) {
        doc.insert(
            ID_FIELD.to_string(),
            Value::String(Uuid::now_v7().simple().to_string()),
        );
    }
    doc
}

/// `$set`-style merge; the `_id` is never overwritten.
pub(crate) fn merge_fields(doc: &mut Document, fields: Document) {
    for (key, value) in fields {
        if key != ID_FIELD {
            doc.insert(key, value);
        }
    }
}

pub(crate) fn field_matches(doc: &Document, field: &str, value: &Value) -> bool {
    doc.get(field) == Some(value)
}
