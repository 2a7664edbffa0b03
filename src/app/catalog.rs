//! Single-document mutations on a clean collection.
//!
//! These entry points sit beside the batch refresh: each call validates its
//! input before touching the store and reports a [`MutationOutcome`] instead
//! of an error, so a UI or the assistant can render the result directly.

use crate::domain::model::{CleanRecord, CollectionRef, Document};
use crate::domain::ports::DocumentStore;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{validate_non_empty_string, Validate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Input of `create`, turned into a full clean record.
pub trait NewRecord: Validate + Send {
    type Clean: CleanRecord;

    fn into_clean(self) -> Result<Self::Clean>;
}

/// Input of `update`, turned into the fields to merge.
pub trait FieldUpdate: Validate + Send {
    fn into_fields(self) -> Result<Document>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MutationOutcome {
    Created { id: String },
    Updated { id: String },
    Deleted { deleted: u64 },
    NotFound,
    Rejected { field: String, reason: String },
    Failed { reason: String },
}

impl MutationOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(
            self,
            Self::Created { .. } | Self::Updated { .. } | Self::Deleted { .. }
        )
    }

    fn from_error(error: EtlError) -> Self {
        match error {
            EtlError::ValidationError { field, message } => Self::Rejected {
                field,
                reason: message,
            },
            other => Self::Failed {
                reason: other.to_string(),
            },
        }
    }
}

pub struct Catalog<'a> {
    store: &'a dyn DocumentStore,
    target: CollectionRef,
    natural_key: String,
}

impl<'a> Catalog<'a> {
    pub fn new(
        store: &'a dyn DocumentStore,
        target: CollectionRef,
        natural_key: impl Into<String>,
    ) -> Self {
        Self {
            store,
            target,
            natural_key: natural_key.into(),
        }
    }

    pub fn target(&self) -> &CollectionRef {
        &self.target
    }

    pub async fn create<R: NewRecord>(&self, input: R) -> MutationOutcome {
        match self.try_create(input).await {
            Ok(id) => {
                tracing::info!("➕ Created document {} in {}", id, self.target);
                MutationOutcome::Created { id }
            }
            Err(e) => self.report("create", e),
        }
    }

    pub async fn update<U: FieldUpdate>(&self, id: &str, update: U) -> MutationOutcome {
        match self.try_update(id, update).await {
            Ok(0) => MutationOutcome::NotFound,
            Ok(_) => {
                tracing::info!("✏️ Updated document {} in {}", id, self.target);
                MutationOutcome::Updated { id: id.to_string() }
            }
            Err(e) => self.report("update", e),
        }
    }

    pub async fn delete(&self, id: &str) -> MutationOutcome {
        let result = match validate_non_empty_string("id", id) {
            Ok(()) => self.store.delete_one(&self.target, id).await,
            Err(e) => Err(e),
        };
        self.deletion_outcome("delete", result)
    }

    /// Deletes the first document whose natural key equals `value`.
    pub async fn delete_by_natural_key(&self, value: &str) -> MutationOutcome {
        let result = match validate_non_empty_string(&self.natural_key, value) {
            Ok(()) => {
                self.store
                    .delete_where(&self.target, &self.natural_key, &Value::from(value.trim()))
                    .await
            }
            Err(e) => Err(e),
        };
        self.deletion_outcome("delete-by-natural-key", result)
    }

    async fn try_create<R: NewRecord>(&self, input: R) -> Result<String> {
        input.validate()?;
        let doc = input.into_clean()?.to_document()?;
        self.store.insert_one(&self.target, doc).await
    }

    async fn try_update<U: FieldUpdate>(&self, id: &str, update: U) -> Result<u64> {
        validate_non_empty_string("id", id)?;
        update.validate()?;
        let fields = update.into_fields()?;
        self.store.update_one(&self.target, id, fields).await
    }

    fn deletion_outcome(&self, operation: &str, result: Result<u64>) -> MutationOutcome {
        match result {
            Ok(0) => MutationOutcome::NotFound,
            Ok(deleted) => {
                tracing::info!("🗑️ Deleted {} document(s) from {}", deleted, self.target);
                MutationOutcome::Deleted { deleted }
            }
            Err(e) => self.report(operation, e),
        }
    }

    fn report(&self, operation: &str, error: EtlError) -> MutationOutcome {
        tracing::warn!(
            target = %self.target,
            category = ?error.category(),
            "❌ {} rejected: {}",
            operation,
            error
        );
        MutationOutcome::from_error(error)
    }
}
