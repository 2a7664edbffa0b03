//! Full-refresh replace of a collection.
//!
//! Two strategies are available:
//!
//! - [`ReplaceStrategy::ShadowSwap`] writes the new documents into a staging
//!   collection and renames it over the target. Readers see either the old
//!   set or the new set, never an empty or half-written collection.
//! - [`ReplaceStrategy::DropThenInsert`] drops the target and inserts into it
//!   directly. Readers may observe the collection empty or partially filled
//!   between the two steps.
//!
//! Neither strategy provides mutual exclusion: two refreshes of the same
//! target must not run at the same time.

use crate::domain::model::{CollectionRef, Document};
use crate::domain::ports::DocumentStore;
use crate::utils::error::{EtlError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplaceStrategy {
    #[default]
    ShadowSwap,
    DropThenInsert,
}

/// What to do when a run produced zero documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmptySourcePolicy {
    /// Leave the existing contents untouched.
    #[default]
    Skip,
    /// Replace with nothing, emptying the collection.
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoadOptions {
    #[serde(default)]
    pub strategy: ReplaceStrategy,
    #[serde(default)]
    pub empty_source: EmptySourcePolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Replaced { loaded: usize },
    SkippedEmpty,
}

impl LoadOutcome {
    pub fn loaded(&self) -> usize {
        match self {
            LoadOutcome::Replaced { loaded } => *loaded,
            LoadOutcome::SkippedEmpty => 0,
        }
    }
}

/// Replaces the whole content of `target` with `docs`.
pub async fn replace_collection(
    store: &dyn DocumentStore,
    target: &CollectionRef,
    docs: Vec<Document>,
    options: &LoadOptions,
) -> Result<LoadOutcome> {
    if docs.is_empty() {
        return match options.empty_source {
            EmptySourcePolicy::Skip => {
                warn!(%target, "no documents to load, keeping existing contents");
                Ok(LoadOutcome::SkippedEmpty)
            }
            EmptySourcePolicy::Replace => {
                info!(%target, "no documents to load, emptying collection");
                store.drop_collection(target).await.map_err(|e| load_error(target, 0, e))?;
                Ok(LoadOutcome::Replaced { loaded: 0 })
            }
        };
    }

    let loaded = match options.strategy {
        ReplaceStrategy::ShadowSwap => shadow_swap(store, target, docs).await?,
        ReplaceStrategy::DropThenInsert => drop_then_insert(store, target, docs).await?,
    };

    info!(%target, loaded, strategy = ?options.strategy, "collection replaced");
    Ok(LoadOutcome::Replaced { loaded })
}

/// 失敗時目標集合保持原樣，回報的是暫存筆數
async fn shadow_swap(
    store: &dyn DocumentStore,
    target: &CollectionRef,
    docs: Vec<Document>,
) -> Result<usize> {
    let shadow = target.shadow();
    let expected = docs.len();

    // 清掉上次中斷留下的暫存集合
    store
        .drop_collection(&shadow)
        .await
        .map_err(|e| staging_error(target, 0, e.to_string()))?;

    debug!(%shadow, count = expected, "writing staging collection");
    let staged = match store.insert_many(&shadow, docs).await {
        Ok(staged) if staged == expected => staged,
        Ok(staged) => {
            discard_staging(store, &shadow).await;
            return Err(staging_error(
                target,
                staged,
                format!("store acknowledged {} of {} documents", staged, expected),
            ));
        }
        Err(e) => {
            let staged = e.loaded_count().unwrap_or(0);
            discard_staging(store, &shadow).await;
            return Err(staging_error(target, staged, cause_message(e)));
        }
    };

    if let Err(e) = store.rename_collection(&shadow, target).await {
        discard_staging(store, &shadow).await;
        return Err(staging_error(target, staged, e.to_string()));
    }

    Ok(staged)
}

async fn drop_then_insert(
    store: &dyn DocumentStore,
    target: &CollectionRef,
    docs: Vec<Document>,
) -> Result<usize> {
    let expected = docs.len();

    store
        .drop_collection(target)
        .await
        .map_err(|e| load_error(target, 0, e))?;

    let loaded = store
        .insert_many(target, docs)
        .await
        .map_err(|e| load_error(target, e.loaded_count().unwrap_or(0), e))?;

    if loaded != expected {
        return Err(EtlError::LoadError {
            collection: target.to_string(),
            loaded,
            message: format!("store acknowledged {} of {} documents", loaded, expected),
        });
    }
    Ok(loaded)
}

async fn discard_staging(store: &dyn DocumentStore, shadow: &CollectionRef) {
    if let Err(cleanup) = store.drop_collection(shadow).await {
        warn!(%shadow, error = %cleanup, "could not remove staging collection");
    }
}

fn staging_error(target: &CollectionRef, staged: usize, message: String) -> EtlError {
    EtlError::StagingError {
        collection: target.to_string(),
        staged,
        message,
    }
}

fn cause_message(cause: EtlError) -> String {
    match cause {
        EtlError::LoadError { message, .. } => message,
        other => other.to_string(),
    }
}

fn load_error(target: &CollectionRef, loaded: usize, cause: EtlError) -> EtlError {
    EtlError::LoadError {
        collection: target.to_string(),
        loaded,
        message: cause_message(cause),
    }
}
