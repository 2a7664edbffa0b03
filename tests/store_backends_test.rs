use anyhow::Result;
use refresh_etl::app::assistant::{self, ToolCall};
use refresh_etl::app::sources::crypto::NewCoin;
use refresh_etl::app::sources::SourceKind;
use refresh_etl::app::{build_pipeline, coin_catalog, MutationOutcome};
use refresh_etl::config::toml_config::{PipelineDefinition, SourceConfig};
use refresh_etl::domain::model::Document;
use refresh_etl::domain::ports::{DocumentStore, StoreConnector};
use refresh_etl::{connector_from_uri, CollectionRef, EtlEngine, RefreshStatus, TomlConfig};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn meme(id: &str, width: u64, height: u64) -> Document {
    json!({"id": id, "name": format!("Meme {}", id), "url": "https://i.imgflip.com/x.jpg",
           "width": width, "height": height, "box_count": 2})
    .as_object()
    .cloned()
    .unwrap()
}

/// Rebuilds `memes_clean` from the raw collection already in the store.
fn rebuild_definition() -> PipelineDefinition {
    PipelineDefinition {
        name: "memes-rebuild".to_string(),
        kind: SourceKind::Memes,
        enabled: None,
        database: "meme_studio".to_string(),
        target: "memes_clean".to_string(),
        raw_collection: None,
        strategy: None,
        empty_source: None,
        source: SourceConfig::Collection {
            collection: "memes_top_100".to_string(),
        },
    }
}

async fn exercise_backend(uri: &str) -> Result<()> {
    let connector: Arc<dyn StoreConnector> = connector_from_uri(uri)?;
    let mut config = TomlConfig::builtin(uri);
    config.pipelines.push(rebuild_definition());
    config.validate_config()?;

    // 準備原始資料
    let session = connector.connect().await?;
    session.ping().await?;
    let raw = CollectionRef::new("meme_studio", "memes_top_100");
    session.drop_collection(&raw).await?;
    session
        .insert_many(&raw, vec![meme("1", 600, 908), meme("2", 500, 500), meme("3", 1200, 600)])
        .await?;
    session.close().await?;

    let def = config.pipeline("memes-rebuild").unwrap();
    let pipeline = build_pipeline(&config, def)?;
    let engine = EtlEngine::new(connector.clone());

    for _ in 0..2 {
        let result = engine.run(pipeline.as_ref()).await;
        assert_eq!(result.status, RefreshStatus::Success, "{:?}", result.error);
        assert_eq!(result.loaded, 3);
    }

    let session = connector.connect().await?;
    let docs = session.find_all(&def.target_ref()).await?;
    assert_eq!(docs.len(), 3);
    let formats: Vec<&str> = docs.iter().filter_map(|d| d["format"].as_str()).collect();
    assert_eq!(formats, vec!["portrait", "square", "landscape"]);
    assert!(docs.iter().all(|d| d.get("captions").is_none()));

    let collections = session.list_collections("meme_studio").await?;
    assert!(collections.contains(&"memes_clean".to_string()));
    assert!(!collections.iter().any(|c| c.ends_with("__staging")));

    // 單筆操作
    let catalog = coin_catalog(session.as_ref(), config.pipeline("crypto").unwrap())?;
    let outcome = catalog
        .create(NewCoin {
            nom: "MonCoin".to_string(),
            symbole: "mnc".to_string(),
            prix_usd: 50.0,
            categorie: "portfolio".to_string(),
        })
        .await;
    assert!(matches!(outcome, MutationOutcome::Created { .. }));

    let reply = assistant::dispatch(
        &catalog,
        &ToolCall {
            id: "call_9".to_string(),
            name: assistant::DELETE_CRYPTO_BY_NAME.to_string(),
            arguments: json!({"nom": "MonCoin"}).to_string(),
        },
    )
    .await;
    assert_eq!(reply.outcome, MutationOutcome::Deleted { deleted: 1 });
    assert!(!session
        .find_all(catalog.target())
        .await?
        .iter()
        .any(|d| d["nom"] == "MonCoin"));

    session.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_file_store_backend() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let uri = format!("file://{}", temp_dir.path().display());

    exercise_backend(&uri).await?;

    assert!(temp_dir.path().join("meme_studio").join("memes_clean.json").exists());
    Ok(())
}

#[cfg(feature = "libsql-store")]
#[tokio::test]
async fn test_libsql_backend() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let uri = format!("libsql://{}", temp_dir.path().join("refresh.db").display());

    exercise_backend(&uri).await
}

/// Needs a reachable deployment in `REFRESH_ETL_TEST_MONGO_URI`; skipped otherwise.
#[cfg(feature = "mongodb-store")]
#[tokio::test]
async fn test_mongodb_backend() -> Result<()> {
    let Ok(uri) = std::env::var("REFRESH_ETL_TEST_MONGO_URI") else {
        return Ok(());
    };
    exercise_backend(&uri).await
}

#[tokio::test]
async fn test_memory_backend() -> Result<()> {
    exercise_backend("memory://").await
}
