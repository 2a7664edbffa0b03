use anyhow::Result;
use async_trait::async_trait;
use httpmock::prelude::*;
use refresh_etl::app::build_pipeline;
use refresh_etl::app::sources::crypto::CoinSnapshot;
use refresh_etl::config::toml_config::{ApiSource, PipelineDefinition, SourceConfig};
use refresh_etl::core::load::{EmptySourcePolicy, ReplaceStrategy};
use refresh_etl::core::transform::{Category, Trend};
use refresh_etl::domain::model::{CleanRecord, Document, Stage, ID_FIELD};
use refresh_etl::domain::ports::{DocumentStore, StoreConnector};
use refresh_etl::{CollectionRef, EtlEngine, EtlError, MemoryStore, RefreshStatus, TomlConfig};
use serde_json::{json, Value};
use std::sync::Arc;

/// 指向 mock server 的內建定義
fn definition(config: &TomlConfig, name: &str, endpoint: String) -> PipelineDefinition {
    let mut def = config.pipeline(name).unwrap().clone();
    match &mut def.source {
        SourceConfig::Api(api) => api.endpoint = endpoint,
        SourceConfig::Collection { .. } => unreachable!(),
    }
    def
}

fn without_ids(mut docs: Vec<Document>) -> Vec<Document> {
    for doc in &mut docs {
        doc.remove(ID_FIELD);
    }
    docs
}

fn coins_payload() -> Value {
    json!([
        {"name": "Coin A", "symbol": "aaa", "current_price": 10, "market_cap_rank": 5,
         "price_change_percentage_24h": 2.5, "market_cap": 1000, "image": "a.png"},
        {"name": "Coin B", "symbol": "bbb", "current_price": 1, "market_cap_rank": 50,
         "price_change_percentage_24h": -3, "market_cap": 10, "image": "b.png"}
    ])
}

#[tokio::test]
async fn test_crypto_refresh_end_to_end() -> Result<()> {
    let server = MockServer::start_async().await;
    let api_mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v3/coins/markets")
                .query_param("vs_currency", "usd")
                .query_param("order", "market_cap_desc")
                .query_param("per_page", "50");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(coins_payload());
        })
        .await;

    let config = TomlConfig::builtin("memory://");
    let def = definition(&config, "crypto", server.url("/api/v3/coins/markets"));
    let pipeline = build_pipeline(&config, &def)?;

    let store = MemoryStore::new();
    let engine = EtlEngine::new(Arc::new(store.clone()));
    let result = engine.run(pipeline.as_ref()).await;

    api_mock.assert_async().await;
    assert_eq!(result.status, RefreshStatus::Success, "{:?}", result.error);
    assert_eq!((result.extracted, result.transformed, result.loaded), (2, 2, 2));

    let target = CollectionRef::new("crypto_data", "market_cap_clean");
    let docs = without_ids(store.find_all(&target).await?);
    assert_eq!(docs.len(), 2);

    let a = &docs[0];
    assert_eq!(a["nom"], "Coin A");
    assert_eq!(a["symbole"], "AAA");
    assert_eq!(a["prix_usd"], 10.0);
    assert_eq!(a["variation_24h"], 2.5);
    assert_eq!(a["tendance"], "up");
    assert_eq!(a["categorie"], "top-tier");

    let b = &docs[1];
    assert_eq!(b["nom"], "Coin B");
    assert_eq!(b["symbole"], "BBB");
    assert_eq!(b["prix_usd"], 1.0);
    assert_eq!(b["variation_24h"], -3.0);
    assert_eq!(b["tendance"], "down");
    assert_eq!(b["categorie"], "other");
    assert!(!b.contains_key("market_cap_rank"));

    // 讀回的文件符合固定結構
    let coin = CoinSnapshot::from_document(&store.find_all(&target).await?[1])?;
    assert_eq!(coin.categorie, Category::Other);
    assert_eq!(coin.tendance, Trend::Down);
    assert_eq!(coin.image.as_deref(), Some("b.png"));

    // 原始快照也被替換，並帶有寫入時間
    let raw = store
        .find_all(&CollectionRef::new("crypto_data", "market_cap_raw"))
        .await?;
    assert_eq!(raw.len(), 2);
    assert!(raw.iter().all(|d| d.get("ingested_at").is_some()));

    assert!(!store
        .list_collections("crypto_data")
        .await?
        .iter()
        .any(|name| name.ends_with("__staging")));
    assert_eq!(store.open_sessions(), 0);
    Ok(())
}

#[tokio::test]
async fn test_refresh_twice_yields_same_documents() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v3/coins/markets");
            then.status(200).json_body(coins_payload());
        })
        .await;

    let config = TomlConfig::builtin("memory://");
    let def = definition(&config, "crypto", server.url("/api/v3/coins/markets"));
    let pipeline = build_pipeline(&config, &def)?;
    let store = MemoryStore::new();
    let engine = EtlEngine::new(Arc::new(store.clone()));
    let target = def.target_ref();

    engine.run(pipeline.as_ref()).await;
    let first = without_ids(store.find_all(&target).await?);
    engine.run(pipeline.as_ref()).await;
    let second = without_ids(store.find_all(&target).await?);

    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn test_launch_refresh_keeps_latest_twenty_newest_first() -> Result<()> {
    let launches: Vec<Value> = (1..=22)
        .map(|n| {
            json!({
                "flight_number": n,
                "name": format!("Mission {}", n),
                "success": n % 2 == 0,
                "details": null,
                "rocket": "falcon9",
                "links": {"patch": {"small": format!("patch-{}.png", n)}, "webcast": "video.mp4"}
            })
        })
        .collect();

    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v4/launches/past");
            then.status(200).json_body(Value::Array(launches));
        })
        .await;

    let config = TomlConfig::builtin("memory://");
    let def = definition(&config, "launches", server.url("/v4/launches/past"));
    let pipeline = build_pipeline(&config, &def)?;
    let store = MemoryStore::new();

    let result = EtlEngine::new(Arc::new(store.clone()))
        .run(pipeline.as_ref())
        .await;
    assert_eq!(result.status, RefreshStatus::Success);
    assert_eq!(result.loaded, 20);

    let docs = store.find_all(&def.target_ref()).await?;
    assert_eq!(docs[0]["flight_number"], 22);
    assert_eq!(docs[0]["status"], "success");
    assert_eq!(docs[0]["image_url"], "patch-22.png");
    assert_eq!(docs[0]["video_url"], "video.mp4");
    assert_eq!(docs[0]["details"], "Aucun détail fourni pour cette mission.");
    assert_eq!(docs[1]["status"], "failure");
    assert_eq!(docs[19]["flight_number"], 3);
    Ok(())
}

#[tokio::test]
async fn test_empty_extract_keeps_previous_contents() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v3/coins/markets");
            then.status(200).json_body(json!([]));
        })
        .await;

    let config = TomlConfig::builtin("memory://");
    let def = definition(&config, "crypto", server.url("/api/v3/coins/markets"));
    let pipeline = build_pipeline(&config, &def)?;
    let store = MemoryStore::new();
    let target = def.target_ref();
    store
        .insert_many(&target, vec![json!({"nom": "Old"}).as_object().cloned().unwrap()])
        .await?;

    let result = EtlEngine::new(Arc::new(store.clone()))
        .run(pipeline.as_ref())
        .await;

    assert_eq!(result.status, RefreshStatus::SkippedEmpty);
    assert!(result.is_success());
    let docs = store.find_all(&target).await?;
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["nom"], "Old");
    Ok(())
}

#[tokio::test]
async fn test_empty_extract_replace_policy_empties_target() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v3/coins/markets");
            then.status(200).json_body(json!([]));
        })
        .await;

    let mut config = TomlConfig::builtin("memory://");
    config.store.empty_source = EmptySourcePolicy::Replace;
    let def = definition(&config, "crypto", server.url("/api/v3/coins/markets"));
    let pipeline = build_pipeline(&config, &def)?;
    let store = MemoryStore::new();
    store
        .insert_many(&def.target_ref(), vec![json!({"nom": "Old"}).as_object().cloned().unwrap()])
        .await?;

    let result = EtlEngine::new(Arc::new(store.clone()))
        .run(pipeline.as_ref())
        .await;

    assert_eq!(result.status, RefreshStatus::Success);
    assert!(store.find_all(&def.target_ref()).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_extract_failures_leave_target_untouched() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/get_memes");
            then.status(200)
                .json_body(json!({"success": false, "error_message": "rate limited"}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v3/coins/markets");
            then.status(503).body("unavailable");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v4/launches/past");
            then.status(200).body("{not json");
        })
        .await;

    let config = TomlConfig::builtin("memory://");
    let defs = [
        definition(&config, "memes", server.url("/get_memes")),
        definition(&config, "crypto", server.url("/api/v3/coins/markets")),
        definition(&config, "launches", server.url("/v4/launches/past")),
    ];
    let pipelines = defs
        .iter()
        .map(|def| build_pipeline(&config, def))
        .collect::<Result<Vec<_>, EtlError>>()?;

    let store = MemoryStore::new();
    for def in &defs {
        store
            .insert_many(&def.target_ref(), vec![json!({"prior": true}).as_object().cloned().unwrap()])
            .await?;
    }

    let results = EtlEngine::new(Arc::new(store.clone()))
        .run_all(&pipelines)
        .await;

    assert_eq!(results.len(), 3);
    for (result, def) in results.iter().zip(&defs) {
        assert_eq!(result.status, RefreshStatus::Failed, "{}", def.name);
        assert_eq!(result.error.as_ref().unwrap().stage, Stage::Extract);
        assert_eq!(result.loaded, 0);
        assert_eq!(store.find_all(&def.target_ref()).await?.len(), 1);
    }
    assert_eq!(store.open_sessions(), 0);
    Ok(())
}

#[tokio::test]
async fn test_extract_timeout_is_reported() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/slow");
            then.status(200)
                .delay(std::time::Duration::from_millis(2500))
                .json_body(json!([]));
        })
        .await;

    let config = TomlConfig::builtin("memory://");
    let mut def = definition(&config, "crypto", server.url("/slow"));
    def.source = SourceConfig::Api(ApiSource {
        endpoint: server.url("/slow"),
        timeout_seconds: Some(1),
        ..ApiSource::default()
    });
    let pipeline = build_pipeline(&config, &def)?;

    let result = EtlEngine::new(Arc::new(MemoryStore::new()))
        .run(pipeline.as_ref())
        .await;

    assert_eq!(result.status, RefreshStatus::Failed);
    assert_eq!(result.error.unwrap().stage, Stage::Extract);
    Ok(())
}

/// Accepts the first `accept` documents of any insert into a collection whose
/// name starts with `prefix`, then refuses the rest.
#[derive(Clone)]
struct FlakyStore {
    inner: MemoryStore,
    prefix: String,
    accept: usize,
}

impl FlakyStore {
    fn refuses(&self, collection: &CollectionRef) -> bool {
        collection.name.starts_with(&self.prefix)
    }
}

#[async_trait]
impl StoreConnector for FlakyStore {
    async fn connect(&self) -> refresh_etl::Result<Box<dyn DocumentStore>> {
        self.inner.connect().await?;
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn ping(&self) -> refresh_etl::Result<()> {
        self.inner.ping().await
    }

    async fn list_collections(&self, database: &str) -> refresh_etl::Result<Vec<String>> {
        self.inner.list_collections(database).await
    }

    async fn find_all(&self, collection: &CollectionRef) -> refresh_etl::Result<Vec<Document>> {
        self.inner.find_all(collection).await
    }

    async fn drop_collection(&self, collection: &CollectionRef) -> refresh_etl::Result<()> {
        self.inner.drop_collection(collection).await
    }

    async fn insert_many(
        &self,
        collection: &CollectionRef,
        mut docs: Vec<Document>,
    ) -> refresh_etl::Result<usize> {
        if !self.refuses(collection) || docs.len() <= self.accept {
            return self.inner.insert_many(collection, docs).await;
        }
        docs.truncate(self.accept);
        let loaded = self.inner.insert_many(collection, docs).await?;
        Err(EtlError::LoadError {
            collection: collection.to_string(),
            loaded,
            message: "write rejected by store".to_string(),
        })
    }

    async fn rename_collection(
        &self,
        from: &CollectionRef,
        to: &CollectionRef,
    ) -> refresh_etl::Result<()> {
        self.inner.rename_collection(from, to).await
    }

    async fn insert_one(&self, collection: &CollectionRef, doc: Document) -> refresh_etl::Result<String> {
        self.inner.insert_one(collection, doc).await
    }

    async fn update_one(
        &self,
        collection: &CollectionRef,
        id: &str,
        fields: Document,
    ) -> refresh_etl::Result<u64> {
        self.inner.update_one(collection, id, fields).await
    }

    async fn delete_one(&self, collection: &CollectionRef, id: &str) -> refresh_etl::Result<u64> {
        self.inner.delete_one(collection, id).await
    }

    async fn delete_where(
        &self,
        collection: &CollectionRef,
        field: &str,
        value: &Value,
    ) -> refresh_etl::Result<u64> {
        self.inner.delete_where(collection, field, value).await
    }

    async fn close(&self) -> refresh_etl::Result<()> {
        self.inner.close().await
    }
}

async fn three_coin_server() -> MockServer {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v3/coins/markets");
            then.status(200).json_body(json!([
                {"name": "A"}, {"name": "B"}, {"name": "C"}
            ]));
        })
        .await;
    server
}

#[tokio::test]
async fn test_partial_insert_is_reported_with_count() -> Result<()> {
    for strategy in [ReplaceStrategy::ShadowSwap, ReplaceStrategy::DropThenInsert] {
        let server = three_coin_server().await;
        let mut config = TomlConfig::builtin("memory://");
        config.store.strategy = strategy;
        let def = definition(&config, "crypto", server.url("/api/v3/coins/markets"));
        let pipeline = build_pipeline(&config, &def)?;

        let inner = MemoryStore::new();
        inner
            .insert_many(&def.target_ref(), vec![json!({"nom": "Old"}).as_object().cloned().unwrap()])
            .await?;
        let store = FlakyStore {
            inner: inner.clone(),
            prefix: def.target.clone(),
            accept: 2,
        };

        let result = EtlEngine::new(Arc::new(store)).run(pipeline.as_ref()).await;

        assert_eq!(result.status, RefreshStatus::Failed, "{:?}", strategy);
        assert_eq!(result.transformed, 3);
        let failure = result.error.as_ref().unwrap();
        assert_eq!(failure.stage, Stage::Load);

        let docs = inner.find_all(&def.target_ref()).await?;
        match strategy {
            // 暫存集合寫入失敗，正式集合保持原樣
            ReplaceStrategy::ShadowSwap => {
                assert_eq!(result.loaded, 0);
                assert!(failure.message.contains("after 2 documents"), "{}", failure.message);
                assert!(failure.message.contains("target left unchanged"), "{}", failure.message);
                assert_eq!(docs.len(), 1);
                assert_eq!(docs[0]["nom"], "Old");
                assert!(inner.find_all(&def.target_ref().shadow()).await?.is_empty());
            }
            ReplaceStrategy::DropThenInsert => {
                assert_eq!(result.loaded, 2);
                assert_eq!(docs.len(), 2);
            }
        }
        assert_eq!(inner.open_sessions(), 0);
    }
    Ok(())
}

#[tokio::test]
async fn test_raw_snapshot_failure_is_partial() -> Result<()> {
    let server = three_coin_server().await;
    let config = TomlConfig::builtin("memory://");
    let def = definition(&config, "crypto", server.url("/api/v3/coins/markets"));
    let pipeline = build_pipeline(&config, &def)?;

    let inner = MemoryStore::new();
    let store = FlakyStore {
        inner: inner.clone(),
        prefix: "market_cap_raw".to_string(),
        accept: 0,
    };

    let result = EtlEngine::new(Arc::new(store)).run(pipeline.as_ref()).await;

    assert_eq!(result.status, RefreshStatus::Partial);
    assert_eq!(result.loaded, 3);
    assert_eq!(result.error.unwrap().stage, Stage::Snapshot);
    assert_eq!(inner.find_all(&def.target_ref()).await?.len(), 3);
    Ok(())
}
