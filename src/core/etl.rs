use crate::core::load::LoadOutcome;
use crate::domain::model::{RefreshResult, RefreshStatus, Stage, StageFailure};
use crate::domain::ports::{DocumentStore, Pipeline, StoreConnector};
use crate::utils::monitor::SystemMonitor;
use std::sync::Arc;
use std::time::Instant;

/// Runs refresh pipelines, one store session per run.
///
/// Stages are strictly sequential: the whole extract completes before the
/// transform starts, and the whole batch is transformed before the load.
/// The session is closed on every exit path.
pub struct EtlEngine {
    connector: Arc<dyn StoreConnector>,
    monitor: SystemMonitor,
}

impl EtlEngine {
    pub fn new(connector: Arc<dyn StoreConnector>) -> Self {
        Self::new_with_monitoring(connector, false)
    }

    pub fn new_with_monitoring(connector: Arc<dyn StoreConnector>, monitor_enabled: bool) -> Self {
        Self {
            connector,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self, pipeline: &dyn Pipeline) -> RefreshResult {
        let started = Instant::now();
        let mut result = RefreshResult::started(pipeline.name(), pipeline.target().clone());
        self.monitor.start_run();
        tracing::info!(pipeline = pipeline.name(), target = %pipeline.target(), "🚀 Starting refresh");

        match self.connector.connect().await {
            Ok(session) => {
                self.execute(pipeline, session.as_ref(), &mut result).await;
                if let Err(e) = session.close().await {
                    tracing::warn!(pipeline = pipeline.name(), error = %e, "failed to close store session");
                }
            }
            Err(e) => result.fail(Stage::Connect, &e),
        }

        result.elapsed_ms = started.elapsed().as_millis();
        self.log_result(&result);
        self.monitor.log_final_stats();
        result
    }

    /// Runs each pipeline in turn; a failed run does not stop the next one.
    pub async fn run_all(&self, pipelines: &[Box<dyn Pipeline>]) -> Vec<RefreshResult> {
        let mut results = Vec::with_capacity(pipelines.len());
        for pipeline in pipelines {
            results.push(self.run(pipeline.as_ref()).await);
        }
        results
    }

    async fn execute(
        &self,
        pipeline: &dyn Pipeline,
        store: &dyn DocumentStore,
        result: &mut RefreshResult,
    ) {
        // Extract
        let raw = match pipeline.extract(store).await {
            Ok(raw) => raw,
            Err(e) => return result.fail(Stage::Extract, &e),
        };
        result.extracted = raw.len();
        tracing::info!(pipeline = pipeline.name(), "Extracted {} records", raw.len());
        self.monitor.log_stats("extract");

        // Transform
        let docs = match pipeline.transform(&raw) {
            Ok(docs) => docs,
            Err(e) => return result.fail(Stage::Transform, &e),
        };
        result.transformed = docs.len();
        tracing::info!(pipeline = pipeline.name(), "Transformed {} records", docs.len());
        self.monitor.log_stats("transform");

        // Load
        match pipeline.load(store, docs).await {
            Ok(LoadOutcome::Replaced { loaded }) => {
                result.loaded = loaded;
                result.status = RefreshStatus::Success;
            }
            Ok(LoadOutcome::SkippedEmpty) => {
                result.loaded = 0;
                result.status = RefreshStatus::SkippedEmpty;
            }
            Err(e) => return result.fail(Stage::Load, &e),
        }
        self.monitor.log_stats("load");

        if let Err(e) = pipeline.snapshot_raw(store, &raw).await {
            // 乾淨資料已替換完成，只有原始快照失敗
            result.status = RefreshStatus::Partial;
            result.error = Some(StageFailure::new(Stage::Snapshot, &e));
        }
    }

    fn log_result(&self, result: &RefreshResult) {
        match result.status {
            RefreshStatus::Success => tracing::info!(
                pipeline = %result.pipeline,
                target = %result.target,
                loaded = result.loaded,
                elapsed_ms = result.elapsed_ms as u64,
                "✅ Refresh completed"
            ),
            RefreshStatus::SkippedEmpty => tracing::warn!(
                pipeline = %result.pipeline,
                target = %result.target,
                "⚠️ Upstream returned no records, existing contents kept"
            ),
            RefreshStatus::Partial | RefreshStatus::Failed => {
                if let Some(failure) = &result.error {
                    tracing::error!(
                        pipeline = %result.pipeline,
                        target = %result.target,
                        stage = %failure.stage,
                        extracted = result.extracted,
                        transformed = result.transformed,
                        loaded = result.loaded,
                        "❌ Refresh {:?}: {}",
                        result.status,
                        failure.message
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::MemoryStore;
    use crate::adapters::CollectionExtractor;
    use crate::app::sources::memes::MemeTransformer;
    use crate::core::pipeline::RefreshPipeline;
    use crate::domain::model::CollectionRef;
    use crate::utils::error::{EtlError, Result};
    use async_trait::async_trait;
    use serde_json::json;

    struct RefusingConnector;

    #[async_trait]
    impl StoreConnector for RefusingConnector {
        async fn connect(&self) -> Result<Box<dyn DocumentStore>> {
            Err(EtlError::store("connection refused"))
        }
    }

    fn meme_pipeline() -> RefreshPipeline<MemeTransformer> {
        RefreshPipeline::new(
            "memes",
            Box::new(CollectionExtractor::new(CollectionRef::new("meme_studio", "memes_top_100"))),
            MemeTransformer,
            CollectionRef::new("meme_studio", "memes_clean"),
        )
    }

    #[tokio::test]
    async fn test_connect_failure_is_reported() {
        let engine = EtlEngine::new(Arc::new(RefusingConnector));
        let result = engine.run(&meme_pipeline()).await;

        assert_eq!(result.status, RefreshStatus::Failed);
        assert_eq!(result.error.map(|e| e.stage), Some(Stage::Connect));
    }

    #[tokio::test]
    async fn test_run_reads_raw_collection_and_closes_session() {
        let store = MemoryStore::new();
        store
            .insert_many(
                &CollectionRef::new("meme_studio", "memes_top_100"),
                vec![json!({"id": "181913649", "name": "Drake", "width": 1200, "height": 1200})
                    .as_object()
                    .cloned()
                    .unwrap()],
            )
            .await
            .unwrap();

        let engine = EtlEngine::new(Arc::new(store.clone()));
        let result = engine.run(&meme_pipeline()).await;

        assert_eq!(result.status, RefreshStatus::Success);
        assert_eq!((result.extracted, result.transformed, result.loaded), (1, 1, 1));
        assert_eq!(store.open_sessions(), 0);

        let clean = store
            .find_all(&CollectionRef::new("meme_studio", "memes_clean"))
            .await
            .unwrap();
        assert_eq!(clean[0]["format"], "square");
    }
}
