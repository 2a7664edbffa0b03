use crate::adapters::{CollectionExtractor, HttpExtractor};
use crate::app::catalog::Catalog;
use crate::app::sources::crypto::{CoinTransformer, COIN_NATURAL_KEY};
use crate::app::sources::launches::LaunchTransformer;
use crate::app::sources::memes::MemeTransformer;
use crate::app::sources::SourceKind;
use crate::config::toml_config::{PipelineDefinition, SourceConfig, TomlConfig};
use crate::core::pipeline::RefreshPipeline;
use crate::domain::model::CollectionRef;
use crate::domain::ports::{DocumentStore, Extractor, Pipeline, Transformer};
use crate::utils::error::{EtlError, Result};

/// Builds the runnable pipeline described by `def`.
pub fn build_pipeline(config: &TomlConfig, def: &PipelineDefinition) -> Result<Box<dyn Pipeline>> {
    let extractor: Box<dyn Extractor> = match &def.source {
        SourceConfig::Api(api) => Box::new(HttpExtractor::new(api.clone())?),
        SourceConfig::Collection { collection } => Box::new(CollectionExtractor::new(
            CollectionRef::new(&def.database, collection),
        )),
    };

    let pipeline = match def.kind {
        SourceKind::Memes => assemble(config, def, extractor, MemeTransformer),
        SourceKind::Crypto => assemble(config, def, extractor, CoinTransformer),
        SourceKind::Launches => assemble(config, def, extractor, LaunchTransformer),
    };

    tracing::debug!(
        "🔧 Built pipeline '{}' ({}) → {}",
        def.name,
        def.kind,
        def.target_ref()
    );
    Ok(pipeline)
}

pub fn build_pipelines(config: &TomlConfig, names: &[String]) -> Result<Vec<Box<dyn Pipeline>>> {
    config
        .select_pipelines(names)?
        .into_iter()
        .map(|def| build_pipeline(config, def))
        .collect()
}

/// Mutation entry points on the clean collection of a crypto pipeline.
pub fn coin_catalog<'a>(
    store: &'a dyn DocumentStore,
    def: &PipelineDefinition,
) -> Result<Catalog<'a>> {
    if def.kind != SourceKind::Crypto {
        return Err(EtlError::InvalidConfigValueError {
            field: "pipeline".to_string(),
            value: def.name.clone(),
            reason: format!("single-document edits need a crypto pipeline, got {}", def.kind),
        });
    }
    Ok(Catalog::new(store, def.target_ref(), COIN_NATURAL_KEY))
}

fn assemble<T: Transformer + 'static>(
    config: &TomlConfig,
    def: &PipelineDefinition,
    extractor: Box<dyn Extractor>,
    transformer: T,
) -> Box<dyn Pipeline> {
    let mut pipeline = RefreshPipeline::new(&def.name, extractor, transformer, def.target_ref())
        .with_options(config.load_options_for(def));
    if let Some(raw) = def.raw_ref() {
        pipeline = pipeline.with_raw_snapshot(raw);
    }
    Box::new(pipeline)
}
