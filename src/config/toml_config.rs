use crate::app::sources::SourceKind;
use crate::core::load::{EmptySourcePolicy, LoadOptions, ReplaceStrategy};
use crate::domain::model::CollectionRef;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{
    validate_collection_name, validate_non_empty_string, validate_positive_number, validate_url,
    Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

pub const DEFAULT_STORE_URI: &str = "file://./data";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub store: StoreConfig,
    #[serde(default)]
    pub pipelines: Vec<PipelineDefinition>,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub uri: String,
    #[serde(default)]
    pub strategy: ReplaceStrategy,
    #[serde(default)]
    pub empty_source: EmptySourcePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub name: String,
    pub kind: SourceKind,
    pub enabled: Option<bool>,
    pub database: String,
    pub target: String,
    pub raw_collection: Option<String>,
    pub strategy: Option<ReplaceStrategy>,
    pub empty_source: Option<EmptySourcePolicy>,
    pub source: SourceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    Api(ApiSource),
    /// Raw records already stored in another collection of the same database.
    Collection { collection: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiSource {
    pub endpoint: String,
    pub timeout_seconds: Option<u64>,
    pub parameters: Option<BTreeMap<String, String>>,
    pub headers: Option<BTreeMap<String, String>>,
    /// JSON pointer to the record array, e.g. `/data/memes`.
    pub records_pointer: Option<String>,
    /// JSON pointer to a boolean that must be `true`.
    pub success_pointer: Option<String>,
    pub keep_last: Option<usize>,
    pub newest_first: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

impl PipelineDefinition {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn target_ref(&self) -> CollectionRef {
        CollectionRef::new(&self.database, &self.target)
    }

    pub fn raw_ref(&self) -> Option<CollectionRef> {
        self.raw_collection
            .as_ref()
            .map(|name| CollectionRef::new(&self.database, name))
    }

    fn validate_definition(&self) -> Result<()> {
        let prefix = format!("pipelines.{}", self.name);
        validate_collection_name(&format!("{}.database", prefix), &self.database)?;
        validate_collection_name(&format!("{}.target", prefix), &self.target)?;

        if let Some(raw) = &self.raw_collection {
            validate_collection_name(&format!("{}.raw_collection", prefix), raw)?;
            if raw == &self.target {
                return Err(EtlError::InvalidConfigValueError {
                    field: format!("{}.raw_collection", prefix),
                    value: raw.clone(),
                    reason: "raw snapshot cannot be the clean target".to_string(),
                });
            }
        }

        match &self.source {
            SourceConfig::Api(api) => {
                validate_url(&format!("{}.source.endpoint", prefix), &api.endpoint)?;
                if let Some(timeout) = api.timeout_seconds {
                    validate_positive_number(
                        &format!("{}.source.timeout_seconds", prefix),
                        timeout,
                        1,
                    )?;
                }
            }
            SourceConfig::Collection { collection } => {
                validate_collection_name(&format!("{}.source.collection", prefix), collection)?;
                if collection == &self.target {
                    return Err(EtlError::InvalidConfigValueError {
                        field: format!("{}.source.collection", prefix),
                        value: collection.clone(),
                        reason: "a pipeline cannot read from its own target".to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl TomlConfig {
    /// Built-in definitions for the three upstream sources.
    pub fn builtin(store_uri: impl Into<String>) -> Self {
        Self {
            store: StoreConfig {
                uri: store_uri.into(),
                strategy: ReplaceStrategy::default(),
                empty_source: EmptySourcePolicy::default(),
            },
            pipelines: SourceKind::ALL
                .iter()
                .map(SourceKind::builtin_definition)
                .collect(),
            monitoring: None,
        }
    }

    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置；沒有定義 pipeline 時使用內建的三個
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);
        let mut config: TomlConfig = toml::from_str(&processed_content)?;

        if config.pipelines.is_empty() {
            config.pipelines = Self::builtin(config.store.uri.clone()).pipelines;
        }
        Ok(config)
    }

    /// 替換環境變數 (例如 ${STORE_URI})；未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> String {
        let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("store.uri", &self.store.uri).map_err(|_| {
            EtlError::MissingConfigError {
                field: "store.uri".to_string(),
            }
        })?;
        if self.store.uri.contains("${") {
            return Err(EtlError::MissingConfigError {
                field: format!("environment variable referenced by store.uri ({})", self.store.uri),
            });
        }

        let mut names = HashSet::new();
        for def in &self.pipelines {
            if def.name.trim().is_empty() {
                return Err(EtlError::MissingConfigError {
                    field: "pipelines.name".to_string(),
                });
            }
            if !names.insert(def.name.as_str()) {
                return Err(EtlError::InvalidConfigValueError {
                    field: "pipelines.name".to_string(),
                    value: def.name.clone(),
                    reason: "pipeline names must be unique".to_string(),
                });
            }
            def.validate_definition()?;
        }
        Ok(())
    }

    pub fn load_options_for(&self, def: &PipelineDefinition) -> LoadOptions {
        LoadOptions {
            strategy: def.strategy.unwrap_or(self.store.strategy),
            empty_source: def.empty_source.unwrap_or(self.store.empty_source),
        }
    }

    pub fn pipeline(&self, name: &str) -> Option<&PipelineDefinition> {
        self.pipelines.iter().find(|p| p.name == name)
    }

    /// Enabled pipelines, or exactly the named ones when `names` is not empty.
    pub fn select_pipelines(&self, names: &[String]) -> Result<Vec<&PipelineDefinition>> {
        if names.is_empty() {
            return Ok(self.pipelines.iter().filter(|p| p.is_enabled()).collect());
        }
        names
            .iter()
            .map(|name| {
                self.pipeline(name).ok_or_else(|| EtlError::InvalidConfigValueError {
                    field: "pipeline".to_string(),
                    value: name.clone(),
                    reason: "no pipeline with this name is configured".to_string(),
                })
            })
            .collect()
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
