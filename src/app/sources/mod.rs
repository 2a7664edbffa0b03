//! Source-specific transforms and the built-in upstream descriptors.

pub mod crypto;
pub mod launches;
pub mod memes;

use crate::config::toml_config::{ApiSource, PipelineDefinition, SourceConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Memes,
    Crypto,
    Launches,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Memes, SourceKind::Crypto, SourceKind::Launches];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Memes => "memes",
            SourceKind::Crypto => "crypto",
            SourceKind::Launches => "launches",
        }
    }

    /// Default pipeline for this source: public endpoint, target collection
    /// and raw snapshot collection.
    pub fn builtin_definition(&self) -> PipelineDefinition {
        match self {
            SourceKind::Memes => PipelineDefinition {
                name: "memes".to_string(),
                kind: *self,
                enabled: None,
                database: "meme_studio".to_string(),
                target: "memes_clean".to_string(),
                raw_collection: Some("memes_top_100".to_string()),
                strategy: None,
                empty_source: None,
                source: SourceConfig::Api(ApiSource {
                    endpoint: "https://api.imgflip.com/get_memes".to_string(),
                    records_pointer: Some("/data/memes".to_string()),
                    success_pointer: Some("/success".to_string()),
                    ..ApiSource::default()
                }),
            },
            SourceKind::Crypto => PipelineDefinition {
                name: "crypto".to_string(),
                kind: *self,
                enabled: None,
                database: "crypto_data".to_string(),
                target: "market_cap_clean".to_string(),
                raw_collection: Some("market_cap_raw".to_string()),
                strategy: None,
                empty_source: None,
                source: SourceConfig::Api(ApiSource {
                    endpoint: "https://api.coingecko.com/api/v3/coins/markets".to_string(),
                    timeout_seconds: Some(10),
                    parameters: Some(BTreeMap::from(
                        [
                            ("vs_currency", "usd"),
                            ("order", "market_cap_desc"),
                            ("per_page", "50"),
                            ("page", "1"),
                            ("sparkline", "false"),
                        ]
                        .map(|(k, v)| (k.to_string(), v.to_string())),
                    )),
                    ..ApiSource::default()
                }),
            },
            SourceKind::Launches => PipelineDefinition {
                name: "launches".to_string(),
                kind: *self,
                enabled: None,
                database: "spacex_data".to_string(),
                target: "lancements_clean".to_string(),
                raw_collection: Some("lancements".to_string()),
                strategy: None,
                empty_source: None,
                source: SourceConfig::Api(ApiSource {
                    endpoint: "https://api.spacexdata.com/v4/launches/past".to_string(),
                    timeout_seconds: Some(15),
                    // 只保留最近 20 筆，最新的排最前面
                    keep_last: Some(20),
                    newest_first: Some(true),
                    ..ApiSource::default()
                }),
            },
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_definitions_are_consistent() {
        for kind in SourceKind::ALL {
            let def = kind.builtin_definition();
            assert_eq!(def.name, kind.as_str());
            assert_eq!(def.kind, kind);
            assert_ne!(def.raw_collection.as_deref(), Some(def.target.as_str()));
            assert!(matches!(def.source, SourceConfig::Api(_)));
        }
    }
}
