use crate::config::toml_config::{TomlConfig, DEFAULT_STORE_URI};
use crate::utils::error::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "refresh-etl")]
#[command(about = "Full-refresh ETL for memes, crypto markets and SpaceX launches")]
pub struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, global = true, env = "REFRESH_ETL_CONFIG")]
    pub config: Option<String>,

    /// Store URI (memory://, file://<dir>, libsql://<path>, mongodb[+srv]://...); overrides the config file
    #[arg(long, global = true, env = "STORE_URI")]
    pub store_uri: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, value_enum, default_value = "text")]
    pub log_format: LogFormat,

    /// Enable system monitoring
    #[arg(long, global = true)]
    pub monitor: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run refresh pipelines (all enabled ones when no name is given)
    Run {
        pipelines: Vec<String>,
    },
    /// Check that the document store is reachable
    Ping,
    /// Print the clean collection of a pipeline as JSON
    List {
        pipeline: String,
    },
    /// Single-document mutations on the crypto collection
    Coin {
        #[arg(long, default_value = "crypto")]
        pipeline: String,
        #[command(subcommand)]
        action: CoinAction,
    },
    /// Function-call surface exposed to the assistant
    Assistant {
        #[arg(long, default_value = "crypto")]
        pipeline: String,
        #[command(subcommand)]
        action: AssistantAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum CoinAction {
    Add {
        #[arg(long)]
        nom: String,
        #[arg(long)]
        symbole: String,
        #[arg(long, allow_negative_numbers = true)]
        prix: f64,
        #[arg(long, default_value = "portfolio")]
        categorie: String,
    },
    Update {
        id: String,
        #[arg(long, allow_negative_numbers = true)]
        prix: Option<f64>,
        #[arg(long)]
        categorie: Option<String>,
        #[arg(long, allow_negative_numbers = true)]
        market_cap: Option<f64>,
    },
    Delete {
        id: String,
    },
    DeleteByName {
        nom: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum AssistantAction {
    /// Print the tool definitions as JSON
    Tools,
    /// Dispatch one tool call; arguments are a JSON object string
    Call {
        name: String,
        arguments: String,
    },
}

impl Cli {
    /// 載入配置：指定的檔案、或當前目錄的 etl-config.toml、否則內建定義
    pub fn load_config(&self) -> Result<TomlConfig> {
        let mut config = match &self.config {
            Some(path) => TomlConfig::from_file(path)?,
            None if Path::new("etl-config.toml").exists() => {
                TomlConfig::from_file("etl-config.toml")?
            }
            None => TomlConfig::builtin(DEFAULT_STORE_URI),
        };

        if let Some(uri) = &self.store_uri {
            config.store.uri = uri.clone();
        }
        Ok(config)
    }

    pub fn monitor_enabled(&self, config: &TomlConfig) -> bool {
        self.monitor || config.monitoring_enabled()
    }
}
