use anyhow::Context;
use clap::Parser;
use refresh_etl::app::assistant::{self, ToolCall};
use refresh_etl::app::sources::crypto::{CoinUpdate, NewCoin};
use refresh_etl::app::{build_pipelines, coin_catalog, Catalog, MutationOutcome};
use refresh_etl::config::cli::{AssistantAction, Cli, CoinAction, Command, LogFormat};
use refresh_etl::domain::ports::{DocumentStore, StoreConnector};
use refresh_etl::utils::error::ErrorSeverity;
use refresh_etl::utils::{logger, validation::Validate};
use refresh_etl::{connector_from_uri, EtlEngine, EtlError, RefreshResult, RefreshStatus, TomlConfig};
use std::collections::BTreeSet;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 初始化日誌
    match cli.log_format {
        LogFormat::Text => logger::init_cli_logger(cli.verbose),
        LogFormat::Json => logger::init_json_logger(cli.verbose),
    }

    let config = match cli.load_config().and_then(|config| {
        config.validate()?;
        Ok(config)
    }) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };
    tracing::debug!("Store: {}, {} pipeline(s)", config.store.uri, config.pipelines.len());

    let connector = connector_from_uri(&config.store.uri)
        .with_context(|| format!("cannot use store '{}'", config.store.uri))?;

    let exit_code = match &cli.command {
        Command::Run { pipelines } => {
            let monitor_enabled = cli.monitor_enabled(&config);
            if monitor_enabled {
                tracing::info!("🔍 System monitoring enabled");
            }
            run_pipelines(&config, connector, pipelines, monitor_enabled).await?
        }
        Command::Ping => ping(&config, connector.as_ref()).await?,
        Command::List { pipeline } => list(&config, connector.as_ref(), pipeline).await?,
        Command::Coin { pipeline, action } => {
            let session = connector.connect().await?;
            let result = edit_coin(&config, session.as_ref(), pipeline, action).await;
            close_session(session.as_ref()).await;
            report_outcome(&result?)?
        }
        Command::Assistant { pipeline, action } => match action {
            AssistantAction::Tools => {
                println!("{}", serde_json::to_string_pretty(&assistant::tool_definitions())?);
                0
            }
            AssistantAction::Call { name, arguments } => {
                let session = connector.connect().await?;
                let result = call_tool(&config, session.as_ref(), pipeline, name, arguments).await;
                close_session(session.as_ref()).await;
                let reply = result?;
                println!("{}", serde_json::to_string_pretty(&reply)?);
                outcome_exit_code(&reply.outcome)
            }
        },
    };

    if exit_code > 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

async fn run_pipelines(
    config: &TomlConfig,
    connector: Arc<dyn StoreConnector>,
    names: &[String],
    monitor_enabled: bool,
) -> anyhow::Result<i32> {
    let pipelines = build_pipelines(config, names)?;
    if pipelines.is_empty() {
        tracing::warn!("⚠️ No enabled pipelines to run");
        return Ok(0);
    }

    let engine = EtlEngine::new_with_monitoring(connector, monitor_enabled);
    let results = engine.run_all(&pipelines).await;

    for result in &results {
        print_result(result);
    }
    println!("{}", serde_json::to_string_pretty(&results)?);

    Ok(results.iter().map(result_exit_code).max().unwrap_or(0))
}

fn print_result(result: &RefreshResult) {
    match result.status {
        RefreshStatus::Success => println!(
            "✅ {} → {}: {} documents loaded",
            result.pipeline, result.target, result.loaded
        ),
        RefreshStatus::SkippedEmpty => println!(
            "⚠️ {} → {}: upstream returned nothing, collection left unchanged",
            result.pipeline, result.target
        ),
        RefreshStatus::Partial | RefreshStatus::Failed => {
            if let Some(failure) = &result.error {
                eprintln!(
                    "❌ {} → {} ({:?} at {}): {}",
                    result.pipeline, result.target, result.status, failure.stage, failure.message
                );
                eprintln!(
                    "   extracted {} / transformed {} / loaded {}",
                    result.extracted, result.transformed, result.loaded
                );
            }
        }
    }
}

/// 根據狀態與錯誤嚴重程度決定退出碼
fn result_exit_code(result: &RefreshResult) -> i32 {
    match result.status {
        RefreshStatus::Success | RefreshStatus::SkippedEmpty => 0,
        RefreshStatus::Partial => 2,
        RefreshStatus::Failed => match result.error.as_ref().map(|f| f.severity) {
            Some(ErrorSeverity::Low) => 0,
            Some(ErrorSeverity::Medium) => 2,
            Some(ErrorSeverity::Critical) => 3,
            Some(ErrorSeverity::High) | None => 1,
        },
    }
}

fn outcome_exit_code(outcome: &MutationOutcome) -> i32 {
    match outcome {
        applied if applied.is_applied() => 0,
        MutationOutcome::Failed { .. } => 3,
        _ => 1,
    }
}

async fn ping(config: &TomlConfig, connector: &dyn StoreConnector) -> anyhow::Result<i32> {
    let session = match connector.connect().await {
        Ok(session) => session,
        Err(e) => return Ok(report_store_error(&e)),
    };

    let result = async {
        session.ping().await?;
        let databases: BTreeSet<&str> =
            config.pipelines.iter().map(|p| p.database.as_str()).collect();
        let mut listing = Vec::new();
        for database in databases {
            listing.push((database, session.list_collections(database).await?));
        }
        Ok::<_, EtlError>(listing)
    }
    .await;
    close_session(session.as_ref()).await;

    match result {
        Ok(listing) => {
            println!("✅ Store reachable: {}", config.store.uri);
            for (database, collections) in listing {
                println!("📂 {}: {}", database, collections.join(", "));
            }
            Ok(0)
        }
        Err(e) => Ok(report_store_error(&e)),
    }
}

async fn list(
    config: &TomlConfig,
    connector: &dyn StoreConnector,
    pipeline: &str,
) -> anyhow::Result<i32> {
    let def = config
        .pipeline(pipeline)
        .with_context(|| format!("no pipeline named '{}'", pipeline))?;

    let session = connector.connect().await?;
    let docs = session.find_all(&def.target_ref()).await;
    close_session(session.as_ref()).await;

    println!("{}", serde_json::to_string_pretty(&docs?)?);
    Ok(0)
}

async fn edit_coin(
    config: &TomlConfig,
    store: &dyn DocumentStore,
    pipeline: &str,
    action: &CoinAction,
) -> anyhow::Result<MutationOutcome> {
    let catalog = catalog_for(config, store, pipeline)?;

    let outcome = match action {
        CoinAction::Add {
            nom,
            symbole,
            prix,
            categorie,
        } => {
            catalog
                .create(NewCoin {
                    nom: nom.clone(),
                    symbole: symbole.clone(),
                    prix_usd: *prix,
                    categorie: categorie.clone(),
                })
                .await
        }
        CoinAction::Update {
            id,
            prix,
            categorie,
            market_cap,
        } => {
            let update = CoinUpdate {
                prix_usd: *prix,
                categorie: categorie.clone(),
                market_cap: *market_cap,
            };
            catalog.update(id, update).await
        }
        CoinAction::Delete { id } => catalog.delete(id).await,
        CoinAction::DeleteByName { nom } => catalog.delete_by_natural_key(nom).await,
    };
    Ok(outcome)
}

async fn call_tool(
    config: &TomlConfig,
    store: &dyn DocumentStore,
    pipeline: &str,
    name: &str,
    arguments: &str,
) -> anyhow::Result<assistant::ToolReply> {
    let catalog = catalog_for(config, store, pipeline)?;
    let call = ToolCall {
        id: format!("cli-{}", name),
        name: name.to_string(),
        arguments: arguments.to_string(),
    };
    Ok(assistant::dispatch(&catalog, &call).await)
}

fn catalog_for<'a>(
    config: &TomlConfig,
    store: &'a dyn DocumentStore,
    pipeline: &str,
) -> anyhow::Result<Catalog<'a>> {
    let def = config
        .pipeline(pipeline)
        .with_context(|| format!("no pipeline named '{}'", pipeline))?;
    Ok(coin_catalog(store, def)?)
}

fn report_outcome(outcome: &MutationOutcome) -> anyhow::Result<i32> {
    println!("{}", serde_json::to_string_pretty(outcome)?);
    Ok(outcome_exit_code(outcome))
}

fn report_store_error(e: &EtlError) -> i32 {
    tracing::error!(
        "❌ Store check failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());
    3
}

async fn close_session(session: &dyn DocumentStore) {
    if let Err(e) = session.close().await {
        tracing::warn!("failed to close store session: {}", e);
    }
}
