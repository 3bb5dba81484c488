use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use toolgraph_core::config::AppConfig;
use toolgraph_core::event::EventBus;
use toolgraph_core::traits::LlmClient;
use toolgraph_core::types::GraphEvent;
use toolgraph_graph::{GraphExecutor, LlmIntentExtractor, NodeRegistry};
use toolgraph_mcp::McpClientManager;
use toolgraph_tools::ToolRegistry;

#[derive(Parser)]
#[command(name = "toolgraph", version, about = "Intent-routed tool execution graph")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "toolgraph.toml", env = "TOOLGRAPH_CONFIG")]
    config: PathBuf,

    /// Print the full run report as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a single query and exit
    Run {
        /// The query text
        #[arg(trailing_var_arg = true, required = true)]
        text: Vec<String>,
    },
    /// Start the HTTP gateway
    Serve,
    /// List registered tool operations
    Tools,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("toolgraph=info,warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    // Tool backends: built-ins first, then MCP servers for what remains.
    let mut tools = if config.graph.builtin_tools {
        ToolRegistry::with_builtins()
    } else {
        ToolRegistry::new()
    };
    let mcp_manager = Arc::new(McpClientManager::new());
    if let Some(ref mcp_config) = config.mcp {
        let count = toolgraph_mcp::connect_all(&mcp_manager, mcp_config, &mut tools).await;
        info!(tools = count, "MCP tools registered");
    }

    let nodes = NodeRegistry::standard(&config.graph);
    let operations: Vec<String> = tools.list().into_iter().map(String::from).collect();
    for op in nodes.operations() {
        if !operations.iter().any(|o| o == op) {
            warn!(operation = op, "No backend serves this operation; its node will fail if routed");
        }
    }

    if let Commands::Tools = cli.command {
        for def in tools.definitions() {
            println!("{:<32} {}", def.name, def.description);
        }
        mcp_manager.disconnect_all().await;
        return Ok(());
    }

    let llm: Arc<dyn LlmClient> = Arc::from(toolgraph_llm::create_client(&config.model));
    let extractor = Arc::new(LlmIntentExtractor::new(llm, config.model.clone()));
    let event_bus = Arc::new(EventBus::default());
    let executor = GraphExecutor::new(extractor, Arc::new(tools), config.graph.clone())
        .with_nodes(nodes)
        .with_event_bus(event_bus.clone());
    executor.validate()?;
    let executor = Arc::new(executor);

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
        cancel_clone.cancel();
    });

    let outcome = match cli.command {
        Commands::Run { text } => {
            let input = text.join(" ");

            // Spawn event printer
            let mut rx = event_bus.subscribe();
            let verbose = !cli.json;
            let print_handle = tokio::spawn(async move {
                while let Ok(event) = rx.recv().await {
                    match event {
                        GraphEvent::NodeStarted { node, .. } if verbose => {
                            eprintln!("[node: {}]", node);
                        }
                        GraphEvent::NodeFailed { node, error, .. } if verbose => {
                            eprintln!("[node: {} failed] {}", node, error);
                        }
                        GraphEvent::RunFinished { .. } => break,
                        _ => {}
                    }
                }
            });

            let result = executor.run(&input, cancel).await;
            if result.is_ok() {
                print_handle.await.ok();
            } else {
                print_handle.abort();
            }

            match result {
                Ok(report) => {
                    if cli.json {
                        println!("{}", serde_json::to_string_pretty(&report)?);
                    } else if report.final_answer.is_empty() {
                        println!("(no tool results)");
                    } else {
                        println!("{}", report.final_answer);
                    }
                    Ok(())
                }
                Err(e) => Err(anyhow::Error::new(e).context("run failed")),
            }
        }
        Commands::Serve => {
            let gateway_config = config.gateway.clone().unwrap_or_default();
            info!(bind = %gateway_config.bind, "Starting gateway");
            let server = toolgraph_gateway::GatewayServer::new(gateway_config, executor, operations);
            server.run(cancel).await
        }
        Commands::Tools => Ok(()),
    };

    mcp_manager.disconnect_all().await;
    outcome
}

/// `--config` path, then `~/.toolgraph/config.toml`, then the environment.
fn load_config(path: &std::path::Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        return Ok(AppConfig::load(path)?);
    }
    if let Some(home) = AppConfig::home_config_path() {
        if home.exists() {
            info!(path = %home.display(), "Loading config from home directory");
            return Ok(AppConfig::load(&home)?);
        }
    }
    warn!("No config file found; using defaults and environment (see toolgraph.toml.example)");
    Ok(AppConfig::from_env())
}
