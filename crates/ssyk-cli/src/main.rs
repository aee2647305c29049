//! `ssyk`: SSYK occupation classifier and MCP tool server.

mod config;

use clap::{Parser, Subcommand, ValueEnum};
use config::AppConfig;
use ssyk_core::ToolCall;
use ssyk_search::HybridSearchEngine;
use ssyk_tools::http::serve_http;
use ssyk_tools::stdio::serve_stdio;
use ssyk_tools::{default_registry, IncomeStatsCache, McpServer};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ssyk", about = "SSYK occupation classifier and MCP tool server")]
struct Cli {
    /// Path to config file (defaults to ./ssyk.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP tool server
    Serve {
        /// Transport to serve on
        #[arg(long, value_enum, default_value_t = Transport::Http)]
        transport: Transport,
        /// Host to bind to (overrides config and FASTMCP_HOST)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config and FASTMCP_PORT)
        #[arg(short, long)]
        port: Option<u16>,
        /// Load data on first request instead of at startup
        #[arg(long)]
        lazy: bool,
    },
    /// Classify an occupation from the command line
    Search {
        /// Job title
        title: String,
        /// Optional description of the tasks
        #[arg(short, long)]
        description: Option<String>,
        /// Number of matches
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Print income statistics for an SSYK code
    Income {
        /// 4-digit SSYK code
        code: String,
    },
    /// List the tools exposed by the server
    Tools,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Transport {
    /// Streamable HTTP (`POST /mcp`)
    Http,
    /// Newline-delimited JSON-RPC on stdin/stdout
    Stdio,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is normal.
    let dotenv = dotenvy::dotenv();

    // Logs go to stderr: stdout belongs to the stdio transport.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    if let Ok(path) = dotenv {
        info!(path = %path.display(), "Loaded environment file");
    }

    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_env(|key| std::env::var(key).ok())?;

    let search_config = config.search_config();
    let engine = Arc::new(HybridSearchEngine::from_config(&search_config)?);
    let income = Arc::new(IncomeStatsCache::new(config.income_stats_path()));
    let registry = Arc::new(default_registry(Arc::clone(&engine), Arc::clone(&income)));

    match cli.command {
        Commands::Serve {
            transport,
            host,
            port,
            lazy,
        } => {
            if !search_config.embedding.has_credential() {
                warn!("OPENAI_API_KEY not set; serving lexical-only search");
            }

            if !lazy {
                if !engine.warmup().await {
                    warn!(
                        corpus = %search_config.corpus_path.display(),
                        "Corpus not loaded; it will be retried on the first request"
                    );
                }
                if let Err(e) = income.load().await {
                    warn!(error = %e, "Income statistics not loaded; retrying on first request");
                }
            }

            let server = Arc::new(McpServer::new(registry));
            match transport {
                Transport::Stdio => serve_stdio(server).await?,
                Transport::Http => {
                    let host = host.unwrap_or(config.server.host);
                    let port = port.unwrap_or(config.server.port);
                    let addr = tokio::net::lookup_host((host.as_str(), port))
                        .await?
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("Cannot resolve bind address {host}:{port}"))?;

                    info!(%host, port, "Starting SSYK MCP server");
                    serve_http(server, addr).await?;
                }
            }
        }
        Commands::Search {
            title,
            description,
            limit,
        } => {
            let mut arguments = serde_json::json!({ "title": title });
            if let Some(description) = description {
                arguments["description"] = serde_json::Value::String(description);
            }
            if let Some(limit) = limit {
                arguments["limit"] = serde_json::Value::from(limit);
            }
            run_tool(&registry, "classify_occupation", arguments).await?;
        }
        Commands::Income { code } => {
            run_tool(
                &registry,
                "get_income_statistics",
                serde_json::json!({ "ssyk_code": code }),
            )
            .await?;
        }
        Commands::Tools => {
            let tools = registry.list_descriptors();
            println!("Registered tools:");
            for tool in &tools {
                println!("  {} - {}", tool.name, tool.description);
            }
            println!("\nTotal: {} tool(s)", tools.len());
        }
    }

    Ok(())
}

/// Run one tool and pretty-print its JSON output to stdout.
async fn run_tool(
    registry: &ssyk_tools::ToolRegistry,
    name: &str,
    arguments: serde_json::Value,
) -> anyhow::Result<()> {
    let result = registry.execute(ToolCall::new("cli", name, arguments)).await?;
    if result.is_error {
        anyhow::bail!("{}", result.content);
    }

    match serde_json::from_str::<serde_json::Value>(&result.content) {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Err(_) => println!("{}", result.content),
    }
    Ok(())
}
