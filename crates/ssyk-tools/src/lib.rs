//! Agent-facing tools for SSYK occupation classification, served over MCP.
//!
//! # Main types
//!
//! - [`Tool`]: Trait implemented by every callable tool.
//! - [`ToolRegistry`]: Name-indexed set of tools.
//! - [`ClassifyOccupationTool`]: Ranks SSYK codes for a job title and description.
//! - [`GetIncomeStatisticsTool`]: Returns income statistics for one SSYK code.
//! - [`IncomeStatsCache`]: Lazily loaded income statistics.
//! - [`McpServer`]: JSON-RPC dispatcher shared by the stdio and HTTP transports.

/// The `classify_occupation` tool.
pub mod classify;
/// HTTP transport (axum).
pub mod http;
/// The `get_income_statistics` tool and its cache.
pub mod income;
/// MCP JSON-RPC message types.
pub mod protocol;
/// Tool registry.
pub mod registry;
/// MCP request dispatcher.
pub mod server;
/// Newline-delimited stdio transport.
pub mod stdio;
/// Tool trait and descriptor.
pub mod tool;

pub use classify::{build_query, ClassifyOccupationTool};
pub use income::{GetIncomeStatisticsTool, IncomeLookup, IncomeStatsCache};
pub use registry::ToolRegistry;
pub use server::McpServer;
pub use tool::{Tool, ToolDescriptor};

use ssyk_search::HybridSearchEngine;
use std::sync::Arc;

/// Registry holding the two SSYK tools.
pub fn default_registry(
    engine: Arc<HybridSearchEngine>,
    income: Arc<IncomeStatsCache>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(ClassifyOccupationTool::new(engine)));
    registry.register(Arc::new(GetIncomeStatisticsTool::new(income)));
    registry
}
