//! Built-in tools for Colloquy.
//!
//! Each tool implements the [`colloquy_engine::Tool`] trait; failures are
//! returned as [`colloquy_engine::ToolError`] values and folded into the
//! conversation by the registry, never raised past it.

pub mod calculator;
pub mod document;
mod params;
pub mod search;
pub mod stocks;
pub mod weather;

use std::sync::Arc;

use colloquy_engine::{RetrievalIndexManager, ToolRegistry};

pub use calculator::CalculatorTool;
pub use document::RetrieveDocumentTool;
pub use search::WebSearchTool;
pub use stocks::StockPriceTool;
pub use weather::WeatherTool;

/// Build a registry with the full built-in tool set.
pub fn builtin_registry(retrieval: Arc<RetrievalIndexManager>) -> ToolRegistry {
    ToolRegistry::new()
        .with(Arc::new(CalculatorTool::new()))
        .with(Arc::new(WeatherTool::new()))
        .with(Arc::new(StockPriceTool::new()))
        .with(Arc::new(WebSearchTool::new()))
        .with(Arc::new(RetrieveDocumentTool::new(retrieval)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_engine::HashEmbedder;

    #[test]
    fn builtin_registry_declares_all_five_tools() {
        let retrieval = Arc::new(RetrievalIndexManager::new(Arc::new(HashEmbedder::new())));
        let registry = builtin_registry(retrieval);

        let names: Vec<String> = registry
            .definitions()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "calculator",
                "get_stock_price",
                "get_weather",
                "retrieve_document",
                "web_search",
            ]
        );
    }
}
