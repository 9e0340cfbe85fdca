//! Stock quote tool.
//!
//! Uses the Alpha Vantage GLOBAL_QUOTE endpoint when `ALPHAVANTAGE_API_KEY`
//! is set, falling back to Stooq's keyless CSV quotes otherwise.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use colloquy_engine::{InvocationContext, Tool, ToolDefinition, ToolError};

use crate::params::require_str;

/// Alpha Vantage quote endpoint.
const ALPHAVANTAGE_URL: &str = "https://www.alphavantage.co/query";

/// Stooq CSV quote endpoint.
const STOOQ_URL: &str = "https://stooq.com/q/l/";

/// Latest-price lookup by ticker symbol.
pub struct StockPriceTool {
    client: reqwest::Client,
    /// Alpha Vantage API key, if configured.
    api_key: Option<String>,
}

impl StockPriceTool {
    /// Create the stock price tool, reading `ALPHAVANTAGE_API_KEY` from the
    /// environment.
    pub fn new() -> Self {
        let api_key = std::env::var("ALPHAVANTAGE_API_KEY")
            .ok()
            .filter(|k| !k.is_empty());

        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            api_key,
        }
    }

    // ───────────────────────────────────────────────────────────────────
    //  Alpha Vantage
    // ───────────────────────────────────────────────────────────────────

    async fn quote_alphavantage(&self, symbol: &str, key: &str) -> Result<Value, ToolError> {
        let response = self
            .client
            .get(ALPHAVANTAGE_URL)
            .query(&[
                ("function", "GLOBAL_QUOTE"),
                ("symbol", symbol),
                ("apikey", key),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ToolError::Failed {
                tool_name: "get_stock_price".into(),
                reason: format!("Alpha Vantage returned status {}", response.status()),
            });
        }

        let body: Value = response.json().await?;
        let quote = &body["Global Quote"];
        let price = quote["05. price"].as_str().and_then(|p| p.parse::<f64>().ok());

        match price {
            Some(price) => Ok(json!({
                "symbol": symbol.to_uppercase(),
                "price": price,
                "change_percent": quote["10. change percent"],
                "source": "alphavantage",
            })),
            None => Err(ToolError::Failed {
                tool_name: "get_stock_price".into(),
                reason: format!("no quote data for symbol: {symbol}"),
            }),
        }
    }

    // ───────────────────────────────────────────────────────────────────
    //  Stooq fallback
    // ───────────────────────────────────────────────────────────────────

    async fn quote_stooq(&self, symbol: &str) -> Result<Value, ToolError> {
        // Stooq expects US tickers suffixed with `.us`.
        let stooq_symbol = if symbol.contains('.') {
            symbol.to_lowercase()
        } else {
            format!("{}.us", symbol.to_lowercase())
        };

        let response = self
            .client
            .get(STOOQ_URL)
            .query(&[
                ("s", stooq_symbol.as_str()),
                ("f", "sd2t2ohlcv"),
                ("h", ""),
                ("e", "csv"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ToolError::Failed {
                tool_name: "get_stock_price".into(),
                reason: format!("Stooq returned status {}", response.status()),
            });
        }

        let csv = response.text().await?;
        let close = parse_stooq_close(&csv).ok_or_else(|| ToolError::Failed {
            tool_name: "get_stock_price".into(),
            reason: format!("no quote data for symbol: {symbol}"),
        })?;

        Ok(json!({
            "symbol": symbol.to_uppercase(),
            "price": close,
            "source": "stooq",
        }))
    }
}

impl Default for StockPriceTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for StockPriceTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_stock_price".into(),
            description: "Get the latest trading price for a stock ticker \
                          symbol (e.g. AAPL, MSFT)."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "symbol": { "type": "string", "description": "Ticker symbol" }
                },
                "required": ["symbol"]
            }),
        }
    }

    async fn invoke(
        &self,
        arguments: Value,
        _ctx: &InvocationContext,
    ) -> Result<Value, ToolError> {
        let symbol = require_str(&arguments, "symbol", "get_stock_price")?;
        debug!(symbol, "looking up stock quote");

        match self.api_key.as_deref() {
            Some(key) => self.quote_alphavantage(symbol, key).await,
            None => self.quote_stooq(symbol).await,
        }
    }
}

/// Extract the close price from a Stooq one-line CSV response.
///
/// Format: `Symbol,Date,Time,Open,High,Low,Close,Volume`.  Unknown symbols
/// come back with `N/D` fields.
fn parse_stooq_close(csv: &str) -> Option<f64> {
    let data_line = csv.lines().nth(1)?;
    let close = data_line.split(',').nth(6)?;
    close.parse::<f64>().ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_stooq_close_reads_column_seven() {
        let csv = "Symbol,Date,Time,Open,High,Low,Close,Volume\n\
                   AAPL.US,2025-06-02,22:00:06,200.28,202.13,195.89,201.7,7.06e6\n";
        assert_eq!(parse_stooq_close(csv), Some(201.7));
    }

    #[test]
    fn parse_stooq_close_rejects_missing_data() {
        let csv = "Symbol,Date,Time,Open,High,Low,Close,Volume\n\
                   NOPE.US,N/D,N/D,N/D,N/D,N/D,N/D,N/D\n";
        assert_eq!(parse_stooq_close(csv), None);
        assert_eq!(parse_stooq_close(""), None);
        assert_eq!(parse_stooq_close("header only\n"), None);
    }

    #[tokio::test]
    async fn missing_symbol_is_invalid_params() {
        let tool = StockPriceTool::new();
        let ctx = InvocationContext {
            thread_key: "t1".into(),
        };
        let err = tool.invoke(json!({}), &ctx).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams { .. }));
    }
}
