//! Web search tool — multi-engine with automatic fallback.
//!
//! Search priority:
//!   1. Brave Search API (if `BRAVE_API_KEY` is set) — best quality
//!   2. DuckDuckGo HTML scraping (no key needed) — fallback
//!
//! Both backends return unified results with title, URL, and snippet.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, warn};

use colloquy_engine::{InvocationContext, Tool, ToolDefinition, ToolError};

use crate::params::{optional_usize, require_str};

/// Default maximum number of search results to return.
const DEFAULT_MAX_RESULTS: usize = 5;

/// DuckDuckGo HTML search endpoint.
const DUCKDUCKGO_HTML_URL: &str = "https://html.duckduckgo.com/html/";

/// Brave Search API endpoint.
const BRAVE_SEARCH_URL: &str = "https://api.search.brave.com/res/v1/web/search";

/// Realistic browser User-Agent to avoid being blocked.
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Web search with Brave → DuckDuckGo fallback.
pub struct WebSearchTool {
    client: reqwest::Client,
    /// Brave Search API key, if configured.
    brave_api_key: Option<String>,
}

impl WebSearchTool {
    /// Create the search tool, reading `BRAVE_API_KEY` from the environment.
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        let brave_api_key = std::env::var("BRAVE_API_KEY")
            .ok()
            .filter(|k| !k.is_empty());

        Self {
            client,
            brave_api_key,
        }
    }

    // ───────────────────────────────────────────────────────────────────
    //  Brave Search API
    // ───────────────────────────────────────────────────────────────────

    async fn search_brave(
        &self,
        query: &str,
        max_results: usize,
        api_key: &str,
    ) -> Result<Vec<Value>, ToolError> {
        let response = self
            .client
            .get(BRAVE_SEARCH_URL)
            .header("X-Subscription-Token", api_key)
            .header("Accept", "application/json")
            .query(&[("q", query), ("count", &max_results.to_string())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ToolError::Failed {
                tool_name: "web_search".into(),
                reason: format!("Brave Search returned status {}", response.status()),
            });
        }

        let body: Value = response.json().await?;

        let mut results = Vec::new();
        if let Some(web_results) = body.pointer("/web/results").and_then(|v| v.as_array()) {
            for item in web_results.iter().take(max_results) {
                let title = item["title"].as_str().unwrap_or("");
                let url = item["url"].as_str().unwrap_or("");
                let snippet = item["description"].as_str().unwrap_or("");

                if !title.is_empty() || !url.is_empty() {
                    results.push(json!({
                        "title": strip_html_tags(title),
                        "url": url,
                        "snippet": strip_html_tags(snippet),
                    }));
                }
            }
        }
        Ok(results)
    }

    // ───────────────────────────────────────────────────────────────────
    //  DuckDuckGo HTML scraping
    // ───────────────────────────────────────────────────────────────────

    async fn search_duckduckgo(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<Value>, ToolError> {
        // POST with form data is more reliable than GET for DDG.
        let response = self
            .client
            .post(DUCKDUCKGO_HTML_URL)
            .form(&[("q", query), ("kl", ""), ("df", "")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ToolError::Failed {
                tool_name: "web_search".into(),
                reason: format!("DuckDuckGo returned status {}", response.status()),
            });
        }

        let html = response.text().await?;
        Ok(parse_duckduckgo_results(&html, max_results))
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "web_search".into(),
            description: "Search the web and return titles, URLs, and snippets. \
                          Uses Brave Search (if BRAVE_API_KEY is set) with \
                          DuckDuckGo as fallback."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "The search query" },
                    "max_results": {
                        "type": "integer",
                        "description": "Maximum number of results (default: 5)"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn invoke(
        &self,
        arguments: Value,
        _ctx: &InvocationContext,
    ) -> Result<Value, ToolError> {
        let query = require_str(&arguments, "query", "web_search")?;
        let max_results = optional_usize(&arguments, "max_results", DEFAULT_MAX_RESULTS);

        debug!(query, max_results, "performing web search");

        // Try Brave Search API first (higher quality).
        if let Some(ref api_key) = self.brave_api_key {
            match self.search_brave(query, max_results, api_key).await {
                Ok(results) if !results.is_empty() => {
                    debug!(count = results.len(), engine = "brave", "search completed");
                    return Ok(json!({ "engine": "brave", "results": results }));
                }
                Ok(_) => debug!("Brave returned no results, falling back to DuckDuckGo"),
                Err(e) => warn!(error = %e, "Brave Search failed, falling back"),
            }
        }

        let results = self.search_duckduckgo(query, max_results).await?;
        debug!(count = results.len(), engine = "duckduckgo", "search completed");

        Ok(json!({ "engine": "duckduckgo", "results": results }))
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  DuckDuckGo HTML parsing
// ═══════════════════════════════════════════════════════════════════════

fn parse_duckduckgo_results(html: &str, max_results: usize) -> Vec<Value> {
    let title_marker = "class=\"result__a\"";
    let snippet_marker = "class=\"result__snippet\"";

    let title_positions = marker_positions(html, title_marker);
    let snippet_positions = marker_positions(html, snippet_marker);

    let mut results = Vec::new();
    for (i, &title_pos) in title_positions.iter().enumerate() {
        if results.len() >= max_results {
            break;
        }

        let url = extract_href_before(&html[..title_pos]).unwrap_or_default();
        let clean_url = clean_ddg_url(&url);

        let after_marker = &html[title_pos + title_marker.len()..];
        let title = extract_tag_text(after_marker, "</a>");

        let snippet = if i < snippet_positions.len() {
            let after_snippet = &html[snippet_positions[i] + snippet_marker.len()..];
            strip_html_tags(&extract_tag_text(after_snippet, "</"))
        } else {
            String::new()
        };

        if !title.is_empty() || !clean_url.is_empty() {
            results.push(json!({
                "title": strip_html_tags(&title),
                "url": clean_url,
                "snippet": snippet.trim(),
            }));
        }
    }

    results
}

/// All byte positions of `marker` within `html`, in order.
fn marker_positions(html: &str, marker: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut search_from = 0;
    while let Some(pos) = html[search_from..].find(marker) {
        positions.push(search_from + pos);
        search_from = search_from + pos + marker.len();
    }
    positions
}

/// Clean DuckDuckGo tracking URLs to extract the actual destination URL.
fn clean_ddg_url(url: &str) -> String {
    if url.contains("duckduckgo.com/l/") {
        if let Some(uddg_start) = url.find("uddg=") {
            let encoded = &url[uddg_start + 5..];
            let encoded = encoded.split('&').next().unwrap_or(encoded);
            return url_decode(encoded);
        }
    }
    if url.starts_with("//") {
        return format!("https:{url}");
    }
    url.to_string()
}

/// Simple URL percent-decoding.
fn url_decode(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        if ch == '%' {
            let hex: String = chars.by_ref().take(2).collect();
            if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                result.push(byte as char);
            } else {
                result.push('%');
                result.push_str(&hex);
            }
        } else if ch == '+' {
            result.push(' ');
        } else {
            result.push(ch);
        }
    }
    result
}

fn extract_href_before(html_before: &str) -> Option<String> {
    let href_marker = "href=\"";
    let last_href = html_before.rfind(href_marker)?;
    let start = last_href + href_marker.len();
    let remaining = &html_before[start..];
    let end = remaining.find('"')?;
    Some(remaining[..end].to_string())
}

fn extract_tag_text(html_after_marker: &str, end_marker: &str) -> String {
    let closing_bracket = match html_after_marker.find('>') {
        Some(pos) => pos,
        None => return String::new(),
    };
    let content = &html_after_marker[closing_bracket + 1..];
    let end = match content.find(end_marker) {
        Some(pos) => pos,
        None => content.len(),
    };
    content[..end].to_string()
}

/// Strip HTML tags from a string and decode common HTML entities.
fn strip_html_tags(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut inside_tag = false;

    for ch in input.chars() {
        match ch {
            '<' => inside_tag = true,
            '>' => inside_tag = false,
            _ if !inside_tag => result.push(ch),
            _ => {}
        }
    }

    result
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}

// ═══════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_requires_query() {
        let tool = WebSearchTool::new();
        let def = tool.definition();
        assert_eq!(def.name, "web_search");
        assert_eq!(def.input_schema["required"][0], "query");
    }

    #[test]
    fn strip_html_tags_removes_tags_and_entities() {
        assert_eq!(strip_html_tags("<b>hello</b> world"), "hello world");
        assert_eq!(strip_html_tags("a &amp; b"), "a & b");
        assert_eq!(strip_html_tags("&quot;quoted&quot;"), "\"quoted\"");
        assert_eq!(strip_html_tags(""), "");
    }

    #[test]
    fn parse_duckduckgo_results_extracts_data() {
        let html = r#"
        <div class="result">
            <a rel="nofollow" href="https://example.com" class="result__a">Example Title</a>
            <span class="result__snippet">This is a snippet about Example.</span>
        </div>
        <div class="result">
            <a rel="nofollow" href="https://other.com" class="result__a">Other Result</a>
            <span class="result__snippet">Another snippet here.</span>
        </div>
        "#;

        let results = parse_duckduckgo_results(html, 10);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["title"], "Example Title");
        assert_eq!(results[0]["url"], "https://example.com");
        assert_eq!(results[0]["snippet"], "This is a snippet about Example.");
        assert_eq!(results[1]["title"], "Other Result");
    }

    #[test]
    fn parse_duckduckgo_results_respects_max_results() {
        let html = r#"
        <a href="https://a.com" class="result__a">A</a>
        <span class="result__snippet">Snippet A</span>
        <a href="https://b.com" class="result__a">B</a>
        <span class="result__snippet">Snippet B</span>
        <a href="https://c.com" class="result__a">C</a>
        <span class="result__snippet">Snippet C</span>
        "#;
        assert_eq!(parse_duckduckgo_results(html, 2).len(), 2);
    }

    #[test]
    fn parse_duckduckgo_results_handles_empty_html() {
        assert!(parse_duckduckgo_results("", 5).is_empty());
    }

    #[test]
    fn clean_ddg_url_unwraps_redirects() {
        let ddg = "//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fpage&rut=abc";
        assert_eq!(clean_ddg_url(ddg), "https://example.com/page");
        assert_eq!(clean_ddg_url("https://example.com"), "https://example.com");
        assert_eq!(clean_ddg_url("//example.com/p"), "https://example.com/p");
    }

    #[test]
    fn url_decode_handles_percent_encoding() {
        assert_eq!(url_decode("hello%20world"), "hello world");
        assert_eq!(url_decode("a+b"), "a b");
    }
}
