//! Shared helper functions used across CLI subcommands.
//!
//! Includes tracing initialization, LLM provider resolution from the
//! environment, and assistant wiring.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use colloquy_engine::{
    Assistant, Embedder, HashEmbedder, HttpEmbedder, LlmClient, LlmClientConfig,
    OrchestratorConfig, RetrievalIndexManager,
};
use colloquy_store::{Database, ThreadStore};
use colloquy_tools::builtin_registry;

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
///
/// `COLLOQUY_LOG` (then `RUST_LOG`) overrides the default.
pub fn init_tracing(default_level: &str) {
    let filter = std::env::var("COLLOQUY_LOG")
        .ok()
        .map(EnvFilter::new)
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

// ---------------------------------------------------------------------------
// System prompt
// ---------------------------------------------------------------------------

/// The assistant's system prompt, with the current date appended.
pub fn system_prompt() -> String {
    let now = chrono::Local::now();
    format!(
        "You are Colloquy, a helpful conversational assistant. You can use \
         tools to calculate, search the web, look up stock prices and \
         weather, and search a document the user has uploaded to this \
         conversation. Use tools when they would improve your answer; \
         answer directly when they would not.\n\n\
         Current date: {}",
        now.format("%Y-%m-%d (%A)")
    )
}

// ---------------------------------------------------------------------------
// LLM provider resolution
// ---------------------------------------------------------------------------

const DEFAULT_MODEL_ANTHROPIC: &str = "claude-sonnet-4-20250514";
const DEFAULT_MODEL_OPENAI: &str = "gpt-4o";
const DEFAULT_MODEL_OLLAMA: &str = "qwen2.5:latest";

const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

/// Resolve which LLM provider, API key, and model to use.
///
/// Resolution order:
///
/// 1. If `COLLOQUY_PROVIDER` is set, use that provider explicitly
///    (`anthropic`, `openai`, or `ollama`).
/// 2. Otherwise auto-detect: `ANTHROPIC_API_KEY` → `OPENAI_API_KEY` →
///    Ollama (local, no key).
///
/// The model can always be overridden with `COLLOQUY_MODEL`, and a custom
/// base URL with `COLLOQUY_API_BASE_URL`.
pub fn resolve_llm_config() -> Result<LlmClientConfig> {
    let explicit_provider = env_non_empty("COLLOQUY_PROVIDER");
    let model_override = env_non_empty("COLLOQUY_MODEL");
    let base_url_override = env_non_empty("COLLOQUY_API_BASE_URL");

    let try_anthropic = || -> Option<LlmClientConfig> {
        let key = env_non_empty("ANTHROPIC_API_KEY")?;
        let model = model_override
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL_ANTHROPIC.to_owned());
        let mut cfg = LlmClientConfig::anthropic(key, model);
        if let Some(ref url) = base_url_override {
            cfg.base_url = url.clone();
        }
        Some(cfg)
    };

    let try_openai = || -> Option<LlmClientConfig> {
        let key = env_non_empty("OPENAI_API_KEY")?;
        let model = model_override
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL_OPENAI.to_owned());
        let mut cfg = LlmClientConfig::openai(key, model);
        if let Some(ref url) = base_url_override {
            cfg.base_url = url.clone();
        }
        Some(cfg)
    };

    let try_ollama = || -> LlmClientConfig {
        let model = model_override
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL_OLLAMA.to_owned());
        let base = base_url_override
            .clone()
            .unwrap_or_else(|| OLLAMA_BASE_URL.to_owned());
        LlmClientConfig::openai_compatible("ollama", model, base)
    };

    if let Some(provider) = explicit_provider {
        let p = provider.to_lowercase();
        return match p.as_str() {
            "anthropic" | "claude" => try_anthropic().with_context(|| {
                "anthropic provider selected but ANTHROPIC_API_KEY is not set"
            }),
            "openai" | "gpt" => try_openai()
                .with_context(|| "openai provider selected but OPENAI_API_KEY is not set"),
            "ollama" | "local" => Ok(try_ollama()),
            other => anyhow::bail!("unknown provider: {other}"),
        };
    }

    if let Some(cfg) = try_anthropic() {
        return Ok(cfg);
    }
    if let Some(cfg) = try_openai() {
        return Ok(cfg);
    }

    info!("no API key found, falling back to Ollama local model");
    Ok(try_ollama())
}

/// Pick the embedding backend: the OpenAI embeddings API when a key is
/// available, the deterministic local embedder otherwise.
pub fn resolve_embedder() -> Arc<dyn Embedder> {
    if let Some(key) = env_non_empty("OPENAI_API_KEY") {
        let base = env_non_empty("COLLOQUY_EMBEDDINGS_BASE_URL")
            .unwrap_or_else(|| "https://api.openai.com/v1".to_owned());
        let model = env_non_empty("COLLOQUY_EMBEDDINGS_MODEL")
            .unwrap_or_else(|| "text-embedding-3-small".to_owned());
        if let Ok(embedder) = HttpEmbedder::new(base, key, model) {
            info!("using HTTP embeddings");
            return Arc::new(embedder);
        }
    }
    info!("using local hash embeddings");
    Arc::new(HashEmbedder::new())
}

/// Read a non-empty environment variable, returning `None` if unset or empty.
pub fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// Default on-disk location of the conversation database.
pub const DATA_DIR: &str = "data";

/// Database filename inside [`DATA_DIR`].
pub const DB_FILE: &str = "colloquy.db";

/// Open (creating if needed) the on-disk database.
pub async fn open_database() -> Result<Database> {
    let data_dir = Path::new(DATA_DIR);
    if !data_dir.exists() {
        std::fs::create_dir_all(data_dir).context("failed to create data directory")?;
    }

    let db_path = data_dir.join(DB_FILE);
    let db = Database::open_and_migrate(db_path.clone())
        .await
        .context("failed to open database")?;
    info!(path = %db_path.display(), "store initialized");
    Ok(db)
}

/// Build a fully wired assistant over the given database.
pub fn build_assistant(db: Database) -> Result<Assistant> {
    let llm_config = resolve_llm_config()?;
    let provider_label = format!("{:?}", llm_config.provider);
    let model = llm_config.model.clone();

    let llm = LlmClient::new(llm_config)
        .context("failed to create LLM client")?
        .with_system_prompt(system_prompt());
    info!(model = %model, provider = %provider_label, "LLM client ready");

    let store = ThreadStore::new(db);
    let retrieval = Arc::new(RetrievalIndexManager::new(resolve_embedder()));
    let registry = Arc::new(builtin_registry(retrieval.clone()));

    Ok(Assistant::new(
        store,
        registry,
        Arc::new(llm),
        retrieval,
        OrchestratorConfig::default(),
    ))
}
