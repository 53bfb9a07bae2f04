mod config;
mod cuisine;
mod error;
mod fit;
mod generate;
mod model;
mod nutrition;
mod payload;
mod planner;
mod search;
mod server;
mod store;

use std::sync::Arc;

use rmcp::{ServiceExt, transport::stdio};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use cuisine::KeywordClassifier;
use generate::{OpenAiBackend, Orchestrator};
use meal_common::error::CommonError;
use meal_common::openai::{OpenAiClient, OpenAiClientConfig};
use meal_common::redis::RedisCache;
use planner::{DayPlanner, Kitchen};
use search::SearchEngine;
use server::MealPlannerServer;
use store::{CorpusStore, MemoryStore, RedisStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout is reserved for MCP JSON-RPC
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting meal-planner MCP server");

    let config = Config::from_env()?;
    info!(
        recipes_path = %config.recipes_path.display(),
        redis = config.redis_url.is_some(),
        llm_base_url = %config.llm_base_url,
        llm_model = %config.llm_model,
        llm_timeout_secs = config.llm_timeout.as_secs(),
        "configuration loaded"
    );

    let store = open_store(&config).await?;

    let mut llm_config = OpenAiClientConfig::new(&config.llm_base_url, &config.llm_model);
    llm_config.temperature = Some(config.llm_temperature);
    llm_config.timeout = config.llm_timeout;
    llm_config.max_error_body_bytes = config.llm_max_error_body_bytes;
    let client = OpenAiClient::new(llm_config)?;

    let kitchen = Kitchen {
        search: SearchEngine::new(Arc::new(store), config.search_max_limit),
        generator: Orchestrator::new(
            OpenAiBackend::new(client),
            KeywordClassifier::default(),
            config.llm_timeout,
            config.generation_max_count,
        ),
    };
    let planner = DayPlanner::new(config.plan_fallback_ingredients.clone());
    let server = MealPlannerServer::new(kitchen, planner);

    if let Some(addr) = config.tcp_listen_addr.as_deref() {
        let listener = TcpListener::bind(addr).await?;
        info!(listen_addr = %addr, "MCP server ready, serving on TCP");
        loop {
            let (stream, peer) = listener.accept().await?;
            let server = server.clone();
            tokio::spawn(async move {
                info!(peer = %peer, "MCP client connected");
                let service = server.serve(stream).await.inspect_err(|e| {
                    tracing::error!(error = %e, "MCP server error");
                })?;
                service.waiting().await?;
                info!(peer = %peer, "MCP client disconnected");
                Ok::<(), anyhow::Error>(())
            });
        }
    } else {
        info!("MCP server ready, serving on stdio");
        let service = server.serve(stdio()).await.inspect_err(|e| {
            tracing::error!(error = %e, "MCP server error");
        })?;
        service.waiting().await?;
        info!("MCP server shut down");
    }
    Ok(())
}

/// Redis when configured (seeded from the corpus file on first run), otherwise the corpus
/// file in memory. A missing corpus file gives an empty corpus.
async fn open_store(config: &Config) -> anyhow::Result<CorpusStore> {
    let seed_exists = config.recipes_path.exists();

    let Some(url) = config.redis_url.as_deref() else {
        if !seed_exists {
            warn!(
                path = %config.recipes_path.display(),
                "recipe corpus file not found, starting with an empty corpus"
            );
            return Ok(CorpusStore::Memory(MemoryStore::empty()));
        }
        return Ok(CorpusStore::Memory(MemoryStore::load_seed_file(
            &config.recipes_path,
        )?));
    };

    let redis = RedisStore::new(RedisCache::new(Some(url)));
    if !redis.is_available().await {
        return Err(CommonError::RedisUnavailable.into());
    }
    info!("redis connected");

    match redis.count().await {
        Some(0) if seed_exists => {
            info!("recipe store empty, importing seed corpus (first run)");
            let records = store::read_seed_file(&config.recipes_path)?;
            let written = redis.import(&records).await;
            info!(records = records.len(), written, "seed corpus imported");
        }
        Some(count) => info!(recipes = count, "recipe store ready"),
        None => warn!("recipe store could not be counted"),
    }
    Ok(CorpusStore::Redis(redis))
}
