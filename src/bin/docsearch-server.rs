//! HTTP server for DocSearch.
//!
//! ```text
//! docsearch-server --db ./docs.db --port 5007 --dimension 384
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use docsearch::api::http::router;
use docsearch::api::DocumentService;
use docsearch::{
    Config, DistanceMetric, EmbeddingDimension, EmbeddingProvider, SearchEngine, SyncMode,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Document ingestion and vector search service.
#[derive(Parser, Debug)]
#[command(name = "docsearch-server", version, about)]
struct Cli {
    /// Database file.
    #[arg(long, env = "DOCSEARCH_DB", default_value = "docsearch.db")]
    db: PathBuf,

    /// Keep the index in memory only.
    #[arg(long, conflicts_with = "db")]
    in_memory: bool,

    /// Listen address.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Listen port.
    #[arg(long, env = "DOCSEARCH_PORT", default_value_t = 5007)]
    port: u16,

    /// Embedding dimension (fixed when the index is created).
    #[arg(long, default_value_t = 384)]
    dimension: usize,

    /// Similarity metric: cosine, l2 or dot.
    #[arg(long, default_value = "cosine")]
    metric: DistanceMetric,

    /// How text is turned into vectors.
    #[arg(long, value_enum, default_value_t = EmbedderArg::Hashing)]
    embedder: EmbedderArg,

    /// Index name inside the database file.
    #[arg(long, default_value = "docs")]
    index_name: String,

    /// Tag given to uploaded files.
    #[arg(long, default_value = "ST")]
    default_tag: String,

    /// Sync every commit to disk with the strongest guarantee.
    #[arg(long)]
    paranoid: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum EmbedderArg {
    /// Deterministic feature hashing.
    Hashing,
    /// Vectors supplied by callers; text queries are rejected.
    External,
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            embedding_provider: match self.embedder {
                EmbedderArg::Hashing => EmbeddingProvider::Hashing,
                EmbedderArg::External => EmbeddingProvider::External,
            },
            embedding_dimension: EmbeddingDimension::from_size(self.dimension),
            metric: self.metric,
            index_name: self.index_name.clone(),
            default_tag: self.default_tag.clone(),
            sync_mode: if self.paranoid {
                SyncMode::Paranoid
            } else {
                SyncMode::Normal
            },
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = cli.config();

    let engine = if cli.in_memory {
        SearchEngine::open_in_memory(config)?
    } else {
        SearchEngine::open(&cli.db, config)?
    };
    let service = Arc::new(DocumentService::from_engine(engine)?);

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Listening");

    axum::serve(listener, router(Arc::clone(&service)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    match Arc::try_unwrap(service) {
        Ok(service) => service.close()?,
        Err(_) => warn!("Service still shared at shutdown, skipping final snapshot"),
    }
    info!("Stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
