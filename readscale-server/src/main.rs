use anyhow::{Result, anyhow};
use clap::Parser;
use readscale_server::{
    AppState, CacheBackend, CacheStore, DataSource, HandleFactory, MemoryCacheStore,
    MemoryDatabase, ReplicaPool, ServerConfig, create_router,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "readscale-server", version, about = "Read-scaling data service")]
struct Args {
    /// Path to YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listen host
    #[arg(long)]
    host: Option<String>,

    /// Override listen port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate().map_err(|e| anyhow!(e))?;

    init_tracing(&config);

    info!("Starting readscale server v{}", env!("CARGO_PKG_VERSION"));

    let store = open_cache_store(&config).await?;

    // Primary plus replicas over one in-process database
    let database = MemoryDatabase::new();
    let primary: Arc<dyn DataSource> = Arc::new(database.primary());
    let replicas: Vec<Arc<dyn DataSource>> = (1..=config.data.replicas)
        .map(|n| Arc::new(database.replica(format!("replica-{n}"))) as Arc<dyn DataSource>)
        .collect();
    let pool = Arc::new(ReplicaPool::new(replicas)?);
    let handles = HandleFactory::new(primary, pool);

    let state = AppState::new(&config, store, handles);
    let app = create_router(state);

    let addr = config.server_addr();
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn init_tracing(config: &ServerConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    if config.logging.format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .pretty()
            .init();
    }
}

async fn open_cache_store(config: &ServerConfig) -> Result<Arc<dyn CacheStore>> {
    match config.cache.backend {
        CacheBackend::Memory => {
            let store = MemoryCacheStore::new();
            store.start_expiry_sweep(Duration::from_millis(config.cache.sweep_interval_ms));
            Ok(Arc::new(store))
        }
        #[cfg(feature = "redis-store")]
        CacheBackend::Redis => {
            let url = config
                .cache
                .redis_url
                .as_deref()
                .ok_or_else(|| anyhow!("cache.redis_url is required for the redis backend"))?;
            let store = readscale_server::cache::RedisCacheStore::connect(url).await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "redis-store"))]
        CacheBackend::Redis => Err(anyhow!(
            "redis cache backend requested but readscale-server was built without the `redis-store` feature"
        )),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
