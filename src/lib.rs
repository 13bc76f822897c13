use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::info;

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod settings;

use application::services::{ReviewStore, ServiceConfig};
use application::{ReviewService, SentimentClassifier};
use infrastructure::{load_artifact, SledReviewStore, SupabaseReviewStore};
use settings::{resolve_data_dir, ConfigManager, StoreBackend};

/// Everything a binary needs after bootstrap.
pub struct AppHandles {
    pub service: Arc<ReviewService>,
    pub store: Arc<dyn ReviewStore>,
    pub config: Arc<ConfigManager>,
    pub data_dir: PathBuf,
}

/// Starts the HTTP service and blocks until shutdown.
pub async fn run() -> Result<()> {
    init_tracing();
    info!("starting ulasan v{}", env!("CARGO_PKG_VERSION"));

    let handles = tokio::task::spawn_blocking(build_environment)
        .await
        .context("initialisation task panicked")??;
    info!(data_dir = %handles.data_dir.display(), "application initialised");

    let server = handles.config.current().server;
    interfaces::serve(handles.service, server)
        .await
        .context("http server failed")
}

/// Loads `.env`, then installs the stderr subscriber once per process.
pub fn init_tracing() {
    init_tracing_with_writer(std::io::stderr);
}

fn init_tracing_with_writer<W>(make_writer: fn() -> W)
where
    W: std::io::Write + Send + Sync + 'static,
{
    static INIT: std::sync::OnceLock<()> = std::sync::OnceLock::new();

    let _ = INIT.get_or_init(|| {
        dotenv::dotenv().ok();
        let filter =
            std::env::var("ULASAN_LOG").unwrap_or_else(|_| "info,ulasan_lib=debug".into());
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(make_writer)
            .compact()
            .try_init();
    });
}

/// Resolves configuration, opens the configured store and loads the model.
///
/// A model that fails to load is not fatal; a store that cannot be opened is.
pub fn build_environment() -> Result<AppHandles> {
    dotenv::dotenv().ok();
    let data_dir = resolve_data_dir()?;

    let config =
        Arc::new(ConfigManager::load_with_env(&data_dir).context("failed to load config file")?);
    let active_config = config.current();

    let store = match &active_config.store {
        StoreBackend::Local => open_local_store(&data_dir)?,
        StoreBackend::Supabase { url, key, table } => connect_remote_store(url, key, table),
    };
    info!(store = store.name(), "review store ready");

    let artifact = load_artifact(&active_config.model);
    let classifier = Arc::new(SentimentClassifier::new(artifact));
    let service = Arc::new(ReviewService::new(
        classifier,
        Arc::clone(&store),
        ServiceConfig::default(),
    ));

    Ok(AppHandles {
        service,
        store,
        config,
        data_dir,
    })
}

fn open_local_store(data_dir: &std::path::Path) -> Result<Arc<dyn ReviewStore>> {
    let store_path = data_dir.join("store");
    let store = SledReviewStore::open(&store_path)
        .map_err(|err| anyhow!(err.to_string()))
        .context("failed to open embedded store")?;
    Ok(Arc::new(store))
}

fn connect_remote_store(url: &str, key: &str, table: &str) -> Arc<dyn ReviewStore> {
    info!(%url, %table, "using supabase review table");
    Arc::new(SupabaseReviewStore::new(url, key, table))
}
