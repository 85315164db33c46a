//! `hexyad`: the Hexya server binary.
//!
//! Usage:
//!   hexyad [-c <context-name-or-path>] [--listen <addr>] [--data-dir <dir>] [--in-memory]
//!          [--strict-args] [--trust-uid-header]
//!
//! The context name resolves to `/etc/hexya/<name>.toml`.
//! If a path with `/` or `.` is given, it's used directly.
//! Flags override the values of the file.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use hexya_core::{Authenticator, DenyAll, HeaderAuthenticator, Module, ServiceConfig};
use hexya_orm::{load_seed_dir, Orm, Registry};
use hexya_store::{MemoryStore, RecordStore, RedbStore};
use hexya_web::{Dispatcher, WebModule};
use tracing::{info, warn};

use config::ServerConfig;

/// Hexya server.
#[derive(Parser, Debug)]
#[command(name = "hexyad", about = "Hexya server", version)]
struct Cli {
    /// Context name or path to config file.
    #[arg(short = 'c', long = "config")]
    config: Option<String>,

    /// Listen address.
    #[arg(long = "listen")]
    listen: Option<String>,

    /// Data directory holding the database and seed files.
    #[arg(long = "data-dir")]
    data_dir: Option<PathBuf>,

    /// Keep records in memory only.
    #[arg(long = "in-memory")]
    in_memory: bool,

    /// Reject call arguments that do not decode into their parameter type.
    #[arg(long = "strict-args")]
    strict_args: bool,

    /// Take the user id from the X-Hexya-Uid header set by a trusted proxy.
    #[arg(long = "trust-uid-header")]
    trust_uid_header: bool,
}

impl Cli {
    fn service_config(&self) -> anyhow::Result<ServiceConfig> {
        let mut config = match &self.config {
            Some(name) => {
                let path = ServerConfig::resolve_path(name);
                info!("Loading configuration from {}", path.display());
                ServerConfig::load(&path)?.to_service_config()
            }
            None => ServiceConfig::default(),
        };
        if let Some(listen) = &self.listen {
            config.listen = listen.clone();
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = Some(dir.clone());
        }
        config.in_memory |= self.in_memory;
        config.strict_args |= self.strict_args;
        config.trust_uid_header |= self.trust_uid_header;
        Ok(config)
    }
}

fn open_store(config: &ServiceConfig) -> anyhow::Result<Arc<dyn RecordStore>> {
    if config.in_memory {
        info!("Using in-memory store");
        return Ok(Arc::new(MemoryStore::new()));
    }
    if let Some(dir) = &config.data_dir {
        std::fs::create_dir_all(dir)?;
    }
    let path = config.resolve_db_path();
    let store = RedbStore::open(&path)
        .map_err(|e| anyhow::anyhow!("failed to open store {}: {}", path.display(), e))?;
    info!("Opened store at {}", path.display());
    Ok(Arc::new(store))
}

fn authenticator(config: &ServiceConfig) -> Arc<dyn Authenticator> {
    if config.trust_uid_header {
        info!("Trusting the X-Hexya-Uid header");
        Arc::new(HeaderAuthenticator)
    } else {
        warn!("No authenticator configured; every call will be rejected (see trust_uid_header)");
        Arc::new(DenyAll)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.service_config()?;

    let mut registry = Registry::new();
    hexya_base::register(&mut registry);
    hexya_web::register(&mut registry)?;
    let orm = Orm::new(registry, open_store(&config)?);

    load_seed_dir(&orm, &hexya_base::seed_dir())?;
    load_seed_dir(&orm, &config.resolve_seed_dir())?;

    let dispatcher = Arc::new(Dispatcher::new(orm).with_strict_args(config.strict_args));
    let web = WebModule::new(dispatcher, authenticator(&config));
    info!("Module {} mounted", web.name());
    let app = web.routes();

    let listener = tokio::net::TcpListener::bind(&config.listen).await?;
    info!("Hexya server listening on {}", config.listen);
    axum::serve(listener, app).await?;

    Ok(())
}
