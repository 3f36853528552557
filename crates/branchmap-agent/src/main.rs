mod backend;
mod config;
mod server;

use anyhow::Result;
use branchmap_core::{runtime_sock_path, Msg};
use config::parse_args;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn host_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = parse_args()?;
    let sock_path = config.socket.clone().unwrap_or_else(runtime_sock_path);

    let generator = backend::build(&config)?;
    tracing::info!(
        backend = generator.name(),
        models = ?generator.models(),
        "generator ready"
    );

    let identity = Msg::Identity {
        agent: format!("branchmap-agent {}", env!("CARGO_PKG_VERSION")),
        host: host_name(),
        backend: generator.name().to_string(),
        models: generator.models(),
    };

    // Clean stale socket
    let _ = std::fs::remove_file(&sock_path);

    server::run(&sock_path, identity, Arc::from(generator)).await
}
