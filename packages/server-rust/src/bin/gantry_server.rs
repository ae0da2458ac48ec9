//! Gantry HTTP server.
//!
//! Configuration comes from command-line flags with `GANTRY_*` environment
//! fallbacks; see `gantry-server --help`.

use std::sync::Arc;

use clap::Parser;
use gantry_server::{
    init_tracing, MappingService, MessageCatalog, NetworkModule, ServerConfig, ServiceContext,
    ServiceRegistry,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    init_tracing(&config.log())?;

    let catalog = Arc::new(MessageCatalog::with_defaults(config.language.as_str()));
    let registry = ServiceRegistry::new();
    let mapping = registry.register(MappingService::new(config.mapping(), catalog));
    registry.init_all(&ServiceContext::new(config.clone())).await?;

    let mut network = NetworkModule::new(config.network(), mapping);
    let port = network.start().await?;
    info!(port, services = ?registry.names(), "gantry server started");

    network.serve(shutdown_signal()).await?;
    registry.shutdown_all(false).await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c, serving until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
