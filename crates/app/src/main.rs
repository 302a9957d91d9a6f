mod problem;
mod registration;
mod router;
mod telemetry;

use std::{net::SocketAddr, sync::Arc};

use tracing::info;

use customer_registry_core::RegistrationService;
use customer_registry_storage::Database;
use customer_registry_util::AppConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let database = Database::connect(&config.database_url, config.database_max_connections).await?;
    database.run_migrations().await?;
    info!(stage = "app", max_connections = config.database_max_connections, "database ready");

    let service = RegistrationService::new(Arc::new(database.customers()));
    let state = router::AppState::new(metrics, Arc::new(service));

    let addr: SocketAddr = config.bind_addr;
    info!(stage = "app", %addr, env = %config.environment.as_str(), "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router::app_router(state))
        .await
        .map_err(|err| err.into())
}
