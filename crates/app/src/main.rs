mod categories;
mod events;
mod problem;
mod router;
mod telemetry;

use std::net::SocketAddr;

use catalog_admin_client::{
    AuthClient, AuthenticatedClient, CatalogClient, DeviceContext, SessionEvents,
};
use catalog_admin_storage::Database;
use catalog_admin_util::{load_env_file, AppConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let database = Database::connect(&config.database_url).await?;
    database.run_migrations().await?;
    let device_id = database.devices().device_id().await?;

    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()?;
    let auth = AuthClient::new(
        config.api_base_url.clone(),
        http.clone(),
        DeviceContext::detect(device_id, telemetry::BUILD_VERSION),
    )
    .with_paths(
        config.auth_login_path.clone(),
        config.auth_refresh_path.clone(),
    )
    .with_system_role(config.auth_system_role.clone());
    let client = AuthenticatedClient::new(
        http,
        config.api_base_url.clone(),
        auth,
        database.sessions(),
        SessionEvents::new(),
    );
    let catalog = CatalogClient::new(client, config.catalog_locale.clone());

    let state = router::AppState::new(metrics, catalog);

    let addr: SocketAddr = config.bind_addr;
    info!(
        stage = "app",
        %addr,
        env = %config.environment.as_str(),
        api = %config.api_base_url,
        "starting admin server"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router::app_router(state))
        .await
        .map_err(|err| err.into())
}
