use maps_api::config::AppConfig;
use maps_api::observability::init_tracing;
use maps_api::services::build_app;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load()?;
    let addr = config.bind_addr()?;
    let ui_path = config.docs.ui_path.clone();
    let app = build_app(config)?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server running on http://{}", addr);
    info!("Swagger UI: http://{}{}", addr, ui_path);
    info!("Health: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
