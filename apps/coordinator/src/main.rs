use secchiware_coordinator::{routes, shutdown, AppState, Config};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenvy::dotenv().ok();
    secchiware_telemetry::init_tracing("secchiware_coordinator");

    let config = Config::load()?;
    let state = AppState::build(&config).await?;

    let app = routes::build(state.clone());
    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;

    tracing::info!(addr = %config.bind_addr(), "coordinator listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::signal(state))
        .await?;

    Ok(())
}
