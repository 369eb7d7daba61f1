use authgate::{app, AppConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "authgate=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    let app_state = AppState::init(config).await?;
    tracing::info!(
        access_ttl_minutes = app_state.config.jwt.ttl_minutes,
        refresh_enabled = app_state.config.jwt.refresh_enabled,
        blacklist_after_rotation = app_state.config.jwt.blacklist_after_rotation,
        "token policy"
    );

    if let Some(db) = &app_state.db {
        sqlx::migrate!("./migrations").run(db).await?;
        tracing::info!("migrations applied");
    }

    let addr = app_state.config.bind_addr;
    app::serve(app::build_app(app_state), addr).await
}
