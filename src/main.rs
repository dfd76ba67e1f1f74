use std::net::SocketAddr;
use threadspace::{config::Config, db, routes, state::AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 0. Load .env file immediately. Silently ignores if no .env exists.
    dotenvy::dotenv().ok();

    // Everything environment-driven is read here and nowhere else.
    let config = Config::from_env()?;

    // 1. Initialize Sentry (if configured)
    // This guard must be kept in scope for Sentry to work
    let _guard = sentry::init((
        config.sentry_dsn.clone(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            traces_sample_rate: 1.0,
            ..Default::default()
        },
    ));

    // 2. Install rustls crypto provider
    // This needs to happen before any TLS connections are made (database, etc).
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    // 3. Initialize logging
    // Respects RUST_LOG. Defaults to debug for us and tower_http.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "threadspace=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    tracing::info!(production = config.production, "Starting threadspace API...");

    // 4. Connect to storage
    // Postgres (with migrations) when DATABASE_URL is set, in-memory otherwise.
    let db = db::connect(config.database_url.as_deref()).await?;
    tracing::info!(backend = db.backend_name(), "Storage ready");

    // 5. Build the app state
    let port = config.port;
    let state = AppState::new(config, db)?;
    let app = routes::create_routes(state);

    // 6. Start the server
    // 0.0.0.0 so it binds to all interfaces (necessary in Docker).
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    // Connection info feeds the per-IP rate limiters when no proxy header is present.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
