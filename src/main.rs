use issuetrack::{
    AppState, LocalDiskStorage, Views,
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
    storage::StorageState,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, sets up logging, connects to Postgres, loads the
/// templates and serves HTTP until the process is stopped.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins over the defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "issuetrack=debug,tower_http=info,sqlx=warn".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Database
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    if config.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("FATAL: Failed to run database migrations.");
        tracing::info!("Migrations applied.");
    }

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 4. Photo storage and templates
    let storage = Arc::new(LocalDiskStorage::new(&config.assets_dir)) as StorageState;

    let views = Views::load(&config.templates_dir)
        .expect("FATAL: Failed to load templates. Check TEMPLATES_DIR.");

    if config.demo_logins {
        tracing::warn!("Demo logins are enabled: /demo/{{role}} skips the password check.");
    }

    // 5. State, router, server
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState {
        repo,
        storage,
        views: Arc::new(views),
        config,
    };

    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server error.");
}
