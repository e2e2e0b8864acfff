//! trailmark-engine binary - recognition and journey HTTP service

use anyhow::Result;
use clap::Parser;
use tracing::info;

use trailmark_common::config::{ensure_root_folder, resolve_root_folder, EngineSettings};
use trailmark_common::db::init_database;
use trailmark_engine::{build_router, sweeper, AppState};

#[derive(Parser, Debug)]
#[command(name = "trailmark-engine", version, about = "User recognition and journey engine")]
struct Args {
    /// Root folder holding the database (overrides env and config file)
    #[arg(long)]
    root_folder: Option<String>,

    /// Port to listen on
    #[arg(long, env = "TRAILMARK_PORT", default_value_t = 5760)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting trailmark-engine v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), "TRAILMARK_ROOT_FOLDER");
    let db_path = ensure_root_folder(&root_folder)?;
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path).await?;
    info!("✓ Database initialized");

    let settings = EngineSettings::load(&pool).await?;
    info!(
        threshold = settings.fingerprint_confidence_threshold,
        ttl_hours = settings.session_ttl_hours,
        "✓ Engine settings loaded"
    );

    tokio::spawn(sweeper::run(pool.clone(), settings.clone()));

    let state = AppState::new(pool, settings);
    let app = build_router(state);

    let addr = format!("127.0.0.1:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("trailmark-engine listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
