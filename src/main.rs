use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vicinity::config::Config;
use vicinity::db;
use vicinity::index::{SpatialIndex, SqliteSpatialIndex};
use vicinity::maintain::IndexMaintainer;
use vicinity::search::ProximityService;
use vicinity::server::{self, AppState};
use vicinity::store::{BusinessStore, SqliteBusinessStore};

/// Vicinity — geohash proximity search for business records
///
/// Serves an HTTP API for registering businesses and finding the ones
/// near a point, backed by a geohash index in SQLite.
///
/// Examples:
///   vicinity
///   vicinity --port 9090 --db ./vicinity.db
///   vicinity --in-memory --precisions 5,6,7
///   vicinity --search-timeout-ms 500 --max-limit 50
#[derive(Parser)]
#[command(name = "vicinity", version, about, long_about = None)]
struct Cli {
    /// Interface to bind. Example: --host 0.0.0.0
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on.
    #[arg(long, short = 'p', default_value_t = 8080)]
    port: u16,

    /// SQLite database file. Defaults to the platform data directory.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Keep everything in memory; nothing survives a restart.
    #[arg(long)]
    in_memory: bool,

    /// Geohash precisions to maintain, comma separated.
    #[arg(long, value_delimiter = ',', default_values_t = vec![4, 5, 6])]
    precisions: Vec<usize>,

    /// Abandon searches that run longer than this many milliseconds.
    #[arg(long, default_value_t = 2_000)]
    search_timeout_ms: u64,

    /// Results per page when a query does not ask for a limit.
    #[arg(long, default_value_t = 20)]
    default_limit: usize,

    /// Hard cap on results per page.
    #[arg(long, default_value_t = 100)]
    max_limit: usize,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // ── Build configuration ─────────────────────────────────────

    let mut config = Config {
        host: cli.host,
        port: cli.port,
        db_path: if cli.in_memory {
            None
        } else {
            Some(cli.db.unwrap_or_else(Config::default_db_path))
        },
        precisions: cli.precisions,
        search_timeout: Duration::from_millis(cli.search_timeout_ms),
        default_limit: cli.default_limit,
        max_limit: cli.max_limit,
    };
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // ── Open storage ────────────────────────────────────────────

    let db = match &config.db_path {
        Some(path) => {
            info!("database at {}", path.display());
            db::open(path)
        }
        None => {
            info!("running on an in-memory database");
            db::in_memory()
        }
    }
    .unwrap_or_else(|e| {
        eprintln!("Error: Cannot open database: {}", e);
        std::process::exit(1);
    });

    let store = Arc::new(SqliteBusinessStore::new(db.clone()).unwrap_or_else(|e| {
        eprintln!("Error: Cannot initialize business store: {}", e);
        std::process::exit(1);
    }));
    let index = Arc::new(SqliteSpatialIndex::new(db).unwrap_or_else(|e| {
        eprintln!("Error: Cannot initialize spatial index: {}", e);
        std::process::exit(1);
    }));

    // ── Wire services ───────────────────────────────────────────

    let store: Arc<dyn BusinessStore> = store;
    let index: Arc<dyn SpatialIndex> = index;

    let search = ProximityService::new(
        index.clone(),
        store.clone(),
        config.precisions.clone(),
        config.search_timeout,
        config.max_limit,
    );
    let maintainer = IndexMaintainer::new(index, config.precisions.clone());

    info!(
        precisions = ?config.precisions,
        timeout_ms = config.search_timeout.as_millis() as u64,
        "index maintainer ready"
    );

    let state = Arc::new(AppState {
        store,
        search,
        maintainer,
        default_limit: config.default_limit,
    });

    server::start(&config.host, config.port, state).await;
}
