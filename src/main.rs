use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use task_tracker::{api, config::Config, db::Database, store::TaskStore, tracker::Tracker};

#[derive(Parser)]
#[command(name = "tracker")]
#[command(about = "Task tracker with epics, scheduling and view history")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port for HTTP API
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Database file (defaults to the platform data directory)
        #[arg(long)]
        db: Option<PathBuf>,

        /// Keep all state in memory; nothing is loaded or saved
        #[arg(long)]
        in_memory: bool,
    },
    /// Print the persisted state as JSON
    Export {
        /// Database file (defaults to the platform data directory)
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "task_tracker=debug,tower_http=debug".into()),
    );

    // Logs go to stderr so `export` output stays clean JSON.
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_database(path: Option<PathBuf>) -> anyhow::Result<Database> {
    let db = match path {
        Some(path) => Database::open(path)?,
        None => Database::open_default()?,
    };
    db.migrate()?;
    Ok(db)
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let tracker = if config.in_memory {
        tracing::info!("Running without persistence");
        Tracker::in_memory(config.history_capacity)
    } else {
        let db = open_database(config.db_path.clone())?;
        Tracker::open(db, config.history_capacity)?
    };

    let app = api::create_router(tracker);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("Task tracker listening on http://{}", address);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = Config::from_env();

    match cli.command {
        Some(Commands::Serve {
            port,
            host,
            db,
            in_memory,
        }) => {
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(host) = host {
                config.host = host;
            }
            if db.is_some() {
                config.db_path = db;
            }
            config.in_memory |= in_memory;
            serve(config).await?;
        }
        Some(Commands::Export { db }) => {
            let db = open_database(db.or(config.db_path))?;
            // Round-trip through the store so epic fields are freshly derived.
            let store = TaskStore::restore(db.load_snapshot()?, config.history_capacity)?;
            let snapshot = store.snapshot();
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        None => {
            serve(config).await?;
        }
    }

    Ok(())
}
