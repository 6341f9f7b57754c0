use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coursebot::config::Config;
use coursebot::db::Db;
use coursebot::embedder;
use coursebot::llm::AnthropicClient;
use coursebot::rag::RagSystem;
use coursebot::server::{self, AppState};

/// Course materials assistant: index course documents and ask Claude about them.
#[derive(Parser, Debug)]
#[command(name = "coursebot")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, global = true, default_value = "config.json")]
    config: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load the docs folder and start the HTTP server (default)
    Serve,

    /// Index every course document in a folder
    Index {
        folder: PathBuf,

        /// Remove all stored courses before indexing
        #[arg(long)]
        clear: bool,
    },

    /// Check API key, vector store and optionally a live query
    Doctor {
        /// Also send a test question to the model
        #[arg(long)]
        query: bool,
    },

    /// Create a .env template for the Anthropic API key
    SetupKey,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if let Err(e) = execute(cli).await {
        tracing::error!("Error: {e:#}");
        std::process::exit(1);
    }
}

/// `COURSEBOT_LOG_FORMAT=json` switches to JSON log lines.
fn init_tracing() {
    let log_format = std::env::var("COURSEBOT_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "coursebot=info,tower_http=info".into());

    match log_format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        _ => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let command = cli.command.unwrap_or(Commands::Serve);

    if let Commands::SetupKey = command {
        let mut stdout = std::io::stdout();
        coursebot::doctor::setup_key(&PathBuf::from(".env"), &mut stdout)?;
        return Ok(());
    }

    let config = Config::load(&cli.config)?;
    config.validate().context("invalid configuration")?;
    let rag = Arc::new(build_rag(&config).await?);

    match command {
        Commands::Serve => {
            let docs = PathBuf::from(&config.docs_dir);
            if docs.is_dir() {
                tracing::info!("Loading initial documents from {}", docs.display());
                let (courses, chunks) = rag.add_course_folder(&docs, false).await?;
                tracing::info!("Loaded {courses} courses with {chunks} chunks");
            }
            let frontend = PathBuf::from(&config.frontend_dir);
            server::run_server(
                &config.bind_addr(),
                AppState::new(rag),
                &config.server.cors_origins,
                Some(frontend),
            )
            .await
        }
        Commands::Index { folder, clear } => {
            let (courses, chunks) = rag.add_course_folder(&folder, clear).await?;
            println!("Indexed {courses} courses ({chunks} chunks) from {}", folder.display());
            let analytics = rag.get_course_analytics().await?;
            println!("Total courses: {}", analytics.total_courses);
            Ok(())
        }
        Commands::Doctor { query } => {
            let mut stdout = std::io::stdout();
            let results = coursebot::doctor::run(&config, &rag, query, &mut stdout).await?;
            anyhow::ensure!(results.iter().all(|r| r.passed), "some checks failed");
            Ok(())
        }
        Commands::SetupKey => Ok(()),
    }
}

async fn build_rag(config: &Config) -> Result<RagSystem> {
    let embedder_config = config.clone();
    let embedder = tokio::task::spawn_blocking(move || embedder::from_config(&embedder_config))
        .await
        .context("embedder initialization panicked")?
        .context("failed to initialize embedder")?;

    let db = Db::open(&config.db_path, embedder.dimensions())
        .with_context(|| format!("failed to open database {}", config.db_path))?;

    if !config.api_key_configured() {
        tracing::warn!("ANTHROPIC_API_KEY is not set; queries will fail until it is configured");
    }
    let client = AnthropicClient::from_config(config).context("failed to build Anthropic client")?;

    Ok(RagSystem::new(config, db, embedder, Arc::new(client)))
}
