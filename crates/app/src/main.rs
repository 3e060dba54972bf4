use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use awareness_core::model::LearnerId;
use services::{AppServices, Clock, CourseCatalog, CourseConfig};
use storage::repository::QuestionBankRepository;

/// Social engineering awareness course: seeding and inspection.
#[derive(Parser)]
#[command(name = "awareness", version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to AWARENESS_CONFIG when set)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database, overriding the config
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the course catalog into the database
    Seed {
        /// Catalog file, overriding the config
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// List modules with their question sets
    Modules,
    /// Print a learner's dashboard as JSON
    Dashboard {
        #[arg(long)]
        learner: u64,
    },
}

fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite://") {
        return trimmed.to_string();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Creates the database file and its directory so the pool can open it.
fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| format!("invalid database url: {db_url}"))?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(format!("invalid database url: {db_url}").into());
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = CourseConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.database_url = db;
    }
    config.database_url = normalize_sqlite_url(&config.database_url);
    prepare_sqlite_file(&config.database_url)?;

    let services = AppServices::new_sqlite(&config, Clock::default()).await?;

    match cli.command {
        Commands::Seed { catalog } => {
            let path = catalog.unwrap_or(config.catalog_path);
            let catalog = CourseCatalog::load(&path)?;
            services.seed(&catalog).await?;
            info!(catalog = %path.display(), db = %config.database_url, "seed complete");
        }
        Commands::Modules => {
            let course = services.gate().course().await?;
            for module in course.modules() {
                let sets = services.storage().questions.question_sets(module.id()).await?;
                let questions: usize = sets.iter().map(|s| s.len()).sum();
                println!(
                    "{:>2}  {:<45} sets={} questions={}{}",
                    module.id().value(),
                    module.title(),
                    sets.len(),
                    questions,
                    module
                        .simulation()
                        .map(|k| format!(" simulation={k}"))
                        .unwrap_or_default()
                );
            }
        }
        Commands::Dashboard { learner } => {
            let dashboard = services
                .dashboard()
                .dashboard(LearnerId::new(learner))
                .await?;
            println!("{}", serde_json::to_string_pretty(&dashboard)?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
