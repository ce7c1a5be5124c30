//! Vellum Administration CLI

mod integrity;
mod maintenance;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vellum_core::{Database, EngineConfig, ObjectType};

#[derive(Parser, Debug)]
#[command(name = "vellum-admin")]
#[command(author = "Vellum Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Vellum content store administration tool")]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the schema and seed system rows
    Init {
        #[arg(long)]
        db: PathBuf,
    },

    /// Check (and optionally repair) node paths and levels
    CheckIntegrity {
        #[arg(long)]
        db: PathBuf,
        /// document, media or member
        #[arg(long, default_value = "document")]
        object_type: String,
        #[arg(long)]
        fix: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete old versions, keeping the newest per item
    CleanupVersions {
        #[arg(long)]
        db: PathBuf,
        #[arg(long, default_value_t = 5)]
        keep: usize,
        /// List candidates without deleting
        #[arg(long)]
        dry_run: bool,
    },

    /// Recompute edited flags for every document of a type
    RenormalizeEdited {
        #[arg(long)]
        db: PathBuf,
        /// Document type alias
        #[arg(long)]
        content_type: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter = if cli.debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into())
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    match cli.command {
        Commands::Init { db } => {
            println!("Initializing content store at {}", db.display());
            let config = load_config(&db)?;
            Database::open(&db, config.clone())?;
            if let Some(dir) = config_dir(&db) {
                config.save(dir)?;
            }
            println!("Content store initialized successfully");
        }

        Commands::CheckIntegrity {
            db,
            object_type,
            fix,
            json,
        } => {
            let object_type = parse_object_type(&object_type)?;
            let mut database = open(&db)?;
            integrity::run(&mut database, object_type, fix, json)?;
        }

        Commands::CleanupVersions { db, keep, dry_run } => {
            let mut database = open(&db)?;
            maintenance::cleanup_versions(&mut database, keep, dry_run)?;
        }

        Commands::RenormalizeEdited { db, content_type } => {
            let mut database = open(&db)?;
            maintenance::renormalize_edited(&mut database, &content_type)?;
        }
    }

    Ok(())
}

fn config_dir(db: &Path) -> Option<&Path> {
    match db.parent() {
        Some(dir) if dir.as_os_str().is_empty() => Some(Path::new(".")),
        other => other,
    }
}

fn load_config(db: &Path) -> Result<EngineConfig> {
    match config_dir(db) {
        Some(dir) => Ok(EngineConfig::load(dir)?),
        None => Ok(EngineConfig::default()),
    }
}

fn open(db: &Path) -> Result<Database> {
    if !db.exists() {
        anyhow::bail!("Content store not found at {}; run `vellum-admin init` first", db.display());
    }
    let config = load_config(db)?;
    Database::open(db, config).with_context(|| format!("Failed to open content store at {}", db.display()))
}

fn parse_object_type(name: &str) -> Result<ObjectType> {
    match ObjectType::from_name(name) {
        Some(t @ (ObjectType::Document | ObjectType::Media | ObjectType::Member)) => Ok(t),
        _ => anyhow::bail!("Unknown object type '{}' (expected document, media or member)", name),
    }
}
