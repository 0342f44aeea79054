//! kvbucket server binary
//!
//! Command-line interface with support for:
//! - Running the HTTP server
//! - Bucket administration (create, list)
//! - Direct item access (get, set, list) against the database file
//!
//! # Examples
//!
//! ```bash
//! # Start server
//! kvbucket serve --bind 0.0.0.0 --port 3000
//!
//! # Create a bucket for a token
//! kvbucket bucket create --token abc123
//!
//! # Write and read an item
//! kvbucket set --token abc123 --bucket <id> --key file1 --value hello
//! kvbucket get --token abc123 --bucket <id> --key file1
//! ```

use clap::{Args, Parser, Subcommand};
use kvbucket::config::Settings;
use kvbucket::keys::ItemKey;
use kvbucket::server::{shutdown_signal, start_server, ServerConfig};
use kvbucket::storage::DefaultStorageEngine;
use kvbucket::{BucketId, BucketManager, Storage, Token, ValueStore};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// kvbucket - bucketed key-value store over HTTP
#[derive(Parser, Debug)]
#[command(name = "kvbucket")]
#[command(version = kvbucket::VERSION)]
#[command(about = "Bucketed key-value store over HTTP", long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "KVBUCKET_CONFIG")]
    config: Option<PathBuf>,

    /// Database file path (overrides storage.path)
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Log directory path
    #[arg(long, global = true, default_value = "logs", env = "KVBUCKET_LOG_DIR")]
    log_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server
    Serve(ServeArgs),

    /// Bucket operations
    Bucket {
        #[command(subcommand)]
        command: BucketCommands,
    },

    /// Print the value stored under a key
    Get(ItemArgs),

    /// Store a value under a key
    Set(SetArgs),

    /// List the keys of a bucket
    List(BucketArgs),

    /// Show version
    Version,
}

/// Server configuration arguments
#[derive(Args, Debug)]
struct ServeArgs {
    /// HTTP bind address
    #[arg(short, long)]
    bind: Option<String>,

    /// HTTP port
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable permissive CORS
    #[arg(long)]
    cors: bool,

    /// Maximum request body size (bytes)
    #[arg(long)]
    max_body_size: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum BucketCommands {
    /// Create a new bucket
    Create {
        /// Tenant token
        #[arg(short, long)]
        token: String,
    },

    /// List the buckets of a token
    List {
        /// Tenant token
        #[arg(short, long)]
        token: String,
    },
}

#[derive(Args, Debug)]
struct BucketArgs {
    /// Tenant token
    #[arg(short, long)]
    token: String,

    /// Bucket identifier
    #[arg(short, long)]
    bucket: String,
}

#[derive(Args, Debug)]
struct ItemArgs {
    #[command(flatten)]
    bucket: BucketArgs,

    /// Item key
    #[arg(short, long)]
    key: String,
}

#[derive(Args, Debug)]
struct SetArgs {
    #[command(flatten)]
    item: ItemArgs,

    /// Value to store (reads stdin when neither --value nor --file is given)
    #[arg(short, long, conflicts_with = "file")]
    value: Option<String>,

    /// Read the value from a file
    #[arg(short, long)]
    file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let _guard = setup_logging(&cli)?;

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(path) = cli.db_path.clone() {
        settings.storage.path = path;
    }

    // Execute command
    match cli.command {
        Commands::Serve(args) => serve_command(settings, args).await,
        Commands::Bucket { command } => bucket_command(&settings, command),
        Commands::Get(args) => get_command(&settings, args),
        Commands::Set(args) => set_command(&settings, args),
        Commands::List(args) => list_command(&settings, args),
        Commands::Version => {
            println!("kvbucket {}", kvbucket::VERSION);
            Ok(())
        }
    }
}

/// Setup logging with rolling files and console output
fn setup_logging(cli: &Cli) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(&cli.log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &cli.log_dir, "kvbucket.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let log_level = cli
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(!cli.no_color),
        )
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();

    Ok(guard)
}

fn open_storage(settings: &Settings) -> anyhow::Result<Arc<Storage>> {
    let engine = DefaultStorageEngine::open(&settings.storage.path)?;
    Ok(Arc::new(Storage::new(Box::new(engine))))
}

/// Serve command - start the HTTP server
async fn serve_command(mut settings: Settings, args: ServeArgs) -> anyhow::Result<()> {
    info!(version = %kvbucket::VERSION, "kvbucket starting");

    if let Some(bind) = args.bind {
        settings.server.bind = bind;
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    if let Some(max_body_size) = args.max_body_size {
        settings.server.max_body_size = max_body_size;
    }
    if args.cors {
        settings.server.enable_cors = true;
    }

    // Initialize storage
    let storage = open_storage(&settings)?;
    info!(path = %settings.storage.path.display(), "Storage initialized");

    let result = start_server(ServerConfig::from(&settings), storage, shutdown_signal()).await;

    info!("Storage closed");
    result
}

fn bucket_command(settings: &Settings, command: BucketCommands) -> anyhow::Result<()> {
    let storage = open_storage(settings)?;

    match command {
        BucketCommands::Create { token } => {
            let token = Token::parse(&token)?;
            let bucket = BucketManager::new(storage).create_bucket(&token)?;
            println!("{}", bucket);
            Ok(())
        }
        BucketCommands::List { token } => {
            let token = Token::parse(&token)?;
            let buckets = ValueStore::new(storage).list_buckets(&token)?;
            if buckets.is_empty() {
                eprintln!("No buckets found.");
            }
            for bucket in buckets {
                println!("{}", bucket);
            }
            Ok(())
        }
    }
}

fn parse_bucket_args(args: &BucketArgs) -> anyhow::Result<(Token, BucketId)> {
    Ok((Token::parse(&args.token)?, BucketId::parse(&args.bucket)?))
}

fn get_command(settings: &Settings, args: ItemArgs) -> anyhow::Result<()> {
    let (token, bucket) = parse_bucket_args(&args.bucket)?;
    let key = ItemKey::parse(&args.key)?;

    let values = ValueStore::new(open_storage(settings)?);
    match values.get_value(&token, &bucket, &key)? {
        Some(value) => {
            std::io::stdout().write_all(&value)?;
            Ok(())
        }
        None => anyhow::bail!("key not found: {}/{}", bucket, key),
    }
}

fn set_command(settings: &Settings, args: SetArgs) -> anyhow::Result<()> {
    let (token, bucket) = parse_bucket_args(&args.item.bucket)?;
    let key = ItemKey::parse(&args.item.key)?;

    let value = match (args.value, args.file) {
        (Some(value), _) => value.into_bytes(),
        (None, Some(path)) => std::fs::read(path)?,
        (None, None) => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };

    let values = ValueStore::new(open_storage(settings)?);
    values.set_value(&token, &bucket, &key, &value)?;
    info!(bucket = %bucket, key = %key, bytes = value.len(), "Value stored");
    Ok(())
}

fn list_command(settings: &Settings, args: BucketArgs) -> anyhow::Result<()> {
    let (token, bucket) = parse_bucket_args(&args)?;

    let values = ValueStore::new(open_storage(settings)?);
    for entry in values.list_values(&token, &bucket)? {
        println!("{}", entry.key);
    }
    Ok(())
}
