use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use lambda_provider::aws::client::LambdaClient;
use lambda_provider::aws::http::format_api_error;
use lambda_provider::config::ProviderConfig;
use lambda_provider::resource::{
    DeployInput, DestroyInput, FetchInput, Provider, ResourceKind, StabilisedInput,
};
use lambda_provider::{ProviderError, VERSION};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Level};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Resource provider for AWS Lambda constructs
#[derive(Parser, Debug)]
#[command(name = "lambda-provider", version, about, long_about = None)]
struct Args {
    /// AWS region to use
    #[arg(short, long, global = true)]
    region: Option<String>,

    /// Shared credentials profile to use
    #[arg(short, long, global = true)]
    profile: Option<String>,

    /// Override the Lambda endpoint (local emulators)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    /// Remember region, profile and endpoint for later runs
    #[arg(long, global = true)]
    save_config: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List supported resource types
    Types,
    /// Fetch the external state of a resource
    Fetch(Invocation),
    /// Create or update a resource
    Deploy(Invocation),
    /// Destroy a resource
    Destroy(Invocation),
    /// Check whether a resource has stabilised
    Stabilised(Invocation),
}

#[derive(clap::Args, Debug)]
struct Invocation {
    /// Resource type, e.g. aws/lambda/function
    #[arg(short = 't', long)]
    resource_type: String,

    /// Input document (JSON or YAML); `-` reads stdin
    #[arg(short, long, default_value = "-")]
    input: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    // RUST_LOG narrows the level per module when set
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(tracing_level.to_string().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("lambda-provider {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("lambda-provider").join("lambda-provider.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".lambda-provider").join("lambda-provider.log");
    }
    PathBuf::from("lambda-provider.log")
}

/// Read an input document; `.yaml`/`.yml` files are parsed as YAML
fn read_input<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let (content, yaml) = if path == Path::new("-") {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("Failed to read input from stdin")?;
        (content, false)
    } else {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file {}", path.display()))?;
        let yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        (content, yaml)
    };

    if yaml {
        serde_yaml::from_str(&content).with_context(|| format!("Invalid YAML in {}", path.display()))
    } else {
        serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
    }
}

async fn build_provider(args: &Args) -> Result<Provider> {
    let config = ProviderConfig::load().with_overrides(
        args.region.clone(),
        args.profile.clone(),
        args.endpoint.clone(),
    );
    if args.save_config {
        config.save().context("Failed to save configuration")?;
    }

    let client = LambdaClient::from_config(&config)
        .await
        .context("Failed to initialize Lambda client")?;
    Ok(Provider::new(Arc::new(client)))
}

fn list_types() -> Result<(), ProviderError> {
    let types = ResourceKind::all()
        .iter()
        .map(|kind| {
            let def = kind.definition()?;
            Ok(json!({
                "type": kind.as_str(),
                "displayName": def.display_name,
                "computedFields": def.computed_fields,
            }))
        })
        .collect::<Result<Vec<_>, ProviderError>>()?;
    emit(&types)
}

async fn run(args: &Args, cancel: &CancellationToken) -> Result<(), ProviderError> {
    // Listing types needs no credentials
    if let Command::Types = args.command {
        return list_types();
    }

    let provider = match build_provider(args).await {
        Ok(provider) => provider,
        Err(e) => return Err(ProviderError::config(format!("{:#}", e))),
    };
    match &args.command {
        Command::Types => list_types(),
        Command::Fetch(inv) => {
            let input: FetchInput = read(&inv.input)?;
            let state = provider
                .fetch_external_state(&inv.resource_type, &input, cancel)
                .await?;
            emit(&state)
        },
        Command::Deploy(inv) => {
            let input: DeployInput = read(&inv.input)?;
            let output = provider.deploy(&inv.resource_type, &input, cancel).await?;
            emit(&output)
        },
        Command::Destroy(inv) => {
            let input: DestroyInput = read(&inv.input)?;
            provider.destroy(&inv.resource_type, &input, cancel).await?;
            emit(&json!({"destroyed": true}))
        },
        Command::Stabilised(inv) => {
            let input: StabilisedInput = read(&inv.input)?;
            let stabilised = provider.stabilised(&inv.resource_type, &input, cancel).await?;
            emit(&json!({"stabilised": stabilised}))
        },
    }
}

fn read<T: DeserializeOwned>(path: &Path) -> Result<T, ProviderError> {
    read_input(path)
        .map_err(|e| ProviderError::invalid_value(path.display().to_string(), format!("{:#}", e)))
}

fn emit<T: Serialize>(value: &T) -> Result<(), ProviderError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; cancelling in-flight call");
            on_interrupt.cancel();
        }
    });

    let invocation = uuid::Uuid::new_v4();
    let span = tracing::info_span!("invocation", id = %invocation);

    match run(&args, &cancel).instrument(span.clone()).await {
        Ok(()) => Ok(()),
        Err(e) => {
            span.in_scope(|| tracing::error!("Invocation failed ({}): {}", e.category(), e));
            eprintln!("Error: {}", format_api_error(&e));
            Err(anyhow::Error::new(e).context(format!("invocation {} failed", invocation)))
        },
    }
}
