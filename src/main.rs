//! application-values CLI
//!
//! Entry point for the `application-values` command-line tool.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use application_values::{
    CancelToken, ConfigLayer, FingerprintAlgorithm, GeneratorConfig, Generator, OutputLayout,
};

#[derive(Parser)]
#[command(name = "application-values")]
#[command(about = "Generate Helm values and Spinnaker descriptors per service", version)]
struct Cli {
    /// Values files location (one directory per namespace)
    #[arg(long)]
    values: Option<PathBuf>,

    /// Generated files will end up here
    #[arg(long)]
    destination: Option<PathBuf>,

    /// Remote store with previously published values (s3://bucket, https://..., or a directory)
    #[arg(long, conflicts_with = "bucket")]
    store: Option<String>,

    /// S3 bucket which stores values from previous deployments
    #[arg(long)]
    bucket: Option<String>,

    /// S3 bucket region (default: us-east-1)
    #[arg(long)]
    region: Option<String>,

    /// Key prefix of values in the store: <prefix>/<service>-<namespace>.yaml (default: values)
    #[arg(long)]
    prefix: Option<String>,

    /// Number of worker threads; zero or negative uses every core
    #[arg(long, allow_negative_numbers = true)]
    workers: Option<i64>,

    /// Configuration file extensions (comma-separated, default: yml,yaml)
    #[arg(long, value_delimiter = ',')]
    extensions: Option<Vec<String>>,

    /// Fingerprint algorithm matching the store's metadata (md5, sha256)
    #[arg(long)]
    fingerprint: Option<FingerprintAlgorithm>,

    /// Deadline of a single remote lookup in seconds (default: 5)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Retries for transient remote failures (default: 2)
    #[arg(long)]
    retries: Option<u32>,

    /// Owner email written into application descriptors
    #[arg(long)]
    email: Option<String>,

    /// Path to a TOML config file; flags override its values
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

impl Cli {
    fn to_layer(&self) -> ConfigLayer {
        ConfigLayer {
            values: self.values.clone(),
            destination: self.destination.clone(),
            store: self.store.clone(),
            bucket: self.bucket.clone(),
            region: self.region.clone(),
            prefix: self.prefix.clone(),
            workers: self.workers,
            extensions: self.extensions.clone(),
            fingerprint: self.fingerprint,
            timeout_secs: self.timeout_secs,
            retries: self.retries,
            email: self.email.clone(),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli.log_level, cli.verbose) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    let config = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    let layout = OutputLayout::new(&config.destination_dir);
    if let Err(e) = layout.create_dirs() {
        eprintln!("Error creating output directories: {}", e);
        process::exit(2);
    }

    let cancel = CancelToken::new();
    if let Err(e) = cancel.install_signal_handler() {
        tracing::warn!(error = %e, "could not install signal handler");
    }

    let detector = match config.change_detector() {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error opening remote store: {}", e);
            process::exit(3);
        }
    };
    if detector.is_none() {
        tracing::info!("no remote store configured, every values file will be written");
    }

    let generator = Generator::new(&config)
        .with_detector(detector)
        .with_cancel_token(cancel);

    match generator.run_with(|outcome| println!("{}", outcome.describe())) {
        Ok(summary) => {
            eprintln!(
                "Generated {} services: {} values written, {} unchanged, {} applications created",
                summary.services.len(),
                summary.values_written(),
                summary.values_unchanged(),
                summary.applications_written()
            );
            for path in &summary.skipped {
                eprintln!("Skipped {} (not inside a namespace directory)", path.display());
            }
        }
        Err(e) if e.is_canceled() => {
            eprintln!("Interrupted: {}", e);
            process::exit(e.exit_code());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}

fn load_config(cli: &Cli) -> Result<GeneratorConfig, application_values::ConfigError> {
    let mut layers = Vec::new();
    if let Some(path) = &cli.config {
        layers.push(ConfigLayer::from_file(path)?);
    }
    layers.push(cli.to_layer());
    GeneratorConfig::resolve(layers)
}

fn init_logging(level: &str, verbose: bool) -> Result<(), String> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        level
            .parse::<tracing::Level>()
            .map_err(|e| format!("invalid log level '{}': {}", level, e))?
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}
