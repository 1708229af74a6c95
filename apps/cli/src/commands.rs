//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use serde::de::DeserializeOwned;
use tracing::info;

use listharvest_core::pipeline::{
    DiscoveryEvent, ExtractionEvent, ProgressReporter, discover, extract,
};
use listharvest_crawler::{HttpNavigator, MediaFetcher};
use listharvest_shared::{
    AppConfig, LogFormat as ConfigLogFormat, StorageBackend, init_config, load_config,
    load_config_from, validate_config,
};
use listharvest_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// listharvest: harvest classified listings into batched, keyed artifacts.
#[derive(Parser)]
#[command(
    name = "listharvest",
    version,
    about = "Discover listing links into manifests and extract manifests into published records.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.listharvest/listharvest.toml).
    #[arg(long, global = true, env = "LISTHARVEST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the configured storage backend.
    #[arg(long, global = true)]
    pub backend: Option<Backend>,

    /// Log format: text or json. Overrides the config file.
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Storage backend override.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum Backend {
    File,
    S3,
    Memory,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Traverse listing targets and write link manifests.
    Discover {
        /// Listing URL to traverse (repeatable, processed in order).
        #[arg(long = "city-link", conflicts_with = "event")]
        city_links: Vec<String>,

        /// JSON event file: {"city_links": [...]}.
        #[arg(long)]
        event: Option<PathBuf>,
    },

    /// Extract the items of one manifest and publish the records.
    Extract {
        /// Manifest key in the links bucket.
        #[arg(long, conflicts_with = "event")]
        manifest: Option<String>,

        /// JSON event file: {"Items": [...]}. Only the first key is used.
        #[arg(long)]
        event: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Config and tracing setup
// ---------------------------------------------------------------------------

/// Load the config file and apply CLI overrides.
pub(crate) fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    if let Some(backend) = cli.backend {
        config.storage.backend = match backend {
            Backend::File => StorageBackend::File,
            Backend::S3 => StorageBackend::S3,
            Backend::Memory => StorageBackend::Memory,
        };
    }
    if let Some(format) = cli.log_format {
        config.logging.format = match format {
            LogFormat::Text => ConfigLogFormat::Text,
            LogFormat::Json => ConfigLogFormat::Json,
        };
    }

    validate_config(&config)?;
    Ok(config)
}

/// Initialize tracing from the logging config and verbosity flags.
pub(crate) fn init_tracing(cli: &Cli, config: &AppConfig) {
    use tracing_subscriber::{EnvFilter, fmt};

    let level = match cli.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("listharvest={level}")));

    match config.logging.format {
        ConfigLogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        ConfigLogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli, config: AppConfig) -> Result<()> {
    match cli.command {
        Command::Discover { city_links, event } => {
            let event = discovery_event(city_links, event.as_deref())?;
            cmd_discover(&event, &config).await
        }
        Command::Extract { manifest, event } => {
            let event = extraction_event(manifest, event.as_deref())?;
            cmd_extract(&event, &config).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

fn read_event<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read event file {}", path.display()))?;
    serde_json::from_str(&raw)
        .wrap_err_with(|| format!("malformed event file {}", path.display()))
}

fn discovery_event(city_links: Vec<String>, event: Option<&Path>) -> Result<DiscoveryEvent> {
    match event {
        Some(path) => read_event(path),
        None if city_links.is_empty() => Err(eyre!("provide --city-link or --event")),
        None => Ok(DiscoveryEvent { city_links }),
    }
}

fn extraction_event(manifest: Option<String>, event: Option<&Path>) -> Result<ExtractionEvent> {
    match (manifest, event) {
        (_, Some(path)) => read_event(path),
        (Some(key), None) => Ok(ExtractionEvent { items: vec![key] }),
        (None, None) => Err(eyre!("provide --manifest or --event")),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_discover(event: &DiscoveryEvent, config: &AppConfig) -> Result<()> {
    info!(targets = event.city_links.len(), "starting discovery");

    let storage = Storage::open(&config.storage)?;
    let mut nav = HttpNavigator::new(&config.site)?;
    let reporter = CliProgress::new();

    let result = discover(&mut nav, &storage, event, config, &reporter).await;
    reporter.finish();
    let result = result?;

    println!("{}", serde_json::to_string_pretty(&result.manifest_keys)?);
    Ok(())
}

async fn cmd_extract(event: &ExtractionEvent, config: &AppConfig) -> Result<()> {
    info!(manifests = event.items.len(), "starting extraction");

    let storage = Storage::open(&config.storage)?;
    let mut nav = HttpNavigator::new(&config.site)?;
    let fetcher = MediaFetcher::new(&config.site)?;
    let reporter = CliProgress::new();

    let result = extract(&mut nav, &storage, &fetcher, event, config, &reporter).await;
    reporter.finish();
    let result = result?;

    if let Some(key) = &result.output_key {
        info!(%key, records = result.records, "records published");
    }
    println!("{}", serde_json::to_string(&result.response)?);
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn target_done(&self, city: &str, links: usize, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Traversed [{current}/{total}] {city}: {links} links"));
    }

    fn item_done(&self, url: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Extracting [{current}/{total}] {url}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_accepts_repeated_city_links() {
        let cli = Cli::try_parse_from([
            "listharvest",
            "discover",
            "--city-link",
            "https://boston.craigslist.org/search/fuo",
            "--city-link",
            "https://chicago.craigslist.org/search/fuo",
        ])
        .unwrap();

        let Command::Discover { city_links, event } = cli.command else {
            panic!("expected discover");
        };
        let event = discovery_event(city_links, event.as_deref()).unwrap();
        assert_eq!(event.city_links.len(), 2);
    }

    #[test]
    fn extract_requires_a_source() {
        assert!(extraction_event(None, None).is_err());
        let event = extraction_event(Some("a/b/00001.json".into()), None).unwrap();
        assert_eq!(event.items, vec!["a/b/00001.json"]);
    }

    #[test]
    fn manifest_and_event_conflict() {
        let parsed = Cli::try_parse_from([
            "listharvest",
            "extract",
            "--manifest",
            "k.json",
            "--event",
            "event.json",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "listharvest",
            "extract",
            "--manifest",
            "k.json",
            "--backend",
            "memory",
            "--log-format",
            "json",
            "-vv",
        ])
        .unwrap();
        assert!(matches!(cli.backend, Some(Backend::Memory)));
        assert!(matches!(cli.log_format, Some(LogFormat::Json)));
        assert_eq!(cli.verbose, 2);
    }
}
