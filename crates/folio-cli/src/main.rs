mod api;
mod github;
mod simulate;

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use folio_core::FolioConfig;
use folio_render::QualityTier;
use folio_store::MemStorage;

const DEFAULT_CONFIG: &str = "folio.config.toml";

#[derive(Parser)]
#[command(
    name = "folio",
    version,
    about = "Folio: portfolio content API and background renderer",
    long_about = "Folio serves the portfolio content API (projects, certificates, messages)\nand simulates the adaptive particle background against a headless host."
)]
struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the content API
    Serve {
        /// Address to bind (overrides server.host)
        #[arg(long)]
        host: Option<IpAddr>,

        /// Port to bind (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,

        /// JSON snapshot file (overrides store.data_file)
        #[arg(long)]
        data: Option<PathBuf>,

        /// Do not insert sample projects into an empty store
        #[arg(long)]
        no_seed: bool,
    },

    /// Run the background animation against a headless host
    Simulate {
        /// Frame-rate cap (default: the tier's target)
        #[arg(long)]
        fps: Option<f64>,

        /// Starting quality tier (default: probed)
        #[arg(long, value_enum)]
        quality: Option<TierArg>,

        /// Host frame-callback rate
        #[arg(long, default_value_t = 60.0)]
        hz: f64,

        /// Simulated duration in seconds
        #[arg(long, default_value_t = 10.0)]
        seconds: f64,

        /// Make every Nth callback late
        #[arg(long)]
        stall_every: Option<u64>,

        /// How late a stalled callback is, in milliseconds
        #[arg(long, default_value_t = 250.0)]
        stall_ms: f64,

        /// Context pool capacity (overrides pool.capacity)
        #[arg(long)]
        capacity: Option<usize>,

        /// Probe the host as a constrained (mobile) device
        #[arg(long)]
        constrained: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config {
        /// Write the default configuration to this path instead
        #[arg(long)]
        init: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum TierArg {
    Low,
    Medium,
    High,
}

impl From<TierArg> for QualityTier {
    fn from(tier: TierArg) -> Self {
        match tier {
            TierArg::Low => QualityTier::Low,
            TierArg::Medium => QualityTier::Medium,
            TierArg::High => QualityTier::High,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve {
            host,
            port,
            data,
            no_seed,
        } => {
            let mut config = load_config(&cli.config)?;
            if let Some(host) = host {
                config.server.host = host.to_string();
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if data.is_some() {
                config.store.data_file = data;
            }
            if no_seed {
                config.store.seed_sample_data = false;
            }
            cmd_serve(config)
        }
        Commands::Simulate {
            fps,
            quality,
            hz,
            seconds,
            stall_every,
            stall_ms,
            capacity,
            constrained,
            json,
        } => {
            let config = load_config(&cli.config)?;
            let options = simulate::SimulateOptions {
                frame_rate: fps,
                quality: quality.map(QualityTier::from),
                host_hz: hz,
                seconds,
                stall_every,
                stall_ms,
                capacity,
                constrained,
            };
            let report = simulate::run(&options, &config);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                simulate::print_report(&report);
            }
            Ok(())
        }
        Commands::Config { init } => cmd_config(&cli.config, init),
    }
}

fn load_config(path: &Path) -> Result<FolioConfig> {
    FolioConfig::load_or_default(path)
        .with_context(|| format!("failed to load config {}", path.display()))
}

fn cmd_serve(config: FolioConfig) -> Result<()> {
    let host: IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("invalid server.host '{}'", config.server.host))?;
    let addr = SocketAddr::new(host, config.server.port);

    let store = MemStorage::from_config(&config.store).context("failed to open store")?;
    match store.snapshot_path() {
        Some(path) => tracing::info!("persisting to {}", path.display()),
        None => tracing::info!("store is in-memory only"),
    }

    let mut github_config = config.github.clone();
    if github_config.token.is_none() {
        github_config.token = std::env::var("GITHUB_TOKEN").ok();
    }
    let github = github::GithubClient::new(&github_config)?;

    run_async(api::serve(api::AppState::new(store, github), addr))
}

fn cmd_config(path: &Path, init: Option<PathBuf>) -> Result<()> {
    if let Some(target) = init {
        if target.exists() {
            anyhow::bail!("{} already exists", target.display());
        }
        FolioConfig::default()
            .save_to_file(&target)
            .with_context(|| format!("failed to write {}", target.display()))?;
        println!("✓ Wrote default config to {}", target.display());
        return Ok(());
    }

    let config = load_config(path)?;
    print!("{}", toml::to_string_pretty(&config).context("failed to render config")?);
    Ok(())
}

fn run_async<F>(future: F) -> Result<()>
where
    F: std::future::Future<Output = Result<()>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to initialize async runtime")?;
    runtime.block_on(future)
}
