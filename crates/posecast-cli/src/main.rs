//! Posecast CLI - immersive session telemetry tools

mod serve;
mod simulate;

use std::io::Read;
use std::net::SocketAddr;

use clap::{Parser, Subcommand};
use posecast_core::collector::{ReportAuthenticator, ReportCollector};
use posecast_core::config::{Config, SECRET_ENV_VAR};
use posecast_core::driver::DriverSettings;
use posecast_core::session::SessionMode;
use posecast_core::telemetry::PoseReporter;
use posecast_core::transport::RequestSigner;
use posecast_core::xr::select_immersive_mode;
use tracing::warn;

use crate::simulate::{SimDevice, SimulationPlan};

#[derive(Parser)]
#[command(name = "posecast")]
#[command(author, version, about = "Immersive session pose telemetry", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Copy, Default, clap::ValueEnum)]
enum ModeArg {
    /// Best immersive mode the simulated device offers
    #[default]
    Auto,
    Ar,
    Vr,
    Inline,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulated immersive session against the configured collector
    Simulate {
        /// Session mode
        #[arg(short, long, value_enum, default_value = "auto")]
        mode: ModeArg,
        /// Pretend the device has no AR support
        #[arg(long)]
        no_ar: bool,
        /// Number of frames to run
        #[arg(long, default_value_t = 600)]
        frames: u64,
        /// Frames per second
        #[arg(long, default_value_t = 60)]
        fps: u32,
        /// Override the configured collector endpoint
        #[arg(long)]
        endpoint: Option<String>,
        /// Page URL; its `secret` query parameter signs reports
        #[arg(long)]
        page_url: Option<String>,
        /// Place an anchor every N frames (0 disables)
        #[arg(long, default_value_t = 90)]
        place_every: u64,
        /// Start a drag every N frames (0 disables)
        #[arg(long, default_value_t = 120)]
        drag_every: u64,
        /// Drag length in frames
        #[arg(long, default_value_t = 45)]
        drag_frames: u64,
        /// Lose tracking every N frames (0 disables)
        #[arg(long, default_value_t = 300)]
        loss_every: u64,
        /// Tracking loss length in frames
        #[arg(long, default_value_t = 30)]
        loss_frames: u64,
        /// Fraction of anchor creations that fail
        #[arg(long, default_value_t = 0.1, value_parser = parse_fraction)]
        failure_rate: f64,
        /// Random seed
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Print the Authorization header for a report body
    Sign {
        /// Report body; read from stdin when omitted
        body: Option<String>,
        /// Shared secret (defaults to the environment)
        #[arg(long)]
        secret: Option<String>,
        /// Print only the hex signature
        #[arg(long)]
        raw: bool,
    },

    /// Run the reference collector
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "0.0.0.0:8000")]
        addr: SocketAddr,
        /// Accept unauthenticated reports on a non-loopback address
        #[arg(long)]
        insecure: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("posecast_cli=info".parse()?)
                .add_directive("posecast_core=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            mode,
            no_ar,
            frames,
            fps,
            endpoint,
            page_url,
            place_every,
            drag_every,
            drag_frames,
            loss_every,
            loss_frames,
            failure_rate,
            seed,
        } => {
            let plan = SimulationPlan {
                frames,
                fps,
                place_every,
                drag_every,
                drag_frames,
                loss_every,
                loss_frames,
                anchor_failure_rate: failure_rate,
                seed,
            };
            cmd_simulate(mode, no_ar, endpoint, page_url.as_deref(), plan, cli.format, cli.quiet).await
        }

        Commands::Sign { body, secret, raw } => cmd_sign(body, secret, raw),

        Commands::Serve { addr, insecure } => cmd_serve(addr, insecure, cli.quiet).await,

        Commands::Config { action } => cmd_config(action, cli.quiet),
    }
}

/// A probability in `[0, 1]`
fn parse_fraction(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("{}", e))?;
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{} is not between 0 and 1", s))
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_simulate(
    mode: ModeArg,
    no_ar: bool,
    endpoint: Option<String>,
    page_url: Option<&str>,
    plan: SimulationPlan,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(endpoint) = endpoint {
        config.set("telemetry.endpoint", &endpoint)?;
    }

    let mode = match mode {
        ModeArg::Ar => SessionMode::ImmersiveAr,
        ModeArg::Vr => SessionMode::ImmersiveVr,
        ModeArg::Inline => SessionMode::Inline,
        ModeArg::Auto => {
            let device = SimDevice { ar: !no_ar, vr: true };
            select_immersive_mode(&device, config.session.prefer_ar)
                .await
                .unwrap_or(SessionMode::Inline)
        }
    };

    let secret = config.telemetry.resolved_secret(page_url)?;
    if secret.is_none() && mode.is_immersive() {
        warn!("No shared secret configured, reports will be sent unauthenticated");
    }
    let reporter = PoseReporter::from_config(&config.telemetry, secret.as_deref())?;

    if !quiet {
        println!(
            "Simulating {} session: {} frames at {} fps -> {}",
            mode, plan.frames, plan.fps, config.telemetry.endpoint
        );
    }

    let summary = simulate::run(mode, plan, reporter, DriverSettings::from(&config)).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => {
            if !quiet {
                println!();
                println!("Session Summary");
                println!("===============");
            }
            println!("Mode:             {}", summary.mode);
            println!("Ticks:            {}", summary.ticks);
            println!("Frames drawn:     {}", summary.frames_drawn);
            println!("Anchors created:  {}", summary.anchors_created);
            println!("Anchors released: {}", summary.anchors_released);
            println!("Reports sent:     {}", summary.reports_sent);
            println!("Reports skipped:  {}", summary.reports_skipped);
            println!("Reports failed:   {}", summary.reports_failed);
        }
    }
    Ok(())
}

fn cmd_sign(body: Option<String>, secret: Option<String>, raw: bool) -> anyhow::Result<()> {
    let secret = match secret {
        Some(secret) => secret,
        None => Config::load()?
            .telemetry
            .resolved_secret(None)?
            .ok_or_else(|| anyhow::anyhow!("No shared secret. Pass --secret or set {}.", SECRET_ENV_VAR))?,
    };

    let body = match body {
        Some(body) => body,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let signer = RequestSigner::new(&secret)?;
    if raw {
        println!("{}", signer.sign(body.as_bytes())?);
    } else {
        println!("{}", signer.authorization(body.as_bytes())?);
    }
    Ok(())
}

async fn cmd_serve(addr: SocketAddr, insecure: bool, quiet: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    let signer = config
        .telemetry
        .resolved_secret(None)?
        .map(|secret| RequestSigner::new(&secret))
        .transpose()?;

    serve::check_exposure(addr, signer.is_some(), insecure)?;
    if signer.is_none() {
        warn!("{} not set, accepting unauthenticated reports", SECRET_ENV_VAR);
    }
    if !quiet {
        println!("Collector listening on http://{}/api/report", addr);
    }

    let collector = ReportCollector::new(ReportAuthenticator::new(signer));
    serve::serve(addr, collector).await
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let items = config.list()?;
            for (key, value) in items {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
