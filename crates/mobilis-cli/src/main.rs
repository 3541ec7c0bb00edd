//! Command-line helper for mobilis capability files and sessions.
//!
//! # Usage
//!
//! ```bash
//! # Print the new-session request body for Android
//! mobilis caps android
//!
//! # Use a specific capability file and override keys
//! mobilis caps ios -c ci/capabilities.toml --set deviceName="iPhone 15" --set noReset=true
//!
//! # Start a session, print its id and viewport, then quit
//! mobilis smoke android
//!
//! # Same, against another server, saving a screenshot
//! mobilis smoke android --server http://10.0.0.5:4723 --screenshot screen.png
//!
//! # Log to a file instead of stderr
//! RUST_LOG=mobilis_core=debug mobilis --log-file logs/mobilis.log smoke android
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mobilis_core::capabilities::{CapabilitySet, Platform};
use mobilis_core::fixture::{run_scoped, DEFAULT_ARTIFACTS_DIR};
use mobilis_core::page::BasePage;
use mobilis_core::session::SessionFactory;
use mobilis_core::Error;

/// Inspect capabilities and smoke-test Appium sessions.
#[derive(Parser)]
#[command(name = "mobilis")]
#[command(about = "Inspect mobile capabilities and smoke-test Appium sessions")]
#[command(version)]
struct Cli {
    /// Capability file (TOML or JSON)
    #[arg(short, long, global = true, env = "MOBILIS_CONFIG")]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the resolved W3C capabilities for a platform
    Caps {
        /// Target platform: android or ios
        platform: String,
        /// Override a capability (repeatable)
        #[arg(short, long = "set", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        set: Vec<(String, String)>,
    },

    /// Create a session, print its id and viewport, then quit
    Smoke {
        /// Target platform: android or ios
        platform: String,
        /// Override a capability (repeatable)
        #[arg(short, long = "set", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        set: Vec<(String, String)>,
        /// Automation server URL for this run
        #[arg(long)]
        server: Option<String>,
        /// Save a screenshot of the launched app
        #[arg(long)]
        screenshot: Option<PathBuf>,
        /// Directory for failure artifacts
        #[arg(long, default_value = DEFAULT_ARTIFACTS_DIR)]
        artifacts: PathBuf,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.log_file.as_deref()) {
        eprintln!("Error: cannot open log file: {e}");
        return ExitCode::from(1);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            exit_code(&e)
        }
    }
}

fn init_logging(log_file: Option<&Path>) -> io::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let Some(path) = log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
        return Ok(());
    };

    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "log file path has no file name"))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(appender)
        .with_ansi(false)
        .init();
    Ok(())
}

fn exit_code(err: &Error) -> ExitCode {
    match err {
        Error::Configuration(_) => ExitCode::from(2),
        Error::SessionCreation(_) => ExitCode::from(3),
        _ => ExitCode::from(1),
    }
}

fn load_factory(config: Option<&Path>) -> Result<SessionFactory, Error> {
    match config {
        Some(path) => SessionFactory::from_file(path),
        None => SessionFactory::discover(),
    }
}

async fn run(cli: Cli) -> Result<(), Error> {
    let factory = load_factory(cli.config.as_deref())?;

    match cli.command {
        Command::Caps { platform, set } => {
            let platform: Platform = platform.parse()?;
            let overrides = CapabilitySet::from_pairs(set)?;
            let caps = factory.resolve(platform, &overrides)?;
            let always_match = caps.to_w3c()?;

            let body = json!({
                "capabilities": {
                    "alwaysMatch": always_match,
                    "firstMatch": [{}],
                }
            });
            println!("{body:#}");
            eprintln!("server: {}", factory.server_url(&caps));
            Ok(())
        }

        Command::Smoke {
            platform,
            set,
            server,
            screenshot,
            artifacts,
        } => {
            let mut overrides = CapabilitySet::from_pairs(set)?;
            if server.is_some() {
                overrides.appium_url = server;
            }

            let session = Arc::new(factory.create_session(&platform, &overrides).await?);
            println!("session: {}", session.id());

            let page = BasePage::with_defaults(session.clone(), factory.config().defaults);
            run_scoped(&*session, &artifacts, "smoke", async {
                let viewport = page.driver().window_rect().await?;
                println!("viewport: {}x{}", viewport.width, viewport.height);

                if let Some(path) = &screenshot {
                    page.take_screenshot(path).await?;
                    println!("screenshot: {}", path.display());
                }
                Ok::<_, Error>(())
            })
            .await?;

            info!(session_id = %session.id(), "smoke run complete");
            Ok(())
        }
    }
}
