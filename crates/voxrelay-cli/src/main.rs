use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use voxrelay_core::config::{Config, LoggingConfig};
use voxrelay_gateway::{GatewayState, ServeOptions};

mod client;
mod player;

use client::PipelineClient;
use player::Player;

#[derive(Parser)]
#[command(
    name = "voxrelay",
    about = "Voice assistant gateway: speech-to-text, chat completion, and speech synthesis behind one endpoint",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Serve {
        /// Port to listen on (default: 3000)
        #[arg(long)]
        port: Option<u16>,

        /// Address to bind (default: 0.0.0.0)
        #[arg(long)]
        bind: Option<String>,

        /// Serve the browser UI
        #[arg(long)]
        ui: bool,
    },

    /// Talk to a running gateway from the terminal
    Chat {
        /// Gateway URL
        #[arg(long, default_value = "http://127.0.0.1:3000")]
        url: String,

        /// Send one message and exit
        #[arg(short, long)]
        message: Option<String>,

        /// Send a recorded audio file and exit
        #[arg(long, conflicts_with = "message")]
        audio: Option<PathBuf>,

        /// Print replies without playing audio
        #[arg(long)]
        mute: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show gateway status
    Status {
        /// Gateway URL (default: derived from config)
        #[arg(long)]
        url: Option<String>,
    },

    /// Diagnose common issues
    Doctor,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the configuration, or one value by dotted path (e.g. "tts.voice")
    Show { path: Option<String> },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config
    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(Config::config_dir);

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    init_logging(config.logging.as_ref(), cli.verbose);

    match cli.command {
        Commands::Serve { port, bind, ui } => serve(&config, port, bind, ui).await?,
        Commands::Chat {
            url,
            message,
            audio,
            mute,
        } => chat(&config, &url, message, audio, mute).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show { path: None } => {
                let json = serde_json::to_string_pretty(&config)?;
                println!("{json}");
            }
            ConfigAction::Show { path: Some(path) } => match config.get_path(&path) {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => anyhow::bail!("no config value at '{path}'"),
            },
        },
        Commands::Status { url } => status(&config, &config_path, url).await,
        Commands::Doctor => doctor(&config, &config_path),
    }

    Ok(())
}

/// RUST_LOG wins; otherwise the configured level plus per-crate filters.
fn init_logging(logging: Option<&LoggingConfig>, verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let level = logging
        .and_then(|l| l.level.as_deref())
        .filter(|_| !verbose)
        .unwrap_or(default_level);

    let mut directives = vec![level.to_string()];
    if let Some(logging) = logging {
        directives.extend(logging.filters.iter().cloned());
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directives.join(",")));

    let json = logging.is_some_and(|l| l.format == "json");
    let stdout = logging.is_some_and(|l| l.output == "stdout");

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match (json, stdout) {
        (true, true) => builder.json().with_writer(std::io::stdout).init(),
        (true, false) => builder.json().with_writer(std::io::stderr).init(),
        (false, true) => builder.with_writer(std::io::stdout).init(),
        (false, false) => builder.with_writer(std::io::stderr).init(),
    }
}

async fn serve(
    config: &Config,
    port: Option<u16>,
    bind: Option<String>,
    ui: bool,
) -> anyhow::Result<()> {
    let (warnings, errors) = config.validate();
    for warning in &warnings {
        tracing::warn!("{warning}");
    }
    if !errors.is_empty() {
        for error in &errors {
            tracing::error!("{error}");
        }
        anyhow::bail!("invalid configuration ({} errors)", errors.len());
    }

    let state = GatewayState::from_settings(&config.resolve());

    #[cfg(feature = "metrics")]
    let state = {
        let handle = voxrelay_gateway::metrics::install_prometheus_recorder()?;
        tracing::info!("Prometheus metrics available at /metrics");
        state.with_metrics(handle)
    };

    let options = ServeOptions {
        bind: bind.unwrap_or_else(|| config.gateway_bind()),
        port: port.unwrap_or_else(|| config.gateway_port()),
        ui_enabled: ui || config.ui_enabled(),
        max_upload_bytes: config.max_upload_bytes(),
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        port = options.port,
        "Starting voxrelay gateway"
    );
    voxrelay_gateway::start_gateway(Arc::new(state), options).await
}

async fn chat(
    config: &Config,
    url: &str,
    message: Option<String>,
    audio: Option<PathBuf>,
    mute: bool,
) -> anyhow::Result<()> {
    let mut client = PipelineClient::new(url);
    let mut player = Player::from_config(config);

    // One-shot: send, play to the end, exit.
    let one_shot = match (message, audio) {
        (Some(text), _) => Some(client.send_text(&text).await?),
        (None, Some(path)) => Some(client.send_audio(&path).await?),
        (None, None) => None,
    };
    if let Some(turn) = one_shot {
        println!("you: {}", turn.transcript);
        println!("assistant: {}", turn.reply);
        if !mute {
            player.play(&turn.audio).await?;
            player.wait().await?;
        }
        return Ok(());
    }

    println!("Connected to {url}. Type a message, /audio <file> to send a recording, /reset, or /quit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let result = match line {
            "/quit" | "/exit" => break,
            "/reset" => {
                let cleared = client.history().len();
                client.reset();
                player.stop().await;
                println!("Cleared {cleared} messages.");
                continue;
            }
            "/stop" => {
                if !player.is_active() {
                    println!("Nothing is playing.");
                }
                player.stop().await;
                continue;
            }
            _ => match line.strip_prefix("/audio ") {
                Some(path) => client.send_audio(Path::new(path.trim())).await,
                None => client.send_text(line).await,
            },
        };

        match result {
            Ok(turn) => {
                println!("assistant: {}", turn.reply);
                if !mute {
                    match player.play(&turn.audio).await {
                        Ok(()) => tracing::debug!(file = ?player.current_file(), "Playing reply"),
                        Err(e) => eprintln!("playback failed: {e:#}"),
                    }
                }
            }
            Err(e) => eprintln!("error: {e:#}"),
        }
    }

    player.stop().await;
    Ok(())
}

async fn status(config: &Config, config_path: &Path, url: Option<String>) {
    let url = url.unwrap_or_else(|| format!("http://127.0.0.1:{}", config.gateway_port()));

    println!("voxrelay v{}", env!("CARGO_PKG_VERSION"));
    println!("Config: {}", config_path.display());
    println!("Gateway: {url}");

    let health = async {
        let resp = reqwest::get(format!("{url}/health")).await?;
        resp.error_for_status()?.json::<serde_json::Value>().await
    };

    match health.await {
        Ok(body) => {
            println!("Status: running (v{})", body["version"].as_str().unwrap_or("?"));
            println!("Pipeline: {}", enabled(body["pipeline"].as_bool()));
            println!("Retell: {}", enabled(body["retell"].as_bool()));
        }
        Err(e) => {
            tracing::debug!(error = %e, "Health check failed");
            println!("Status: not running");
        }
    }
}

fn enabled(flag: Option<bool>) -> &'static str {
    match flag {
        Some(true) => "enabled",
        Some(false) => "disabled",
        None => "unknown",
    }
}

fn doctor(config: &Config, config_path: &Path) {
    println!("voxrelay doctor\n");

    if config_path.exists() {
        println!("  [ok]   config file: {}", config_path.display());
    } else {
        println!(
            "  [info] no config file at {} (using defaults and environment)",
            config_path.display()
        );
    }

    let (warnings, errors) = config.validate();
    for error in &errors {
        println!("  [err]  {error}");
    }
    for warning in &warnings {
        println!("  [warn] {warning}");
    }

    let settings = config.resolve();
    println!(
        "  [{}] pipeline (/api)",
        if settings.pipeline.is_some() { "ok" } else { "warn" }
    );
    println!(
        "  [{}] retell (/api/retell/*)",
        if settings.retell.is_some() { "ok" } else { "warn" }
    );

    let player = Player::from_config(config);
    if on_path(player.program()) {
        println!("  [ok]   audio player: {}", player.program());
    } else {
        println!(
            "  [warn] audio player '{}' not found on PATH; run `voxrelay chat --mute` or set player.command",
            player.program()
        );
    }

    if errors.is_empty() {
        println!("\nNo blocking issues found.");
    } else {
        println!("\n{} error(s) must be fixed before `voxrelay serve`.", errors.len());
    }
}

fn on_path(program: &str) -> bool {
    if program.is_empty() {
        return false;
    }
    if Path::new(program).is_absolute() {
        return Path::new(program).exists();
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}
