use anyhow::{anyhow, Context, Result};
use beatsaver_playlist_batch as lib;
use clap::{Parser, Subcommand};
use lib::api::beatsaver::BeatSaverClient;
use lib::config::Config;
use lib::panel::PanelHost;
use lib::session::{self, CopyOutcome};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::subscriber as tracing_subscriber_global;
use tracing_appender::rolling::RollingFileAppender;
use tracing_log::LogTracer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "beatsaver-playlist-batch", version)]
struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a playlist and show its batches
    Load {
        playlist_id: String,
        /// Show the JSON payload of every batch
        #[arg(long)]
        preview: bool,
    },
    /// Load a playlist and submit batches to the playlist API
    Submit {
        playlist_id: String,
        /// Batch number to submit (1-based, repeatable)
        #[arg(long = "batch", value_name = "N")]
        batches: Vec<usize>,
        /// Submit every batch
        #[arg(long, conflicts_with = "batches")]
        all: bool,
        /// Bearer token sent as the authorization header
        #[arg(long, env = "BEATSAVER_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },
    /// Copy the BeatSaver session cookie to the clipboard
    SessionCookie {
        /// Raw Cookie header, e.g. copied from browser devtools
        #[arg(long, env = "BEATSAVER_COOKIE", hide_env_values = true)]
        cookie: Option<String>,
        /// Netscape cookies.txt export
        #[arg(long, value_name = "FILE", conflicts_with = "cookie")]
        cookie_file: Option<PathBuf>,
        /// Print instead of copying
        #[arg(long)]
        print: bool,
    },
    /// Validate config file and exit
    ConfigValidate,
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("beatsaver-playlist-batch")
        .join("config.toml")
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    if let Commands::ConfigValidate = cli.command {
        return match Config::from_path(&config_path) {
            Ok(_) => {
                println!("OK");
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                eprintln!("Config validation failed: {}", e);
                Ok(ExitCode::from(2))
            }
        };
    }

    // An explicit --config must exist; the default location is optional.
    let cfg = if cli.config.is_some() {
        Config::from_path(&config_path)
    } else {
        Config::load_or_default(&config_path)
    }
    .with_context(|| format!("loading config from {}", config_path.display()))?;

    // Logs go to stderr and a daily-rotated file in cfg.log_dir; stdout is
    // reserved for command output.
    let _ = LogTracer::init();
    let _ = std::fs::create_dir_all(&cfg.log_dir);
    let file_appender: RollingFileAppender =
        tracing_appender::rolling::daily(&cfg.log_dir, "beatsaver-playlist-batch.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Honor RUST_LOG if set, otherwise default to info.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber_global::set_global_default(subscriber)
        .context("failed to set global tracing subscriber")?;

    let code = run(cli.command, &cfg).await;
    // flush buffered file logs before the process exits
    drop(guard);
    code
}

async fn run(command: Commands, cfg: &Config) -> Result<ExitCode> {
    match command {
        Commands::Load { playlist_id, preview } => {
            let host = panel_host(cfg)?;
            let panel = host.mount();
            if let Err(e) = panel.load(&playlist_id).await {
                eprintln!("Load failed: {}", e);
                return Ok(ExitCode::FAILURE);
            }
            println!("{}", panel.render_summary().await);
            print!("{}", panel.render_cards(preview).await);
            host.unmount();
        }
        Commands::Submit { playlist_id, batches, all, token } => {
            if batches.is_empty() && !all {
                return Err(anyhow!("choose batches with --batch N or pass --all"));
            }
            if batches.iter().any(|&n| n == 0) {
                return Err(anyhow!("batch numbers start at 1"));
            }
            let host = panel_host(cfg)?;
            let panel = host.mount();
            if let Err(e) = panel.load(&playlist_id).await {
                eprintln!("Load failed: {}", e);
                return Ok(ExitCode::FAILURE);
            }
            println!("{}", panel.render_summary().await);

            let results = if all {
                panel.submit_all(token).await?
            } else {
                let indices: Vec<usize> = batches.iter().map(|n| n - 1).collect();
                panel.submit_many(&indices, token).await?
            };

            let mut failed = 0usize;
            for (index, res) in &results {
                match res {
                    Ok(r) if r.ok => println!("Batch {}: OK ({})", index + 1, r.status),
                    Ok(r) => {
                        failed += 1;
                        println!("Batch {}: FAILED ({}) {}", index + 1, r.status, r.data);
                    }
                    Err(e) => {
                        failed += 1;
                        println!("Batch {}: ERROR {}", index + 1, e);
                    }
                }
            }
            host.unmount();

            if failed > 0 {
                eprintln!("Completed with {} failed batch(es) of {}.", failed, results.len());
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::SessionCookie { cookie, cookie_file, print } => {
            let name = cfg.session_cookie_name.as_str();
            let value = match (cookie, cookie_file) {
                (Some(header), _) => session::find_cookie(&header, name),
                (None, Some(path)) => {
                    let jar = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading cookie jar {}", path.display()))?;
                    session::find_cookie_in_jar(&jar, name, &cfg.cookie_domain)
                }
                (None, None) => return Err(anyhow!("pass --cookie or --cookie-file")),
            };
            let value = match value {
                Some(v) => v,
                None => {
                    eprintln!("Not logged in: no {} cookie found", name);
                    return Ok(ExitCode::FAILURE);
                }
            };
            if print {
                session::print_value(name, &value);
            } else {
                match session::copy_to_clipboard(name, &value) {
                    CopyOutcome::Copied => println!("Copied!"),
                    CopyOutcome::Printed => {
                        eprintln!("Clipboard unavailable; value printed above.")
                    }
                }
            }
        }
        Commands::ConfigValidate => {}
    }

    Ok(ExitCode::SUCCESS)
}

fn panel_host(cfg: &Config) -> Result<PanelHost> {
    let client = BeatSaverClient::from_config(cfg).context("building BeatSaver client")?;
    Ok(PanelHost::new(Arc::new(client), cfg.batch_size))
}
