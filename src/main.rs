mod cli;
mod config;
mod dispatch;
mod engine;
mod gesture;
mod relay;

use std::path::PathBuf;

use clap::Parser;
use cli::{Cli, Command};
use tracing_subscriber::EnvFilter;

use config::{ConfigError, FileStore, Settings};
use dispatch::host::{HostPrimitives, LogHost, LogNotifier, SystemHost};
use engine::replay::{self, ReplayOptions, SceneDocument};
use engine::{Endpoint, GestureEngine};
use gesture::sampler::Screen;
use relay::RelayHub;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Replay {
            trace,
            config,
            frame,
            offset,
            live,
        } => {
            let records = match replay::load_trace(&trace) {
                Ok(records) => records,
                Err(e) => fail("replay", &e),
            };
            let settings = load_settings(config);
            let options = ReplayOptions {
                role: frame.into(),
                offset,
            };
            let make_host = || host(live);
            for line in replay::replay(&records, &settings, &options, &make_host) {
                if line.executed.result.is_ok() {
                    println!("{line}");
                } else {
                    eprintln!("{line}");
                }
            }
        }
        Command::Listen {
            config,
            width,
            height,
            live,
        } => {
            let settings = load_settings(config);
            let mut engine = GestureEngine::from_settings(
                SceneDocument::default(),
                Screen { width, height },
                &settings,
                Endpoint::Top(RelayHub::new()),
                host(live),
                LogNotifier,
            );
            if let Err(e) = engine::listen(&mut engine).await {
                fail("listen", &e);
            }
        }
        Command::Defaults { write, config } => {
            let settings = Settings::default();
            if write {
                let result = config_path(config)
                    .and_then(FileStore::open)
                    .and_then(|mut store| {
                        settings.save(&mut store)?;
                        Ok(store)
                    });
                match result {
                    Ok(store) => tracing::info!(path = %store.path().display(), "defaults written"),
                    Err(e) => fail("defaults", &e),
                }
            } else {
                let mut entries = serde_json::Map::new();
                let rendered = settings
                    .save(&mut entries)
                    .and_then(|()| Ok(serde_json::to_string_pretty(&entries)?));
                match rendered {
                    Ok(text) => println!("{text}"),
                    Err(e) => fail("defaults", &e),
                }
            }
        }
        Command::Validate { config } => {
            let store = match config_path(config).and_then(FileStore::open) {
                Ok(store) => store,
                Err(e) => fail("validate", &e),
            };
            let (settings, issues) = Settings::load_checked(&store);
            for issue in &issues {
                eprintln!("{issue}");
            }
            if !issues.is_empty() {
                std::process::exit(1);
            }
            println!(
                "{}: {} actions, ok",
                store.path().display(),
                settings.actions.len()
            );
        }
    }
}

fn host(live: bool) -> Box<dyn HostPrimitives> {
    if live {
        Box::new(SystemHost)
    } else {
        Box::new(LogHost)
    }
}

fn config_path(explicit: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    match explicit {
        Some(path) => Ok(path),
        None => config::resolve_config_path(),
    }
}

/// Settings for a running engine. An unreadable file falls back to the
/// built-in defaults with a warning.
fn load_settings(explicit: Option<PathBuf>) -> Settings {
    match config_path(explicit).and_then(FileStore::open) {
        Ok(store) => Settings::load(&store),
        Err(e) => {
            tracing::warn!(error = %e, "settings unavailable, using defaults");
            Settings::default()
        }
    }
}

fn fail(command: &str, error: &dyn std::fmt::Display) -> ! {
    tracing::error!(error = %error, "{command} failed");
    eprintln!("touchpathd {command}: {error}");
    std::process::exit(1);
}
