use std::process::exit;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use vk2tg::{
    config::{self, Config},
    error::VkError,
    logging,
    relay::Relay,
    retry::RetryPolicy,
    sources::vk::VkClient,
    telegram::{Forwarder, TelegramClient},
};

#[derive(Parser)]
#[clap(version, about)]
struct Args {
    /// Toml configuration. Environment variables override credentials from it.
    #[clap(short, long, value_parser)]
    config: Option<String>,

    /// Dotenv file loaded before reading the environment.
    #[clap(long, value_parser, default_value = ".env")]
    env_file: String,

    /// Run a single poll cycle and exit.
    #[clap(long, value_parser, default_value_t = false)]
    once: bool,
}

fn load_env(path: &str) -> anyhow::Result<()> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to load {}", path)),
    }
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let (path, required) = match &args.config {
        Some(path) => (path.as_str(), true),
        None => (config::DEFAULT_CONFIG_PATH, false),
    };

    info!("Try reading config from {}...", path);

    let mut cfg = Config::from_file(path, required)?;
    cfg.apply_env(|k| std::env::var(k).ok());
    cfg.validate()?;

    Ok(cfg)
}

const EXIT_STARTUP_FAILED: i32 = 1;
const EXIT_POLL_FAILED: i32 = 2;

/// Config for the run, or the exit code to stop with.
fn startup(args: &Args, env_loaded: anyhow::Result<()>) -> Result<Config, i32> {
    env_loaded.and_then(|_| load_config(args)).map_err(|e| {
        error!("Startup failed: {:#}", e);
        EXIT_STARTUP_FAILED
    })
}

/// Exit code for a `--once` run.
fn once_exit_code(result: Result<Option<i64>, VkError>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(e) => {
            error!(error = %e, "poll cycle failed");
            EXIT_POLL_FAILED
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();

    // before logging, so RUST_LOG from the file applies
    let env_loaded = load_env(&args.env_file);

    logging::init();

    let cfg = match startup(&args, env_loaded) {
        Ok(cfg) => cfg,
        Err(code) => exit(code),
    };

    let retry = RetryPolicy::new(cfg.relay.retry_interval(), cfg.relay.max_fetch_attempts);
    let vk = VkClient::new(&cfg.vk, retry);
    let tg = TelegramClient::new(&cfg.telegram);

    let mut relay = Relay::new(vk, Forwarder::new(tg), cfg.relay.check_interval());

    if args.once {
        let code = once_exit_code(relay.poll_once().await);
        if code != 0 {
            exit(code);
        }
        return;
    }

    let token = CancellationToken::new();

    tokio::spawn({
        let token = token.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Ctrl-C received, stopping");
                    token.cancel();
                }
                Err(e) => warn!(error = %e, "failed to listen for Ctrl-C"),
            }
        }
    });

    relay.run(token).await;
}
