//! inkpot worker - runs notebook cells for a host over stdin/stdout.

use anyhow::{anyhow, Context};
use clap::Parser;
use inkpot_rewrite::DEFAULT_PRIMITIVE;
use inkpot_worker::{serve, Options};
use tokio::io::BufReader;
use tokio::task::LocalSet;
use tracing_subscriber::EnvFilter;

/// Deeply recursive cells nest many futures; give the evaluator room.
const WORKER_STACK_SIZE: usize = 64 * 1024 * 1024;

#[derive(Parser, Debug)]
#[command(name = "inkpot-worker")]
#[command(about = "Run inkpot notebook cells over a JSON-lines stdio protocol")]
#[command(version)]
struct Args {
    /// Log filter directives, e.g. `inkpot_eval=debug`; overrides RUST_LOG
    #[arg(long, value_name = "FILTER")]
    log_filter: Option<String>,

    /// Run cells exactly as submitted, without inserting suspension points
    #[arg(long)]
    no_rewrite: bool,

    /// Function whose calls are wrapped in `await`
    #[arg(long, value_name = "NAME", default_value = DEFAULT_PRIMITIVE)]
    primitive: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // stdout carries the protocol, so logs go to stderr
    let filter = match &args.log_filter {
        Some(directives) => EnvFilter::try_new(directives).context("invalid --log-filter")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting inkpot worker");

    let options = Options {
        rewrite: !args.no_rewrite,
        primitive: args.primitive,
    };
    let worker = std::thread::Builder::new()
        .name("inkpot-worker".to_string())
        .stack_size(WORKER_STACK_SIZE)
        .spawn(move || -> anyhow::Result<()> {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("failed to start runtime")?;
            let local = LocalSet::new();
            local.block_on(
                &runtime,
                serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout(), options),
            )
        })
        .context("failed to spawn worker thread")?;

    worker
        .join()
        .map_err(|_| anyhow!("worker thread panicked"))?
}
