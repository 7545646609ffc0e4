/// Inkpot rewrite CLI

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;
use inkpot_rewrite::{DEFAULT_PRIMITIVE, Rewriter};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "inkpot-rewrite")]
#[command(about = "Insert suspension points around input calls in an inkpot cell")]
#[command(version)]
struct Args {
    /// Cell source file; reads stdin when omitted
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Function whose calls are wrapped in `await`
    #[arg(long, value_name = "NAME", default_value = DEFAULT_PRIMITIVE)]
    primitive: String,

    /// Exit with status 1 if rewriting would change the source
    #[arg(long)]
    check: bool,

    /// Print the transformed syntax tree instead of source
    #[arg(long)]
    dump_ast: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(2);
        }
    }
}

/// Returns `false` when `--check` found work to do.
fn run(args: &Args) -> anyhow::Result<bool> {
    let source = match &args.input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read '{}'", path.display()))?,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read stdin")?;
            buffer
        }
    };

    let rewriter = Rewriter::new().primitive(&args.primitive);

    if args.dump_ast {
        let module = rewriter.transform(&source)?;
        println!("{:#?}", module);
        return Ok(true);
    }

    if args.check {
        let pending = rewriter.pending(&source)?;
        if pending > 0 {
            eprintln!("{} call(s) to '{}' need a suspension point", pending, args.primitive);
            return Ok(false);
        }
        return Ok(true);
    }

    println!("{}", rewriter.try_rewrite(&source)?);
    Ok(true)
}
