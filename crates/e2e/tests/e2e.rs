//! Screenshot run entry point
//!
//! This file is the test binary that renders every YAML case on the emulators.
//! Run with: MOCK_SERVER_PORT=5555 cargo test --package watchshot-e2e --test e2e
//!
//! Without `MOCK_SERVER_PORT` there is no mock backend to seed, so the run is skipped.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use watchshot_common::config::MOCK_SERVER_PORT_VAR;
use watchshot_common::HarnessConfig;
use watchshot_e2e::{spec, RunContext};

#[derive(Parser, Debug)]
#[command(name = "watchshot")]
#[command(about = "Screenshot regression run for the watchface")]
struct Args {
    /// Directory of YAML test cases
    #[arg(short, long, default_value = "test/cases")]
    cases: PathBuf,

    /// Run only cases whose name contains this
    #[arg(short, long)]
    name: Option<String>,

    /// Harness configuration file
    #[arg(long, default_value = "watchshot.toml")]
    config: PathBuf,

    /// Directory holding gold/ and receiving output/
    #[arg(long)]
    test_root: Option<PathBuf>,

    /// Constants file with DEFAULT_CONFIG
    #[arg(long)]
    constants: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() {
    if std::env::var_os(MOCK_SERVER_PORT_VAR).is_none() {
        eprintln!("Skipping: {} is not set", MOCK_SERVER_PORT_VAR);
        return;
    }

    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
    match rt.block_on(async_main(args)) {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

async fn async_main(args: Args) -> anyhow::Result<bool> {
    let mut config = HarnessConfig::load(&args.config)?.with_env()?;
    if let Some(root) = args.test_root {
        config.test_root = root;
    }
    if let Some(constants) = args.constants {
        config.constants_path = constants;
    }

    let mut cases = spec::load_all(&args.cases)?;
    if let Some(pattern) = &args.name {
        cases = spec::filter_by_name(&cases, pattern).into_iter().cloned().collect();
    }

    let mut ctx = RunContext::from_config(config)?;
    let summary = ctx.run_cases(&cases).await?;

    for (name, message) in &summary.failures {
        println!("FAILED {}\n{}\n", name, message);
    }
    println!("Report: {}", ctx.report().html_path().display());

    Ok(summary.failed == 0)
}
