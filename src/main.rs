//! synthtrace: generate synthetic CTF traces.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use synthtrace::debuginfo::fixtures::Scenario;
use synthtrace::TraceConfig;

#[derive(Parser)]
#[command(name = "synthtrace")]
#[command(about = "Generate synthetic LTTng-UST debug-info traces in CTF format")]
#[command(version)]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON file overriding the trace configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write one of the reference traces
    Generate {
        /// Scenario to generate (see `synthtrace list`)
        scenario: Scenario,

        /// Trace directory to write
        #[arg(short, long)]
        output: PathBuf,

        /// Number of CPUs; never fewer than the scenario needs
        #[arg(long, default_value_t = 1)]
        cpus: u32,

        /// Print the TSDL metadata after writing the trace
        #[arg(long)]
        print_metadata: bool,
    },
    /// List the available scenarios
    List,
}

/// Install the fmt subscriber. `RUST_LOG` takes precedence over `-v`.
fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

fn load_config(path: Option<&PathBuf>) -> Result<TraceConfig> {
    match path {
        Some(path) => TraceConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(TraceConfig::default()),
    }
}

fn run_generate(
    scenario: Scenario,
    output: PathBuf,
    cpus: u32,
    print_metadata: bool,
    config: TraceConfig,
) -> Result<()> {
    let tw = scenario
        .generate(&output, cpus, config)
        .with_context(|| format!("Failed to generate {scenario} trace in {}", output.display()))?;

    if print_metadata {
        print!("{}", tw.metadata());
    }

    let events: usize = tw.writer().streams().map(|s| s.events().len()).sum();
    eprintln!(
        "Wrote {} trace to {} ({} streams, {} events)",
        scenario,
        output.display(),
        tw.writer().streams().count(),
        events
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Generate {
            scenario,
            output,
            cpus,
            print_metadata,
        } => {
            let config = load_config(cli.config.as_ref())?;
            run_generate(scenario, output, cpus, print_metadata, config)
        }
        Commands::List => {
            for scenario in Scenario::ALL {
                println!(
                    "{:<22} {} (cpus: {})",
                    scenario.name(),
                    scenario.description(),
                    scenario.min_cpus()
                );
            }
            Ok(())
        }
    }
}
