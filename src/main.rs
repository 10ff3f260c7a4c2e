//! ferrite-sweep: trains a regularization sweep of MNIST classifiers.
//!
//! `run` trains every planned entry and prints the run summaries as JSON;
//! `plan` prints the expanded sweep without training.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use ferrite_sweep::data::DataSource;
use ferrite_sweep::writer::{ConsoleWriter, DashboardWriter, Fanout, JsonlWriter};
use ferrite_sweep::{plan, run_sweep, Error, ExperimentContext, ModelKind, Result, Settings};

/// Regularization sweeps over MNIST classifiers
#[derive(Parser, Debug)]
#[command(name = "ferrite-sweep", version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Train the sweep
    Run(RunArgs),
    /// Print the planned sweep entries as JSON
    Plan {
        /// Settings file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Plan the single smoke-test entry
        #[arg(long)]
        trial: bool,

        /// Keep only entries of this model kind
        #[arg(long)]
        only: Option<ModelKind>,
    },
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Settings file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory with the MNIST IDX files; synthetic data if omitted
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Directory for JSONL run logs
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Directory for best-epoch network snapshots
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,

    /// One epoch, one step per phase, convolutional baseline only
    #[arg(long)]
    trial: bool,

    /// Gradient towers per step
    #[arg(long)]
    towers: Option<usize>,

    /// Override EPOCHS
    #[arg(long)]
    epochs: Option<usize>,

    /// Override SEED
    #[arg(long)]
    seed: Option<u64>,

    /// Keep only entries of this model kind
    #[arg(long)]
    only: Option<ModelKind>,

    /// Serve live metrics on this address, e.g. 127.0.0.1:7878
    #[arg(long)]
    dashboard: Option<String>,
}

fn load_settings(path: Option<&PathBuf>) -> Result<Settings> {
    match path {
        Some(p) => Settings::load_json(p),
        None => Ok(Settings::default()),
    }
}

fn run(args: RunArgs) -> Result<()> {
    let mut settings = load_settings(args.config.as_ref())?;
    settings.data_dir = args.data_dir.or(settings.data_dir);
    settings.log_dir = args.log_dir.or(settings.log_dir);
    settings.checkpoint_dir = args.checkpoint_dir.or(settings.checkpoint_dir);
    settings.dashboard = args.dashboard.or(settings.dashboard);
    settings.trial_run |= args.trial;
    if let Some(towers) = args.towers {
        settings.run.towers = towers;
    }
    if let Some(epochs) = args.epochs {
        settings.run.epochs = epochs;
    }
    if let Some(seed) = args.seed {
        settings.run.seed = seed;
    }
    settings.run.validate()?;

    let entries = plan(&settings.run, settings.trial_run, args.only);
    if entries.is_empty() {
        return Err(Error::config("no sweep entries match the selection"));
    }
    for entry in &entries {
        entry.kind.check(&entry.config)?;
    }

    let source = match &settings.data_dir {
        Some(dir) => DataSource::Mnist(dir.clone()),
        None => DataSource::synthetic_default(settings.run.seed),
    };
    let splits = source.load(&settings.run)?;

    let mut writer = Fanout::new().with(ConsoleWriter::new());
    if let Some(dir) = &settings.log_dir {
        writer.push(Box::new(JsonlWriter::new(dir)?));
    }
    if let Some(addr) = &settings.dashboard {
        writer.push(Box::new(DashboardWriter::bind(addr)?));
    }

    let mut ctx = ExperimentContext::new(Box::new(writer), splits)
        .trial_run(settings.trial_run)
        .checkpoint_dir(settings.checkpoint_dir.clone());
    let summaries = run_sweep(entries, &mut ctx)?;
    println!("{}", serde_json::to_string_pretty(&summaries)?);
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let result = match cli.command {
        Command::Run(args) => run(args),
        Command::Plan { config, trial, only } => load_settings(config.as_ref()).and_then(|settings| {
            let entries = plan(&settings.run, trial || settings.trial_run, only);
            println!("{}", serde_json::to_string_pretty(&entries)?);
            Ok(())
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "sweep failed");
            ExitCode::FAILURE
        }
    }
}
