//! Funnel Sim: generate a synthetic marketing-funnel dataset and the
//! channel, cohort, attribution and budget reports built from it.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use funnel_core::SimulationConfig;
use funnel_journey::{write_dataset, Journey, JourneyGenerator};
use funnel_reporting::ReportBuilder;

const DEFAULT_DATASET: &str = "marketing_funnel_data.csv";

#[derive(Parser)]
#[command(name = "funnel-sim")]
#[command(about = "Synthetic marketing funnel journey generator")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// TOML configuration file
    #[arg(short, long, global = true, env = "FUNNEL_SIM_CONFIG")]
    config: Option<PathBuf>,

    /// Number of simulated users (overrides config)
    #[arg(long, global = true)]
    users: Option<u64>,

    /// Random seed (overrides config)
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Emit logs as JSON
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the journey dataset as CSV
    Generate {
        /// Output file path
        #[arg(short, long, default_value = DEFAULT_DATASET)]
        output: PathBuf,
    },

    /// Generate the dataset and write every analysis report
    Analyze {
        /// Directory for the dataset and report files
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Validate the configuration and print it as JSON
    Validate,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.log_json);

    let config = load_config(&cli.global)?;

    match cli.command {
        Commands::Generate { output } => {
            let journeys = generate(&config)?;
            write_csv(&journeys, &output)?;
        }
        Commands::Analyze { out_dir } => {
            let journeys = generate(&config)?;
            std::fs::create_dir_all(&out_dir)
                .with_context(|| format!("creating {}", out_dir.display()))?;
            write_csv(&journeys, &out_dir.join(DEFAULT_DATASET))?;

            let report = ReportBuilder::new(&config).build(&journeys);
            report
                .write_to(&out_dir)
                .with_context(|| format!("writing reports to {}", out_dir.display()))?;
        }
        Commands::Validate => {
            check_config(&config)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "funnel_sim=info,funnel_journey=info,funnel_reporting=info".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(args: &GlobalArgs) -> anyhow::Result<SimulationConfig> {
    let mut config =
        SimulationConfig::load(args.config.as_deref()).with_context(|| match &args.config {
            Some(path) => format!("loading config from {}", path.display()),
            None => "loading config from environment".to_string(),
        })?;

    // Apply CLI overrides
    if let Some(users) = args.users {
        config.user_count = users;
    }
    if let Some(seed) = args.seed {
        config.random_seed = seed;
    }

    info!(
        users = config.user_count,
        seed = config.random_seed,
        channels = config.channels.len(),
        devices = config.devices.len(),
        "Configuration loaded"
    );
    Ok(config)
}

fn check_config(config: &SimulationConfig) -> anyhow::Result<()> {
    config
        .validate()
        .map_err(|e| {
            warn!(error = %e, "Configuration rejected");
            e
        })
        .context("configuration is invalid")
}

fn generate(config: &SimulationConfig) -> anyhow::Result<Vec<Journey>> {
    check_config(config)?;
    let generator = JourneyGenerator::new(config)?;
    Ok(generator.generate()?)
}

fn write_csv(journeys: &[Journey], path: &Path) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    write_dataset(journeys, BufWriter::new(file))
        .with_context(|| format!("writing {}", path.display()))?;
    info!(rows = journeys.len(), path = %path.display(), "Dataset written");
    Ok(())
}
