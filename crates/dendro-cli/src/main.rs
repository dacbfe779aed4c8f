//! CLI for dendro-core — log dendrometer readings or watch them live.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dendro_core::LogFormat;
use dendro_core::config::MAX_SAMPLES;

#[derive(Parser)]
#[command(name = "dendrologger")]
#[command(about = "dendrologger — sample ADS1115 dendrometer channels and log displacement")]
#[command(version = dendro_core::VERSION)]
struct Cli {
    /// Station config file (KEY=VALUE). Default: ~/dendro-pi-main/dendro-logger/dendro_config.env
    #[arg(long, global = true, env = "DENDRO_CONFIG")]
    config: Option<PathBuf>,

    /// Read a constant voltage on every channel instead of the ADC (bench testing)
    #[arg(long, global = true, value_name = "VOLTS")]
    simulate: Option<f64>,

    /// Log persisted files and configuration details
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take one reading of every channel and append it to the logs
    Log {
        /// Output layout: text (one file per tree) or csv (one row per reading)
        #[arg(long, default_value = "text")]
        format: LogFormat,

        /// Samples averaged per channel (overrides SAMPLES)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=MAX_SAMPLES as i64))]
        samples: Option<u32>,

        /// Seconds between samples (overrides SAMPLE_DELAY)
        #[arg(long)]
        delay: Option<f64>,

        /// Output directory (overrides DATA_DIR)
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Floor negative displacements at zero (overrides CLAMP_NEGATIVE)
        #[arg(long)]
        clamp: bool,

        /// Also print the cycle as JSON
        #[arg(long)]
        json: bool,
    },

    /// Live channel readout, refreshed until Ctrl+C. Nothing is written to disk
    Monitor {
        /// Samples averaged per channel (overrides SAMPLES)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=MAX_SAMPLES as i64))]
        samples: Option<u32>,

        /// Seconds between samples (overrides SAMPLE_DELAY)
        #[arg(long)]
        delay: Option<f64>,

        /// Seconds between screen refreshes (overrides REFRESH_INTERVAL)
        #[arg(long)]
        refresh: Option<f64>,
    },

    /// Show the resolved channel table and settings
    Channels {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config_path = cli.config.unwrap_or_else(commands::default_config_path);
    let source = commands::ReaderSource::from_simulate(cli.simulate);

    match cli.command {
        Commands::Log {
            format,
            samples,
            delay,
            data_dir,
            clamp,
            json,
        } => commands::log::run(commands::log::LogCommandConfig {
            config_path: &config_path,
            source,
            format,
            samples,
            delay,
            data_dir: data_dir.as_deref(),
            clamp,
            json,
        }),
        Commands::Monitor {
            samples,
            delay,
            refresh,
        } => commands::monitor::run(&config_path, source, samples, delay, refresh),
        Commands::Channels { json } => commands::channels::run(&config_path, json),
    }
}
