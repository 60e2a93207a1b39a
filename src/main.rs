// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sinewave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Main entry point for the sine waveform generator
use anyhow::Result;
use clap::Parser;
use log::{debug, info};
use rust_sinewave::config::{self, Config};
use rust_sinewave::daemon::Daemon;
use rust_sinewave::waveform::stream::SampleStreamConsumer;

use std::path::PathBuf;
use tokio::signal;

/// Periodic sine waveform generator with uniform noise
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file (YAML format)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to a configuration to validate and exit
    #[arg(long)]
    validate_config: Option<PathBuf>,

    /// Output the configuration schema as JSON and exit
    #[arg(long)]
    show_config_schema: bool,

    /// Number of points of one wave period
    #[arg(long)]
    sample_count: Option<usize>,

    /// Amplitude of the sine
    #[arg(long, allow_negative_numbers = true)]
    gain: Option<f64>,

    /// Phase offset in radians
    #[arg(long, allow_negative_numbers = true)]
    phase: Option<f64>,

    /// Constant offset added to every sample
    #[arg(long, allow_negative_numbers = true)]
    bias: Option<f64>,

    /// Amplitude of the uniform noise
    #[arg(long, allow_negative_numbers = true)]
    noise_gain: Option<f64>,

    /// Wave frequency (stored, not used by the formula)
    #[arg(long)]
    frequency: Option<f64>,

    /// Period of the scheduler tick in microseconds
    #[arg(long)]
    tick_interval_us: Option<u64>,

    /// Enable verbose logging (debug level)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Disable all logging output
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger with appropriate level based on verbose and quiet flags
    let args = Args::parse();

    let log_level = if args.quiet {
        log::LevelFilter::Off
    } else if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    // Check if --show-config-schema flag is set
    if args.show_config_schema {
        return config::output_config_schema();
    }

    // Validate configuration file if --validate-config is set
    if let Some(validate_path) = args.validate_config {
        if !validate_path.exists() {
            return Err(anyhow::anyhow!(
                "Configuration file does not exist: {}",
                validate_path.display()
            ));
        }

        Config::from_file(&validate_path)
            .map_err(|err| anyhow::anyhow!("Configuration validation failed: {:#}", err))?;
        println!("Configuration file is valid: {}", validate_path.display());
        return Ok(());
    }

    // Load configuration
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("config.yaml"));
    let mut config = Config::from_file(&config_path)?;

    // Apply command line overrides
    config.apply_args(
        args.sample_count,
        args.gain,
        args.phase,
        args.bias,
        args.noise_gain,
        args.frequency,
        args.tick_interval_us,
    );
    config::validate_specific_rules(&config)?;

    info!("Starting in daemon mode");
    let mut daemon = Daemon::new();
    daemon.launch(&config).await?;

    // Log what the unit publishes at debug level
    if let Some(stream) = daemon.stream() {
        let mut consumer = SampleStreamConsumer::new(&stream);
        tokio::spawn(async move {
            while let Some(record) = consumer.next_record().await {
                debug!(
                    "Record #{}: {} samples",
                    record.sequence,
                    record.sample_count()
                );
            }
        });
    }

    // Wait for termination signal
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal, terminating daemon");
            daemon.shutdown();
            daemon.join().await?;
        }
        Err(err) => {
            eprintln!("Error waiting for shutdown signal: {}", err);
        }
    }

    Ok(())
}
