//! CLI entry point for batmon
//!
//! ```bash
//! # sample the MCP3204 and log to the configured sinks until Ctrl+C
//! batmon run --config /etc/batmon.toml
//!
//! # no hardware: simulated converter, console output only
//! batmon run --simulate --sink console
//!
//! # show the configuration after file and environment overrides
//! batmon check-config --config /etc/batmon.toml
//! ```

use anyhow::{anyhow, Context, Result};
use batmon::config::{SensorSettings, Settings, DEFAULT_CONFIG_FILE};
use batmon::core::AdcBus;
use batmon::dispatch::SinkDispatcher;
use batmon::hardware::MockAdc;
use batmon::logging;
use batmon::sampler::{Sampler, SamplingLoop};
use batmon::sinks::{SinkKind, SinkRegistry};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

/// Codes the simulated converter idles around: roughly 6.9 V and 178 A with
/// the reference divider values.
const SIMULATED_CODES: [u16; 2] = [2048, 2048];
const SIMULATED_NOISE: u16 = 6;

#[derive(Parser)]
#[command(name = "batmon")]
#[command(about = "Battery voltage and current monitor for SPI ADCs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample the ADC and feed readings to the configured sinks
    Run {
        /// Configuration file (defaults to ./batmon.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Sink to enable, in order; repeat to add more. Replaces the configured list.
        #[arg(long = "sink", value_enum)]
        sinks: Vec<SinkKind>,

        /// Use a simulated converter instead of the SPI device
        #[arg(long)]
        simulate: bool,
    },

    /// Load, validate and print the effective configuration
    CheckConfig {
        /// Configuration file (defaults to ./batmon.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            sinks,
            simulate,
        } => run(config, sinks, simulate).await,
        Commands::CheckConfig { config } => check_config(config),
    }
}

fn load_settings(path: Option<PathBuf>) -> Result<Settings> {
    let path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    Settings::load_from(&path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}

async fn run(config: Option<PathBuf>, sinks: Vec<SinkKind>, simulate: bool) -> Result<()> {
    let mut settings = load_settings(config)?;
    if !sinks.is_empty() {
        settings.sinks = sinks;
    }
    settings.validate()?;
    logging::init_from_settings(&settings)?;

    let bus = if simulate {
        simulated_adc()
    } else {
        hardware_adc(&settings.sensor)?
    };

    let registry = SinkRegistry::new();
    let dispatcher = SinkDispatcher::with_sinks(registry.create_configured(&settings)?);
    let sampler = Sampler::from_settings(bus, &settings.sensor, dispatcher);
    let mut sampling = SamplingLoop::start(sampler, settings.sensor.sample_interval()).await?;

    let halted = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl+C")?;
            info!("Ctrl+C received, stopping");
            false
        }
        _ = sampling.stopped() => true,
    };

    sampling.stop().await;

    if halted {
        warn!("Sampling stopped after a fatal bus error");
        return Err(anyhow!("sampling stopped after a fatal bus error"));
    }
    Ok(())
}

fn simulated_adc() -> Box<dyn AdcBus> {
    Box::new(MockAdc::new(SIMULATED_CODES.to_vec()).with_noise(SIMULATED_NOISE))
}

#[cfg(feature = "hardware_spi")]
fn hardware_adc(sensor: &SensorSettings) -> Result<Box<dyn AdcBus>> {
    use batmon::hardware::Mcp3204;

    Ok(Box::new(Mcp3204::new(
        sensor.spi_bus,
        sensor.spi_slave_select,
        sensor.clock_frequency_hz,
    )))
}

#[cfg(not(feature = "hardware_spi"))]
fn hardware_adc(_sensor: &SensorSettings) -> Result<Box<dyn AdcBus>> {
    Err(batmon::error::MonitorError::FeatureNotEnabled("hardware_spi".to_string()).into())
}

fn check_config(config: Option<PathBuf>) -> Result<()> {
    let mut settings = load_settings(config)?;
    settings.validate()?;

    if settings.influx.password.is_some() {
        settings.influx.password = Some("********".to_string());
    }
    let rendered = toml::to_string_pretty(&settings).context("failed to render configuration")?;
    print!("{rendered}");
    Ok(())
}
