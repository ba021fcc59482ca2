//! heatersrv entry point

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use heatersrv::{Host, HostConfig};
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "heatersrv")]
#[command(version, about = "Heater predictive control host")]
struct Args {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, value_name = "FILE", default_value = "config/heatersrv.toml")]
    config: PathBuf,

    /// Log filter directive, overrides `log.level`
    #[arg(short, long)]
    log_level: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Load the config, connect every section and report
    Check,

    /// Invoke every predictive callback N times and print the values
    Eval {
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,
    },

    /// Tick the predictive callbacks until stopped (default)
    Run {
        /// Tick interval, overrides `run.interval_ms`
        #[arg(long)]
        interval_ms: Option<u64>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    if args.no_color {
        colored::control::set_override(false);
    }

    let mut config = HostConfig::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    if let Some(level) = args.log_level {
        config.log.level = level;
    }

    let mut log_config = config.log.to_log_config();
    log_config.ansi = !args.no_color;
    // Held until main returns so buffered lines reach the sinks
    let _log_guard = common::logging::init_with_config(&log_config)?;

    info!("Starting heatersrv v{}", env!("CARGO_PKG_VERSION"));

    let mut host = Host::from_config(config)?;
    host.connect()?;

    match args.command.unwrap_or(Commands::Run { interval_ms: None }) {
        Commands::Check => check(&host),
        Commands::Eval { count } => eval(&host, count),
        Commands::Run { interval_ms } => {
            let interval = interval_ms.unwrap_or(host.config().run.interval_ms).max(1);
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?
                .block_on(run(host, Duration::from_millis(interval)))
        },
    }
}

fn check(host: &Host) -> Result<()> {
    println!("{}", "Heaters".bold());
    for heater in host.heaters().iter() {
        let mode = if heater.has_predictive_callback() {
            "predictive".green()
        } else {
            "no callback".dimmed()
        };
        println!("  {} (max_power {}) {}", heater.name(), heater.max_power(), mode);
    }

    println!("{}", "Predictive sections".bold());
    for control in host.controls() {
        let store = control.binding().surface().store().lock();
        println!(
            "  {} {} -> {} [{:?}] {}",
            "✓".green(),
            control.section(),
            control.heater_name(),
            control.state(),
            store.snapshot()
        );
    }
    Ok(())
}

fn eval(host: &Host, count: u32) -> Result<()> {
    for round in 1..=count {
        match host.tick() {
            Ok(predictions) => {
                for p in predictions {
                    println!(
                        "[{}] {}: {} (power {})",
                        round,
                        p.heater.cyan(),
                        p.value,
                        p.power
                    );
                }
            },
            Err(e) => {
                println!("[{}] {} {}", round, "✗".red(), e);
                return Err(e.into());
            },
        }
    }
    Ok(())
}

async fn run(host: Host, period: Duration) -> Result<()> {
    let controller = host.shutdown().clone();
    let stop = common::shutdown::wait_for_shutdown();
    tokio::pin!(stop);

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!("Ticking every {:?}", period);

    loop {
        tokio::select! {
            _ = &mut stop => {
                info!("Stop signal received");
                break;
            }
            _ = controller.wait() => break,
            _ = ticker.tick() => {
                // Failures already invoked the shutdown; the next select ends the loop
                if let Err(e) = host.tick() {
                    error!("{}", e);
                }
            }
        }
    }

    match controller.reason() {
        Some(reason) => anyhow::bail!("Control system shut down: {}", reason),
        None => {
            info!("heatersrv stopped");
            Ok(())
        },
    }
}
