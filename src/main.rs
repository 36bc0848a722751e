//! flowgen binary: drive request/response flows and log completion times

use clap::Parser;
use flowgen::cdf::CdfTable;
use flowgen::config::Config;
use flowgen::pacing::{measure_sleep_overhead, OsSleeper, CALIBRATION_ROUNDS};
use flowgen::plan::{Plan, PlanParams};
use flowgen::run::Run;
use flowgen::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Generate request/response flows and measure their completion times
#[derive(Parser)]
#[command(name = "flowgen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Expected average RX bandwidth in Mbits/sec
    #[arg(short = 'b', value_name = "MBPS")]
    bandwidth: f64,

    /// Configuration file
    #[arg(short = 'c', value_name = "FILE")]
    config: PathBuf,

    /// Number of requests (instead of -t)
    #[arg(
        short = 'n',
        value_name = "COUNT",
        conflicts_with = "time",
        required_unless_present = "time"
    )]
    number: Option<u64>,

    /// Time in seconds to generate requests (instead of -n)
    #[arg(short = 't', value_name = "SECONDS")]
    time: Option<u64>,

    /// Log file with flow completion times
    #[arg(short = 'l', value_name = "FILE", default_value = "flows.txt")]
    log: PathBuf,

    /// Seed to generate random numbers (default: current time)
    #[arg(short = 's', value_name = "SEED")]
    seed: Option<u64>,

    /// Script invoked on the FCT log after the run
    #[arg(short = 'r', value_name = "FILE")]
    script: Option<PathBuf>,

    /// Give more detailed output (verbose)
    #[arg(short = 'v')]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if cli.bandwidth <= 0.0 {
        return Err(Error::Config(format!(
            "invalid average RX bandwidth: {}",
            cli.bandwidth
        )));
    }

    let seed = cli.seed.unwrap_or_else(now_us);
    debug!("seed: {seed}");

    let config = Config::load(&cli.config)?;
    let cdf = CdfTable::load(&config.size_dist_path)?;
    debug!("average request size: {:.2} bytes", cdf.avg());

    let params = PlanParams {
        load_mbps: cli.bandwidth,
        count: cli.number,
        duration_secs: cli.time,
        seed,
    };
    let plan = Plan::build(&config, &cdf, &params)?;

    let overhead_us = measure_sleep_overhead(CALIBRATION_ROUNDS);
    debug!("sleep overhead: {overhead_us} us");

    let mut run = Run::new(config, plan)
        .with_sleep_overhead(overhead_us)
        .with_progress(!cli.verbose);

    let wall = run.execute(OsSleeper)?;
    let summary = run.write_fct_log(&cli.log, wall)?;
    debug!(
        "{} flows completed, {} unfinished, {} new connections",
        summary.completed,
        summary.unfinished,
        run.new_connections()
    );

    if let Some(script) = &cli.script {
        run_post_script(script, &cli.log);
    }

    Ok(())
}

/// Invoke the optional post-processing script on the FCT log.
///
/// Failure to launch or a non-zero exit is logged, never fatal.
fn run_post_script(script: &Path, log: &Path) {
    match Command::new("python").arg(script).arg(log).status() {
        Ok(status) if status.success() => {}
        Ok(status) => warn!("post-processing script exited with {status}"),
        Err(e) => warn!("cannot launch post-processing script: {e}"),
    }
}

fn now_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "flowgen=debug" } else { "flowgen=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
