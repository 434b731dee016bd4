//! Software-in-the-loop boom tracker
//!
//! Runs the full boot sequence and the multi-rate estimator against a
//! simulated swinging boom, writing telemetry frames to a file.
//!
//! ```bash
//! sitl --seconds 10 --output boom.bin --csv boom-log.csv
//! sitl --config tracker.toml --realtime
//! ```

mod board;
mod csv;
mod plant;

use std::time::Duration;

use anyhow::{bail, Context};
use hal::Clock;
use tracker::{SimClock, StdClock, TrackerConfig};

use crate::board::{FileSink, SitlBoard};
use crate::plant::BoomPlant;

/// Simulated time per idle step while waiting for index pulses
const IDLE_STEP_US: u64 = 1_000;

/// Simulated time per wait step between fast ticks
const WAIT_STEP_US: u64 = 10;

struct Args {
    config_path: Option<String>,
    seconds: f64,
    output: String,
    csv: Option<String>,
    realtime: bool,
}

impl Default for Args {
    fn default() -> Self {
        Args {
            config_path: None,
            seconds: 5.0,
            output: "boom.bin".to_string(),
            csv: None,
            realtime: false,
        }
    }
}

fn next_value(args: &mut impl Iterator<Item = String>, name: &str) -> anyhow::Result<String> {
    args.next()
        .with_context(|| format!("{} needs a value", name))
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = std::env::args().skip(1);
    let mut result = Args::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-c" | "--config" => result.config_path = Some(next_value(&mut args, &arg)?),
            "-s" | "--seconds" => {
                result.seconds = next_value(&mut args, &arg)?
                    .parse()
                    .context("--seconds must be a number")?
            }
            "-o" | "--output" => result.output = next_value(&mut args, &arg)?,
            "--csv" => result.csv = Some(next_value(&mut args, &arg)?),
            "--realtime" => result.realtime = true,
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => {
                print_help();
                bail!("unknown argument: {}", other);
            }
        }
    }

    if !(result.seconds > 0.0) {
        bail!("--seconds must be positive");
    }
    Ok(result)
}

fn print_help() {
    println!("sitl - boom tracker software-in-the-loop");
    println!();
    println!("USAGE:");
    println!("    sitl [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <FILE>     Tracker configuration (default: built-in)");
    println!("    -s, --seconds <S>       Simulated run time after boot (default: 5)");
    println!("    -o, --output <FILE>     Telemetry frame file (default: boom.bin)");
    println!("        --csv <FILE>        Also decode frames into a CSV log");
    println!("        --realtime          Pace against the wall clock");
    println!("    -h, --help              Print help information");
}

fn run<C: Clock + Clone + 'static>(
    config: &TrackerConfig,
    args: &Args,
    clock: C,
    mut idle: impl FnMut(),
    mut wait: impl FnMut(),
) -> anyhow::Result<()> {
    let sink = FileSink::create(&args.output)
        .with_context(|| format!("creating telemetry file {}", args.output))?;
    let board = SitlBoard::new(
        BoomPlant::new(&config.axes),
        clock.clone(),
        config.imu.bias_samples,
        sink,
    );
    let mut pulses = board.index_pulses();

    let mut scheduler = tracker::boot(board, config, &clock, || {
        idle();
        pulses.iter_mut().for_each(|p| p.poll());
    })
    .context("boot failed")?;

    let fast_hz = config.scheduler.fast_hz as u64;
    let total_ticks = (args.seconds * fast_hz as f64) as u64;
    let mut done = 0;
    while done < total_ticks {
        let ticks = fast_hz.min(total_ticks - done);
        scheduler
            .run_for(&clock, ticks, || {
                wait();
                pulses.iter_mut().for_each(|p| p.poll());
            })
            .context("estimator stopped")?;
        done += ticks;

        for axis in scheduler.axes() {
            let fused = axis.fused();
            log::info!(
                "t={:.1}s {}: {:+.3} m {:+.3} m/s {:+.3} m/s^2",
                clock.now_us() as f64 * 1.0e-6,
                axis.id(),
                fused.position,
                fused.velocity,
                fused.acceleration
            );
        }
    }

    scheduler.log_stats();
    log::info!(
        "{} frames written to {}",
        scheduler.frames_sent(),
        args.output
    );
    // closes the telemetry file before it is read back
    drop(scheduler);

    if let Some(csv_path) = &args.csv {
        let rows = csv::export(
            &args.output,
            csv_path,
            &config.axes,
            config.scheduler.telemetry_hz,
        )?;
        log::info!("{} rows written to {}", rows, csv_path);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args()?;
    let config = match &args.config_path {
        Some(path) => TrackerConfig::load(path)?,
        None => {
            let config = TrackerConfig::default();
            config.validate()?;
            config
        }
    };

    if args.realtime {
        log::info!("Pacing against the wall clock");
        let clock = StdClock::new();
        run(
            &config,
            &args,
            clock,
            || std::thread::sleep(Duration::from_micros(IDLE_STEP_US)),
            std::hint::spin_loop,
        )
    } else {
        let clock = SimClock::new();
        let idle_clock = clock.clone();
        let wait_clock = clock.clone();
        run(
            &config,
            &args,
            clock,
            move || idle_clock.advance_us(IDLE_STEP_US),
            move || wait_clock.advance_us(WAIT_STEP_US),
        )
    }
}
