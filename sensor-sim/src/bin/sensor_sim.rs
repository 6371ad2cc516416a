//! Sensor simulation runner.
//!
//! Prints one `Tick <t>:\t<temperature> E-3 <unit>` line per consumed sample.
//!
//! # Usage
//!
//! ```sh
//! sensor-sim                          # 1 ms ticks, one sample per second, until stdin closes
//! sensor-sim --virtual --steps 40     # one full ramp, no waiting
//! sensor-sim --tick-us 100 --steps 10 --pin 0
//! ```

use std::io;
use std::num::ParseIntError;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use sensor_sim::consumer::LineSink;
use sensor_sim::{ConfigError, Pipeline, SimConfig, SimError, Simulation, init_tracing};

/// Samples replayed by `--virtual` when `--steps` is absent: one full ramp.
const DEFAULT_VIRTUAL_STEPS: u32 = 40;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("missing value for {0}")]
    MissingValue(String),
    #[error("invalid value for {flag}: {source}")]
    InvalidValue {
        flag: String,
        #[source]
        source: ParseIntError,
    },
    #[error("unknown argument: {0}")]
    UnknownArgument(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sim(#[from] SimError),
    #[error("failed to start stdin watcher: {0}")]
    Watcher(#[source] io::Error),
}

struct Options {
    config: SimConfig,
    steps: Option<u32>,
    virtual_time: bool,
}

fn main() {
    init_tracing();
    if let Err(e) = run() {
        eprintln!("sensor-sim: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    let args: Vec<String> = std::env::args().collect();
    let Some(options) = parse_args(&args)? else {
        print_usage();
        return Ok(());
    };
    let Options {
        config,
        steps,
        virtual_time,
    } = options;
    let sink = LineSink::stdout(config.scale.unit.clone());

    if virtual_time {
        let mut pipeline = Pipeline::new(&config, sink)?;
        for _ in 0..steps.unwrap_or(DEFAULT_VIRTUAL_STEPS) {
            pipeline.step();
        }
        return Ok(());
    }

    let simulation = Simulation::spawn(&config, sink)?;
    let events = simulation.events();
    let poll = config.timing.tick.max(Duration::from_millis(1));

    match steps {
        Some(limit) => {
            while events.get() < limit {
                thread::sleep(poll);
            }
            simulation.shutdown();
        }
        None => {
            let shutdown_flag = simulation.shutdown_flag();
            watch_stdin(Arc::clone(&shutdown_flag)).map_err(CliError::Watcher)?;
            while !shutdown_flag.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(100));
            }
            eprintln!("sensor-sim: stdin closed, shutting down");
            simulation.shutdown();
        }
    }

    Ok(())
}

/// Raises `flag` once stdin reaches end of file (Ctrl-D, or a closed pipe).
fn watch_stdin(flag: Arc<AtomicBool>) -> io::Result<()> {
    thread::Builder::new()
        .name("stdin-watcher".into())
        .spawn(move || {
            // A read error ends the run the same way EOF does.
            let _ = io::copy(&mut io::stdin().lock(), &mut io::sink());
            flag.store(true, Ordering::Relaxed);
        })
        .map(drop)
}

/// Returns `None` when `--help` was requested.
fn parse_args(args: &[String]) -> Result<Option<Options>, CliError> {
    let mut options = Options {
        config: SimConfig::default(),
        steps: None,
        virtual_time: false,
    };

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--tick-us" => {
                options.config.timing.tick = Duration::from_micros(value(&mut iter, arg)?);
            }
            "--period" | "-p" => options.config.timing.period_ticks = value(&mut iter, arg)?,
            "--rx-delay" => options.config.timing.consumer_delay_ticks = value(&mut iter, arg)?,
            "--steps" | "-n" => options.steps = Some(value(&mut iter, arg)?),
            "--pin" => options.config.tasks.pin_core = Some(value(&mut iter, arg)?),
            "--virtual" => options.virtual_time = true,
            "--help" | "-h" => return Ok(None),
            other => return Err(CliError::UnknownArgument(other.to_owned())),
        }
    }

    Ok(Some(options))
}

/// Parses the argument following `flag`.
fn value<'a, T>(iter: &mut impl Iterator<Item = &'a String>, flag: &str) -> Result<T, CliError>
where
    T: FromStr<Err = ParseIntError>,
{
    let raw = iter
        .next()
        .ok_or_else(|| CliError::MissingValue(flag.to_owned()))?;
    raw.parse().map_err(|source| CliError::InvalidValue {
        flag: flag.to_owned(),
        source,
    })
}

fn print_usage() {
    eprintln!(
        r#"sensor-sim - periodic waveform producer and temperature consumer

USAGE:
    sensor-sim [OPTIONS]

OPTIONS:
        --tick-us <US>      Tick length in microseconds (default: 1000)
    -p, --period <TICKS>    Generator period in ticks (default: 1000)
        --rx-delay <TICKS>  Consumer pause after each report (default: 1000)
    -n, --steps <N>         Stop after N consumed samples (default: run until stdin closes)
        --pin <CPU>         Pin both tasks to one CPU
        --virtual           Replay on a virtual clock without sleeping (default 40 steps)
    -h, --help              Print this help message

LOGGING:
    Build with --features tracing and set RUST_LOG, e.g. RUST_LOG=sensor_sim=trace

EXAMPLE:
    sensor-sim --virtual --steps 40
"#
    );
}
