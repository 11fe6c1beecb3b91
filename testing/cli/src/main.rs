use std::time::Duration;

use anyhow::{bail, Context};
use clap::{App, Arg, ArgMatches};
use fifoq_core::QueueOptions;
use tracing::info;

mod stress;

fn parse_arg<T>(matches: &ArgMatches, name: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match matches.value_of(name) {
        Some(value) => value
            .parse()
            .map_err(|err| anyhow::anyhow!("{}", err))
            .with_context(|| format!("Invalid value for --{}: {}", name, value)),
        None => Ok(default),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let matches = App::new("fifoq stress test")
        .arg(
            Arg::with_name("engine")
                .short("e")
                .long("engine")
                .value_name("ENGINE")
                .help("Queue engine to use, one of [fifo,fixed]")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("capacity")
                .short("c")
                .long("capacity")
                .value_name("CAPACITY")
                .help("Capacity of the fixed engine")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("producers")
                .short("p")
                .long("producers")
                .value_name("PRODUCERS")
                .help("Number of producer threads")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("consumers")
                .long("consumers")
                .value_name("CONSUMERS")
                .help("Number of consumer threads")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("messages")
                .short("m")
                .long("messages")
                .value_name("MESSAGES")
                .help("Number of messages to send")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("timeout")
                .short("t")
                .long("timeout-ms")
                .value_name("TIMEOUT_MS")
                .help("How long consumers wait for the next message before re-checking")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("samples")
                .short("s")
                .long("samples")
                .value_name("SAMPLES")
                .help("Number of iterations to run")
                .takes_value(true),
        )
        .get_matches();

    let samples: usize = parse_arg(&matches, "samples", 1)?;
    let capacity: usize = parse_arg(&matches, "capacity", 1024)?;
    let workload = stress::Workload {
        producers: parse_arg(&matches, "producers", 4)?,
        consumers: parse_arg(&matches, "consumers", 4)?,
        messages: parse_arg(&matches, "messages", 100_000)?,
        idle_timeout: Duration::from_millis(parse_arg(&matches, "timeout", 50)?),
    };

    let engine = matches.value_of("engine").unwrap_or("fifo");
    let options = match engine {
        "fifo" => QueueOptions::unbounded(),
        "fixed" => QueueOptions::fixed(capacity),
        e => bail!("Queue engine ({}) isn't implemented", e),
    };

    info!(engine, ?options, ?workload, samples, "Starting stress test");

    for sample in 0..samples {
        let report = stress::run(options.build(), &workload)
            .with_context(|| format!("Sample {} failed", sample))?;
        info!(
            sample,
            full_retries = report.full_retries,
            idle_timeouts = report.idle_timeouts,
            "Sample finished"
        );
        println!("{},{:?}", engine, report.elapsed);
    }
    Ok(())
}
