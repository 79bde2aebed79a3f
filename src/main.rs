use clap::Parser;
use color_eyre::eyre::{self, WrapErr};
use console::style;
use flcachesim::{config::Config, trace::Trace};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(author, version, about = "replay a request trace through a cache", long_about = None)]
struct Options {
    /// Trace to replay (YAML or JSON)
    #[arg(short, long, value_name = "TRACE")]
    trace: PathBuf,
    /// Cache config (YAML or JSON), overrides the config of the trace
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,
    /// Turn debugging information on
    #[arg(short, long, action = clap::ArgAction::Count)]
    debug: u8,
    /// Fail if a response differs from the expected response of the trace
    #[arg(long)]
    check: bool,
    /// Write statistics as JSON to this file
    #[arg(long = "stats-json", value_name = "PATH")]
    stats_json: Option<PathBuf>,
}

fn init_logging(debug: u8) {
    let mut log_builder = env_logger::Builder::new();
    let level = match debug {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    log_builder.filter_level(level);
    log_builder.parse_default_env();
    log_builder.init();
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let options = Options::parse();
    init_logging(options.debug);

    let start = std::time::Instant::now();
    let trace = Trace::from_path(&options.trace)?;
    let config = match options.config {
        Some(ref path) => Config::from_path(path)?,
        None => trace.config.clone().unwrap_or_default(),
    };
    println!("cache: {}", style(&config.cache).bold());

    let replay = trace.replay(&config)?;
    for (entry, resp) in trace.requests.iter().zip(replay.responses.iter()) {
        let outcome = if resp.hit {
            style("hit ").green()
        } else {
            style("miss").red()
        };
        println!("{outcome} {:<32} => {resp}", entry.request.to_string());
    }

    println!("\n{}", replay.stats);
    println!(
        "{} requests in {:?}",
        replay.responses.len(),
        start.elapsed()
    );

    if let Some(ref path) = options.stats_json {
        let file = std::fs::File::create(path)
            .wrap_err_with(|| eyre::eyre!("failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), &replay.stats)?;
    }

    if !replay.mismatches.is_empty() {
        for mismatch in &replay.mismatches {
            eprintln!("{}", style(mismatch).yellow());
        }
        if options.check {
            eyre::bail!(
                "{} of {} responses differ from the trace",
                replay.mismatches.len(),
                replay.responses.len()
            );
        }
    }
    Ok(())
}
