use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::{debug, error};
use wcmr::report::write_frequencies;
use wcmr::{
    config, frequencies_sequential, run_sequential, Aggregator, Engine, LineSource, OutputMode,
    Pipeline, PipelineConfig, PipelineError, Report,
};

/// Count the words in a plain text file with a map -> reduce -> aggregate pipeline
#[derive(Parser)]
#[command(name = "mapreduce", version)]
struct Cli {
    /// Plain text file to count
    path: PathBuf,

    /// Number of mapper workers
    #[arg(short, long, default_value_t = config::DEFAULT_MAPPERS)]
    mappers: usize,

    /// Number of reducer workers
    #[arg(short, long, default_value_t = config::DEFAULT_REDUCERS)]
    reducers: usize,

    /// Capacity of the channels between stages (0 = unbuffered)
    #[arg(short, long, default_value_t = 0)]
    buffer: usize,

    /// What to print (default: trace for the pipeline, summary with --sequential)
    #[arg(short, long, value_enum)]
    output: Option<OutputMode>,

    /// Count on a single thread instead of running the pipeline
    #[arg(long)]
    sequential: bool,

    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            eprintln!("{e}");
            eprintln!("Error: {}", PipelineError::usage());
            std::process::exit(1);
        }
    };

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_thread_names(cli.verbose >= 1)
        .init();

    debug!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    if let Err(e) = run(cli) {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let engine = if cli.sequential {
        Engine::Sequential
    } else {
        Engine::Pipeline
    };
    let mode = cli.output.unwrap_or_else(|| engine.default_output());
    let context = || format!("counting words in {}", cli.path.display());

    let pipeline = match engine {
        Engine::Sequential => None,
        Engine::Pipeline => {
            let config = PipelineConfig::new()
                .with_mappers(cli.mappers)
                .with_reducers(cli.reducers)
                .with_capacity(cli.buffer);
            Some(Pipeline::new(config)?)
        }
    };

    // the aggregator thread writes through this, so no lock is held across the run
    let mut out = io::stdout();

    if mode == OutputMode::Frequencies {
        let outcome = match &pipeline {
            Some(pipeline) => pipeline.frequencies_file(&cli.path),
            None => LineSource::open(&cli.path).and_then(frequencies_sequential),
        }
        .with_context(context)?;
        write_frequencies(&outcome.tally, &mut out)?;
        return Ok(());
    }

    let outcome = match &pipeline {
        None => {
            let aggregator = match mode {
                OutputMode::Trace => Aggregator::echoing(&mut out),
                _ => Aggregator::new(),
            };
            LineSource::open(&cli.path).and_then(|source| run_sequential(source, aggregator))
        }
        Some(pipeline) => match mode {
            OutputMode::Trace => pipeline.run_file_traced(&cli.path, &mut out),
            _ => pipeline.run_file(&cli.path),
        },
    }
    .with_context(context)?;

    Report::new(&cli.path, engine, &outcome).render(mode, &mut out)?;
    out.flush()?;
    Ok(())
}
