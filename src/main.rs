//! Offline pipeline entry point: reads one input file through a configured reader, drives
//! every event through the processor graph, and persists the activated results to an output
//! sink (§4.L, SPEC_FULL.md §10).

use cassrs::config::Settings;
use cassrs::error::CassResult;
use cassrs::event::CassEvent;
use cassrs::manager::ProcessorManager;
use cassrs::processor::DependencyResolver;
use cassrs::readers::frms6::Frms6Reader;
use cassrs::readers::raw_sss::RawSssReader;
use cassrs::readers::Reader;
use cassrs::registry::builtin_registry;
use cassrs::sinks::hdf5_sink::Hdf5Sink;
use cassrs::sinks::{NamedResult, ResultSink};
use clap::{Parser, ValueEnum};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum InputFormat {
    Frms6,
    RawSss,
}

/// Runs the event-graph pipeline over a single input file (§10).
#[derive(Debug, Parser)]
#[command(name = "cassrs", about = "Pixel-detector and waveform event-graph pipeline")]
struct Args {
    /// Path to the TOML processor configuration.
    #[arg(long)]
    config: PathBuf,

    /// Path to the raw event stream to process.
    #[arg(long)]
    input: PathBuf,

    /// Wire format of the input stream.
    #[arg(long, value_enum, default_value_t = InputFormat::Frms6)]
    format: InputFormat,

    /// Directory to write the HDF5-shaped sink output into, if given.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// File base name used by the output sink.
    #[arg(long, default_value = "run")]
    output_base_name: String,

    /// Stop after this many events (0 means unlimited).
    #[arg(long, default_value_t = 0)]
    max_events: u64,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            log::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> CassResult<ExitCode> {
    let settings = Settings::load(&args.config)?;
    let workers = settings.general.workers;
    let mgr = ProcessorManager::build(settings, workers, builtin_registry())?;

    let sink: Option<Hdf5Sink> = args
        .output_dir
        .as_ref()
        .map(|dir| Hdf5Sink::new(dir.clone(), args.output_base_name.clone(), true));

    let file = File::open(&args.input)?;
    let mut stream = BufReader::new(file);

    let mut event = CassEvent::new();
    let mut processed = 0u64;

    match args.format {
        InputFormat::Frms6 => {
            let mut reader = Frms6Reader::new();
            reader.read_header_info(&mut stream)?;
            while reader.read_event(&mut stream, &mut event)? {
                processed += 1;
                drive_one(&mgr, &event, sink.as_ref())?;
                if args.max_events > 0 && processed >= args.max_events {
                    break;
                }
            }
        }
        InputFormat::RawSss => {
            let mut reader = RawSssReader::new();
            reader.read_header_info(&mut stream)?;
            while reader.read_event(&mut stream, &mut event)? {
                processed += 1;
                drive_one(&mgr, &event, sink.as_ref())?;
                if args.max_events > 0 && processed >= args.max_events {
                    break;
                }
            }
        }
    }

    mgr.about_to_quit()?;
    log::info!("processed {processed} events");
    Ok(ExitCode::SUCCESS)
}

/// Runs one event through the graph, then persists every activated processor's latest
/// result to the sink (when configured) under its own name, and releases the event's slot.
fn drive_one(mgr: &ProcessorManager, event: &CassEvent, sink: Option<&Hdf5Sink>) -> CassResult<()> {
    mgr.process_event(event)?;
    if let Some(sink) = sink {
        let mut results = Vec::new();
        let handles: Vec<_> = mgr
            .active_order()
            .into_iter()
            .filter_map(|name| mgr.result_of(&name, event.id).ok().map(|h| (name, h)))
            .collect();
        let guards: Vec<_> = handles.iter().map(|(_, h)| h.read()).collect();
        for ((name, _), guard) in handles.iter().zip(guards.iter()) {
            results.push(NamedResult { group: "/results", name: name.as_str(), result: &**guard });
        }
        sink.write(event.id, &results)?;
    }
    mgr.release_event(event.id);
    Ok(())
}
