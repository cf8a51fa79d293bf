mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use monsoon_lib::capture::parse_capture_line;
use monsoon_lib::{AnyPacket, Capture, DropTracker, HardwareVariant, SampleType};
use output::{OutputFormat, RecordSink};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Variant {
    Hvpm,
    Lvpm,
}

impl From<Variant> for HardwareVariant {
    fn from(variant: Variant) -> Self {
        match variant {
            Variant::Hvpm => HardwareVariant::Hvpm,
            Variant::Lvpm => HardwareVariant::Lvpm,
        }
    }
}

/// Decode Monsoon power monitor sample packets from hex capture files.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long, global = true)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode every packet in a capture file.
    Decode {
        /// Capture file, one hex-encoded packet per line
        file: PathBuf,
        /// Hardware variant that produced the capture
        #[arg(short = 't', long, value_enum)]
        variant: Variant,
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
        /// Write records here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Decode capture lines from stdin as they arrive, until EOF or Ctrl+C.
    Follow {
        #[arg(short = 't', long, value_enum)]
        variant: Variant,
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Print packet, sample type and drop statistics for a capture file.
    Summary {
        file: PathBuf,
        #[arg(short = 't', long, value_enum)]
        variant: Variant,
    },
}

fn setup_logging(log_file_path: Option<PathBuf>, verbosity: &Verbosity<InfoLevel>) -> Result<Option<WorkerGuard>> {
    // Records may go to stdout, so logs stay on stderr
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .without_time();

    let (file_layer, guard) = if let Some(ref path) = log_file_path {
        let log_file = File::create(path).with_context(|| format!("Failed to create log file at: {:?}", path))?;
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(log_file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_file_path {
        info!("Logging to file: {:?}", path);
    }

    Ok(guard)
}

fn open_output(path: Option<&PathBuf>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create output file {:?}", path))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    })
}

fn load_capture(file: &PathBuf, variant: HardwareVariant) -> Result<Capture> {
    let capture = Capture::load(variant, file).with_context(|| format!("Failed to load capture {:?}", file))?;
    info!(packets = capture.len(), %variant, "Loaded capture {:?}", file);
    Ok(capture)
}

fn decode(file: PathBuf, variant: HardwareVariant, format: OutputFormat, output: Option<PathBuf>) -> Result<()> {
    let capture = load_capture(&file, variant)?;
    let mut sink = RecordSink::new(format, open_output(output.as_ref())?, variant)?;
    let mut tracker = DropTracker::new();

    for (i, captured) in capture.packets().iter().enumerate() {
        let packet = captured
            .decode(variant)
            .with_context(|| format!("Failed to decode packet on line {}", captured.line))?;
        tracker.observe(&packet);
        sink.write_packet(i, &packet)?;
    }
    sink.finish()?;

    info!(
        packets = tracker.packets(),
        measurements = tracker.measurements(),
        "Decoding finished"
    );
    Ok(())
}

async fn follow(variant: HardwareVariant, format: OutputFormat) -> Result<()> {
    let mut sink = RecordSink::new(format, Box::new(io::stdout()), variant)?;
    let mut tracker = DropTracker::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_no = 0;

    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!(%variant, "Reading capture lines from stdin...");
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    debug!("End of input");
                    break;
                };
                line_no += 1;
                let packet = match parse_capture_line(variant, line_no, &line)
                    .and_then(|captured| captured.map(|c| c.decode(variant)).transpose())
                {
                    Ok(Some(packet)) => packet,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!(line = line_no, "Skipping packet: {}", e);
                        continue;
                    }
                };
                tracker.observe(&packet);
                sink.write_packet(tracker.packets() as usize - 1, &packet)?;
                sink.flush()?;
            }
            _ = &mut ctrl_c => {
                info!("Ctrl+C received, shutting down gracefully.");
                break;
            }
        }
    }
    sink.finish()?;

    info!(
        packets = tracker.packets(),
        missed = tracker.missed_packets(),
        dropped = tracker.reported_dropped(),
        "Stream closed"
    );
    Ok(())
}

fn summary(file: PathBuf, variant: HardwareVariant) -> Result<()> {
    let capture = load_capture(&file, variant)?;
    let mut tracker = DropTracker::new();
    let mut sample_types: HashMap<SampleType, u64> = HashMap::new();
    let mut first_time: Option<f64> = None;
    let mut last_time: Option<f64> = None;
    let mut failed = 0usize;

    for captured in capture.packets() {
        let packet: AnyPacket = match captured.decode(variant) {
            Ok(packet) => packet,
            Err(e) => {
                warn!(line = captured.line, "Undecodable packet: {}", e);
                failed += 1;
                continue;
            }
        };
        tracker.observe(&packet);
        for record in packet.records() {
            *sample_types.entry(record.sample_type).or_default() += 1;
            first_time.get_or_insert(record.sample_time);
            last_time = Some(record.sample_time);
        }
    }

    println!("Capture:         {:?} ({})", file, variant);
    println!("Packets:         {} ({} undecodable)", tracker.packets(), failed);
    println!("Measurements:    {}", tracker.measurements());
    for sample_type in [
        SampleType::Measurement,
        SampleType::ZeroCal,
        SampleType::RefCal,
        SampleType::Invalid,
    ] {
        let count = sample_types.get(&sample_type).copied().unwrap_or(0);
        println!("  {:<14} {}", format!("{}:", sample_type), count);
    }
    if let (Some(first), Some(last)) = (first_time, last_time) {
        println!("Time span:       {:.6} s .. {:.6} s ({:.6} s)", first, last, last - first);
    }
    println!("Missed packets:  {}", tracker.missed_packets());
    println!("Device dropped:  {}", tracker.reported_dropped());
    if tracker.has_gaps() {
        warn!("Capture has gaps; interpolated sample times around them are unreliable");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_file, &cli.verbose)?;

    let result = match cli.command {
        Command::Decode {
            file,
            variant,
            format,
            output,
        } => decode(file, variant.into(), format, output),
        Command::Follow { variant, format } => follow(variant.into(), format).await,
        Command::Summary { file, variant } => summary(file, variant.into()),
    };

    if let Err(e) = result {
        error!("Application failed: {:?}", e);
        drop(_guard);
        process::exit(1);
    }
    Ok(())
}
