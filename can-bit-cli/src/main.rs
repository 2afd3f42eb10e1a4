//! CAN Bit Decoder CLI Application
//!
//! This is the command-line interface for the CAN bit decoder.
//! It uses the can-bit-decoder library and adds:
//! - Settings from config.toml and flags (channel, bit timing, FRC mode, base)
//! - Capture file loading (.bits text, logic analyzer CSV)
//! - Text, CSV and JSON output
//! - Synthetic capture generation

use anyhow::{bail, Context, Result};
use can_bit_decoder::synth::{CanId, CaptureBuilder, FrameSpec};
use can_bit_decoder::{Cancellation, DecodeResults, Decoder, NeverCancel, PacketLimit};
use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

mod capture;
mod config;
mod export;
mod render;

use config::{AppConfig, OutputFormat};
use render::{DisplayBase, FrameRenderer, IdentifierProfile};

/// CAN Bit Decoder - Decode CAN frames from logic-level captures
#[derive(Parser, Debug)]
#[command(name = "can-bit-cli")]
#[command(about = "Decode classic CAN frames from sampled bus captures", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode one or more capture files
    Decode(DecodeArgs),
    /// Write a synthetic capture
    Generate(GenerateArgs),
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Capture files (.bits or .csv)
    #[arg(required = true, value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Bus bit rate in bit/s
    #[arg(long)]
    bit_rate: Option<u32>,

    /// Capture sample rate in samples/s
    #[arg(long)]
    sample_rate: Option<u32>,

    /// CSV column to decode ("Channel N")
    #[arg(long)]
    channel: Option<usize>,

    /// Decompose identifiers with the FRC layout
    #[arg(long)]
    frc: bool,

    /// Numeric display base
    #[arg(long, value_enum)]
    base: Option<DisplayBase>,

    /// Output format (bubbles: one line per packet, fields fitted to their bit time)
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Output file (default: stdout); a directory when decoding several files
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Stop each pass after this many packets
    #[arg(long, value_name = "COUNT")]
    max_packets: Option<usize>,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Output .bits file
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Identifier (decimal or 0x-prefixed hex)
    #[arg(long, value_parser = parse_int, default_value = "0x123")]
    id: u32,

    /// Send a 29-bit identifier
    #[arg(long)]
    extended: bool,

    /// Send a remote frame requesting DLC bytes
    #[arg(long)]
    remote: bool,

    /// Requested length of a remote frame
    #[arg(long, default_value_t = 0)]
    dlc: u8,

    /// Payload bytes (decimal or 0x-prefixed hex), comma separated
    #[arg(long, value_delimiter = ',', value_parser = parse_byte)]
    data: Vec<u8>,

    /// Leave the ACK slot recessive
    #[arg(long)]
    nak: bool,

    /// Number of copies of the frame
    #[arg(long, default_value_t = 1)]
    count: usize,

    /// Bus bit rate in bit/s
    #[arg(long, default_value_t = 1_000_000)]
    bit_rate: u32,

    /// Capture sample rate in samples/s
    #[arg(long, default_value_t = 10_000_000)]
    sample_rate: u32,
}

fn parse_int(text: &str) -> std::result::Result<u32, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|e| format!("invalid number {:?}: {}", text, e))
}

fn parse_byte(text: &str) -> std::result::Result<u8, String> {
    let value = parse_int(text)?;
    u8::try_from(value).map_err(|_| format!("{} does not fit in a byte", value))
}

fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.quiet);

    log::info!("CAN Bit Decoder CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using decoder library v{}", can_bit_decoder::VERSION);

    match cli.command {
        Command::Decode(args) => decode_command(&args),
        Command::Generate(args) => generate_command(&args),
    }
}

/// Merge the config file (if any) with command-line overrides
fn resolve_config(args: &DecodeArgs) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };

    let analyzer = &mut config.analyzer;
    if let Some(bit_rate) = args.bit_rate {
        analyzer.bit_rate = bit_rate;
    }
    if let Some(sample_rate) = args.sample_rate {
        analyzer.sample_rate = sample_rate;
    }
    if let Some(channel) = args.channel {
        analyzer.channel = channel;
    }
    if args.frc {
        analyzer.frc = true;
    }
    if let Some(base) = args.base {
        analyzer.display_base = base;
    }
    if let Some(format) = args.format {
        config.output.format = format;
    }
    if let Some(output) = &args.output {
        config.output.path = Some(output.clone());
    }
    Ok(config)
}

/// Decode every input in parallel, then write results in input order
fn decode_command(args: &DecodeArgs) -> Result<()> {
    let config = resolve_config(args)?;
    let decoder_config = config.analyzer.decoder_config();
    decoder_config.validate().context("Invalid analyzer settings")?;
    let channel = config.analyzer.channel;

    let limit = args.max_packets.map(PacketLimit);
    let cancel: &(dyn Cancellation + Sync) = match &limit {
        Some(limit) => limit,
        None => &NeverCancel,
    };

    let decoded: Vec<Result<DecodeResults>> = args
        .files
        .par_iter()
        .map(|path| -> Result<DecodeResults> {
            let loaded = capture::load_capture(path, channel, &decoder_config)?;
            let decoder = Decoder::new(loaded.decoder_config(&decoder_config))
                .context("Invalid analyzer settings")?;
            let results = decoder.decode_with_cancel(&loaded.samples, cancel);
            log::info!(
                "{:?}: {} frames in {} packets",
                path,
                results.frame_count(),
                results.packet_count()
            );
            Ok(results)
        })
        .collect();

    let renderer = FrameRenderer::new(
        config.analyzer.display_base,
        IdentifierProfile::from_flag(config.analyzer.frc),
    );
    let several = args.files.len() > 1;
    for (path, results) in args.files.iter().zip(decoded) {
        let results = results?;
        match output_path(&config, path, several)? {
            Some(target) => {
                let file = File::create(&target)
                    .with_context(|| format!("Failed to create output file: {:?}", target))?;
                let mut writer = BufWriter::new(file);
                write_results(&mut writer, &results, &config, &renderer)?;
                log::info!("Wrote {:?}", target);
            }
            None => {
                let stdout = io::stdout();
                let mut writer = stdout.lock();
                if several {
                    writeln!(writer, "==> {} <==", path.display())?;
                }
                write_results(&mut writer, &results, &config, &renderer)?;
            }
        }
    }
    Ok(())
}

/// Destination for one input's results; `None` means stdout
fn output_path(config: &AppConfig, input: &Path, several: bool) -> Result<Option<PathBuf>> {
    let Some(path) = &config.output.path else {
        return Ok(None);
    };
    if !several {
        return Ok(Some(path.clone()));
    }
    fs::create_dir_all(path)
        .with_context(|| format!("Failed to create output directory: {:?}", path))?;
    let stem = input.file_stem().unwrap_or(input.as_os_str());
    Ok(Some(path.join(stem).with_extension(config.output.format.extension())))
}

fn write_results<W: Write>(
    writer: &mut W,
    results: &DecodeResults,
    config: &AppConfig,
    renderer: &FrameRenderer,
) -> Result<()> {
    match config.output.format {
        OutputFormat::Txt => export::write_text(writer, results, renderer),
        OutputFormat::Csv => export::write_csv(writer, results, renderer.base),
        OutputFormat::Json => export::write_json(writer, results),
        OutputFormat::Bubbles => {
            let samples_per_bit = config.analyzer.decoder_config().samples_per_bit();
            export::write_bubbles(writer, results, renderer, samples_per_bit)
        }
    }
}

/// Render the requested frame into a .bits file
fn generate_command(args: &GenerateArgs) -> Result<()> {
    let id = if args.extended {
        if args.id > 0x1FFF_FFFF {
            bail!("Extended identifier {:#X} exceeds 29 bits", args.id);
        }
        CanId::Extended(args.id)
    } else {
        if args.id > 0x7FF {
            bail!("Standard identifier {:#X} exceeds 11 bits", args.id);
        }
        CanId::Standard(args.id as u16)
    };
    if args.data.len() > 8 {
        bail!("At most 8 data bytes fit in a classic CAN frame");
    }

    let spec = if args.remote {
        FrameSpec::remote(id, args.dlc)
    } else {
        FrameSpec::data(id, &args.data)
    }
    .with_ack(!args.nak);

    let decoder_config = can_bit_decoder::DecoderConfig::new()
        .with_bit_rate(args.bit_rate)
        .with_sample_rate(args.sample_rate);
    decoder_config.validate().context("Invalid bit timing")?;

    let mut builder = CaptureBuilder::from_config(&decoder_config).idle(12);
    for _ in 0..args.count {
        builder = builder.frame(&spec).idle(12);
    }
    let capture = builder.build();

    let mut file = BufWriter::new(
        File::create(&args.output)
            .with_context(|| format!("Failed to create capture file: {:?}", args.output))?,
    );
    writeln!(
        file,
        "# {} x {:?} at {} bit/s, {} samples/s",
        args.count, spec.id, args.bit_rate, args.sample_rate
    )?;
    writeln!(file, "{}", capture.to_bit_string())?;
    file.flush()?;

    log::info!("Wrote {} samples to {:?}", capture.len(), args.output);
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
