//! tfrec: TFRecord container and `tf.Example` codec.
//!
//! tfrec writes and reads the files TensorFlow's object-detection pipelines
//! train from. It builds `Example` messages from typed features with a small
//! hand-written protobuf encoder, frames them in TFRecord containers with
//! masked CRC32C checksums, and parses such containers back with full
//! checksum validation.
//!
//! # Modules
//!
//! - [`checksum`]: CRC32C, CRC masking and fixed-width little-endian helpers
//! - [`wire`]: protobuf wire encoding for the fixed `Example` schema
//! - [`feature`]: feature types and the insertion-ordered feature map
//! - [`builder`]: `TfRecordsBuilder` and container framing
//! - [`reader`]: `TfRecordsReader`, corruption reporting and feature lookup
//! - [`io`]: reading and writing containers on disk
//! - [`error`]: Error types for tfrec operations
//!
//! # Example
//!
//! ```
//! use tfrec::{build_tfrecords, FeatureType, FeatureValues, TfRecordsBuilder, TfRecordsReader};
//!
//! let mut builder = TfRecordsBuilder::new();
//! builder.add_feature("image/width", FeatureType::Int64, 640)?;
//! let container = build_tfrecords(&[builder.build()]);
//!
//! let reader = TfRecordsReader::new(&container)?;
//! assert_eq!(
//!     reader.get_feature(0, "image/width", FeatureType::Int64)?,
//!     FeatureValues::Int64s(vec![640])
//! );
//! # Ok::<(), tfrec::TfrecError>(())
//! ```

pub mod builder;
pub mod checksum;
pub mod error;
pub mod feature;
pub mod io;
pub mod reader;
pub mod wire;

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

pub use builder::{build_tfrecords, write_record, TfRecordsBuilder};
pub use error::{FeatureNotFound, TfrecError};
pub use feature::{Feature, FeatureKind, FeatureType, FeatureValue, FeatureValues, Features};
pub use io::{read_tfrecords, write_tfrecords};
pub use reader::{Corruption, CorruptionKind, ParseStatus, ReadOptions, TfRecordsReader};

/// The tfrec CLI application.
#[derive(Parser)]
#[command(name = "tfrec")]
#[command(version, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Print the records and features of a TFRecords file.
    Inspect(InspectArgs),
    /// Check every frame checksum of a TFRecords file.
    Verify(VerifyArgs),
}

/// Arguments for the inspect subcommand.
#[derive(clap::Args)]
struct InspectArgs {
    /// TFRecords file to inspect.
    input: PathBuf,

    /// Show the records before a corrupt frame instead of failing.
    #[arg(long)]
    lenient: bool,

    /// Output format ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,
}

/// Arguments for the verify subcommand.
#[derive(clap::Args)]
struct VerifyArgs {
    /// TFRecords file to verify.
    input: PathBuf,

    /// Output format for the report ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,
}

/// Run the tfrec CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), TfrecError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Commands::Inspect(args)) => run_inspect(args),
        Some(Commands::Verify(args)) => run_verify(args),
        None => {
            println!("tfrec {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("TFRecord container and tf.Example codec.");
            println!();
            println!("Run 'tfrec --help' for usage information.");
            Ok(())
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .try_init();
}

/// Execute the inspect subcommand.
fn run_inspect(args: InspectArgs) -> Result<(), TfrecError> {
    let opts = ReadOptions {
        lenient: args.lenient,
    };
    let reader = read_tfrecords(&args.input, &opts)?;

    match args.output.as_str() {
        "json" => println!("{}", reader.to_json_string()?),
        "text" => {
            println!("{} record(s)", reader.len());
            for index in 0..reader.len() {
                let features = reader.example(index)?;
                println!();
                println!("Record {} ({} feature(s))", index, features.len());
                for (key, feature) in features.iter() {
                    println!("  {}: {} [{}]", key, feature.kind(), describe_values(feature));
                }
            }
            if let Some(corruption) = reader.corruption() {
                println!();
                println!("Stopped early: {}", corruption);
            }
        }
        other => {
            return Err(TfrecError::UnsupportedFormat(format!(
                "'{}' (supported: text, json)",
                other
            )));
        }
    }

    Ok(())
}

/// Short rendering of a feature's values for text output.
fn describe_values(feature: &Feature) -> String {
    const MAX_SHOWN: usize = 8;

    let mut parts: Vec<String> = match feature {
        Feature::Int64List(values) => values.iter().take(MAX_SHOWN).map(i64::to_string).collect(),
        Feature::FloatList(values) => values.iter().take(MAX_SHOWN).map(f32::to_string).collect(),
        Feature::BytesList(values) => values
            .iter()
            .take(MAX_SHOWN)
            .map(|bytes| match std::str::from_utf8(bytes) {
                Ok(text) if text.len() <= 64 => format!("{:?}", text),
                _ => format!("<{} bytes>", bytes.len()),
            })
            .collect(),
    };
    if feature.len() > MAX_SHOWN {
        parts.push(format!("... {} more", feature.len() - MAX_SHOWN));
    }
    parts.join(", ")
}

/// Execute the verify subcommand.
fn run_verify(args: VerifyArgs) -> Result<(), TfrecError> {
    let reader = read_tfrecords(&args.input, &ReadOptions { lenient: true })?;

    match args.output.as_str() {
        "json" => {
            let report = serde_json::json!({
                "records": reader.len(),
                "corruption": reader.corruption(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "text" => match reader.status() {
            ParseStatus::Complete => println!("OK: {} record(s)", reader.len()),
            ParseStatus::Partial(corruption) => println!("CORRUPT: {}", corruption),
        },
        other => {
            return Err(TfrecError::UnsupportedFormat(format!(
                "'{}' (supported: text, json)",
                other
            )));
        }
    }

    match reader.corruption() {
        Some(corruption) => Err(corruption.clone().into()),
        None => Ok(()),
    }
}
