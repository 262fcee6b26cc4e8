//! cococonv: COCO detection annotations to Pascal VOC and YOLO.
//!
//! Converts one COCO JSON file per split into per-image VOC XML or YOLO text
//! records, repairing boxes that can be repaired and dropping the rest, and
//! reads emitted datasets back to verify them.
//!
//! # Modules
//!
//! - [`ir`]: Typed records, box conventions and the on-disk formats
//! - [`index`]: Split-aware annotation index over the source files
//! - [`normalize`]: Box validation, repair and convention conversion
//! - [`classes`]: Class allow-list filtering and dense index remapping
//! - [`conversion`]: The conversion pass and the VOC/YOLO emitters
//! - [`verify`]: Reading emitted datasets back and reporting discrepancies
//! - [`validation`]: Checking a source for boxes that need repair
//! - [`error`]: Error types for cococonv operations

pub mod classes;
pub mod conversion;
pub mod error;
pub mod index;
pub mod ir;
pub mod normalize;
pub mod validation;
pub mod verify;

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

pub use error::CococonvError;

use conversion::{ConvertOptions, TargetFormat};
use index::AnnotationIndex;
use ir::Split;
use normalize::{RepairPolicy, ZeroExtent};

/// The cococonv CLI application.
#[derive(Parser)]
#[command(name = "cococonv")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert COCO annotations to VOC or YOLO.
    Convert(ConvertArgs),
    /// Report boxes in a COCO file that a conversion would repair or drop.
    Check(CheckArgs),
    /// Read an emitted VOC or YOLO dataset back and report discrepancies.
    Verify(VerifyArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatArg {
    Voc,
    Yolo,
}

impl From<FormatArg> for TargetFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Voc => TargetFormat::Voc,
            FormatArg::Yolo => TargetFormat::Yolo,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SplitArg {
    Train,
    Val,
}

impl From<SplitArg> for Split {
    fn from(value: SplitArg) -> Self {
        match value {
            SplitArg::Train => Split::Train,
            SplitArg::Val => Split::Val,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

#[derive(clap::Args)]
struct ConvertArgs {
    /// COCO JSON file of the train split.
    #[arg(long)]
    train: PathBuf,

    /// COCO JSON file of the val split.
    #[arg(long)]
    val: Option<PathBuf>,

    /// Output format.
    #[arg(long, value_enum)]
    to: FormatArg,

    /// Output directory.
    #[arg(short, long)]
    output: PathBuf,

    /// Comma-separated class names to keep, in output index order.
    #[arg(long, value_delimiter = ',', env = "COCOCONV_CLASSES")]
    classes: Option<Vec<String>>,

    /// Only write classes.txt.
    #[arg(long)]
    classes_only: bool,

    /// Grow zero-width or zero-height boxes by one pixel instead of dropping them.
    #[arg(long)]
    expand_zero_extent: bool,

    /// Directory holding the train images; emitted images are linked into the output.
    #[arg(long)]
    train_images: Option<PathBuf>,

    /// Directory holding the val images.
    #[arg(long)]
    val_images: Option<PathBuf>,

    /// Report format.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    report: ReportFormat,
}

#[derive(clap::Args)]
struct CheckArgs {
    /// COCO JSON file to check.
    input: PathBuf,

    /// Split the file belongs to (labels the report).
    #[arg(long, value_enum, default_value_t = SplitArg::Train)]
    split: SplitArg,

    /// Fail on boxes that would be repaired, not only on boxes that would be dropped.
    #[arg(long)]
    strict: bool,

    /// Predict outcomes as if zero-extent boxes were expanded.
    #[arg(long)]
    expand_zero_extent: bool,

    /// Report format.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    report: ReportFormat,
}

#[derive(clap::Args)]
struct VerifyArgs {
    /// Root of the emitted dataset.
    root: PathBuf,

    /// Format of the dataset.
    #[arg(long, value_enum)]
    format: FormatArg,

    /// Source COCO JSON file(s) supplying image dimensions.
    #[arg(long = "source")]
    sources: Vec<PathBuf>,

    /// Report format.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    report: ReportFormat,
}

/// Run the cococonv CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), CococonvError> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Convert(args)) => run_convert(args),
        Some(Commands::Check(args)) => run_check(args),
        Some(Commands::Verify(args)) => run_verify(args),
        None => {
            println!("cococonv {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("COCO to Pascal VOC / YOLO annotation converter.");
            println!();
            println!("Run 'cococonv --help' for usage information.");
            Ok(())
        }
    }
}

fn repair_policy(expand_zero_extent: bool) -> RepairPolicy {
    RepairPolicy {
        zero_extent: if expand_zero_extent {
            ZeroExtent::ExpandOnePixel
        } else {
            ZeroExtent::Drop
        },
    }
}

fn print_report<T: Serialize + std::fmt::Display>(
    report: &T,
    format: ReportFormat,
) -> Result<(), CococonvError> {
    match format {
        ReportFormat::Json => {
            let json = serde_json::to_string_pretty(report).map_err(CococonvError::ReportJson)?;
            println!("{json}");
        }
        ReportFormat::Text => print!("{report}"),
    }
    Ok(())
}

fn run_convert(args: ConvertArgs) -> Result<(), CococonvError> {
    let mut sources = vec![(Split::Train, args.train)];
    if let Some(val) = args.val {
        sources.push((Split::Val, val));
    }
    let index = AnnotationIndex::load(&sources)?;

    let mut image_dirs = BTreeMap::new();
    if let Some(dir) = args.train_images {
        image_dirs.insert(Split::Train, dir);
    }
    if let Some(dir) = args.val_images {
        image_dirs.insert(Split::Val, dir);
    }

    let options = ConvertOptions {
        output_root: args.output,
        target: args.to.into(),
        allow_list: args.classes,
        classes_only: args.classes_only,
        repair: repair_policy(args.expand_zero_extent),
        image_dirs,
    };

    let summary = conversion::convert(&index, &options)?;
    print_report(&summary, args.report)
}

fn run_check(args: CheckArgs) -> Result<(), CococonvError> {
    let index = AnnotationIndex::load(&[(args.split.into(), args.input)])?;
    let opts = validation::CheckOptions {
        strict: args.strict,
        repair: repair_policy(args.expand_zero_extent),
    };
    let report = validation::check_source(&index, &opts);
    print_report(&report, args.report)?;

    if validation::check_failed(&report, &opts) {
        Err(CococonvError::CheckFailed {
            error_count: report.error_count(),
            warning_count: report.warning_count(),
            report,
        })
    } else {
        Ok(())
    }
}

fn run_verify(args: VerifyArgs) -> Result<(), CococonvError> {
    let opts = verify::VerifyOptions::from_sources(&args.sources)?;
    let report = verify::verify_dir(&args.root, args.format.into(), &opts)?;
    print_report(&report, args.report)?;

    if report.is_ok() {
        Ok(())
    } else {
        Err(CococonvError::VerificationFailed {
            discrepancy_count: report.discrepancy_count(),
            image_count: report.image_count(),
            report,
        })
    }
}
