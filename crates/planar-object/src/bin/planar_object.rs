//! Command-line front end: learn a reference patch, find it in images.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use planar_object::detect;
use planar_object::detector::{rect_from_spec, DetectConfig, QueryReport, RoiSpec};
use planar_object::{FernClassifier, FernParams, PlanarDetectorParams, PlanarObjectDetector};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(
    name = "planar-object",
    about = "Learn a planar patch from one image and locate it in others",
    version
)]
struct Cli {
    /// Log debug messages.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Learn a reference region and record it in a model archive.
    Train(TrainArgs),
    /// Search one image for a recorded reference model.
    Detect(DetectArgs),
    /// Train and detect as described by a JSON config.
    Run(RunArgs),
}

#[derive(Args)]
struct TrainArgs {
    /// Reference image.
    #[arg(long)]
    image: PathBuf,

    /// Reference region as `x,y,width,height`; the whole image when omitted.
    #[arg(long, value_parser = parse_roi)]
    roi: Option<RoiSpec>,

    /// Model archive (JSON). Created if missing; other records are kept.
    #[arg(long)]
    model: PathBuf,

    /// Record name inside the archive.
    #[arg(long, default_value = "object")]
    name: String,

    /// Fern parameters as JSON.
    #[arg(long)]
    fern_config: Option<PathBuf>,
}

#[derive(Args)]
struct DetectArgs {
    /// Query image.
    #[arg(long)]
    image: PathBuf,

    #[arg(long)]
    model: PathBuf,

    #[arg(long, default_value = "object")]
    name: String,

    /// Match region as `x,y,width,height`.
    #[arg(long, value_parser = parse_roi)]
    roi: Option<RoiSpec>,

    /// Inliers required to accept a detection.
    #[arg(long)]
    min_inliers: Option<usize>,

    /// Write the report here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args)]
struct RunArgs {
    #[arg(long)]
    config: PathBuf,
}

fn parse_roi(raw: &str) -> Result<RoiSpec, String> {
    let values: Vec<i32> = raw
        .split(',')
        .map(|v| v.trim().parse::<i32>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid ROI {raw:?}: {e}"))?;
    let spec: RoiSpec = values
        .try_into()
        .map_err(|_| format!("ROI must be x,y,width,height, got {raw:?}"))?;
    rect_from_spec(spec).map_err(|e| e.to_string())?;
    Ok(spec)
}

fn init_logging(verbose: bool) -> CliResult<()> {
    #[cfg(feature = "tracing")]
    {
        let _ = tracing_log::LogTracer::init();
        planar_object::core::init_tracing(false, if verbose { "debug" } else { "info" });
    }
    #[cfg(not(feature = "tracing"))]
    {
        let level = if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        planar_object::core::init_with_level(level)?;
    }
    Ok(())
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    match cli.command {
        Commands::Train(args) => run_train(&args),
        Commands::Detect(args) => run_detect(&args),
        Commands::Run(args) => run_config(&args),
    }
}

fn run_train(args: &TrainArgs) -> CliResult<()> {
    let fern = match &args.fern_config {
        Some(path) => serde_json::from_str::<FernParams>(&std::fs::read_to_string(path)?)?,
        None => FernParams::default(),
    };
    let mut detector =
        PlanarObjectDetector::new(FernClassifier::new(fern), PlanarDetectorParams::default());

    let img = detect::load_gray(&args.image)?;
    let roi = args.roi.map(rect_from_spec).transpose()?;
    let n = detect::build_reference_from_image(&mut detector, &img, roi)?;
    if n == 0 {
        let msg = format!(
            "no interest points in the reference region of {}",
            args.image.display()
        );
        return Err(msg.into());
    }
    detector.record_detector(&args.name, &args.model)?;
    log::info!(
        "recorded {n} reference points as {:?} in {}",
        args.name,
        args.model.display()
    );
    Ok(())
}

fn run_detect(args: &DetectArgs) -> CliResult<()> {
    let mut params = PlanarDetectorParams::default();
    if let Some(n) = args.min_inliers {
        params.min_inlier_count = n;
    }
    let detector =
        PlanarObjectDetector::from_file(&args.model, &args.name, FernClassifier::default(), params)?;

    let img = detect::load_gray(&args.image)?;
    let roi = args.roi.map(rect_from_spec).transpose()?;
    let result = detect::match_image(&detector, &img, roi)?;
    log::info!(
        "{}: {} with {} inliers",
        args.image.display(),
        if result.accepted { "found" } else { "not found" },
        result.inlier_count
    );

    let report = QueryReport::from_result(args.image.display().to_string(), &result);
    let json = serde_json::to_string_pretty(&report)?;
    match &args.out {
        Some(path) => std::fs::write(path, json)?,
        None => println!("{json}"),
    }
    Ok(())
}

fn run_config(args: &RunArgs) -> CliResult<()> {
    let cfg = DetectConfig::load_json(&args.config)?;
    let report = detect::run_config(&cfg)?;
    let out = cfg.output_path();
    report.write_json(&out)?;
    log::info!(
        "{} of {} queries found, report written to {}",
        report.accepted_count(),
        report.queries.len(),
        out.display()
    );
    Ok(())
}
