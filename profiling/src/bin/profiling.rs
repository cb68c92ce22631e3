use clap::Parser;
use doceval::{
    evaluate_files, DivByZeroStrat, EvalConfigBuilder, FailurePolicy, GroundTruth, InputFile,
    LabelVocabulary, OrphanInside, RawRow, TagFormat, UnknownLabelPolicy,
};
use serde_jsonlines::json_lines;
use std::error::Error;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Evaluates JSON-lines files of token rows, one row per line, and prints the per-file table and
/// the global report.
#[derive(Debug, Parser)]
struct Args {
    /// JSON-lines files, one per evaluated document.
    #[arg(required = true)]
    files: Vec<PathBuf>,
    #[arg(short, long, default_value_t = 1)]
    n_samples: u32,
    /// Label names, one per line; line `i` names the code `i`.
    #[arg(short, long)]
    labels: Option<PathBuf>,
    #[arg(long, default_value_t = DivByZeroStrat::ReplaceBy0)]
    zero_division: DivByZeroStrat,
    #[arg(long, default_value_t = OrphanInside::Begin)]
    orphan_inside: OrphanInside,
    #[arg(long, default_value_t = UnknownLabelPolicy::PassThrough)]
    unknown_label: UnknownLabelPolicy,
    #[arg(long, default_value_t = GroundTruth::Labels)]
    ground_truth: GroundTruth,
    #[arg(long, default_value_t = TagFormat::Bio)]
    gold_format: TagFormat,
    #[arg(long, default_value_t = TagFormat::Bio)]
    pred_format: TagFormat,
    #[arg(long, default_value_t = 20)]
    top_confusions: usize,
    #[arg(short, long)]
    parallel: bool,
    /// Stop at the first file that cannot be evaluated.
    #[arg(long)]
    abort: bool,
}

fn load<P: AsRef<Path>>(path: P) -> Result<InputFile, Box<dyn Error>> {
    let rows = json_lines::<RawRow, _>(path.as_ref())?.collect::<Result<Vec<_>, _>>()?;
    let name = path
        .as_ref()
        .file_name()
        .map_or_else(|| path.as_ref().display().to_string(), |n| n.to_string_lossy().into_owned());
    Ok(InputFile::new(name, rows))
}

fn load_vocabulary<P: AsRef<Path>>(path: P) -> Result<LabelVocabulary, Box<dyn Error>> {
    Ok(read_to_string(path)?
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect())
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut builder = EvalConfigBuilder::new()
        .division_by_zero(args.zero_division)
        .orphan_inside(args.orphan_inside)
        .unknown_label(args.unknown_label)
        .ground_truth(args.ground_truth)
        .gold_format(args.gold_format)
        .pred_format(args.pred_format)
        .top_confusions(args.top_confusions)
        .parallel(args.parallel);
    if let Some(path) = args.labels.as_ref() {
        builder = builder.vocabulary(Arc::new(load_vocabulary(path)?));
    }
    let config = builder.build();
    info!("{}", config);

    let files = args.files.iter().map(load).collect::<Result<Vec<_>, _>>()?;
    let policy = if args.abort {
        FailurePolicy::Abort
    } else {
        FailurePolicy::Skip
    };

    let mut total_duration = Duration::ZERO;
    let mut summary = None;
    for _ in 0..args.n_samples {
        let now = Instant::now();
        summary = Some(evaluate_files(&files, &config, policy)?);
        total_duration += now.elapsed();
    }
    if let Some(summary) = summary {
        println!("{}", summary);
    }
    println!(
        "Total duration: {} with {} samples",
        total_duration.as_secs_f64(),
        args.n_samples
    );
    Ok(())
}
