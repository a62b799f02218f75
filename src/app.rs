//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and initialises logging
//! - parses CLI arguments
//! - runs the ingest/aggregate/index pipeline
//! - writes the index CSV and prints the summary

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{BuildArgs, Command, DatesArgs, WeightsArgs};
use crate::domain::{IndexConfig, NumberFormat, ProductWeights};
use crate::error::AppError;
use crate::io::ingest::{COLLECTION_DATE_FORMAT, parse_collection_date, read_collected_dates};
use crate::io::weights::{read_weights_json, write_weights_json};

pub mod pipeline;

/// Entry point for the `billy` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Build(args) => handle_build(args),
        Command::Dates(args) => handle_dates(args),
        Command::Weights(args) => handle_weights(args),
    }
}

/// Log to stderr, filtered by `RUST_LOG` (default `info`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_build(args: BuildArgs) -> Result<(), AppError> {
    let config = index_config_from_args(&args)?;
    let run = pipeline::run_index(&config)?;
    let written = pipeline::export(&run, &config)?;
    info!(path = %config.output_path.display(), "File generated successfully");

    if config.print_summary {
        println!(
            "{}",
            crate::report::format_run_summary(&run.ingest, &run.aggregation, &run.report, &config, written)
        );
    }
    Ok(())
}

fn handle_dates(args: DatesArgs) -> Result<(), AppError> {
    let dates = read_collected_dates(&args.input, delimiter_byte(args.delimiter))?;

    let check = match args.check.as_deref() {
        None => None,
        Some("today") => Some(
            chrono::Local::now()
                .date_naive()
                .format(COLLECTION_DATE_FORMAT)
                .to_string(),
        ),
        Some(raw) => Some(
            parse_collection_date(raw)
                .map_err(AppError::input)?
                .format(COLLECTION_DATE_FORMAT)
                .to_string(),
        ),
    };

    let present = check.as_ref().map(|d| dates.contains(d));
    let check_view = check.as_deref().zip(present);
    println!("{}", crate::report::format_collected_dates(&dates, check_view));

    if let Some((date, true)) = check_view {
        return Err(AppError::new(
            AppError::ALREADY_COLLECTED,
            format!("Data for {date} already exists."),
        ));
    }
    Ok(())
}

fn handle_weights(args: WeightsArgs) -> Result<(), AppError> {
    let weights = load_weights(args.weights.as_deref())?;
    for (product, weight) in weights.iter() {
        println!("{weight:>6.3}  {product}");
    }
    if let Some(path) = &args.export {
        write_weights_json(path, &weights)?;
        info!(path = %path.display(), "weights exported");
    }
    Ok(())
}

fn load_weights(path: Option<&std::path::Path>) -> Result<ProductWeights, AppError> {
    match path {
        Some(p) => read_weights_json(p),
        None => Ok(ProductWeights::default()),
    }
}

pub fn index_config_from_args(args: &BuildArgs) -> Result<IndexConfig, AppError> {
    Ok(IndexConfig {
        input_path: args.input.clone(),
        output_path: args.output.clone(),
        baseline: args.baseline,
        weights: load_weights(args.weights.as_deref())?,
        number_format: NumberFormat {
            decimal: args.decimal,
            group_thousands: args.group_thousands,
        },
        delimiter: delimiter_byte(args.delimiter),
        undefined: args.undefined,
        print_summary: !args.quiet,
    })
}

/// The CLI only accepts ASCII delimiters, so this never truncates.
fn delimiter_byte(c: char) -> u8 {
    u8::try_from(c).unwrap_or(b';')
}

/// Rewrite argv so `billy` defaults to `billy build`.
///
/// Rules:
/// - `billy`                         -> `billy build`
/// - `billy -i prices.csv ...`       -> `billy build -i prices.csv ...`
/// - `billy --help/--version/-h`     -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("build".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "build" | "dates" | "weights");
    if is_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "build flags".
    if arg1.starts_with('-') {
        argv.insert(1, "build".to_string());
        return argv;
    }

    argv
}
