//! `tsgap`: fill missing rows in regularly sampled CSV and Parquet series.

mod error;
mod input;
mod inspect;
mod options;
mod output;

use std::{
    io::{self, Write},
    path::PathBuf,
};

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;
use snafu::ResultExt;
use timeseries_gapfill_core::{FillMode, fill_gaps_with};

use crate::{
    error::{CliResult, StdoutSnafu},
    input::{InputFormat, load_batch},
    inspect::write_inspection,
    options::{FillFlags, build_options},
    output::{FillSummary, OutputFormat, write_batch_to, write_preview, write_summary},
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormatArg {
    Csv,
    Jsonl,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(v: OutputFormatArg) -> Self {
        match v {
            OutputFormatArg::Csv => OutputFormat::Csv,
            OutputFormatArg::Jsonl => OutputFormat::Jsonl,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum InputFormatArg {
    Csv,
    Parquet,
}

impl From<InputFormatArg> for InputFormat {
    fn from(v: InputFormatArg) -> Self {
        match v {
            InputFormatArg::Csv => InputFormat::Csv,
            InputFormatArg::Parquet => InputFormat::Parquet,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Fill every gap
    All,
    /// Insert a single null row per gap
    Break,
}

impl From<ModeArg> for FillMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::All => FillMode::All,
            ModeArg::Break => FillMode::Break,
        }
    }
}

/// Where the series comes from and how the key is chosen.
#[derive(Debug, Args)]
struct SourceArgs {
    /// CSV or Parquet file
    #[arg(long)]
    input: PathBuf,

    /// Input format (default: from the file extension)
    #[arg(long = "input-format", value_enum)]
    input_format: Option<InputFormatArg>,

    /// Key column (default: the column carrying interval metadata)
    #[arg(long)]
    key: Option<String>,

    /// Sampling interval: a bare number in the key's units, or e.g. 500ms, 30s, 15m, 1h, 1d
    #[arg(long)]
    interval: Option<String>,

    /// JSON file with fill options; flags override its fields
    #[arg(long)]
    options: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Insert null rows wherever the key skips one or more intervals
    Fill {
        #[command(flatten)]
        source: SourceArgs,

        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Extend the series backwards down to this key value
        #[arg(long = "range-min", allow_negative_numbers = true)]
        range_min: Option<f64>,

        /// Extend the series forwards up to this key value
        #[arg(long = "range-max", allow_negative_numbers = true)]
        range_max: Option<f64>,

        /// Skip filling if the output would exceed this many rows
        #[arg(long = "max-output-rows")]
        max_output_rows: Option<usize>,

        /// Write the filled table here instead of previewing it
        #[arg(long)]
        output: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = OutputFormatArg::Csv)]
        format: OutputFormatArg,

        /// Rows shown in the preview
        #[arg(long, default_value_t = 20)]
        max_rows: usize,
    },

    /// Show columns, interval metadata and the key column `fill` would use
    Inspect {
        #[command(flatten)]
        source: SourceArgs,
    },
}

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

struct FillArgs {
    source: SourceArgs,
    mode: Option<ModeArg>,
    range_min: Option<f64>,
    range_max: Option<f64>,
    max_output_rows: Option<usize>,
    output: Option<PathBuf>,
    format: OutputFormatArg,
    max_rows: usize,
}

fn fill_flags(source: &SourceArgs) -> FillFlags {
    FillFlags {
        options_file: source.options.clone(),
        key: source.key.clone(),
        interval: source.interval.clone(),
        ..FillFlags::default()
    }
}

fn cmd_fill(args: FillArgs) -> CliResult<()> {
    let batch = load_batch(&args.source.input, args.source.input_format.map(Into::into))?;

    let flags = FillFlags {
        mode: args.mode.map(Into::into),
        range_min: args.range_min,
        range_max: args.range_max,
        max_output_rows: args.max_output_rows,
        ..fill_flags(&args.source)
    };
    let options = build_options(&flags, &batch)?;

    let res = fill_gaps_with(&batch, &options);
    let summary = FillSummary {
        rows_in: batch.num_rows(),
        rows_out: res.batch.num_rows(),
        outcome: res.outcome,
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match &args.output {
        Some(path) => {
            write_batch_to(path, args.format.into(), &res.batch)?;
            info!("wrote {} rows to {}", summary.rows_out, path.display());
            write_summary(&summary, &mut out)?;
            writeln!(out, "wrote: {}", path.display()).context(StdoutSnafu)?;
        }
        None => write_preview(&res.batch, &summary, args.max_rows, &mut out)?,
    }
    out.flush().context(StdoutSnafu)
}

fn cmd_inspect(source: SourceArgs) -> CliResult<()> {
    let batch = load_batch(&source.input, source.input_format.map(Into::into))?;
    let options = build_options(&fill_flags(&source), &batch)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_inspection(&batch, &options, &mut out)?;
    out.flush().context(StdoutSnafu)
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Command::Fill {
            source,
            mode,
            range_min,
            range_max,
            max_output_rows,
            output,
            format,
            max_rows,
        } => cmd_fill(FillArgs {
            source,
            mode,
            range_min,
            range_max,
            max_output_rows,
            output,
            format,
            max_rows,
        }),

        Command::Inspect { source } => cmd_inspect(source),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
