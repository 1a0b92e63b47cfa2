use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};

mod dates;
mod detect;
mod error;
mod io;
mod models;
mod pipeline;
mod report;
mod reshape;
mod resolve;
mod status;
mod totals;

use crate::io::OutputFormat;
use crate::models::{RawTable, RoleAssignment, Shape};
use crate::pipeline::{Conversion, ConvertOptions};
use crate::report::CellEdit;
use crate::resolve::{NoOverrides, OverrideSource, PositionalDefaults, Prompt};

#[derive(Parser)]
#[command(name = "attendance-report")]
#[command(about = "Turn attendance sheets into per-student attendance reports", long_about = None)]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which column was detected for each role
    Detect {
        #[command(flatten)]
        input: InputArgs,
        /// Print the detection as JSON
        #[arg(long)]
        json: bool,
    },
    /// Convert a sheet into the attendance report
    Convert {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        conversion: ConversionArgs,
        /// Output file; defaults to <input>_attendance_report.<format>
        #[arg(long)]
        out: Option<PathBuf>,
        /// Output format; inferred from --out when omitted
        #[arg(long, value_enum)]
        format: Option<CliFormat>,
    },
    /// Write per-student attendance statistics as markdown
    Summary {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        conversion: ConversionArgs,
        /// Markdown file to write; prints to stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Attendance sheet (.csv, .xlsx, .xls, .xlsm, .xlsb, .ods)
    #[arg(long)]
    input: PathBuf,
    /// Worksheet to read; defaults to the first one
    #[arg(long)]
    sheet: Option<String>,
    #[arg(long)]
    name_col: Option<String>,
    #[arg(long)]
    roll_col: Option<String>,
    #[arg(long)]
    date_col: Option<String>,
    #[arg(long)]
    status_col: Option<String>,
    #[arg(long)]
    time_col: Option<String>,
    /// Input layout
    #[arg(long, value_enum, default_value_t = CliShape::Auto)]
    shape: CliShape,
}

impl InputArgs {
    fn overrides(&self) -> RoleAssignment {
        RoleAssignment {
            name: self.name_col.clone(),
            roll: self.roll_col.clone(),
            date: self.date_col.clone(),
            status: self.status_col.clone(),
            time: self.time_col.clone(),
        }
    }

    fn load(&self) -> anyhow::Result<RawTable> {
        let table = io::load_table(&self.input, self.sheet.as_deref())
            .with_context(|| format!("failed to load {}", self.input.display()))?;
        tracing::info!(
            input = %self.input.display(),
            rows = table.row_count(),
            columns = table.columns().len(),
            "table loaded"
        );
        Ok(table)
    }
}

#[derive(Args)]
struct ConversionArgs {
    /// How to fill roles that detection could not settle
    #[arg(long, value_enum, default_value_t = CliResolve::Fail)]
    resolve: CliResolve,
    /// chrono format for date column labels
    #[arg(long, env = "ATTENDANCE_DATE_FORMAT", default_value = dates::DEFAULT_DISPLAY_FORMAT)]
    date_format: String,
    /// Fail when a status value is not P, A, I or a known synonym
    #[arg(long)]
    strict: bool,
    /// Manual correction, e.g. --set 12@2025-01-02=A (repeatable)
    #[arg(long = "set", value_name = "ROLL@DATE=CODE")]
    edits: Vec<CellEdit>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliShape {
    /// Pick from the headers
    Auto,
    /// One row per attendance event
    Long,
    /// One column per date
    Wide,
}

impl From<CliShape> for Option<Shape> {
    fn from(cli: CliShape) -> Self {
        match cli {
            CliShape::Auto => None,
            CliShape::Long => Some(Shape::Long),
            CliShape::Wide => Some(Shape::Wide),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliResolve {
    /// Stop with an error
    Fail,
    /// Name, date and status in the first three free columns
    Positional,
    /// Ask on the terminal
    Prompt,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliFormat {
    Csv,
    Xlsx,
    Json,
}

impl From<CliFormat> for OutputFormat {
    fn from(cli: CliFormat) -> Self {
        match cli {
            CliFormat::Csv => OutputFormat::Csv,
            CliFormat::Xlsx => OutputFormat::Xlsx,
            CliFormat::Json => OutputFormat::Json,
        }
    }
}

fn init_logging(level: &str, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run_conversion(
    input: &InputArgs,
    conversion: ConversionArgs,
) -> anyhow::Result<Conversion> {
    let table = input.load()?;
    let options = ConvertOptions {
        overrides: input.overrides(),
        shape: input.shape.into(),
        display_format: conversion.date_format,
        strict: conversion.strict,
        edits: conversion.edits,
    };

    let mut resolver: Box<dyn OverrideSource> = match conversion.resolve {
        CliResolve::Fail => Box::new(NoOverrides),
        CliResolve::Positional => Box::new(PositionalDefaults),
        CliResolve::Prompt => Box::new(Prompt::new(std::io::stdin().lock(), std::io::stderr())),
    };

    pipeline::convert(&table, &options, resolver.as_mut())
        .with_context(|| format!("failed to convert {}", input.input.display()))
}

fn output_target(
    input: &Path,
    out: Option<PathBuf>,
    format: Option<CliFormat>,
) -> (PathBuf, OutputFormat) {
    let format: Option<OutputFormat> = format.map(Into::into);
    match out {
        Some(path) => {
            let format = format
                .or_else(|| OutputFormat::from_path(&path))
                .unwrap_or(OutputFormat::Xlsx);
            (path, format)
        }
        None => {
            let format = format.unwrap_or(OutputFormat::Xlsx);
            (io::default_output_path(input, format), format)
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.quiet);

    match cli.command {
        Commands::Detect { input, json } => {
            let table = input.load()?;
            let options = ConvertOptions {
                overrides: input.overrides(),
                shape: input.shape.into(),
                ..ConvertOptions::default()
            };
            let plan = pipeline::plan(&table, &options)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
                return Ok(());
            }

            let roles = &plan.detection.roles;
            let show = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
            println!("Shape: {}", plan.shape);
            println!("- Name: {}", show(&roles.name));
            println!("- Roll: {}", show(&roles.roll));
            println!("- Date: {}", show(&roles.date));
            println!("- Status: {}", show(&roles.status));
            println!("- Time: {}", show(&roles.time));
            println!(
                "Status values: {}",
                if plan.detection.numeric_status {
                    "numeric (numbers count as present)"
                } else {
                    "text"
                }
            );
            if plan.shape == Shape::Wide {
                println!("Date columns: {}", plan.date_columns.join(", "));
            }
            if plan.missing.is_empty() {
                println!("All required columns found.");
            } else {
                let missing: Vec<String> =
                    plan.missing.iter().map(|role| role.to_string()).collect();
                println!(
                    "Missing: {} (use --name-col/--date-col/--status-col)",
                    missing.join(", ")
                );
            }
        }
        Commands::Convert {
            input,
            conversion,
            out,
            format,
        } => {
            let result = run_conversion(&input, conversion)?;
            let (path, format) = output_target(&input.input, out, format);
            io::write_report(&result.report, &path, format)?;
            tracing::info!(
                out = %path.display(),
                shape = %result.shape,
                numeric_status = result.detection.numeric_status,
                "report written"
            );
            println!(
                "Report for {} students across {} dates written to {}.",
                result.report.records.len(),
                result.report.date_labels.len(),
                path.display()
            );
        }
        Commands::Summary {
            input,
            conversion,
            out,
        } => {
            let result = run_conversion(&input, conversion)?;
            let source = input.input.display().to_string();
            let summary = report::build_summary(&source, &result.report);
            match out {
                Some(path) => {
                    std::fs::write(&path, summary)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Summary written to {}.", path.display());
                }
                None => print!("{summary}"),
            }
        }
    }

    Ok(())
}
