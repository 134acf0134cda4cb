//! Autosens CLI - Command-line interface for Autosens
//!
//! Commands:
//! - detect: Compute the sensitivity ratio from the five input documents
//! - stats: Query percentiles and percent ranks of a number list

use clap::error::ErrorKind;
use clap::{ArgGroup, Parser, Subcommand};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use autosens::report::{diagnostic_lines, progress_markers, report_json, result_json};
use autosens::stats::SortedSeries;
use autosens::{
    AutosensConfig, AutosensError, AutosensInputs, AutosensProcessor, AUTOSENS_VERSION,
};

/// Autosens - Detect insulin sensitivity changes from glucose history
#[derive(Parser)]
#[command(name = "autosens")]
#[command(version = AUTOSENS_VERSION)]
#[command(about = "Detect insulin sensitivity changes from glucose history", long_about = None)]
struct Cli {
    /// Log debug details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the sensitivity ratio
    Detect {
        /// Glucose history (JSON array, most recent first)
        glucose: PathBuf,

        /// Pump history (JSON array)
        pump_history: PathBuf,

        /// Insulin sensitivity factors (JSON object with units)
        isf: PathBuf,

        /// Basal profile (JSON array)
        basal_profile: PathBuf,

        /// Profile (JSON object with sens and max_daily_basal)
        profile: PathBuf,

        /// Detection settings (JSON object)
        #[arg(long)]
        settings: Option<PathBuf>,

        /// Write the full report as JSON to this path
        #[arg(long)]
        report: Option<PathBuf>,

        /// Output file path for the ratio (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Print progress markers even when stderr is not a terminal
        #[arg(long)]
        progress: bool,

        /// Suppress diagnostics
        #[arg(short, long, conflicts_with = "progress")]
        quiet: bool,
    },

    /// Query percentiles and percent ranks
    #[command(group(ArgGroup::new("query").required(true).args(["percentile", "rank"])))]
    Stats {
        /// Values as a JSON array of numbers
        #[arg(short, long)]
        input: String,

        /// Value at percentile p (0.0 to 1.0)
        #[arg(short, long)]
        percentile: Option<f64>,

        /// Percent rank of a value
        #[arg(short, long)]
        rank: Option<f64>,
    },
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(1),
            };
        }
    };

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e.exit_code();
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> Result<(), AutosensCliError> {
    match cli.command {
        Commands::Detect {
            glucose,
            pump_history,
            isf,
            basal_profile,
            profile,
            settings,
            report,
            output,
            progress,
            quiet,
        } => {
            let paths = InputPaths {
                glucose: &glucose,
                pump_history: &pump_history,
                isf: &isf,
                basal_profile: &basal_profile,
                profile: &profile,
            };
            let diagnostics = if quiet {
                Diagnostics::Off
            } else if progress || atty::is(atty::Stream::Stderr) {
                Diagnostics::WithProgress
            } else {
                Diagnostics::Summary
            };
            cmd_detect(paths, settings.as_deref(), report.as_deref(), &output, diagnostics)
        }

        Commands::Stats {
            input,
            percentile,
            rank,
        } => cmd_stats(&input, percentile, rank),
    }
}

struct InputPaths<'a> {
    glucose: &'a Path,
    pump_history: &'a Path,
    isf: &'a Path,
    basal_profile: &'a Path,
    profile: &'a Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Diagnostics {
    Off,
    Summary,
    WithProgress,
}

fn cmd_detect(
    paths: InputPaths<'_>,
    settings: Option<&Path>,
    report_path: Option<&Path>,
    output: &Path,
    diagnostics: Diagnostics,
) -> Result<(), AutosensCliError> {
    let config = match settings {
        Some(path) => AutosensConfig::load(path)?,
        None => AutosensConfig::default(),
    };
    let processor = AutosensProcessor::with_config(config)?;

    let glucose = read_input(paths.glucose)?;
    let pump_history = read_input(paths.pump_history)?;
    let isf = read_input(paths.isf)?;
    let basal_profile = read_input(paths.basal_profile)?;
    let profile = read_input(paths.profile)?;

    let report = processor.process_json(AutosensInputs {
        glucose: &glucose,
        pump_history: &pump_history,
        isf: &isf,
        basal_profile: &basal_profile,
        profile: &profile,
    })?;

    if diagnostics != Diagnostics::Off {
        let mut stderr = io::stderr().lock();
        if diagnostics == Diagnostics::WithProgress {
            writeln!(stderr, "{}", progress_markers(&report))?;
        }
        for line in diagnostic_lines(&report) {
            writeln!(stderr, "{}", line)?;
        }
    }

    if let Some(path) = report_path {
        fs::write(path, report_json(&report)?)?;
    }

    write_output(output, &result_json(&report)?)
}

fn cmd_stats(
    input: &str,
    percentile: Option<f64>,
    rank: Option<f64>,
) -> Result<(), AutosensCliError> {
    let values: Vec<f64> = serde_json::from_str(input)?;
    let sorted = SortedSeries::from_unsorted(values).map_err(AutosensError::from)?;

    let answer = match (percentile, rank) {
        (Some(p), _) => serde_json::json!({
            "percentile": p,
            "value": sorted.percentile(p).map_err(AutosensError::from)?,
        }),
        (None, Some(value)) => serde_json::json!({
            "value": value,
            "rank": sorted.percent_rank(value).map_err(AutosensError::from)?,
        }),
        (None, None) => {
            return Err(AutosensCliError::Usage(
                "either --percentile or --rank is required",
            ))
        }
    };

    println!("{}", answer);
    Ok(())
}

fn read_input(path: &Path) -> Result<String, AutosensCliError> {
    fs::read_to_string(path).map_err(|e| AutosensCliError::Read(path.to_path_buf(), e))
}

fn write_output(output: &Path, content: &str) -> Result<(), AutosensCliError> {
    if output.to_string_lossy() == "-" {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", content)?;
        stdout.flush()?;
    } else {
        fs::write(output, format!("{}\n", content))?;
    }
    Ok(())
}

// Error types

#[derive(Debug)]
enum AutosensCliError {
    Io(io::Error),
    Read(PathBuf, io::Error),
    Json(serde_json::Error),
    Compute(AutosensError),
    Usage(&'static str),
}

impl AutosensCliError {
    fn exit_code(&self) -> u8 {
        match self {
            AutosensCliError::Compute(e) => e.exit_code(),
            AutosensCliError::Json(_) => 4,
            _ => 1,
        }
    }
}

impl From<io::Error> for AutosensCliError {
    fn from(e: io::Error) -> Self {
        AutosensCliError::Io(e)
    }
}

impl From<AutosensError> for AutosensCliError {
    fn from(e: AutosensError) -> Self {
        AutosensCliError::Compute(e)
    }
}

impl From<serde_json::Error> for AutosensCliError {
    fn from(e: serde_json::Error) -> Self {
        AutosensCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<AutosensCliError> for CliError {
    fn from(e: AutosensCliError) -> Self {
        match e {
            AutosensCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            AutosensCliError::Read(path, e) => CliError {
                code: "MISSING_INPUT".to_string(),
                message: format!("{}: {}", path.display(), e),
                hint: Some(
                    concat!(
                        "Usage: autosens detect <glucose.json> <pumphistory.json> ",
                        "<insulin_sensitivities.json> <basal_profile.json> <profile.json>"
                    )
                    .to_string(),
                ),
            },
            AutosensCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            AutosensCliError::Compute(e) => {
                let (code, hint) = match &e {
                    AutosensError::MissingInput(_) => {
                        ("MISSING_INPUT", "All five input files are required")
                    }
                    AutosensError::InsufficientGlucose { .. } => (
                        "INSUFFICIENT_GLUCOSE",
                        "Provide at least 6 hours of glucose history",
                    ),
                    AutosensError::UnsupportedUnits(_) => (
                        "UNSUPPORTED_UNITS",
                        "Convert insulin sensitivities to mg/dL",
                    ),
                    AutosensError::InvalidSettings(_) => {
                        ("INVALID_SETTINGS", "Check the --settings file")
                    }
                    AutosensError::InvalidArgument(_) => {
                        ("INVALID_ARGUMENT", "Arguments must be numbers")
                    }
                    _ => ("PARSE_ERROR", "Check input format"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            AutosensCliError::Usage(msg) => CliError {
                code: "USAGE".to_string(),
                message: msg.to_string(),
                hint: Some("Run 'autosens --help' for usage".to_string()),
            },
        }
    }
}
