//! DDP CLI - Command-line interface for DDP Convert
//!
//! Commands:
//! - convert: Run the pipeline on an export package and write the exports
//! - inspect: Show which section each category resolves to
//! - config: Print the default configuration

use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ddp_convert::aggregator::MonthlyAggregator;
use ddp_convert::encoder::ReportEncoder;
use ddp_convert::extractor::ExportExtractor;
use ddp_convert::pipeline::{ConversionSession, FailureKind, PipelineOutcome};
use ddp_convert::{Category, ConvertError, PipelineConfig, CONVERTER_VERSION};

/// DDP - Convert social-media data download packages into activity tables
#[derive(Parser)]
#[command(name = "ddp")]
#[command(version = CONVERTER_VERSION)]
#[command(about = "Extract, normalize and export activity history from a data download package", long_about = None)]
struct Cli {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline on an export package
    Convert {
        /// Input file path (use - for stdin)
        input: PathBuf,

        /// Directory to write the CSV and link exports into
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Categories to extract, comma separated (Browsing, Favorite, Liked)
        #[arg(long, value_delimiter = ',')]
        categories: Vec<String>,

        /// Session-gap ceiling in seconds
        #[arg(long)]
        session_gap: Option<f64>,

        /// Field written by the link export
        #[arg(long)]
        link_field: Option<String>,

        /// Print the full JSON report instead of the status line
        #[arg(long)]
        json: bool,

        /// Pretty-print the JSON report
        #[arg(long, requires = "json")]
        pretty: bool,
    },

    /// Show which section each category resolves to
    Inspect {
        /// Input file path (use - for stdin)
        input: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default configuration as JSON
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), DdpCliError> {
    match cli.command {
        Commands::Convert {
            input,
            output_dir,
            config,
            categories,
            session_gap,
            link_field,
            json,
            pretty,
        } => {
            let config = build_config(config.as_deref(), &categories, session_gap, link_field)?;
            cmd_convert(&input, output_dir.as_deref(), config, json, pretty)
        }

        Commands::Inspect { input, json } => cmd_inspect(&input, json),

        Commands::Config => {
            println!("{}", PipelineConfig::default().to_json()?);
            Ok(())
        }
    }
}

/// Initialise the global `tracing` subscriber on stderr
fn setup_logging(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .init();
}

fn build_config(
    path: Option<&Path>,
    categories: &[String],
    session_gap: Option<f64>,
    link_field: Option<String>,
) -> Result<PipelineConfig, DdpCliError> {
    let mut config = match path {
        Some(path) => PipelineConfig::from_json(&fs::read_to_string(path)?)?,
        None => PipelineConfig::default(),
    };

    if !categories.is_empty() {
        let parsed = categories
            .iter()
            .map(|c| c.parse::<Category>())
            .collect::<Result<Vec<_>, _>>()?;
        config = config.with_categories(parsed);
    }
    if let Some(ceiling) = session_gap {
        config = config.with_session_gap_ceiling(ceiling);
    }
    if let Some(field) = link_field {
        config = config.with_link_field(field);
    }

    config.validate()?;
    Ok(config)
}

fn cmd_convert(
    input: &Path,
    output_dir: Option<&Path>,
    config: PipelineConfig,
    json: bool,
    pretty: bool,
) -> Result<(), DdpCliError> {
    let bytes = read_input(input)?;
    let session = ConversionSession::new(config)?;

    let outcome = session.ingest(&bytes);
    let summary = match &outcome {
        PipelineOutcome::Success(summary) | PipelineOutcome::Empty(summary) => summary,
        PipelineOutcome::Failure(failure) => {
            return Err(DdpCliError::Pipeline(failure.kind, failure.message.clone()))
        }
    };

    if json {
        let encoder = ReportEncoder::new();
        let report = if pretty {
            encoder.encode_to_json_pretty(&summary.dataset, &summary.monthly, &summary.engagement)?
        } else {
            encoder.encode_to_json(&summary.dataset, &summary.monthly, &summary.engagement)?
        };
        println!("{}", report);
    } else {
        println!("{}", outcome.status_line());
        println!("Rows:     {}", summary.dataset.len());
        if summary.dataset.rejected_count() > 0 {
            println!(
                "Rejected: {} (missing or unparseable Date)",
                summary.dataset.rejected_count()
            );
        }
        let months =
            MonthlyAggregator::fill_missing_months(&summary.monthly, &summary.dataset.categories);
        for month in &months {
            let breakdown = month
                .per_category_counts
                .iter()
                .map(|(category, count)| format!("{}={}", category, count))
                .collect::<Vec<_>>()
                .join(" ");
            println!("  {}  {:>6}  {}", month.year_month, month.total_count, breakdown);
        }
    }

    if let Some(dir) = output_dir {
        // Both exports must succeed before anything is written
        let table = session.export_table();
        let links = session.export_links()?;

        fs::create_dir_all(dir)?;
        fs::write(dir.join(&table.filename), &table.bytes)?;
        fs::write(dir.join(&links.filename), &links.bytes)?;

        if !json {
            println!("Wrote {} and {}", table.filename, links.filename);
        }
    }

    Ok(())
}

fn cmd_inspect(input: &Path, json: bool) -> Result<(), DdpCliError> {
    let bytes = read_input(input)?;
    let document = ExportExtractor::decode(&bytes)?;
    let report = ExportExtractor::default().inspect(&document);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Export Layout");
        println!("=============");
        for resolution in &report {
            match &resolution.matched {
                Some(path) => println!(
                    "{:<9} {} / {} ({} records{})",
                    resolution.category.as_str(),
                    path.section,
                    path.list_field,
                    resolution.record_count,
                    if resolution.used_fallback {
                        ", legacy name"
                    } else {
                        ""
                    }
                ),
                None => println!("{:<9} not found", resolution.category.as_str()),
            }
        }
    }

    Ok(())
}

fn read_input(input: &Path) -> Result<Vec<u8>, DdpCliError> {
    if input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            return Err(DdpCliError::NoInput);
        }
        let mut buffer = Vec::new();
        io::stdin().read_to_end(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read(input)?)
    }
}

// Error types

#[derive(Debug)]
enum DdpCliError {
    Io(io::Error),
    Convert(ConvertError),
    Json(serde_json::Error),
    Pipeline(FailureKind, String),
    NoInput,
}

impl From<io::Error> for DdpCliError {
    fn from(e: io::Error) -> Self {
        DdpCliError::Io(e)
    }
}

impl From<ConvertError> for DdpCliError {
    fn from(e: ConvertError) -> Self {
        DdpCliError::Convert(e)
    }
}

impl From<serde_json::Error> for DdpCliError {
    fn from(e: serde_json::Error) -> Self {
        DdpCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<DdpCliError> for CliError {
    fn from(e: DdpCliError) -> Self {
        match e {
            DdpCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            DdpCliError::Convert(ConvertError::MissingField(msg)) => CliError {
                code: "MISSING_FIELD".to_string(),
                message: msg,
                hint: Some(
                    "The export may come from an unsupported version; try --link-field"
                        .to_string(),
                ),
            },
            DdpCliError::Convert(e @ ConvertError::DecodeError(_)) => CliError {
                code: "DECODE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Ensure the input is the JSON export, not the ZIP archive".to_string()),
            },
            DdpCliError::Convert(
                e @ (ConvertError::InvalidConfig(_) | ConvertError::UnknownCategory(_)),
            ) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'ddp config' to see valid settings".to_string()),
            },
            DdpCliError::Convert(e) => CliError {
                code: "CONVERT_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            DdpCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            DdpCliError::Pipeline(kind, message) => CliError {
                code: match kind {
                    FailureKind::Decode => "DECODE_ERROR",
                    FailureKind::MissingField => "MISSING_FIELD",
                    FailureKind::Config => "CONFIG_ERROR",
                    FailureKind::Encoding => "ENCODING_ERROR",
                }
                .to_string(),
                message,
                hint: Some("Run 'ddp inspect' on the file to check its layout".to_string()),
            },
            DdpCliError::NoInput => CliError {
                code: "NO_INPUT".to_string(),
                message: "stdin is a terminal; nothing to read".to_string(),
                hint: Some("Pipe the export file in or pass its path".to_string()),
            },
        }
    }
}
