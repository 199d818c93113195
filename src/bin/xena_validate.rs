use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use xena_gdc_validator::app::{App, ProgressSink};
use xena_gdc_validator::config::ConfigLoader;
use xena_gdc_validator::domain::{ExpressionDataType, ProjectId, SurvivalSource};
use xena_gdc_validator::error::ValidatorError;
use xena_gdc_validator::gdc::GdcHttpClient;
use xena_gdc_validator::output::{JsonOutput, OutputMode, TextOutput};
use xena_gdc_validator::report::ComparisonReport;

#[derive(Parser)]
#[command(name = "xena-validate")]
#[command(about = "Cross-check Xena matrices against data re-fetched from the GDC")]
#[command(version, author)]
struct Cli {
    /// Print results as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Path to a JSON config file
    #[arg(long, global = true)]
    config: Option<String>,

    /// Verbose logging (overrides RUST_LOG)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Compare a clinical matrix with /cases clinical records")]
    Clinical(MatrixArgs),
    #[command(about = "Compare a survival matrix with survival derived from /cases")]
    Survival(SurvivalArgs),
    #[command(about = "Compare a survival matrix with /analysis/survival")]
    SurvivalEndpoint(SurvivalArgs),
    #[command(about = "Compare a STAR gene expression matrix with downloaded count files")]
    Expression(ExpressionArgs),
    #[command(about = "Compare a segment copy number matrix with downloaded segment files")]
    CopyNumber(MatrixArgs),
    #[command(about = "Correlate two to four expression matrices")]
    Correlate(CorrelateArgs),
}

#[derive(Args)]
struct MatrixArgs {
    matrix: PathBuf,
}

#[derive(Args)]
struct SurvivalArgs {
    matrix: PathBuf,
    project: String,
}

#[derive(Args)]
struct ExpressionArgs {
    matrix: PathBuf,
    #[arg(value_enum)]
    data_type: ExpressionDataType,
}

#[derive(Args)]
struct CorrelateArgs {
    #[arg(required = true, num_args = 2..=4)]
    matrices: Vec<PathBuf>,
}

enum Verdict {
    Passed,
    Failed,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // usage problems print help and exit cleanly
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
    };

    match run(cli) {
        Ok(Verdict::Passed) => ExitCode::SUCCESS,
        Ok(Verdict::Failed) => ExitCode::from(1),
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(error) = report.downcast_ref::<ValidatorError>() {
                return ExitCode::from(map_exit_code(error));
            }
            ExitCode::from(2)
        }
    }
}

fn map_exit_code(error: &ValidatorError) -> u8 {
    match error {
        ValidatorError::Usage(_) => 0,
        ValidatorError::GdcHttp(_)
        | ValidatorError::GdcStatus { .. }
        | ValidatorError::Envelope { .. }
        | ValidatorError::InvalidFileId(_)
        | ValidatorError::Bundle(_)
        | ValidatorError::MissingTool(_)
        | ValidatorError::Transfer(_) => 3,
        _ => 2,
    }
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> miette::Result<Verdict> {
    init_tracing(cli.debug);
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    let sink: &dyn ProgressSink = match output_mode {
        OutputMode::Text => &TextOutput,
        OutputMode::Json => &JsonOutput,
    };

    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let client = GdcHttpClient::new(&config)?;
    let app = App::new(client, config);

    let report = match cli.command {
        Commands::Clinical(args) => app.clinical(&args.matrix, sink)?,
        Commands::Survival(args) => {
            let project: ProjectId = args.project.parse()?;
            app.survival(&args.matrix, &project, SurvivalSource::Cases, sink)?
        }
        Commands::SurvivalEndpoint(args) => {
            let project: ProjectId = args.project.parse()?;
            app.survival(&args.matrix, &project, SurvivalSource::AnalysisEndpoint, sink)?
        }
        Commands::Expression(args) => app.expression(&args.matrix, args.data_type, sink)?,
        Commands::CopyNumber(args) => app.copy_number(&args.matrix, sink)?,
        Commands::Correlate(args) => {
            let report = app.correlate(&args.matrices, sink)?;
            match output_mode {
                OutputMode::Text => TextOutput::print_correlation(&report).into_diagnostic()?,
                OutputMode::Json => JsonOutput::print_correlation(&report).into_diagnostic()?,
            }
            return Ok(Verdict::Passed);
        }
    };

    print_report(&report, output_mode)?;
    Ok(if report.passed() {
        Verdict::Passed
    } else {
        Verdict::Failed
    })
}

fn print_report(report: &ComparisonReport, output_mode: OutputMode) -> miette::Result<()> {
    match output_mode {
        OutputMode::Text => TextOutput::print_report(report).into_diagnostic(),
        OutputMode::Json => JsonOutput::print_report(report).into_diagnostic(),
    }
}
