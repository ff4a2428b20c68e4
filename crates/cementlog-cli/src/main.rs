use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use cementlog_core::report::export::save_pdf;
use cementlog_core::{
    build_service, parse_result, render_report, response_schema, run_analysis, AnalysisError,
    AnalysisResult, IngestError, InterpreterSettings, Language, OutputFormat, ReportView,
    SessionController, SessionError, SessionStatus,
};
use chrono::{Local, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "cementlog",
    author,
    version,
    about = "Cement bond log interpretation with bilingual reporting"
)]
struct Cli {
    /// Optional config file (TOML, YAML or JSON) with [interpreter] and [report] tables
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interpret a PDF or LAS well log and print the report
    Analyze {
        /// Log file to analyze (.pdf or .las)
        file: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
        /// Also write the parsed analysis result as JSON
        #[arg(long, value_name = "PATH")]
        save_json: Option<PathBuf>,
    },
    /// Render a stored analysis result without contacting the service
    Render {
        /// JSON file produced by `analyze --save-json`
        result: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Print the response schema sent to the inference service
    Schema,
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Report language
    #[arg(long, value_enum)]
    lang: Option<LangArg>,
    /// Terminal output format
    #[arg(long, value_enum, default_value_t = FormatArg::Human)]
    format: FormatArg,
    /// Export a PDF report into DIR (config `report.output_dir`, else the current directory, when omitted)
    #[arg(long, value_name = "DIR", num_args = 0..=1)]
    export: Option<Option<PathBuf>>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LangArg {
    En,
    Ar,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Human,
    Json,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    interpreter: HashMap<String, String>,
    #[serde(default)]
    report: ReportConfig,
}

#[derive(Debug, Default, Deserialize)]
struct ReportConfig {
    language: Option<String>,
    output_dir: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let file_config = load_file_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Analyze {
            file,
            output,
            save_json,
        } => analyze(&file, &output, save_json.as_deref(), file_config).await,
        Commands::Render { result, output } => render(&result, &output, &file_config.report),
        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(&response_schema())?);
            Ok(())
        }
    }
}

fn load_file_config(path: Option<&Path>) -> Result<FileConfig> {
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };
    config::Config::builder()
        .add_source(config::File::from(path))
        .build()
        .and_then(|cfg| cfg.try_deserialize::<FileConfig>())
        .with_context(|| format!("failed to load config from {}", path.display()))
}

async fn analyze(
    file: &Path,
    output: &OutputArgs,
    save_json: Option<&Path>,
    file_config: FileConfig,
) -> Result<()> {
    let settings = InterpreterSettings::from_layers(file_config.interpreter, std::env::vars().collect())
        .context("invalid interpreter settings")?;
    let service = build_service(&settings)?;

    let mut session = SessionController::new();
    session.set_language(resolve_language(output, &file_config.report)?);

    let ticket = match session.begin(file) {
        Ok(ticket) => ticket,
        Err(SessionError::Unsupported(err)) => {
            tracing::debug!(error = %err, "rejected file");
            bail!(IngestError::UNSUPPORTED_MESSAGE);
        }
        Err(err) => return Err(err.into()),
    };
    eprintln!("Analyzing {} ...", file.display());

    let outcome = tokio::select! {
        outcome = run_analysis(file, service.as_ref()) => Some(outcome),
        _ = tokio::signal::ctrl_c() => None,
    };
    let Some(outcome) = outcome else {
        session.abandon()?;
        bail!("analysis abandoned");
    };

    match session.complete(ticket, outcome)? {
        SessionStatus::Completed => {}
        SessionStatus::Error => {
            if let Some(failure) = session.failure() {
                tracing::debug!(kind = failure.kind(), error = ?failure, "analysis failure detail");
            }
            eprintln!("{}", "Analysis Interrupted".red().bold());
            bail!(AnalysisError::USER_MESSAGE);
        }
        status => bail!("unexpected session status {status:?}"),
    }

    let result = session
        .result()
        .context("completed session holds no result")?;
    if let Some(path) = save_json {
        std::fs::write(path, serde_json::to_string_pretty(result)?)
            .with_context(|| format!("failed to write result to {}", path.display()))?;
    }
    emit(result, session.language(), output, &file_config.report)
}

fn render(result_path: &Path, output: &OutputArgs, report_config: &ReportConfig) -> Result<()> {
    let text = std::fs::read_to_string(result_path)
        .with_context(|| format!("failed to read {}", result_path.display()))?;
    let result = parse_result(&text)
        .with_context(|| format!("{} is not a valid analysis result", result_path.display()))?;
    let language = resolve_language(output, report_config)?;
    emit(&result, language, output, report_config)
}

fn emit(
    result: &AnalysisResult,
    language: Language,
    output: &OutputArgs,
    report_config: &ReportConfig,
) -> Result<()> {
    let now = Local::now();
    let format = match output.format {
        FormatArg::Human => OutputFormat::Human,
        FormatArg::Json => OutputFormat::Json,
    };
    print!("{}", render_report(result, language, now.naive_local(), format)?);
    if format == OutputFormat::Json {
        println!();
    }

    let export_dir = match &output.export {
        None => None,
        Some(Some(dir)) => Some(dir.clone()),
        Some(None) => Some(
            report_config
                .output_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(".")),
        ),
    };
    if let Some(dir) = export_dir {
        let view = ReportView::build(result, language, now.naive_local());
        // Export files are named after the UTC calendar date.
        let summary = save_pdf(&view, &dir, Utc::now().date_naive())
            .with_context(|| format!("failed to export report into {}", dir.display()))?;
        eprintln!("Report saved to {}", summary.path.display());
        if summary.substituted_glyphs > 0 {
            eprintln!(
                "{} {} character(s) could not be drawn with the built-in PDF font and were replaced with '?'",
                "warning:".yellow().bold(),
                summary.substituted_glyphs
            );
        }
    }
    Ok(())
}

fn resolve_language(output: &OutputArgs, report_config: &ReportConfig) -> Result<Language> {
    if let Some(lang) = output.lang {
        return Ok(match lang {
            LangArg::En => Language::En,
            LangArg::Ar => Language::Ar,
        });
    }
    match report_config.language.as_deref() {
        None => Ok(Language::default()),
        Some(raw) => Language::parse(raw)
            .with_context(|| format!("unknown report language `{raw}` in config (expected en or ar)")),
    }
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tokio=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
