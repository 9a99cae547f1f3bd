//! oasguard: compare two OpenAPI specs and report breaking changes.
//!
//! Prints a change log, writes optional report files, and maps the overall
//! verdict to an exit code for CI pipelines.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};

use oasguard_diff::{ChangeSet, DiagnosticPolicy, DiffEngine, Verdict};
use oasguard_report::{render, ReportFormat};
use oasguard_telemetry::{
    log_comparison_completed, log_comparison_started, log_report_write_failed, log_report_written,
    log_spec_load_failed, LogFormat, TelemetryConfig,
};

/// Exit code when a spec cannot be loaded or arguments are unusable.
const EXIT_ERROR: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "oasguard",
    about = "Detect breaking changes between two OpenAPI specs",
    version
)]
struct Cli {
    /// Old (baseline) spec file (YAML or JSON).
    #[arg(short, long)]
    old: PathBuf,

    /// New spec file (YAML or JSON).
    #[arg(short, long)]
    new: PathBuf,

    /// How the overall verdict maps to the exit code.
    #[arg(short, long, value_enum, default_value_t = ExitPolicy::FailOnIncompatible)]
    exit: ExitPolicy,

    /// Print the text change log to stdout.
    #[arg(short, long)]
    console: bool,

    /// Write a Markdown report to FILE.
    #[arg(long, value_name = "FILE")]
    markdown: Option<PathBuf>,

    /// Write an HTML report to FILE.
    #[arg(long, value_name = "FILE")]
    html: Option<PathBuf>,

    /// Write a plain-text report to FILE.
    #[arg(long, value_name = "FILE")]
    text: Option<PathBuf>,

    /// Write the JSON change tree to FILE.
    #[arg(long, value_name = "FILE")]
    json: Option<PathBuf>,

    /// Fail when a spec has structural problems instead of warning.
    #[arg(long)]
    strict: bool,

    /// Log level filter (RUST_LOG takes precedence).
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Log format (pretty or json).
    #[arg(long, default_value = "pretty")]
    log_format: String,
}

/// Exit code policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ExitPolicy {
    /// Exit 1 when a breaking change is found.
    FailOnIncompatible,
    /// Exit 1 when anything changed.
    FailOnChanged,
    /// Print the overall state and always exit 0.
    PrintState,
}

impl ExitPolicy {
    fn exit_code(self, verdict: Verdict) -> u8 {
        match (self, verdict) {
            (Self::FailOnIncompatible, Verdict::Breaking) => 1,
            (Self::FailOnChanged, Verdict::Compatible | Verdict::Breaking) => 1,
            _ => 0,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let Some(log_format) = LogFormat::parse(&cli.log_format) else {
        eprintln!("error: invalid log format '{}' (expected pretty or json)", cli.log_format);
        return ExitCode::from(EXIT_ERROR);
    };
    let telemetry = TelemetryConfig::new()
        .with_log_level(&cli.log_level)
        .with_log_format(log_format);
    if let Err(e) = oasguard_telemetry::init(&telemetry) {
        eprintln!("warning: {}", e);
    }

    match run(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<u8> {
    let policy = if cli.strict {
        DiagnosticPolicy::Strict
    } else {
        DiagnosticPolicy::Lenient
    };

    for path in [&cli.old, &cli.new] {
        if !path.exists() {
            log_spec_load_failed!(path = %path.display(), "spec file not found");
            bail!("spec file not found: {}", path.display());
        }
    }

    log_comparison_started!(old = %cli.old.display(), new = %cli.new.display(), "comparing specs");
    let engine = DiffEngine::default();
    let changes = engine
        .compare_files(&cli.old, &cli.new, policy)
        .inspect_err(|e| {
            log_spec_load_failed!(error = %e, "failed to load spec");
        })?;
    log_comparison_completed!(
        verdict = %changes.verdict(),
        breaking = changes.count(Verdict::Breaking),
        compatible = changes.count(Verdict::Compatible),
        "comparison completed"
    );

    let reports = [
        (ReportFormat::Markdown, &cli.markdown),
        (ReportFormat::Html, &cli.html),
        (ReportFormat::Text, &cli.text),
        (ReportFormat::Json, &cli.json),
    ];
    let any_file = reports.iter().any(|(_, path)| path.is_some());

    if cli.console || (!any_file && cli.exit != ExitPolicy::PrintState) {
        print!("{}", render(&changes, ReportFormat::Text)?);
    }

    for (format, path) in reports {
        if let Some(path) = path {
            write_report(&changes, format, path);
        }
    }

    if cli.exit == ExitPolicy::PrintState {
        println!("{}", changes.verdict());
    }

    Ok(cli.exit.exit_code(changes.verdict()))
}

/// Render and write one report. Failures are logged, never fatal.
fn write_report(changes: &ChangeSet, format: ReportFormat, path: &Path) {
    let result = render(changes, format)
        .map_err(anyhow::Error::from)
        .and_then(|body| {
            std::fs::write(path, body)
                .with_context(|| format!("failed to write {}", path.display()))
        });
    match result {
        Ok(()) => log_report_written!(format = %format, path = %path.display(), "report written"),
        Err(e) => {
            let error = format!("{:#}", e);
            log_report_write_failed!(
                format = %format,
                path = %path.display(),
                error = %error,
                "report could not be written"
            );
        }
    }
}
