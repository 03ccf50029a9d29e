//! `formflow` command line tool
//!
//! Runs templates and submissions stored as JSON files through the engine:
//! `process` validates and computes a submission, `check` reports template authoring
//! issues and `eval` evaluates a single expression.

use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use formflow_core::{
    EngineConfig, EvaluationContext, FieldValue, FormProcessor, FormTemplate, SubmissionData,
    TemplateIssue, TemplateValidator, load_template, submission_from_json,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Exit status when `check` finds issues
const EXIT_ISSUES: u8 = 2;

/// Formflow form computation engine
#[derive(Parser, Debug)]
#[command(name = "formflow")]
#[command(about = "Validate and compute schema-driven form submissions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Engine configuration file (defaults to FORMFLOW_CONFIG_PATH or formflow.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    log_format: LogFormat,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a submission and compute its formulas
    Process {
        /// Template JSON file
        #[arg(short, long)]
        template: PathBuf,

        /// Submission JSON file (an object of field values)
        #[arg(short, long)]
        data: PathBuf,

        /// Evaluation date for age() (YYYY-MM-DD), defaults to today
        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// Report template authoring issues
    Check {
        /// Template JSON file
        #[arg(short, long)]
        template: PathBuf,
    },

    /// Evaluate one expression
    Eval {
        /// Expression source
        expression: String,

        /// Variables as a JSON object file
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Evaluation date for age() (YYYY-MM-DD), defaults to today
        #[arg(long)]
        today: Option<NaiveDate>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Serialize)]
struct CheckReport<'a> {
    template: &'a str,
    version: u32,
    issues: &'a [TemplateIssue],
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "command failed");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let processor = build_processor(cli.config.as_deref())?;

    match cli.command {
        Command::Process { template, data, today } => {
            let template = read_template(&template)?;
            let data = read_submission(&data)?;
            let today = today.unwrap_or_else(|| chrono::Local::now().date_naive());

            info!(template = %template.key, %today, "processing submission");
            let outcome = processor.process_at(&template, data, today);
            print_json(&outcome)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { template } => {
            let template = read_template(&template)?;
            let issues = TemplateValidator::for_calculator(processor.calculator()).validate(&template);

            print_json(&CheckReport {
                template: &template.key,
                version: template.version,
                issues: &issues,
            })?;
            Ok(if issues.is_empty() { ExitCode::SUCCESS } else { ExitCode::from(EXIT_ISSUES) })
        }
        Command::Eval { expression, data, today } => {
            let variables = match data {
                Some(path) => read_submission(&path)?,
                None => SubmissionData::new(),
            };
            let value = evaluate(&processor, &expression, &variables, today)?;
            print_json(&value)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_processor(config_path: Option<&Path>) -> anyhow::Result<FormProcessor> {
    let Some(path) = config_path else {
        return formflow_core::init();
    };

    let config = EngineConfig::from_file(path)
        .and_then(EngineConfig::apply_env_overrides)
        .and_then(EngineConfig::validated)
        .with_context(|| format!("loading configuration from {}", path.display()))?;
    debug!(?config, "configuration loaded");
    Ok(FormProcessor::with_config(config))
}

fn evaluate(
    processor: &FormProcessor,
    expression: &str,
    variables: &SubmissionData,
    today: Option<NaiveDate>,
) -> anyhow::Result<FieldValue> {
    let context = match today {
        Some(today) => EvaluationContext::at(variables, today),
        None => EvaluationContext::new(variables),
    };
    processor
        .calculator()
        .eval(expression, &context)
        .map_err(|err| anyhow!("{expression}: {err}"))
}

fn read_json(path: &Path) -> anyhow::Result<serde_json::Value> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

fn read_template(path: &Path) -> anyhow::Result<FormTemplate> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    load_template(&contents).with_context(|| format!("loading template {}", path.display()))
}

fn read_submission(path: &Path) -> anyhow::Result<SubmissionData> {
    let value = read_json(path)?;
    submission_from_json(value).with_context(|| format!("loading submission {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_process_command() {
        let cli = Cli::try_parse_from([
            "formflow", "process", "--template", "t.json", "--data", "d.json", "--today",
            "2024-06-15",
        ])
        .unwrap();

        match cli.command {
            Command::Process { template, data, today } => {
                assert_eq!(template, PathBuf::from("t.json"));
                assert_eq!(data, PathBuf::from("d.json"));
                assert_eq!(today, NaiveDate::from_ymd_opt(2024, 6, 15));
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_parse_rejects_bad_date() {
        assert!(
            Cli::try_parse_from(["formflow", "eval", "1 + 1", "--today", "15/06/2024"]).is_err()
        );
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "formflow", "check", "-t", "t.json", "--config", "engine.toml", "--log-format", "json",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("engine.toml")));
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn test_evaluate_with_variables() {
        let processor = FormProcessor::new();
        let variables = SubmissionData::from([("income".to_string(), FieldValue::Integer(50_000))]);
        let today = NaiveDate::from_ymd_opt(2024, 6, 15);

        let value = evaluate(&processor, "income * 2", &variables, today).unwrap();
        assert_eq!(value, FieldValue::Integer(100_000));

        let err = evaluate(&processor, "income +", &variables, today).unwrap_err();
        assert!(err.to_string().starts_with("income +: parse error"));
    }

    #[test]
    fn test_check_report_shape() {
        let issues = vec![];
        let report = CheckReport { template: "loan", version: 2, issues: &issues };
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            serde_json::json!({"template": "loan", "version": 2, "issues": []})
        );
    }
}
