//! SecureVector CLI binary.
//!
//! Local host for the scanning connector.
//!
//! # Commands
//!
//! - `scan` - Scan a prompt (or one prompt per line) and apply the blocking policy
//! - `check-credentials` - Validate credentials and send a probe scan
//! - `redact` - Strip API keys and auth headers from text or JSON
//!
//! Credentials come from `--api-key`/`--base-url`, then `SECUREVECTOR_API_KEY`/
//! `SECUREVECTOR_BASE_URL`, then the config file.

use std::io::{self, Read};
use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand, ValueEnum};
use securevector::{
    config::{Config, CredentialsConfig},
    sanitize_error_message, sanitize_error_value, BlockingCondition, Dispatcher, ExecutionContext,
    FailureMode, ItemFailure, ItemOutput, ReqwestTransport, RiskLevel, ScanParameters,
    ScanPipeline, VERSION,
};
use serde_json::{Number, Value};

#[derive(Parser)]
#[command(name = "securevector")]
#[command(version = VERSION)]
#[command(about = "SecureVector - AI prompt security scanning", long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/securevector/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a prompt for threats
    Scan {
        /// Prompt to scan (or - for stdin)
        input: Option<String>,

        /// Input file path
        #[arg(short, long)]
        file: Option<PathBuf>,

        #[command(flatten)]
        credentials: CredentialArgs,

        /// Request timeout in seconds (1-300)
        #[arg(short, long)]
        timeout: Option<u32>,

        /// Attach workflow/execution identifiers
        #[arg(long)]
        include_metadata: bool,

        /// Workflow identifier sent with --include-metadata
        #[arg(long)]
        workflow_id: Option<String>,

        /// Execution identifier sent with --include-metadata
        #[arg(long)]
        execution_id: Option<String>,

        /// Enable the blocking policy
        #[arg(short, long)]
        block: bool,

        /// Blocking conditions (verdict, score, riskLevel)
        #[arg(long, value_delimiter = ',')]
        conditions: Option<Vec<String>>,

        /// Score threshold (0-100)
        #[arg(long)]
        threshold: Option<i64>,

        /// Blocking risk levels (critical, high, medium, low)
        #[arg(long, value_delimiter = ',')]
        risk_levels: Option<Vec<String>>,

        /// Treat every non-empty input line as a separate prompt
        #[arg(long)]
        lines: bool,

        /// Behavior when an item fails
        #[arg(long, value_enum, default_value = "stop")]
        on_fail: OnFail,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate credentials and send a probe scan
    CheckCredentials {
        #[command(flatten)]
        credentials: CredentialArgs,
    },

    /// Redact secrets from text (or JSON with --json)
    Redact {
        /// Text to redact (or - for stdin)
        input: Option<String>,

        /// Input file path
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Parse input as JSON and redact every string in it
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args)]
struct CredentialArgs {
    /// API key (overrides SECUREVECTOR_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Base URL (overrides SECUREVECTOR_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OnFail {
    /// Abort on the first failure
    Stop,
    /// Report failures as error items and keep going
    Continue,
    /// Keep going past policy blocks only
    ContinueOnBlock,
}

impl From<OnFail> for FailureMode {
    fn from(value: OnFail) -> Self {
        match value {
            OnFail::Stop => FailureMode::Stop,
            OnFail::Continue => FailureMode::Continue,
            OnFail::ContinueOnBlock => FailureMode::ContinueOnPolicyBlock,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    match cli.command {
        Commands::Scan {
            input,
            file,
            credentials,
            timeout,
            include_metadata,
            workflow_id,
            execution_id,
            block,
            conditions,
            threshold,
            risk_levels,
            lines,
            on_fail,
            json,
        } => {
            let config = load_config(cli.config, &credentials)?;
            let mut params = config.scan.clone();
            if let Some(timeout) = timeout {
                params.timeout = Number::from(timeout);
            }
            params.include_metadata |= include_metadata;
            params.block_on_threat |= block;
            if let Some(conditions) = conditions {
                params.blocking_conditions = parse_list(&conditions, BlockingCondition::from_str)?;
            }
            if let Some(threshold) = threshold {
                params.threat_threshold = threshold;
            }
            if let Some(levels) = risk_levels {
                params.block_on_risk_levels = parse_list(&levels, RiskLevel::from_str)?;
            }

            let content = read_input(input, file)?;
            let items = if lines {
                content
                    .lines()
                    .filter(|line| !line.trim().is_empty())
                    .map(|line| ScanParameters {
                        prompt: line.to_string(),
                        ..params.clone()
                    })
                    .collect()
            } else {
                vec![ScanParameters {
                    prompt: content,
                    ..params
                }]
            };

            let context = ExecutionContext {
                workflow_id,
                execution_id,
            };
            cmd_scan(&config, &items, &context, on_fail.into(), json)
        }

        Commands::CheckCredentials { credentials } => {
            let config = load_config(cli.config, &credentials)?;
            cmd_check_credentials(&config)
        }

        Commands::Redact { input, file, json } => cmd_redact(input, file, json),
    }
}

fn init_logging(verbose: bool, json: bool) {
    let log_level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// File config, then environment, then command-line flags.
fn load_config(path: Option<PathBuf>, args: &CredentialArgs) -> anyhow::Result<Config> {
    let file_config = match path {
        Some(path) => Config::from_file(path)?,
        None => match Config::default_path().filter(|p| p.exists()) {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        },
    };

    let cli_config = Config {
        credentials: CredentialsConfig {
            api_key: args.api_key.clone(),
            base_url: args.base_url.clone(),
        },
        ..Default::default()
    };

    Ok(file_config.merge(Config::from_env()).merge(cli_config))
}

fn build_pipeline(config: &Config) -> anyhow::Result<ScanPipeline<ReqwestTransport>> {
    let dispatcher = Dispatcher::new(ReqwestTransport::new()?).with_policy(config.retry.clone());
    Ok(ScanPipeline::with_dispatcher(dispatcher))
}

fn cmd_scan(
    config: &Config,
    items: &[ScanParameters],
    context: &ExecutionContext,
    mode: FailureMode,
    json_output: bool,
) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config)?;
    let credentials = config.credentials.to_value();

    let runtime = tokio::runtime::Runtime::new()?;
    let outcome = runtime.block_on(pipeline.execute(items, &credentials, context, mode));

    match outcome {
        Ok(outputs) => {
            if json_output {
                println!("{}", serde_json::to_string_pretty(&outputs)?);
            } else {
                for output in &outputs {
                    print_output(output, outputs.len() > 1);
                }
            }
            if outputs.iter().any(|o| o.json.get("error").is_some()) {
                std::process::exit(1);
            }
        }
        Err(failure) => {
            if json_output {
                println!("{}", serde_json::to_string_pretty(&failure)?);
            } else {
                print_failure(&failure);
            }
            std::process::exit(1);
        }
    }

    Ok(())
}

fn print_output(output: &ItemOutput, numbered: bool) {
    let prefix = if numbered {
        format!("[{}] ", output.item_index)
    } else {
        String::new()
    };

    if let Some(error) = output.json.get("error").and_then(Value::as_str) {
        println!("{prefix}ERROR: {error}");
        return;
    }

    let field = |name: &str| output.json.get(name).cloned().unwrap_or(Value::Null);
    println!(
        "{prefix}{} (risk: {}, score: {:.1}, confidence: {:.2})",
        field("verdict").as_str().unwrap_or("?"),
        field("riskLevel").as_str().unwrap_or("?"),
        field("score").as_f64().unwrap_or_default(),
        field("confidence_score").as_f64().unwrap_or_default(),
    );

    if let Some(threats) = output.json.get("threats").and_then(Value::as_array) {
        for threat in threats {
            println!(
                "    - {} ({}) {}: {}",
                threat["category"].as_str().unwrap_or("?"),
                threat["severity"].as_str().unwrap_or("?"),
                threat["rule_id"].as_str().unwrap_or("?"),
                threat["rule_name"].as_str().unwrap_or("?"),
            );
        }
    }
    if let Some(recommendation) = output.json.get("recommendation").and_then(Value::as_str) {
        println!("    Recommendation: {recommendation}");
    }
}

fn print_failure(failure: &ItemFailure) {
    if failure.is_policy_block() {
        eprintln!("BLOCKED: {}", failure.message());
    } else {
        eprintln!("Error: {}", failure.message());
    }
    if let Some(description) = failure.description() {
        eprintln!("  {description}");
    }
}

fn cmd_check_credentials(config: &Config) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config)?;
    let credentials = config.credentials.to_value();

    let runtime = tokio::runtime::Runtime::new()?;
    match runtime.block_on(pipeline.test_credentials(&credentials)) {
        Ok(()) => {
            println!("Credentials OK");
            Ok(())
        }
        Err(err) => {
            print_failure(&ItemFailure::from_error(0, &err));
            std::process::exit(1);
        }
    }
}

fn cmd_redact(input: Option<String>, file: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let content = read_input(input, file)?;

    if json {
        let value: Value = serde_json::from_str(&content)?;
        println!("{}", serde_json::to_string_pretty(&sanitize_error_value(&value))?);
    } else {
        print!("{}", redact_text(&content));
        if !content.ends_with('\n') {
            println!();
        }
    }

    Ok(())
}

/// Redact plain text, echoing blank input as-is.
fn redact_text(content: &str) -> String {
    if content.trim().is_empty() {
        content.to_string()
    } else {
        sanitize_error_message(content)
    }
}

fn parse_list<T>(
    values: &[String],
    parse: impl Fn(&str) -> Result<T, String>,
) -> anyhow::Result<Vec<T>> {
    values
        .iter()
        .map(|v| parse(v.trim()).map_err(|e| anyhow::anyhow!(e)))
        .collect()
}

fn read_input(input: Option<String>, file: Option<PathBuf>) -> anyhow::Result<String> {
    if let Some(path) = file {
        Ok(std::fs::read_to_string(path)?)
    } else if let Some(s) = input {
        if s == "-" {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        } else {
            Ok(s)
        }
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    }
}
