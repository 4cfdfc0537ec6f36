//! Congestion CLI - Command-line interface for the congestion monitor
//!
//! Commands:
//! - analyze: Score recorded frame observations (batch mode)
//! - run: Score observations streamed on stdin (streaming mode)
//! - config: Print the default configuration
//! - doctor: Diagnose configuration and environment

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use congestion_monitor::config::MonitorConfig;
use congestion_monitor::notifier::{BackgroundNotifier, JsonLinesTransport, LogNotifier, Notifier};
use congestion_monitor::pipeline::{parse_observations, FrameAnalyzer, FrameReport};
use congestion_monitor::types::FrameObservation;
use congestion_monitor::{MonitorError, MONITOR_VERSION, PRODUCER_NAME};
use tracing_subscriber::EnvFilter;

/// Congestion - crowd congestion scoring and alerting
#[derive(Parser)]
#[command(name = "congestion")]
#[command(version = MONITOR_VERSION)]
#[command(about = "Score crowd congestion from detector and motion output", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score recorded observations (batch mode)
    Analyze {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,
    },

    /// Score observations streamed on stdin (streaming mode)
    Run {
        /// Configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Append raised alerts to this NDJSON file from a background worker
        #[arg(long)]
        alerts_log: Option<PathBuf>,

        /// Flush output after each record (`--flush false` to buffer)
        #[arg(long, action = ArgAction::Set, default_value_t = true)]
        flush: bool,
    },

    /// Print the default configuration
    Config {
        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Configuration file to check
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one report per line)
    Ndjson,
    /// JSON array of reports
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("congestion_monitor=info,congestion=info")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CongestionCliError> {
    match cli.command {
        Commands::Analyze {
            input,
            output,
            config,
            output_format,
        } => cmd_analyze(&input, &output, config.as_deref(), output_format),

        Commands::Run {
            config,
            alerts_log,
            flush,
        } => cmd_run(config.as_deref(), alerts_log.as_deref(), flush),

        Commands::Config { pretty } => cmd_config(pretty),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
    }
}

fn load_config(path: Option<&Path>) -> Result<MonitorConfig, CongestionCliError> {
    match path {
        Some(path) => Ok(MonitorConfig::load(path)?),
        None => Ok(MonitorConfig::default()),
    }
}

fn cmd_analyze(
    input: &Path,
    output: &Path,
    config: Option<&Path>,
    output_format: OutputFormat,
) -> Result<(), CongestionCliError> {
    let config = load_config(config)?;

    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let observations = parse_observations(&input_data)?;
    if observations.is_empty() {
        return Err(CongestionCliError::NoObservations);
    }

    let mut analyzer = FrameAnalyzer::new(&config)?;
    let reports: Vec<FrameReport> = observations
        .iter()
        .enumerate()
        .map(|(i, obs)| analyzer.analyze_observation(i as u64 + 1, obs))
        .collect();

    let alerts = reports.iter().filter(|r| r.alert.is_some()).count();
    tracing::info!(frames = reports.len(), alerts, "analysis complete");

    let output_data = format_output(&reports, &output_format)?;

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_run(
    config: Option<&Path>,
    alerts_log: Option<&Path>,
    flush: bool,
) -> Result<(), CongestionCliError> {
    let config = load_config(config)?;
    let mut analyzer = FrameAnalyzer::new(&config)?;

    let notifier: Box<dyn Notifier> = match alerts_log {
        Some(path) => Box::new(BackgroundNotifier::spawn(
            JsonLinesTransport::open(path)?,
            config.notifier.queue_capacity,
        )?),
        None => Box::new(LogNotifier::new(config.alerts.destination.clone())),
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut frame: u64 = 0;

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let observation: FrameObservation = serde_json::from_str(trimmed).map_err(|e| {
            CongestionCliError::ParseError(format!("Failed to parse observation: {}", e))
        })?;

        frame += 1;
        let report = analyzer.analyze_observation(frame, &observation);
        if let Some(alert) = &report.alert {
            notifier.notify(alert.clone());
        }

        writeln!(stdout, "{}", serde_json::to_string(&report)?)?;
        if flush {
            stdout.flush()?;
        }
    }

    stdout.flush()?;
    Ok(())
}

fn cmd_config(pretty: bool) -> Result<(), CongestionCliError> {
    let config = MonitorConfig::default();
    if pretty {
        println!("{}", config.to_json()?);
    } else {
        println!("{}", serde_json::to_string(&config)?);
    }
    Ok(())
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), CongestionCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("congestion-monitor version {}", MONITOR_VERSION),
    });

    if let Some(config_path) = config {
        if config_path.exists() {
            match MonitorConfig::load(config_path) {
                Ok(config) => {
                    checks.push(DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Ok,
                        message: format!(
                            "Configuration valid (warning {}, critical {}, cooldown {}s)",
                            config.scoring.warning_threshold,
                            config.scoring.critical_threshold,
                            config.alerts.cooldown_seconds
                        ),
                    });
                    let weight_sum = config.scoring.density_weight + config.scoring.motion_weight;
                    if (weight_sum - 1.0).abs() > 1e-9 {
                        checks.push(DoctorCheck {
                            name: "weights".to_string(),
                            status: CheckStatus::Warning,
                            message: format!(
                                "density_weight + motion_weight = {}; the index will not span 0-100",
                                weight_sum
                            ),
                        });
                    }
                    if config.alerts.destination.is_none() {
                        checks.push(DoctorCheck {
                            name: "alerts".to_string(),
                            status: CheckStatus::Warning,
                            message: "No alert destination configured".to_string(),
                        });
                    }
                }
                Err(e) => {
                    checks.push(DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Error,
                        message: format!("Invalid configuration: {}", e),
                    });
                }
            }
        } else {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Warning,
                message: "Configuration file does not exist; defaults apply".to_string(),
            });
        }
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: MONITOR_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Congestion Doctor Report");
        println!("========================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(CongestionCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn format_output(reports: &[FrameReport], format: &OutputFormat) -> Result<String, CongestionCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for report in reports {
                lines.push(serde_json::to_string(report)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(reports)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(reports)?),
    }
}

// Error types

#[derive(Debug)]
enum CongestionCliError {
    Io(io::Error),
    Monitor(MonitorError),
    Json(serde_json::Error),
    NoObservations,
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for CongestionCliError {
    fn from(e: io::Error) -> Self {
        CongestionCliError::Io(e)
    }
}

impl From<MonitorError> for CongestionCliError {
    fn from(e: MonitorError) -> Self {
        CongestionCliError::Monitor(e)
    }
}

impl From<serde_json::Error> for CongestionCliError {
    fn from(e: serde_json::Error) -> Self {
        CongestionCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<CongestionCliError> for CliError {
    fn from(e: CongestionCliError) -> Self {
        match e {
            CongestionCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            CongestionCliError::Monitor(MonitorError::InvalidConfiguration(msg)) => CliError {
                code: "INVALID_CONFIGURATION".to_string(),
                message: msg,
                hint: Some("Run 'congestion config --pretty' for a valid starting point".to_string()),
            },
            CongestionCliError::Monitor(e) => CliError {
                code: "MONITOR_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Ensure each input line is a frame observation object".to_string()),
            },
            CongestionCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            CongestionCliError::NoObservations => CliError {
                code: "NO_OBSERVATIONS".to_string(),
                message: "No observations found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            CongestionCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            CongestionCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
