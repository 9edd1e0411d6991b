//! Blink Morse CLI - Command-line interface for the blink-to-Morse pipeline
//!
//! Commands:
//! - decode: Decode a recorded trace into text (batch mode)
//! - run: Decode frames streamed on stdin (streaming mode)
//! - calibrate: Derive thresholds from blink durations and save them
//! - doctor: Diagnose thresholds and configuration
//! - lexicon: Print the Morse and quick-command tables

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use blink_morse::calibration::CalibrationManager;
use blink_morse::encoder::TranscriptEncoder;
use blink_morse::lexicon;
use blink_morse::schema::{FrameRecord, TraceAdapter, TRACE_SCHEMA_VERSION};
use blink_morse::storage::{JsonFileStore, MemoryStore, ThresholdStore};
use blink_morse::types::{Thresholds, TranscriptReport};
use blink_morse::pipeline::collect_snapshots;
use blink_morse::{BlinkMorseError, BlinkMorsePipeline, PipelineConfig};
use blink_morse::{BLINK_MORSE_VERSION, PRODUCER_NAME};

/// Blink Morse - turn eye blinks into text
#[derive(Parser)]
#[command(name = "blink-morse")]
#[command(version = BLINK_MORSE_VERSION)]
#[command(about = "Decode eye-blink Morse code from recorded EAR traces", long_about = None)]
struct Cli {
    /// Thresholds file (defaults to <config dir>/blink-morse/thresholds.json)
    #[arg(long, global = true)]
    thresholds: Option<PathBuf>,

    /// Pipeline configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a recorded trace into text (batch mode)
    Decode {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,

        /// Use the first blinks of the trace as calibration samples.
        /// Off by default: saved (or default) thresholds are used from the
        /// first frame, even on a fresh profile
        #[arg(long)]
        calibrate: bool,
    },

    /// Decode NDJSON frames streamed on stdin (streaming mode)
    Run {
        /// Use the first blinks as calibration samples.
        /// Off by default: saved (or default) thresholds are used from the
        /// first frame, even on a fresh profile
        #[arg(long)]
        calibrate: bool,

        /// Print every frame, not only frames with blinks or decoder events
        #[arg(long)]
        all_frames: bool,

        /// Flush output after each record
        #[arg(long, default_value = "true")]
        flush: bool,
    },

    /// Derive thresholds from blink durations and save them
    Calibrate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// What the input contains
        #[arg(long, default_value = "durations")]
        input_kind: CalibrationInput,

        /// Compute thresholds without saving them
        #[arg(long)]
        dry_run: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose thresholds and configuration
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the Morse and quick-command tables
    Lexicon {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one frame per line)
    Ndjson,
    /// JSON array of frames
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Single-line JSON report
    Ndjson,
    /// JSON report
    Json,
    /// Pretty-printed JSON report
    JsonPretty,
    /// Translation only
    Text,
}

#[derive(Clone, ValueEnum)]
enum CalibrationInput {
    /// One blink duration in seconds per line
    Durations,
    /// A recorded frame trace (NDJSON)
    Trace,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

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

fn run(cli: Cli) -> Result<(), CliFailure> {
    let thresholds_path = cli.thresholds.unwrap_or_else(default_thresholds_path);
    let config_path = cli.config;

    match cli.command {
        Commands::Decode {
            input,
            output,
            input_format,
            output_format,
            calibrate,
        } => {
            let config = load_config(config_path.as_deref())?;
            cmd_decode(
                &input,
                &output,
                input_format,
                output_format,
                calibrate,
                config,
                &thresholds_path,
            )
        }

        Commands::Run {
            calibrate,
            all_frames,
            flush,
        } => {
            let config = load_config(config_path.as_deref())?;
            cmd_run(calibrate, all_frames, flush, config, &thresholds_path)
        }

        Commands::Calibrate {
            input,
            input_kind,
            dry_run,
            json,
        } => {
            let config = load_config(config_path.as_deref())?;
            cmd_calibrate(&input, input_kind, dry_run, json, config, &thresholds_path)
        }

        Commands::Doctor { json } => cmd_doctor(&thresholds_path, config_path.as_deref(), json),

        Commands::Lexicon { json } => cmd_lexicon(json),
    }
}

fn cmd_decode(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    calibrate: bool,
    mut config: PipelineConfig,
    thresholds_path: &Path,
) -> Result<(), CliFailure> {
    let input_data = read_input(input)?;

    let records = match input_format {
        InputFormat::Ndjson => TraceAdapter::parse_ndjson(&input_data)?,
        InputFormat::Json => TraceAdapter::parse_array(&input_data)?,
    };

    if records.is_empty() {
        return Err(CliFailure::NoFrames);
    }

    config.calibrate_on_start |= calibrate;
    let store = JsonFileStore::new(thresholds_path);
    let mut pipeline = BlinkMorsePipeline::new(config, Box::new(store))?;
    let outcomes = pipeline.run_trace(&records)?;

    if pipeline.is_calibrating() {
        log::warn!(
            "trace ended during calibration ({} blinks still needed)",
            pipeline.calibration_remaining()
        );
    }

    let report = TranscriptEncoder::new().encode(&pipeline, collect_snapshots(&outcomes));
    let output_data = format_report(&report, &output_format)?;

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_run(
    calibrate: bool,
    all_frames: bool,
    flush: bool,
    mut config: PipelineConfig,
    thresholds_path: &Path,
) -> Result<(), CliFailure> {
    config.calibrate_on_start |= calibrate;
    let mut pipeline =
        BlinkMorsePipeline::new(config, Box::new(JsonFileStore::new(thresholds_path)))?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut last_timestamp: Option<f64> = None;

    for (line_num, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let record = TraceAdapter::parse_line(trimmed).map_err(|e| {
            CliFailure::ParseError(format!("Failed to parse line {}: {}", line_num + 1, e))
        })?;

        if let Some(last) = last_timestamp {
            if record.timestamp < last {
                return Err(CliFailure::ParseError(format!(
                    "Timestamp goes backwards on line {} ({} < {})",
                    line_num + 1,
                    record.timestamp,
                    last
                )));
            }
        }
        last_timestamp = Some(record.timestamp);

        let outcome = pipeline.step(record.timestamp, record.raw_ear());
        let interesting = outcome.blink.is_some() || outcome.snapshot.is_some();

        if all_frames || interesting {
            writeln!(stdout, "{}", serde_json::to_string(&outcome)?)?;
            if flush {
                stdout.flush()?;
            }
        }
    }

    let summary = serde_json::json!({
        "translation": pipeline.get_translation(),
        "pending_buffer": pipeline.buffer(),
        "stats": pipeline.stats(),
    });
    writeln!(stdout, "{}", summary)?;
    stdout.flush()?;

    Ok(())
}

fn cmd_calibrate(
    input: &Path,
    input_kind: CalibrationInput,
    dry_run: bool,
    json: bool,
    config: PipelineConfig,
    thresholds_path: &Path,
) -> Result<(), CliFailure> {
    let input_data = read_input(input)?;

    let durations = match input_kind {
        CalibrationInput::Durations => parse_durations(&input_data)?,
        CalibrationInput::Trace => {
            let records = TraceAdapter::parse_ndjson(&input_data)?;
            blink_durations(&records, config)?
        }
    };

    let store: Box<dyn ThresholdStore> = if dry_run {
        Box::new(MemoryStore::new())
    } else {
        Box::new(JsonFileStore::new(thresholds_path))
    };
    let mut manager = CalibrationManager::new(config.calibration, store);

    let mut rejected = 0usize;
    for duration in &durations {
        let before = manager.engine().sample_count();
        manager.record(*duration);
        if manager.engine().sample_count() == before {
            rejected += 1;
        }
    }

    if !manager.is_ready() {
        return Err(CliFailure::NotEnoughSamples(manager.remaining()));
    }

    let report = CalibrationReport {
        samples: durations.len(),
        accepted: durations.len() - rejected,
        rejected,
        thresholds: manager.thresholds(),
        saved_to: if dry_run {
            None
        } else {
            Some(thresholds_path.display().to_string())
        },
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let t = report.thresholds;
        println!("Calibration Report");
        println!("==================");
        println!(
            "Samples:  {} ({} accepted, {} rejected)",
            report.samples, report.accepted, report.rejected
        );
        println!("Dot:      < {:.3}s", t.short_blink_max);
        println!("Dash:     >= {:.3}s", t.long_blink_min);
        println!(
            "Gaps:     symbol {:.2}s, letter {:.2}s, word {:.2}s",
            t.symbol_gap, t.letter_gap, t.word_gap
        );
        match &report.saved_to {
            Some(path) => println!("Saved to: {}", path),
            None => println!("Dry run, nothing saved"),
        }
    }

    Ok(())
}

fn cmd_doctor(
    thresholds_path: &Path,
    config_path: Option<&Path>,
    json: bool,
) -> Result<(), CliFailure> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    // Check thresholds file
    let store = JsonFileStore::new(thresholds_path);
    match store.try_load() {
        Ok(Some(thresholds)) if thresholds.is_valid() => checks.push(DoctorCheck {
            name: "thresholds".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "Thresholds valid (dot < {:.3}s, dash >= {:.3}s)",
                thresholds.short_blink_max, thresholds.long_blink_min
            ),
        }),
        Ok(Some(thresholds)) => checks.push(DoctorCheck {
            name: "thresholds".to_string(),
            status: CheckStatus::Error,
            message: format!(
                "Thresholds overlap or are not positive: {:?}",
                thresholds
            ),
        }),
        Ok(None) => checks.push(DoctorCheck {
            name: "thresholds".to_string(),
            status: CheckStatus::Warning,
            message: format!(
                "No thresholds at {}, defaults will be used",
                thresholds_path.display()
            ),
        }),
        Err(e) => checks.push(DoctorCheck {
            name: "thresholds".to_string(),
            status: CheckStatus::Warning,
            message: format!("Unreadable thresholds ({}), defaults will be used", e),
        }),
    }

    // Check config file
    if let Some(path) = config_path {
        match PipelineConfig::load(path) {
            Ok(_) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!("Config valid ({})", path.display()),
            }),
            Err(e) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: format!("Invalid config: {}", e),
            }),
        }
    }

    // Check stdin is available (for streaming mode)
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
        version: BLINK_MORSE_VERSION.to_string(),
        trace_schema: TRACE_SCHEMA_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Blink Morse Doctor Report");
        println!("=========================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("Schema:   {}", report.trace_schema);
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

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(CliFailure::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_lexicon(json: bool) -> Result<(), CliFailure> {
    if json {
        let letters: serde_json::Map<String, serde_json::Value> = lexicon::morse_entries()
            .iter()
            .map(|(code, c)| (code.to_string(), serde_json::Value::from(c.to_string())))
            .collect();
        let commands: serde_json::Map<String, serde_json::Value> = lexicon::quick_command_entries()
            .iter()
            .map(|(code, phrase)| (code.to_string(), serde_json::Value::from(*phrase)))
            .collect();
        let tables = serde_json::json!({
            "letters": letters,
            "quick_commands": commands,
            "placeholder": lexicon::PLACEHOLDER.to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&tables)?);
        return Ok(());
    }

    println!("Quick commands (take priority over letters):");
    for (code, phrase) in lexicon::quick_command_entries() {
        println!("  {:<10} {}", code, phrase);
    }
    println!();
    println!("Letters:");
    for (code, c) in lexicon::morse_entries() {
        println!("  {:<10} {}", code, c);
    }
    Ok(())
}

// Helper functions

fn default_thresholds_path() -> PathBuf {
    match dirs::config_dir() {
        Some(dir) => dir.join("blink-morse").join("thresholds.json"),
        None => PathBuf::from("config").join("thresholds.json"),
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig, CliFailure> {
    match path {
        Some(path) => Ok(PipelineConfig::load(path)?),
        None => Ok(PipelineConfig::default()),
    }
}

fn read_input(input: &Path) -> Result<String, CliFailure> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn parse_durations(data: &str) -> Result<Vec<f64>, CliFailure> {
    let mut durations = Vec::new();
    for (line_num, line) in data.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let duration: f64 = trimmed.parse().map_err(|e| {
            CliFailure::ParseError(format!("Line {}: invalid duration: {}", line_num + 1, e))
        })?;
        durations.push(duration);
    }
    Ok(durations)
}

/// Run a trace through blink detection only and collect blink durations
fn blink_durations(
    records: &[FrameRecord],
    config: PipelineConfig,
) -> Result<Vec<f64>, CliFailure> {
    TraceAdapter::check_monotonic(records)?;
    let mut processor = blink_morse::BlinkSignalProcessor::new(config.blink);
    Ok(records
        .iter()
        .filter_map(|r| processor.process_sample(r.timestamp, r.raw_ear()).1)
        .map(|event| event.duration)
        .collect())
}

fn format_report(report: &TranscriptReport, format: &OutputFormat) -> Result<String, CliFailure> {
    match format {
        OutputFormat::Ndjson => Ok(serde_json::to_string(report)? + "\n"),
        OutputFormat::Json => Ok(serde_json::to_string(report)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(report)? + "\n"),
        OutputFormat::Text => Ok(format!("{}\n", report.text)),
    }
}

// Error types

#[derive(Debug)]
enum CliFailure {
    Io(io::Error),
    Pipeline(BlinkMorseError),
    Json(serde_json::Error),
    NoFrames,
    NotEnoughSamples(usize),
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for CliFailure {
    fn from(e: io::Error) -> Self {
        CliFailure::Io(e)
    }
}

impl From<BlinkMorseError> for CliFailure {
    fn from(e: BlinkMorseError) -> Self {
        CliFailure::Pipeline(e)
    }
}

impl From<serde_json::Error> for CliFailure {
    fn from(e: serde_json::Error) -> Self {
        CliFailure::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<CliFailure> for CliError {
    fn from(e: CliFailure) -> Self {
        match e {
            CliFailure::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            CliFailure::Pipeline(BlinkMorseError::InvalidConfig(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'blink-morse doctor --config <file>' for details".to_string()),
            },
            CliFailure::Pipeline(e) => CliError {
                code: "PIPELINE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some(format!("Ensure input matches the {} schema", TRACE_SCHEMA_VERSION)),
            },
            CliFailure::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            CliFailure::NoFrames => CliError {
                code: "NO_FRAMES".to_string(),
                message: "No frames found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            CliFailure::NotEnoughSamples(remaining) => CliError {
                code: "NOT_ENOUGH_SAMPLES".to_string(),
                message: format!("{} more admissible blinks needed", remaining),
                hint: Some("Record more blinks between 0.04s and 2.5s".to_string()),
            },
            CliFailure::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            CliFailure::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct CalibrationReport {
    samples: usize,
    accepted: usize,
    rejected: usize,
    thresholds: Thresholds,
    saved_to: Option<String>,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    trace_schema: String,
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
