// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{error, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use dramamix::app_config::{self, Config};
use dramamix::app_controller::{Controller, RenderTargets};

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a script to a mastered WAV file
    Render(RenderArgs),

    /// Generate shell completions for dramamix
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Structured script (JSON) to render
    #[arg(value_name = "SCRIPT")]
    script: PathBuf,

    /// Output WAV file (default: next to the script)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Output sample rate, e.g. 48000 for delivery
    #[arg(short = 'r', long)]
    sample_rate: Option<u32>,

    /// Directory of WAV files to match sound cues against
    #[arg(long)]
    sounds: Option<PathBuf>,

    /// Write the run report as JSON to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// dramamix - audio drama production engine
///
/// Lays out a parsed drama script on a multi-track timeline, applies effects,
/// and masters the result to a single audio file.
#[derive(Parser, Debug)]
#[command(name = "dramamix")]
#[command(version = "0.1.0")]
#[command(about = "Audio drama timeline, mixing and mastering engine")]
#[command(long_about = "dramamix renders a structured drama script into one mastered audio file.

EXAMPLES:
    dramamix render play.json                       # Render to play.wav
    dramamix render play.json -o out.wav -r 48000   # Delivery sample rate
    dramamix render play.json --sounds ./sfx        # Match cues against a sound library
    dramamix render play.json --report run.json     # Also write the run report
    dramamix completions bash > dramamix.bash       # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.

VOICES:
    Speech synthesis is external to the engine. The command line renders lines as
    timed tone sketches at 150 words per minute so that timing and mix can be checked.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
}

struct ConsoleLogger {
    level: LevelFilter,
}

impl ConsoleLogger {
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(ConsoleLogger { level }))?;
        log::set_max_level(level);
        Ok(())
    }

    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {:<5} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Trace is the ceiling; the effective level is set once options are known
    ConsoleLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();
    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "dramamix", &mut std::io::stdout());
            Ok(())
        }
        Commands::Render(args) => {
            let result = run_render(args).await;
            if let Err(e) = &result {
                error!("{:#}", e);
            }
            result
        }
    }
}

fn load_config(options: &RenderArgs) -> Result<Config> {
    let config_path = &options.config_path;
    let mut config = if Path::new(config_path).exists() {
        let file = File::open(config_path).context(format!("Failed to open config file: {}", config_path))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).context(format!("Failed to parse config file: {}", config_path))?
    } else {
        warn!("Config file not found at '{}', creating default config.", config_path);
        let config = Config::default();
        let config_json =
            serde_json::to_string_pretty(&config).context("Failed to serialize default config to JSON")?;
        std::fs::write(config_path, config_json)
            .context(format!("Failed to write default config to file: {}", config_path))?;
        config
    };

    if let Some(sample_rate) = options.sample_rate {
        config.output.sample_rate = sample_rate;
    }
    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }
    Ok(config)
}

async fn run_render(options: RenderArgs) -> Result<()> {
    if let Some(level) = &options.log_level {
        let level: app_config::LogLevel = level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    let config = load_config(&options)?;
    log::set_max_level(config.log_level.to_level_filter());

    let mut controller = Controller::with_config(config)?;
    if let Some(dir) = options.sounds.clone() {
        controller = controller.with_sounds(dir);
    }

    let targets = RenderTargets::for_script(&options.script, options.output.clone(), options.report.clone());
    controller.run(&options.script, &targets).await?;
    Ok(())
}
