// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use ocity::app_config::{self, Config, RenderStrategy};
use ocity::errors::{ErrorKind, PipelineError};
use ocity::media::FinalArtifact;
use ocity::pipeline::{HeritageRecord, LengthVariant, VideoPipeline, VideoResponse};

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

/// CLI Wrapper for RenderStrategy to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliStrategy {
    Clip,
    Still,
}

impl From<CliStrategy> for RenderStrategy {
    fn from(cli_strategy: CliStrategy) -> Self {
        match cli_strategy {
            CliStrategy::Clip => RenderStrategy::Clip,
            CliStrategy::Still => RenderStrategy::Still,
        }
    }
}

/// CLI Wrapper for LengthVariant to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLength {
    Short,
    Extended,
}

impl From<CliLength> for LengthVariant {
    fn from(cli_length: CliLength) -> Self {
        match cli_length {
            CliLength::Short => LengthVariant::Short,
            CliLength::Extended => LengthVariant::Extended,
        }
    }
}

/// Options shared by every generating subcommand
#[derive(Args, Debug, Clone)]
struct CommonArgs {
    /// Output video file
    #[arg(short, long, default_value = "output.mp4")]
    output: PathBuf,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Segment rendering strategy
    #[arg(short, long, value_enum)]
    strategy: Option<CliStrategy>,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Print the result as a JSON response on stdout
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Narrate free text over an image
    Text {
        /// Text to narrate, or '-' to read it from stdin
        #[arg(value_name = "TEXT")]
        text: String,

        /// Background image URL
        #[arg(short, long)]
        image: Option<String>,

        /// Narration and caption language (e.g., 'es', 'en', 'pt-BR')
        #[arg(short = 'L', long)]
        language: Option<String>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Narrate one heritage record read from a JSON file
    Record {
        /// JSON file holding one record
        #[arg(value_name = "RECORD_JSON")]
        path: PathBuf,

        /// Target language, or 'local' for the record's own language
        #[arg(short = 'L', long, default_value = "en")]
        language: String,

        /// Description length to narrate
        #[arg(long, value_enum, default_value = "extended")]
        length: CliLength,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Narrate a JSON array of heritage records into one video
    Batch {
        /// JSON file holding an array of records
        #[arg(value_name = "RECORDS_JSON")]
        path: PathBuf,

        /// Target language, or 'local' for the records' own language
        #[arg(short = 'L', long, default_value = "en")]
        language: String,

        /// Description length to narrate
        #[arg(long, value_enum, default_value = "extended")]
        length: CliLength,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Generate shell completions for ocity
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// ocity - narrated heritage videos
///
/// Turns text and a background image into a narrated MP4 with translated
/// captions and a posing avatar.
#[derive(Parser, Debug)]
#[command(name = "ocity")]
#[command(version)]
#[command(about = "Narrated video generator")]
#[command(long_about = "ocity narrates text with a TTS service, splits it into sentences timed against the
narration, renders one captioned segment per sentence and muxes everything into one MP4.

EXAMPLES:
    ocity text \"Hola mundo. Esto es una prueba.\" -i https://example.com/bg.png
    ocity text - -L en -o intro.mp4 < intro.txt
    ocity record site.json -L local --length short
    ocity batch sites.json -L fr --strategy still --json
    ocity completions bash > ocity.bash

CONFIGURATION:
    Configuration is stored in conf.json by default. If the file doesn't exist,
    a default one is created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
}

// @struct: Custom logger implementation, filtered by the global max level
struct CustomLogger;

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI colour for log level
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

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
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
async fn main() {
    if let Err(e) = CustomLogger::init(LevelFilter::Info) {
        eprintln!("Failed to initialize logger: {}", e);
    }

    let cli = CommandLineOptions::parse();
    if let Err(e) = run(cli.command).await {
        error!("{:#}", e);
        let code = match e.downcast_ref::<PipelineError>().map(PipelineError::kind) {
            Some(ErrorKind::InvalidInput) => 2,
            _ => 1,
        };
        std::process::exit(code);
    }
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "ocity", &mut std::io::stdout());
            Ok(())
        }
        Commands::Text { text, image, language, common } => {
            let config = load_config(&common)?;
            let text = if text == "-" {
                std::io::read_to_string(std::io::stdin()).context("Failed to read text from stdin")?
            } else {
                text
            };
            let language = language.unwrap_or_else(|| config.default_language.clone());
            let pipeline = VideoPipeline::from_config(config)?;

            let result = pipeline.generate_video(&text, image.as_deref(), &language).await;
            finish(result, &common, None)
        }
        Commands::Record { path, language, length, common } => {
            let config = load_config(&common)?;
            let record: HeritageRecord = read_json(&path)?;
            let pipeline = VideoPipeline::from_config(config)?;

            let result = pipeline
                .generate_video_from_record(&record, &language, length.into())
                .await;
            finish(result, &common, None)
        }
        Commands::Batch { path, language, length, common } => {
            let config = load_config(&common)?;
            let records: Vec<HeritageRecord> = read_json(&path)?;
            let pipeline = VideoPipeline::from_config(config)?;

            let progress = ProgressBar::new(records.len() as u64);
            let style = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} records ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            progress.set_style(style.progress_chars("█▓▒░"));
            progress.enable_steady_tick(std::time::Duration::from_millis(120));

            let result = pipeline
                .generate_multi_video_with_progress(&records, &language, length.into(), |done| {
                    progress.set_position(done as u64)
                })
                .await;
            progress.finish_and_clear();
            finish(result, &common, Some(records.len()))
        }
    }
}

/// Load or create the configuration, then apply CLI overrides and validate
fn load_config(options: &CommonArgs) -> Result<Config> {
    if let Some(cmd_log_level) = &options.log_level {
        let level: app_config::LogLevel = cmd_log_level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    let config_path = &options.config_path;
    let mut config = if Path::new(config_path).exists() {
        read_json(Path::new(config_path))?
    } else {
        warn!("Config file not found at '{}', creating default config.", config_path);
        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        std::fs::write(config_path, config_json)
            .with_context(|| format!("Failed to write default config to file: {}", config_path))?;
        config
    };

    if let Some(strategy) = &options.strategy {
        config.render_strategy = strategy.clone().into();
    }
    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }

    config.validate().context("Configuration validation failed")?;
    log::set_max_level(config.log_level.to_level_filter());
    Ok(config)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    serde_json::from_reader(BufReader::new(file)).with_context(|| format!("Failed to parse {:?}", path))
}

/// Write the video and report the outcome
fn finish(result: Result<FinalArtifact, PipelineError>, options: &CommonArgs, video_count: Option<usize>) -> Result<()> {
    match result {
        Ok(artifact) => {
            if let Some(parent) = options.output.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create output directory {:?}", parent))?;
            }
            std::fs::write(&options.output, &artifact.bytes)
                .with_context(|| format!("Failed to write video to {:?}", options.output))?;
            info!(
                "Success: {:?} ({} unit(s), {:.1}s, {})",
                options.output, artifact.unit_count, artifact.duration_secs, artifact.mime_type
            );

            if options.json {
                let response = VideoResponse::success(options.output.to_string_lossy(), video_count);
                println!("{}", serde_json::to_string(&response)?);
            }
            Ok(())
        }
        Err(e) => {
            if options.json {
                let (status, response) = VideoResponse::failure(&e);
                println!("{}", serde_json::to_string(&response)?);
                warn!("Request failed with status {}", status);
            }
            Err(e.into())
        }
    }
}
