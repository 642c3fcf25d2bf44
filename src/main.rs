// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{error, info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use chapterwise::app_config::{Config, LogLevel, TranslationProvider};
use chapterwise::documents::TextDirectory;
use chapterwise::{Controller, RunOutcome};

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Gemini,
    Zhipu,
    Minimax,
    Kimi,
    #[value(name = "openai")]
    OpenAI,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Gemini => TranslationProvider::Gemini,
            CliTranslationProvider::Zhipu => TranslationProvider::Zhipu,
            CliTranslationProvider::Minimax => TranslationProvider::Minimax,
            CliTranslationProvider::Kimi => TranslationProvider::Kimi,
            CliTranslationProvider::OpenAI => TranslationProvider::OpenAI,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LogLevel::Error,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Trace => LogLevel::Trace,
        }
    }
}

/// Options shared by every command that touches a source
#[derive(Parser, Debug, Clone)]
struct CommonArgs {
    /// Directory holding the documents to translate
    #[arg(value_name = "INPUT_DIR")]
    input_dir: PathBuf,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// Target language, as a code ('fr', 'pt-BR') or a name
    #[arg(short, long)]
    target_language: Option<String>,

    /// API key for the selected provider
    #[arg(long, env = "CHAPTERWISE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

#[derive(Parser, Debug)]
struct TranslateArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Directory the translated copy is written below
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Use only the primary provider
    #[arg(long)]
    no_fallback: bool,

    /// Hide the progress bar
    #[arg(long)]
    quiet: bool,
}

#[derive(Parser, Debug)]
struct ClearArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Confirm deletion of the checkpoint
    #[arg(long)]
    yes: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate every document of a directory, resuming from its checkpoint
    Translate(TranslateArgs),

    /// Show the checkpoint of a directory for the current settings
    Status(CommonArgs),

    /// Delete the checkpoint of a directory for the current settings
    Clear(ClearArgs),

    /// Generate shell completions for chapterwise
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Chapterwise - resumable batch translation with LLM providers
#[derive(Parser, Debug)]
#[command(name = "chapterwise")]
#[command(version)]
#[command(about = "Resumable batch translation of document collections")]
#[command(long_about = "Chapterwise translates every document of a directory a few paragraphs per request.

EXAMPLES:
    chapterwise translate ./book -t fr              # Translate into French
    chapterwise translate ./book -p kimi -m kimi-k2 # Use a specific provider and model
    chapterwise status ./book -t fr                 # Show checkpoint progress
    chapterwise clear ./book -t fr --yes            # Start over on the next run
    chapterwise completions bash > chapterwise.bash # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. If the file doesn't exist,
    a default one is created. A run interrupted with Ctrl-C resumes from its
    checkpoint as long as the source, language, model and prompt are unchanged.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger { level: LevelFilter::Trace }))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Color escape and marker for a log level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("\x1B[1;31m", "❌"),
            Level::Warn => ("\x1B[1;33m", "🚧"),
            Level::Info => ("\x1B[1;32m", " "),
            Level::Debug => ("\x1B[1;36m", "🔍"),
            Level::Trace => ("\x1B[1;35m", "📋"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.target().starts_with("chapterwise")
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (color, marker) = Self::style_for_level(record.level());
            let _ = writeln!(std::io::stderr(), "{}{} {} {}\x1B[0m", color, now, marker, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Info until the config is loaded
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "chapterwise", &mut std::io::stdout());
            Ok(())
        }
        Commands::Translate(args) => run_translate(args).await,
        Commands::Status(args) => run_status(args).await,
        Commands::Clear(args) => run_clear(args).await,
    }
}

/// Load the config file, creating a default one when missing, then apply CLI overrides
fn load_config(options: &CommonArgs) -> Result<Config> {
    let config_path = &options.config_path;
    let mut config = if Path::new(config_path).exists() {
        let file = File::open(config_path)
            .context(format!("Failed to open config file: {}", config_path))?;
        serde_json::from_reader(BufReader::new(file))
            .context(format!("Failed to parse config file: {}", config_path))?
    } else {
        warn!("Config file not found at '{}', creating default config.", config_path);
        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        std::fs::write(config_path, config_json)
            .context(format!("Failed to write default config to file: {}", config_path))?;
        config
    };

    if let Some(provider) = &options.provider {
        config.translation.provider = provider.clone().into();
    }

    let active = config.translation.provider;
    if let Some(model) = &options.model {
        config.translation.provider_config_mut(active).model = model.clone();
    }
    if let Some(api_key) = &options.api_key {
        config.translation.provider_config_mut(active).api_key = api_key.clone();
    }
    if let Some(target_lang) = &options.target_language {
        config.target_language = target_lang.clone();
    }
    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }

    log::set_max_level(config.log_level.as_level_filter());
    Ok(config)
}

/// Controller without provider clients, for checkpoint inspection
fn checkpoint_controller(config: Config) -> Result<Controller> {
    let store = Controller::open_store(&config).context("Failed to open checkpoint database")?;
    Ok(Controller::with_parts(config, Arc::new(store), Vec::new()))
}

async fn run_translate(options: TranslateArgs) -> Result<()> {
    let mut config = load_config(&options.common)?;
    if options.no_fallback {
        config.translation.enable_fallback = false;
    }
    config.validate().context("Configuration validation failed")?;

    let controller = Controller::with_config(config)?.with_progress(!options.quiet);

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after in-flight requests");
            signal_token.cancel();
        }
    });

    let input_dir = &options.common.input_dir;
    let output_root = options.output.clone()
        .or_else(|| input_dir.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));

    match controller.run_directory(input_dir, &output_root, &cancel).await {
        Ok(RunOutcome::Completed { output_dir, report }) => {
            info!("Output written to {:?}", output_dir);
            if !report.is_complete() {
                warn!("{} document(s) kept their original text, run again to retry them", report.failures.len());
            }
            Ok(())
        }
        Ok(RunOutcome::Cancelled) => {
            info!("Run again with the same settings to resume");
            Ok(())
        }
        Err(e) => {
            error!("Translation failed: {}", e);
            Err(e.into())
        }
    }
}

async fn run_status(options: CommonArgs) -> Result<()> {
    let config = load_config(&options)?;
    let controller = checkpoint_controller(config)?;
    let source = TextDirectory::open(&options.input_dir)?;

    let line = controller.checkpoint_status(&source).await?;
    println!("{}", line);
    Ok(())
}

async fn run_clear(options: ClearArgs) -> Result<()> {
    if !options.yes {
        anyhow::bail!("Refusing to delete the checkpoint without --yes");
    }

    let config = load_config(&options.common)?;
    let controller = checkpoint_controller(config)?;
    let source = TextDirectory::open(&options.common.input_dir)?;

    if controller.clear_checkpoint(&source).await? {
        println!("checkpoint cleared");
    } else {
        println!("no checkpoint found");
    }
    Ok(())
}
