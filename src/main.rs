use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;

use linguise_fragments::core::{ContentKind, FragmentError};
use linguise_fragments::env::{core as core_env, EnvVar};
use linguise_fragments::translation::{ConfigManager, EngineConfig, FragmentEngine, HttpTranslator};

#[derive(Parser, Debug)]
#[command(
    name = "linguise-fragments",
    version,
    about = "Extract translatable fragments into an HTML carrier and patch translations back"
)]
struct Cli {
    /// Engine configuration file (TOML or JSON)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Input file, HTML page or JSON payload
    file: PathBuf,

    /// Treat the input as a raw JSON payload instead of sniffing it
    #[arg(long)]
    json: bool,
}

impl InputArgs {
    fn read(&self) -> Result<(String, ContentKind), FragmentError> {
        let content = fs::read_to_string(&self.file).map_err(|e| {
            FragmentError::new(&format!("无法读取 {}: {}", self.file.display(), e))
        })?;
        let kind = if self.json {
            ContentKind::Json
        } else {
            ContentKind::sniff(&content)
        };
        Ok((content, kind))
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Collect fragments and print the carrier document
    Collect {
        #[command(flatten)]
        input: InputArgs,

        /// Only collect values explicitly allowed by a rule
        #[arg(long)]
        strict: bool,

        /// Write the page with attribute markers to this file
        #[arg(long)]
        marked_page: Option<PathBuf>,
    },
    /// Apply a translated carrier document to the input
    Patch {
        #[command(flatten)]
        input: InputArgs,

        /// Translated carrier document
        #[arg(long)]
        carrier: PathBuf,
    },
    /// Run the whole flow against the configured translation backend
    Translate {
        #[command(flatten)]
        input: InputArgs,

        /// Target language, defaults to the configured one
        #[arg(short, long)]
        lang: Option<String>,
    },
}

fn init_logging() {
    let level = core_env::LogLevel::get()
        .ok()
        .and_then(|level| tracing::Level::from_str(&level).ok())
        .unwrap_or(tracing::Level::INFO);

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

fn load_config(path: Option<&str>) -> Result<EngineConfig, FragmentError> {
    let manager = match path {
        Some(path) => ConfigManager::from_file(path)?,
        None => ConfigManager::new()?,
    };
    if let Some(source) = manager.source() {
        tracing::debug!("配置来源: {}", source);
    }
    Ok(manager.into_config())
}

fn render_json(tree: &Value, original: &str) -> Result<String, FragmentError> {
    let rendered = if original.contains('\n') {
        serde_json::to_string_pretty(tree)
    } else {
        serde_json::to_string(tree)
    };
    rendered.map_err(|e| FragmentError::new(&format!("JSON编码失败: {}", e)))
}

fn parse_json(content: &str) -> Result<Value, FragmentError> {
    serde_json::from_str(content).map_err(|e| FragmentError::new(&format!("输入不是合法JSON: {}", e)))
}

fn run(cli: Cli) -> Result<String, FragmentError> {
    let config = load_config(cli.config.as_deref())?;
    let engine = FragmentEngine::from_config(&config)?;

    match cli.command {
        Command::Collect {
            input,
            strict,
            marked_page,
        } => {
            let (content, kind) = input.read()?;
            let groups = match kind {
                ContentKind::Json => engine.collect_json(&parse_json(&content)?, strict),
                ContentKind::Html => {
                    let collected = engine.collect_html(&content, strict);
                    if let Some(path) = marked_page {
                        fs::write(&path, &collected.html)?;
                    }
                    collected.groups
                }
            };
            tracing::info!("收集到 {} 个组, {} 个片段", groups.len(), groups.fragment_count());
            Ok(engine.to_carrier_document(&groups))
        }
        Command::Patch { input, carrier } => {
            let (content, kind) = input.read()?;
            let translated = fs::read_to_string(&carrier).map_err(|e| {
                FragmentError::new(&format!("无法读取 {}: {}", carrier.display(), e))
            })?;
            let groups = engine.from_carrier(&translated);

            match kind {
                ContentKind::Json => {
                    let patched = engine.apply_json(&parse_json(&content)?, &groups);
                    render_json(&patched, &content)
                }
                ContentKind::Html => Ok(engine.apply_page(&content, &groups)),
            }
        }
        Command::Translate { input, lang } => {
            let (content, kind) = input.read()?;
            let language = lang.unwrap_or_else(|| config.backend.target_lang.clone());
            let translator = HttpTranslator::new(&config.backend)?;
            tracing::info!("翻译到 {} via {}", language, translator.api_url());

            Ok(match kind {
                ContentKind::Json => engine.translate_json(&content, &language, &translator),
                ContentKind::Html => engine.translate_html(&content, &language, &translator),
            })
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    match run(cli) {
        Ok(output) => {
            let mut stdout = io::stdout();
            if let Err(e) = stdout
                .write_all(output.as_bytes())
                .and_then(|_| stdout.flush())
            {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
