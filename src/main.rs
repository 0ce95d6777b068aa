//! Command-line front end for the narration core.
//!
//! Responsibilities here are intentionally minimal:
//! - Parse command-line arguments.
//! - Load user configuration from `conf/config.toml`.
//! - Run one pipeline stage headlessly (render, narrate, import, chunk).

use anyhow::{Context, Result, anyhow};
use epub_narrator::checkpoint::TomlFileStore;
use epub_narrator::config::{AppConfig, load_config};
use epub_narrator::epub_loader::{RenderedBook, clean_document_path, load_epub_document};
use epub_narrator::import::{DocumentImportBridge, PickOutcome, PickedFile, read_as_base64};
use epub_narrator::narration::{
    EngineCallbacks, QueueMode, SpeechEngine, SpeechSettings, UtteranceListener,
};
use epub_narrator::segmenter::segment;
use epub_narrator::session::ReaderSession;
use epub_narrator::surface::HeadlessSurface;
use std::env;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

const USAGE: &str = "Usage:
  epub-narrator render <book.epub> [out.html]
  epub-narrator narrate <book.epub>
  epub-narrator import <file>
  epub-narrator chunks <text-file>
  epub-narrator base64 <file>";

enum Command {
    Render { book: PathBuf, out: Option<PathBuf> },
    Narrate { book: PathBuf },
    Import { file: PathBuf },
    Chunks { file: PathBuf },
    Base64 { file: PathBuf },
}

fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let command = parse_args()?;
    let config = load_config(Path::new("conf/config.toml"));
    set_log_level(reload_handle, config.log_level.as_filter_str());

    match command {
        Command::Render { book, out } => render(&book, out.as_deref()),
        Command::Narrate { book } => narrate(&book, config),
        Command::Import { file } => import(&file, &config),
        Command::Chunks { file } => chunks(&file, &config),
        Command::Base64 { file } => {
            println!("{}", read_as_base64(&file)?);
            Ok(())
        }
    }
}

fn parse_args() -> Result<Command> {
    let mut args = env::args().skip(1);
    let name = args.next().ok_or_else(|| anyhow!(USAGE))?;
    let path = args
        .next()
        .map(|arg| clean_document_path(&arg))
        .ok_or_else(|| anyhow!(USAGE))?;

    let command = match name.as_str() {
        "render" => Command::Render {
            book: path,
            out: args.next().map(PathBuf::from),
        },
        "narrate" => Command::Narrate { book: path },
        "import" => Command::Import { file: path },
        "chunks" => Command::Chunks { file: path },
        "base64" => Command::Base64 { file: path },
        other => return Err(anyhow!("Unknown command `{other}`\n{USAGE}")),
    };
    Ok(command)
}

fn render(book: &Path, out: Option<&Path>) -> Result<()> {
    let rendered = load_epub_document(book);
    if let RenderedBook::Placeholder(placeholder) = &rendered {
        warn!(reason = ?placeholder.reason, "Rendered a placeholder page");
    }
    match out {
        Some(out) => {
            fs::write(out, rendered.html())
                .with_context(|| format!("Failed to write {}", out.display()))?;
            info!(path = %out.display(), "Wrote rendered document");
        }
        None => println!("{}", rendered.html()),
    }
    Ok(())
}

fn narrate(book: &Path, config: AppConfig) -> Result<()> {
    let store = TomlFileStore::new(config.checkpoint_path());
    let mut session = ReaderSession::open(
        book,
        config,
        HeadlessSurface::new(),
        ConsoleSpeechEngine::default(),
        store,
    );
    if let Some(restore) = session.on_load_complete() {
        info!(offset = restore.offset_pixels, "Resuming from saved position");
    }
    let callbacks = session.narration().callbacks();
    session.narration_mut().engine_mut().callbacks = Some(callbacks);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .context("Failed to start async runtime")?;
    let dispatched = runtime.block_on(session.speak_visible())?;
    let applied = session.pump_engine_events();
    info!(dispatched, applied, "Narration finished");

    session.teardown();
    Ok(())
}

fn import(file: &Path, config: &AppConfig) -> Result<()> {
    let reader = File::open(file).with_context(|| format!("Failed to open {}", file.display()))?;
    let size_bytes = reader.metadata().ok().map(|meta| meta.len());
    let picked = PickedFile {
        reader: Box::new(reader),
        display_name: file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned()),
        size_bytes,
        mime_type: None,
    };
    let bridge = DocumentImportBridge::new(config.storage_path());
    let document = bridge.import(PickOutcome::Picked(picked))?;
    if !config.picker_mime_types.contains(&document.mime_type) {
        warn!(mime = %document.mime_type, "Imported a document type the picker would filter out");
    }
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}

fn chunks(file: &Path, config: &AppConfig) -> Result<()> {
    let text =
        fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
    for chunk in segment(&text, config.max_chunk_length) {
        println!(
            "--- chunk {} ({} chars) ---\n{}",
            chunk.index,
            chunk.text.chars().count(),
            chunk.text
        );
    }
    Ok(())
}

/// Prints utterances instead of synthesizing them and reports each one as
/// spoken straight away.
#[derive(Default)]
struct ConsoleSpeechEngine {
    callbacks: Option<EngineCallbacks>,
}

impl SpeechEngine for ConsoleSpeechEngine {
    fn configure(&mut self, settings: &SpeechSettings) -> Result<()> {
        info!(
            language = %settings.language,
            rate = settings.speech_rate,
            "Console speech engine ready"
        );
        Ok(())
    }

    fn set_speech_rate(&mut self, rate: f32) -> Result<()> {
        info!(rate, "Console speech engine rate changed");
        Ok(())
    }

    fn speak(&mut self, text: &str, mode: QueueMode, utterance_id: &str) -> Result<()> {
        let label = match mode {
            QueueMode::Flush => "flush",
            QueueMode::Append => "append",
        };
        println!("[{label}] {utterance_id}: {text}");
        if let Some(callbacks) = &self.callbacks {
            callbacks.on_start(utterance_id);
            callbacks.on_done(utterance_id);
        }
        Ok(())
    }

    fn stop(&mut self) {
        info!("Console speech engine stopped");
    }
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_writer(std::io::stderr)
                .with_filter(filter_layer),
        )
        .init();
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    if env::var_os("RUST_LOG").is_some() {
        return;
    }
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(err) = handle.modify(|filter| *filter = parsed) {
        warn!(%level, "Failed to update log level from config: {err}");
    }
}
