//! One reading session: a rendered document, its surface, its narration and
//! its scroll checkpoint.
//!
//! The host forwards lifecycle signals (`on_load_complete`, `on_pause`,
//! `teardown`) and engine callbacks; everything else is owned here so no
//! global state is needed.

use crate::checkpoint::{KeyValueStore, ScrollCheckpointStore, document_key};
use crate::config::AppConfig;
use crate::epub_loader::{RenderedBook, load_epub_document};
use crate::narration::{NarrationController, SpeechEngine};
use crate::segmenter::segment;
use crate::surface::{RenderSurface, VISIBLE_TEXT_SCRIPT, decode_script_result};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Instructions for restoring a saved position without a visible jump:
/// keep the surface hidden, scroll to `offset_pixels`, then fade it in over
/// `reveal_after`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollRestore {
    pub offset_pixels: u32,
    pub reveal_after: Duration,
}

pub struct ReaderSession<S, E, K> {
    document_path: PathBuf,
    document_key: String,
    config: AppConfig,
    rendered: RenderedBook,
    surface: S,
    narration: NarrationController<E>,
    checkpoints: ScrollCheckpointStore<K>,
}

impl<S, E, K> ReaderSession<S, E, K>
where
    S: RenderSurface,
    E: SpeechEngine,
    K: KeyValueStore,
{
    /// Render the EPUB at `document_path` and load it into `surface`.
    pub fn open(document_path: &Path, config: AppConfig, surface: S, engine: E, store: K) -> Self {
        let rendered = load_epub_document(document_path);
        Self::with_rendered(document_path, rendered, config, surface, engine, store)
    }

    /// Start a session from a document rendered elsewhere (e.g. a background
    /// [`crate::epub_loader::RenderJob`]).
    pub fn with_rendered(
        document_path: &Path,
        rendered: RenderedBook,
        config: AppConfig,
        mut surface: S,
        engine: E,
        store: K,
    ) -> Self {
        let key = document_key(document_path);
        info!(
            path = %document_path.display(),
            key = %key,
            placeholder = rendered.is_placeholder(),
            "Opening reader session"
        );
        surface.load(rendered.html());
        let narration = NarrationController::new(engine, &config.speech_settings());
        Self {
            document_path: document_path.to_path_buf(),
            document_key: key,
            config,
            rendered,
            surface,
            narration,
            checkpoints: ScrollCheckpointStore::new(store),
        }
    }

    pub fn document_path(&self) -> &Path {
        &self.document_path
    }

    pub fn document_key(&self) -> &str {
        &self.document_key
    }

    pub fn rendered(&self) -> &RenderedBook {
        &self.rendered
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn narration(&self) -> &NarrationController<E> {
        &self.narration
    }

    pub fn narration_mut(&mut self) -> &mut NarrationController<E> {
        &mut self.narration
    }

    /// Restore the saved scroll position once the surface finished loading.
    pub fn on_load_complete(&mut self) -> Option<ScrollRestore> {
        if self.rendered.is_placeholder() {
            return None;
        }
        let offset = self.checkpoints.load(&self.document_key);
        if offset == 0 {
            debug!("No saved scroll position");
            return None;
        }
        info!(offset, "Restoring scroll position");
        self.surface.scroll_to(offset);
        Some(ScrollRestore {
            offset_pixels: offset,
            reveal_after: self.config.reveal_transition(),
        })
    }

    /// Read the visible text off the surface and narrate it. Returns the
    /// number of chunks dispatched.
    pub async fn speak_visible(&mut self) -> Result<usize> {
        let raw = self
            .surface
            .evaluate_script(VISIBLE_TEXT_SCRIPT)
            .await
            .context("Extracting visible text")?;
        let Some(text) = decode_script_result(&raw) else {
            info!("No visible text to narrate");
            return Ok(0);
        };
        let chunks = segment(&text, self.config.max_chunk_length);
        self.narration.start(chunks)
    }

    /// Play/pause control: stops when speaking, otherwise narrates from the
    /// current viewport.
    pub async fn toggle_speech(&mut self) -> Result<usize> {
        if self.narration.is_speaking() {
            self.narration.stop();
            return Ok(0);
        }
        self.speak_visible().await
    }

    /// Nudge the speech rate by `delta`. Narration that is playing restarts
    /// from the current viewport at the new rate. Returns the rate in effect.
    pub async fn adjust_speed(&mut self, delta: f32) -> Result<f32> {
        let rate = self
            .narration
            .set_speech_rate(self.narration.speech_rate() + delta);
        self.config.tts_speech_rate = rate;
        if self.narration.is_speaking() {
            info!(rate, "Restarting narration at new speech rate");
            self.narration.stop();
            self.speak_visible().await?;
        }
        Ok(rate)
    }

    pub fn stop_speech(&mut self) {
        self.narration.stop();
    }

    /// Apply engine callbacks posted from other threads.
    pub fn pump_engine_events(&mut self) -> usize {
        self.narration.pump()
    }

    pub fn on_pause(&mut self) {
        self.save_position();
    }

    /// Final save, then stop and release the speech engine.
    pub fn teardown(mut self) -> (S, E, K) {
        self.save_position();
        let engine = self.narration.shutdown();
        info!(path = %self.document_path.display(), "Reader session closed");
        (self.surface, engine, self.checkpoints.into_inner())
    }

    fn save_position(&mut self) {
        // A placeholder page must not clobber the real book's position.
        if self.rendered.is_placeholder() {
            return;
        }
        let offset = self.surface.current_scroll_offset();
        self.checkpoints.save(&self.document_key, offset);
    }
}
