//! EPUB loading pipeline.
//!
//! Ties extraction and normalization together behind a boundary that never
//! fails: callers always get either book content or a placeholder page to
//! show. The work is synchronous and may be pushed onto a worker thread with
//! [`RenderJob`].

use crate::archive::{ContentFragments, open_archive};
use crate::cancellation::CancellationToken;
use crate::error::ArchiveError;
use crate::normalizer::{DocumentBuilder, Placeholder, RenderableDocument};
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use tracing::{debug, info, warn};

/// Result of one render attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedBook {
    Document(RenderableDocument),
    Placeholder(Placeholder),
}

impl RenderedBook {
    /// HTML to hand to the rendering surface.
    pub fn html(&self) -> &str {
        match self {
            RenderedBook::Document(doc) => &doc.html,
            RenderedBook::Placeholder(placeholder) => &placeholder.html,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, RenderedBook::Placeholder(_))
    }
}

/// Accept both plain paths and `file://` references.
pub fn clean_document_path(reference: &str) -> PathBuf {
    PathBuf::from(reference.strip_prefix("file://").unwrap_or(reference))
}

/// Load the EPUB at `path` into a renderable document or a placeholder.
pub fn load_epub_document(path: &Path) -> RenderedBook {
    load_cancellable(path, &CancellationToken::new()).unwrap_or_else(|| {
        RenderedBook::Placeholder(Placeholder::load_failed("Loading was cancelled"))
    })
}

/// Same as [`load_epub_document`] but for an already-open container.
pub fn load_epub_from_reader<R: Read + Seek>(reader: R) -> RenderedBook {
    let outcome = ContentFragments::new(reader)
        .and_then(|fragments| build_document(fragments, &CancellationToken::new()));
    finish(outcome).unwrap_or_else(|| {
        RenderedBook::Placeholder(Placeholder::load_failed("Loading was cancelled"))
    })
}

/// Returns `None` only when `token` was cancelled mid-way.
fn load_cancellable(path: &Path, token: &CancellationToken) -> Option<RenderedBook> {
    let outcome = open_archive(path).and_then(|fragments| build_document(fragments, token));
    let rendered = finish(outcome)?;
    if let RenderedBook::Document(doc) = &rendered {
        info!(
            path = %path.display(),
            chapters = doc.chapter_count,
            total_chars = doc.html.len(),
            "Finished loading EPUB content"
        );
    }
    Some(rendered)
}

fn build_document<R: Read + Seek>(
    fragments: ContentFragments<R>,
    token: &CancellationToken,
) -> Result<Option<RenderableDocument>, ArchiveError> {
    let mut builder = DocumentBuilder::new();
    for fragment in fragments {
        if token.is_cancelled() {
            debug!(chapters = builder.chapter_count(), "Render cancelled");
            return Ok(None);
        }
        let fragment = fragment?;
        builder.push_fragment(&fragment.text);
    }
    Ok(Some(builder.finish()))
}

fn finish(outcome: Result<Option<RenderableDocument>, ArchiveError>) -> Option<RenderedBook> {
    match outcome {
        Ok(Some(doc)) if doc.chapter_count == 0 => {
            warn!("No content documents found in EPUB");
            Some(RenderedBook::Placeholder(Placeholder::no_content()))
        }
        Ok(Some(doc)) => Some(RenderedBook::Document(doc)),
        Ok(None) => None,
        Err(err) => {
            warn!("Failed to load EPUB: {err}");
            Some(RenderedBook::Placeholder(Placeholder::load_failed(
                err.to_string(),
            )))
        }
    }
}

/// A render running on a worker thread with a single completion signal.
pub struct RenderJob {
    token: CancellationToken,
    rx: mpsc::Receiver<RenderedBook>,
}

impl RenderJob {
    pub fn spawn(path: PathBuf) -> Self {
        let token = CancellationToken::new();
        let (tx, rx) = mpsc::channel();
        let worker_token = token.clone();
        thread::spawn(move || {
            if let Some(rendered) = load_cancellable(&path, &worker_token) {
                let _ = tx.send(rendered);
            }
        });
        Self { token, rx }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Non-blocking poll for the result.
    pub fn try_result(&self) -> Option<RenderedBook> {
        self.rx.try_recv().ok()
    }

    /// Block until the worker finishes. `None` if the job was cancelled.
    pub fn wait(self) -> Option<RenderedBook> {
        self.rx.recv().ok()
    }
}
