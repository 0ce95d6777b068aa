//! EPUB ingestion and narration core.
//!
//! Pipeline, leaf-first:
//! - `import` copies a picked document into app storage.
//! - `archive` pulls content documents out of the EPUB container.
//! - `normalizer` joins them into one scrollable HTML document.
//! - `segmenter` cuts visible text into synthesizer-sized chunks.
//! - `narration` feeds chunks to a speech engine and tracks its progress.
//! - `checkpoint` remembers where the reader left off.
//!
//! `session` ties these together for one open document; the rendering
//! surface, speech engine, picker and key-value store are host collaborators
//! expressed as traits.

pub mod archive;
pub mod cancellation;
pub mod checkpoint;
pub mod config;
pub mod epub_loader;
pub mod error;
pub mod import;
pub mod narration;
pub mod normalizer;
pub mod segmenter;
pub mod session;
pub mod surface;

pub use error::{ArchiveError, ImportError};
pub use import::SourceDocument;
pub use normalizer::RenderableDocument;
pub use segmenter::SpeechChunk;

#[cfg(test)]
mod tests {
    use crate::archive::tests::build_zip;
    use crate::checkpoint::{TomlFileStore, document_key};
    use crate::config::AppConfig;
    use crate::import::{DocumentImportBridge, MIME_EPUB, PickOutcome, PickedFile};
    use crate::narration::UtteranceListener;
    use crate::narration::tests::RecordingEngine;
    use crate::session::ReaderSession;
    use crate::surface::{HeadlessSurface, RenderSurface};
    use std::io::Cursor;

    #[tokio::test]
    async fn imported_book_narrates_and_resumes() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            storage_dir: dir.path().join("docs").display().to_string(),
            checkpoint_dir: dir.path().join("cp").display().to_string(),
            ..AppConfig::default()
        };
        let epub = build_zip(&[
            ("mimetype", "application/epub+zip"),
            ("OEBPS/ch1.xhtml", "<html><body><h1>One</h1><p>It began.</p></body></html>"),
            ("OEBPS/ch2.xhtml", "<html><body><p>It ended.</p></body></html>"),
        ]);
        let size = epub.len() as u64;

        let bridge = DocumentImportBridge::new(config.storage_path());
        let document = bridge
            .import(PickOutcome::Picked(PickedFile {
                reader: Box::new(Cursor::new(epub)),
                display_name: Some("novel.epub".to_string()),
                size_bytes: Some(size),
                mime_type: None,
            }))
            .unwrap();
        assert_eq!(document.mime_type, MIME_EPUB);
        assert_eq!(document.size_bytes, size);

        let mut session = ReaderSession::open(
            &document.local_path,
            config.clone(),
            HeadlessSurface::new(),
            RecordingEngine::default(),
            TomlFileStore::new(config.checkpoint_path()),
        );
        assert!(!session.rendered().is_placeholder());
        assert_eq!(session.on_load_complete(), None);

        assert_eq!(session.speak_visible().await.unwrap(), 1);
        let id = session.narration().engine().spoken_ids()[0].clone();
        let callbacks = session.narration().callbacks();
        callbacks.on_start(&id);
        callbacks.on_done(&id);
        assert_eq!(session.pump_engine_events(), 2);
        assert!(!session.narration().has_outstanding());

        session.surface_mut().scroll_to(1200);
        let (_, _, store) = session.teardown();
        drop(store);

        let mut reopened = ReaderSession::open(
            &document.local_path,
            config.clone(),
            HeadlessSurface::new(),
            RecordingEngine::default(),
            TomlFileStore::new(config.checkpoint_path()),
        );
        let restore = reopened.on_load_complete().expect("saved position");
        assert_eq!(restore.offset_pixels, 1200);
        assert_eq!(reopened.surface().current_scroll_offset(), 1200);
        assert_eq!(reopened.document_key(), document_key(&document.local_path));
    }
}
