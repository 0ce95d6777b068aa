//! Copies user-picked documents into app-private storage.
//!
//! A second import with the same display name overwrites the first copy;
//! unrelated documents that share a name collide.

use crate::error::ImportError;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use std::fs::{self, File};
use std::future::Future;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_EPUB: &str = "application/epub+zip";
pub const MIME_UNKNOWN: &str = "unknown";

const FALLBACK_NAME: &str = "document";

/// A document that now lives in app storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceDocument {
    pub local_path: PathBuf,
    pub mime_type: String,
    pub size_bytes: u64,
    pub display_name: String,
}

impl SourceDocument {
    /// `file://` reference for hosts that expect a URI.
    pub fn local_uri(&self) -> String {
        format!("file://{}", self.local_path.display())
    }

    pub fn is_epub(&self) -> bool {
        self.mime_type == MIME_EPUB
    }
}

/// What the picker handed back for a selection.
pub struct PickedFile {
    pub reader: Box<dyn Read + Send>,
    pub display_name: Option<String>,
    pub size_bytes: Option<u64>,
    pub mime_type: Option<String>,
}

pub enum PickOutcome {
    Picked(PickedFile),
    Cancelled,
    NoSelection,
}

/// Native document picker; completes once per call.
pub trait DocumentPicker {
    fn pick(&mut self, mime_filters: &[String]) -> impl Future<Output = PickOutcome> + Send;
}

pub struct DocumentImportBridge {
    storage_dir: PathBuf,
}

impl DocumentImportBridge {
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
        }
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Run the picker and import whatever it returns.
    pub async fn pick_and_import<P: DocumentPicker>(
        &self,
        picker: &mut P,
        mime_filters: &[String],
    ) -> Result<SourceDocument, ImportError> {
        let outcome = picker.pick(mime_filters).await;
        self.import(outcome)
    }

    pub fn import(&self, outcome: PickOutcome) -> Result<SourceDocument, ImportError> {
        let picked = match outcome {
            PickOutcome::Picked(picked) => picked,
            PickOutcome::Cancelled => {
                info!("Document picker cancelled");
                return Err(ImportError::Cancelled);
            }
            PickOutcome::NoSelection => {
                warn!("Document picker returned no selection");
                return Err(ImportError::NoSelection);
            }
        };

        let display_name = sanitize_display_name(picked.display_name.as_deref());
        let mime_type = picked
            .mime_type
            .filter(|mime| !mime.trim().is_empty())
            .unwrap_or_else(|| infer_mime_type(&display_name).to_string());

        fs::create_dir_all(&self.storage_dir).map_err(|err| {
            ImportError::io(
                format!("creating storage dir {}", self.storage_dir.display()),
                err,
            )
        })?;
        let local_path = self.storage_dir.join(&display_name);
        let copied = copy_into(picked.reader, &local_path)?;

        if let Some(reported) = picked.size_bytes {
            if reported != copied {
                warn!(
                    reported,
                    copied,
                    name = %display_name,
                    "Picker-reported size differs from copied size"
                );
            }
        }
        info!(
            path = %local_path.display(),
            size_bytes = copied,
            mime = %mime_type,
            "Imported document"
        );
        Ok(SourceDocument {
            local_path,
            mime_type,
            size_bytes: copied,
            display_name,
        })
    }
}

fn copy_into(mut reader: Box<dyn Read + Send>, destination: &Path) -> Result<u64, ImportError> {
    let file = File::create(destination)
        .map_err(|err| ImportError::io(format!("creating {}", destination.display()), err))?;
    let mut writer = BufWriter::new(file);
    let copied = io::copy(&mut reader, &mut writer)
        .map_err(|err| ImportError::io(format!("copying into {}", destination.display()), err))?;
    writer
        .flush()
        .map_err(|err| ImportError::io(format!("flushing {}", destination.display()), err))?;
    Ok(copied)
}

/// Keep only the final path component so a name can't leave storage.
fn sanitize_display_name(name: Option<&str>) -> String {
    name.map(|raw| raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim())
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .unwrap_or(FALLBACK_NAME)
        .to_string()
}

/// Best guess when the picker reports no MIME type.
pub fn infer_mime_type(name: &str) -> &'static str {
    let extension = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("pdf") => MIME_PDF,
        Some("epub") => MIME_EPUB,
        _ => MIME_UNKNOWN,
    }
}

/// Full content of a stored document as standard base64.
pub fn read_as_base64(path: &Path) -> Result<String, ImportError> {
    let bytes =
        fs::read(path).map_err(|err| ImportError::io(format!("reading {}", path.display()), err))?;
    Ok(STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn picked(name: Option<&str>, body: &[u8], mime: Option<&str>) -> PickOutcome {
        PickOutcome::Picked(PickedFile {
            reader: Box::new(Cursor::new(body.to_vec())),
            display_name: name.map(str::to_string),
            size_bytes: Some(body.len() as u64),
            mime_type: mime.map(str::to_string),
        })
    }

    struct ScriptedPicker(Option<PickOutcome>);

    impl DocumentPicker for ScriptedPicker {
        async fn pick(&mut self, _mime_filters: &[String]) -> PickOutcome {
            self.0.take().unwrap_or(PickOutcome::NoSelection)
        }
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("device gone"))
        }
    }

    #[test]
    fn copies_and_reports_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = DocumentImportBridge::new(dir.path().join("docs"));
        let doc = bridge
            .import(picked(Some("Book.epub"), b"PK\x03\x04data", Some(MIME_EPUB)))
            .unwrap();
        assert_eq!(doc.display_name, "Book.epub");
        assert_eq!(doc.size_bytes, 8);
        assert_eq!(doc.mime_type, MIME_EPUB);
        assert_eq!(fs::read(&doc.local_path).unwrap(), b"PK\x03\x04data");
        assert!(doc.local_uri().starts_with("file://"));
        assert!(doc.is_epub());
    }

    #[test]
    fn same_name_overwrites_previous_copy() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = DocumentImportBridge::new(dir.path());
        bridge.import(picked(Some("a.pdf"), b"first", None)).unwrap();
        let doc = bridge.import(picked(Some("a.pdf"), b"2nd", None)).unwrap();
        assert_eq!(fs::read(&doc.local_path).unwrap(), b"2nd");
        assert_eq!(doc.mime_type, MIME_PDF);
    }

    #[test]
    fn cancellation_and_empty_selection_are_distinct() {
        let bridge = DocumentImportBridge::new("unused");
        let cancelled = bridge.import(PickOutcome::Cancelled).unwrap_err();
        assert!(cancelled.is_cancellation());
        let empty = bridge.import(PickOutcome::NoSelection).unwrap_err();
        assert!(matches!(empty, ImportError::NoSelection));
        assert!(!empty.is_cancellation());
    }

    #[test]
    fn read_failure_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = DocumentImportBridge::new(dir.path());
        let outcome = PickOutcome::Picked(PickedFile {
            reader: Box::new(FailingReader),
            display_name: Some("x.epub".into()),
            size_bytes: None,
            mime_type: None,
        });
        let err = bridge.import(outcome).unwrap_err();
        assert!(matches!(err, ImportError::Io { .. }));
        assert!(!err.is_cancellation());
    }

    #[test]
    fn display_names_cannot_escape_storage() {
        assert_eq!(sanitize_display_name(Some("../../etc/passwd")), "passwd");
        assert_eq!(sanitize_display_name(Some("dir\\file.epub")), "file.epub");
        assert_eq!(sanitize_display_name(Some("..")), FALLBACK_NAME);
        assert_eq!(sanitize_display_name(None), FALLBACK_NAME);
    }

    #[test]
    fn infers_mime_from_extension() {
        assert_eq!(infer_mime_type("x.PDF"), MIME_PDF);
        assert_eq!(infer_mime_type("x.epub"), MIME_EPUB);
        assert_eq!(infer_mime_type("x.txt"), MIME_UNKNOWN);
    }

    #[test]
    fn reads_stored_document_as_base64() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.bin");
        fs::write(&path, b"hello").unwrap();
        assert_eq!(read_as_base64(&path).unwrap(), "aGVsbG8=");
        assert!(read_as_base64(&dir.path().join("missing")).is_err());
    }

    #[tokio::test]
    async fn picker_outcome_flows_through_import() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = DocumentImportBridge::new(dir.path());
        let filters = vec![MIME_EPUB.to_string()];

        let mut picker = ScriptedPicker(Some(picked(Some("p.epub"), b"zz", None)));
        let doc = bridge.pick_and_import(&mut picker, &filters).await.unwrap();
        assert_eq!(doc.mime_type, MIME_EPUB);

        let mut cancelled = ScriptedPicker(Some(PickOutcome::Cancelled));
        let err = bridge
            .pick_and_import(&mut cancelled, &filters)
            .await
            .unwrap_err();
        assert!(err.is_cancellation());
    }
}
