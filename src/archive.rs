//! Content-document extraction from a ZIP-packaged EPUB.
//!
//! The container is read generically: no OCF/manifest validation, no spine.
//! Every entry whose name ends in `.html`, `.xhtml` or `.htm` is yielded in
//! the archive's own enumeration order. The suffix match is case-sensitive,
//! so `CHAPTER.HTML` is skipped.

use crate::error::ArchiveError;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use tracing::{debug, info, warn};
use zip::ZipArchive;

const CONTENT_SUFFIXES: [&str; 3] = [".html", ".xhtml", ".htm"];

/// Raw text of one content document, in archive order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFragment {
    pub entry_name: String,
    pub text: String,
}

/// Whether an archive entry name looks like a content document.
pub fn is_content_entry(name: &str) -> bool {
    CONTENT_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

/// Open the archive at `path` and return its content documents lazily.
pub fn open_archive(path: &Path) -> Result<ContentFragments<BufReader<File>>, ArchiveError> {
    let file = File::open(path).map_err(|source| ArchiveError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "Opening EPUB container");
    ContentFragments::new(BufReader::new(file))
}

/// Single-pass iterator over the content documents of a ZIP container.
///
/// Yields `Err` at most once; after an error the iterator is exhausted.
pub struct ContentFragments<R> {
    archive: ZipArchive<R>,
    next_index: usize,
    failed: bool,
}

impl<R: Read + Seek> ContentFragments<R> {
    pub fn new(reader: R) -> Result<Self, ArchiveError> {
        let archive = ZipArchive::new(reader)?;
        debug!(entries = archive.len(), "Read archive directory");
        Ok(Self {
            archive,
            next_index: 0,
            failed: false,
        })
    }

    /// Total entries in the archive, matching or not.
    pub fn entry_count(&self) -> usize {
        self.archive.len()
    }

    fn read_entry(&mut self, index: usize) -> Result<Option<ContentFragment>, ArchiveError> {
        let mut entry = self.archive.by_index(index)?;
        if entry.is_dir() || !is_content_entry(entry.name()) {
            return Ok(None);
        }
        let entry_name = entry.name().to_string();

        // The declared size is untrusted; let the buffer grow with the data.
        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|err| ArchiveError::Corrupt(format!("reading {entry_name}: {err}")))?;

        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => {
                warn!(entry = %entry_name, "Content document is not valid UTF-8; decoding lossily");
                String::from_utf8_lossy(err.as_bytes()).into_owned()
            }
        };
        debug!(entry = %entry_name, bytes = text.len(), "Extracted content document");
        Ok(Some(ContentFragment { entry_name, text }))
    }
}

impl<R: Read + Seek> Iterator for ContentFragments<R> {
    type Item = Result<ContentFragment, ArchiveError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        while self.next_index < self.archive.len() {
            let index = self.next_index;
            self.next_index += 1;
            match self.read_entry(index) {
                Ok(Some(fragment)) => return Some(Ok(fragment)),
                Ok(None) => continue,
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            }
        }
        None
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::CompressionMethod;
    use zip::write::SimpleFileOptions;

    pub(crate) fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .expect("start zip entry");
            writer.write_all(body.as_bytes()).expect("write zip entry");
        }
        writer.finish().expect("finish zip").into_inner()
    }

    pub(crate) fn stored_zip(entries: &[(&str, &str)], large_file: bool) -> Vec<u8> {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .large_file(large_file);
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in entries {
            writer.start_file(*name, options).expect("start zip entry");
            writer.write_all(body.as_bytes()).expect("write zip entry");
        }
        writer.finish().expect("finish zip").into_inner()
    }

    pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> usize {
        haystack
            .windows(needle.len())
            .position(|window| window == needle)
            .expect("pattern present")
    }

    fn extract(bytes: Vec<u8>) -> Vec<ContentFragment> {
        ContentFragments::new(Cursor::new(bytes))
            .expect("valid archive")
            .collect::<Result<Vec<_>, _>>()
            .expect("all entries readable")
    }

    #[test]
    fn yields_content_documents_in_archive_order() {
        let bytes = build_zip(&[
            ("mimetype", "application/epub+zip"),
            ("OEBPS/ch2.xhtml", "two"),
            ("OEBPS/style.css", "p {}"),
            ("OEBPS/ch1.html", "one"),
            ("OEBPS/ch3.htm", "three"),
        ]);
        let names: Vec<String> = extract(bytes).into_iter().map(|f| f.entry_name).collect();
        assert_eq!(names, vec!["OEBPS/ch2.xhtml", "OEBPS/ch1.html", "OEBPS/ch3.htm"]);
    }

    #[test]
    fn suffix_match_is_case_sensitive() {
        let bytes = build_zip(&[("A.HTML", "upper"), ("b.html", "lower")]);
        let fragments = extract(bytes);
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].text, "lower");
    }

    #[test]
    fn duplicate_content_is_not_deduplicated() {
        let bytes = build_zip(&[("a/x.html", "same"), ("b/x.html", "same")]);
        assert_eq!(extract(bytes).len(), 2);
    }

    #[test]
    fn empty_archive_yields_nothing() {
        let bytes = build_zip(&[]);
        let fragments = ContentFragments::new(Cursor::new(bytes)).expect("valid archive");
        assert_eq!(fragments.entry_count(), 0);
        assert_eq!(fragments.count(), 0);
    }

    #[test]
    fn archive_without_content_documents_yields_nothing() {
        let bytes = build_zip(&[("mimetype", "application/epub+zip"), ("cover.jpg", "xx")]);
        assert!(extract(bytes).is_empty());
    }

    #[test]
    fn garbage_bytes_are_corrupt() {
        let result = ContentFragments::new(Cursor::new(b"definitely not a zip".to_vec()));
        assert!(matches!(result, Err(ArchiveError::Corrupt(_))));
    }

    #[test]
    fn missing_file_is_unreadable() {
        let result = open_archive(Path::new("/nonexistent/book.epub"));
        assert!(matches!(result, Err(ArchiveError::Unreadable { .. })));
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("bad.html", SimpleFileOptions::default())
            .expect("start zip entry");
        writer.write_all(&[b'o', b'k', 0xff]).expect("write zip entry");
        let bytes = writer.finish().expect("finish zip").into_inner();
        let fragments = extract(bytes);
        assert_eq!(fragments[0].text, "ok\u{fffd}");
    }

    #[test]
    fn oversized_declared_entry_size_does_not_preallocate() {
        let mut bytes = stored_zip(&[("big.html", "<p>small</p>")], true);
        let central = find(&bytes, b"PK\x01\x02");
        let name_len = u16::from_le_bytes([bytes[central + 28], bytes[central + 29]]) as usize;
        // Point both 32-bit sizes at the zip64 extra field, then inflate the
        // uncompressed size recorded there.
        bytes[central + 20..central + 28].fill(0xff);
        let extra = central + 46 + name_len;
        assert_eq!(&bytes[extra..extra + 2], &[0x01, 0x00]);
        bytes[extra + 4..extra + 12].copy_from_slice(&(u64::MAX / 2).to_le_bytes());

        let outcome: Vec<_> = match ContentFragments::new(Cursor::new(bytes)) {
            Ok(fragments) => fragments.collect(),
            Err(err) => vec![Err(err)],
        };
        assert_eq!(outcome.len(), 1);
        match &outcome[0] {
            Ok(fragment) => assert_eq!(fragment.text, "<p>small</p>"),
            Err(err) => assert!(matches!(err, ArchiveError::Corrupt(_)), "{err}"),
        }
    }

    #[test]
    fn unreadable_entry_is_corrupt_and_ends_iteration() {
        let mut bytes = stored_zip(
            &[
                ("ch1.html", "<p>first chapter</p>"),
                ("ch2.html", "<p>damaged chapter</p>"),
                ("ch3.html", "<p>never reached</p>"),
            ],
            false,
        );
        let payload = find(&bytes, b"damaged");
        bytes[payload] ^= 0x20;

        let mut fragments = ContentFragments::new(Cursor::new(bytes)).expect("valid directory");
        let first = fragments.next().expect("first entry").expect("intact entry");
        assert_eq!(first.text, "<p>first chapter</p>");
        assert!(matches!(fragments.next(), Some(Err(ArchiveError::Corrupt(_)))));
        assert!(fragments.next().is_none());
        assert!(fragments.next().is_none());
    }
}
