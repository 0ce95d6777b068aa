//! Splits visible text into synthesizer-sized chunks.
//!
//! Chunks cover the input exactly, in order, with no gaps. A chunk is cut just
//! after the last `". "`, `"? "` or `"! "` inside its window; when the window
//! holds no such boundary it is cut at the window edge, mid-sentence. Lengths
//! are counted in Unicode scalar values.

use tracing::debug;

/// Default chunk ceiling, comfortably under common synthesizer input limits.
pub const DEFAULT_MAX_CHUNK_LENGTH: usize = 3000;

const SENTENCE_BOUNDARIES: [&str; 3] = [". ", "? ", "! "];

/// One unit of speech, dispatched as a single utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechChunk {
    pub index: usize,
    pub text: String,
}

/// Lazily yields chunks of `text` in index order.
pub struct Segmenter<'a> {
    text: &'a str,
    max_chunk_length: usize,
    cursor: usize,
    next_index: usize,
}

impl<'a> Segmenter<'a> {
    pub fn new(text: &'a str, max_chunk_length: usize) -> Self {
        Self {
            text,
            max_chunk_length: max_chunk_length.max(1),
            cursor: 0,
            next_index: 0,
        }
    }

    /// Byte offset of the window's right edge.
    fn window_end(&self) -> usize {
        let rest = &self.text[self.cursor..];
        rest.char_indices()
            .nth(self.max_chunk_length)
            .map(|(offset, _)| self.cursor + offset)
            .unwrap_or(self.text.len())
    }

    fn cut_point(&self) -> usize {
        let end = self.window_end();
        if end == self.text.len() {
            return end;
        }
        let window = &self.text[self.cursor..end];
        let boundary = SENTENCE_BOUNDARIES
            .iter()
            .filter_map(|marker| window.rfind(*marker))
            .max();
        match boundary {
            // A boundary at the very start would yield an empty-sentence chunk.
            Some(offset) if offset > 0 => self.cursor + offset + 2,
            _ => {
                debug!(
                    chunk = self.next_index,
                    "No sentence boundary in window; splitting mid-sentence"
                );
                end
            }
        }
    }
}

impl Iterator for Segmenter<'_> {
    type Item = SpeechChunk;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.text.len() {
            return None;
        }
        let cut = self.cut_point();
        let chunk = SpeechChunk {
            index: self.next_index,
            text: self.text[self.cursor..cut].to_string(),
        };
        self.cursor = cut;
        self.next_index += 1;
        Some(chunk)
    }
}

/// Segment `text` into chunks of at most `max_chunk_length` characters.
pub fn segment(text: &str, max_chunk_length: usize) -> Vec<SpeechChunk> {
    let chunks: Vec<SpeechChunk> = Segmenter::new(text, max_chunk_length).collect();
    debug!(
        input_chars = text.chars().count(),
        chunks = chunks.len(),
        "Segmented text for speech"
    );
    chunks
}
