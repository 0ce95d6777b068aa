//! Turns extracted content documents into one continuous HTML document.
//!
//! Each fragment loses its container-level tags (`html`, `head`, `body`,
//! `meta`); everything else is left byte-for-byte as it was. Fragments are
//! joined in extraction order with a fixed spacer between chapters and wrapped
//! once in the reading template.

use crate::archive::ContentFragment;
use once_cell::sync::Lazy;
use regex::Regex;

/// Inserted after every chapter.
pub const CHAPTER_SPACER: &str = "<div style='height: 20px;'></div>";

const TEMPLATE_HEAD: &str = concat!(
    "<!DOCTYPE html><html><head>",
    "<meta name='viewport' content='width=device-width, initial-scale=1.0, maximum-scale=3.0, user-scalable=yes'>",
    "<style>",
    "* { margin: 0; padding: 0; box-sizing: border-box; }",
    "body { font-family: Georgia, 'Times New Roman', serif; line-height: 1.8; padding: 20px; ",
    "font-size: 18px; background: #faf8f5; color: #333; max-width: 800px; margin: 0 auto; }",
    "p { margin-bottom: 1em; text-align: justify; }",
    "h1, h2, h3, h4, h5, h6 { margin-top: 1.5em; margin-bottom: 0.5em; font-weight: bold; }",
    "h1 { font-size: 2em; }",
    "h2 { font-size: 1.5em; }",
    "h3 { font-size: 1.3em; }",
    "img { max-width: 100%; height: auto; display: block; margin: 1em auto; }",
    "blockquote { margin: 1em 0; padding-left: 1em; border-left: 3px solid #ccc; font-style: italic; }",
    "a { color: #007AFF; text-decoration: none; }",
    "</style>",
    "</head><body>",
);
const TEMPLATE_TAIL: &str = "</body></html>";

const NO_CONTENT_HTML: &str =
    "<h1>No content found</h1><p>This EPUB file appears to be empty or corrupted.</p>";

// Tag name must be followed by whitespace, `/` or `>` so `<header>` and
// `<metadata>` survive.
static RE_CONTAINER_TAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</?(?:html|head|body)(?:\s[^>]*)?/?>").unwrap());
static RE_META_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<meta(?:\s[^>]*)?/?>").unwrap());

/// The single HTML document handed to the rendering surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderableDocument {
    pub html: String,
    pub chapter_count: usize,
}

/// Why a placeholder page is shown instead of book content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceholderReason {
    NoContent,
    LoadFailed(String),
}

/// Literal fallback page rendered when the pipeline produced no content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub reason: PlaceholderReason,
    pub html: String,
}

impl Placeholder {
    pub fn no_content() -> Self {
        Self {
            reason: PlaceholderReason::NoContent,
            html: NO_CONTENT_HTML.to_string(),
        }
    }

    pub fn load_failed(message: impl Into<String>) -> Self {
        let message = message.into();
        let html = format!(
            "<h1>Error loading EPUB</h1><p>{}</p>",
            escape_html(&message)
        );
        Self {
            reason: PlaceholderReason::LoadFailed(message),
            html,
        }
    }
}

/// Remove container-level tags from one fragment.
pub fn strip_container_tags(fragment: &str) -> String {
    let without_containers = RE_CONTAINER_TAGS.replace_all(fragment, "");
    RE_META_TAG.replace_all(&without_containers, "").into_owned()
}

/// Incremental builder so fragments can be consumed straight off the
/// extractor without collecting them first.
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    body: String,
    chapter_count: usize,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_fragment(&mut self, fragment: &str) {
        self.body.push_str(&strip_container_tags(fragment));
        self.body.push_str(CHAPTER_SPACER);
        self.chapter_count += 1;
    }

    pub fn chapter_count(&self) -> usize {
        self.chapter_count
    }

    pub fn finish(self) -> RenderableDocument {
        let mut html =
            String::with_capacity(TEMPLATE_HEAD.len() + self.body.len() + TEMPLATE_TAIL.len());
        html.push_str(TEMPLATE_HEAD);
        html.push_str(&self.body);
        html.push_str(TEMPLATE_TAIL);
        RenderableDocument {
            html,
            chapter_count: self.chapter_count,
        }
    }
}

/// Normalize and join fragments in the order given.
pub fn normalize<'a, I>(fragments: I) -> RenderableDocument
where
    I: IntoIterator<Item = &'a ContentFragment>,
{
    let mut builder = DocumentBuilder::new();
    for fragment in fragments {
        builder.push_fragment(&fragment.text);
    }
    builder.finish()
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
