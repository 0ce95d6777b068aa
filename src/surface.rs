//! Rendering-surface collaborator.
//!
//! The surface is an HTML view owned by the host. The core only loads a
//! document into it, scrolls it, and asks it for the text a reader can
//! currently see.

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::future::Future;
use tracing::{debug, warn};

/// Collects headings and paragraphs starting one viewport above the current
/// scroll position and returns them joined by spaces.
pub const VISIBLE_TEXT_SCRIPT: &str = concat!(
    "(function() { ",
    "  var scrollY = window.scrollY || window.pageYOffset; ",
    "  var viewportHeight = window.innerHeight; ",
    "  var elements = document.querySelectorAll('p, h1, h2, h3, h4, h5, h6'); ",
    "  var text = ''; ",
    "  for (var i = 0; i < elements.length; i++) { ",
    "    var rect = elements[i].getBoundingClientRect(); ",
    "    var elementTop = rect.top + scrollY; ",
    "    if (elementTop >= scrollY - viewportHeight) { ",
    "      text += elements[i].innerText + ' '; ",
    "    } ",
    "  } ",
    "  return text; ",
    "})();"
);

static RE_BODY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<body[^>]*>(.*)</body>").unwrap());

pub trait RenderSurface {
    fn load(&mut self, html: &str);

    /// Evaluate `script` against the live DOM; resolves to the script's
    /// result serialized as JSON.
    fn evaluate_script(&mut self, script: &str) -> impl Future<Output = Result<String>> + Send;

    fn scroll_to(&mut self, offset_pixels: u32);

    fn current_scroll_offset(&self) -> u32;
}

/// Decode a JSON-serialized script result into speakable text.
///
/// `null` (or an empty string) means there is nothing to speak. Line breaks
/// become spaces. Results that are not JSON strings are used as-is.
pub fn decode_script_result(raw: &str) -> Option<String> {
    let text = match serde_json::from_str::<Option<String>>(raw.trim()) {
        Ok(value) => value?,
        Err(err) => {
            warn!("Script result is not a JSON string; using raw value: {err}");
            raw.to_string()
        }
    };
    let text = text.replace("\r\n", " ").replace('\n', " ");
    if text.trim().is_empty() {
        debug!("Script returned no visible text");
        return None;
    }
    Some(text)
}

/// Surface without a display, for the CLI and tests. There is no viewport, so
/// the visible-text query answers with the text of the whole document.
#[derive(Debug, Default, Clone)]
pub struct HeadlessSurface {
    html: String,
    scroll_offset: u32,
    loads: usize,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn load_count(&self) -> usize {
        self.loads
    }

    /// Plain text of the loaded document's body, one block per paragraph.
    pub fn plain_text(&self) -> String {
        let body = RE_BODY
            .captures(&self.html)
            .and_then(|caps| caps.get(1))
            .map_or(self.html.as_str(), |m| m.as_str());
        // Very wide lines so no hard wraps are baked into the text.
        match html2text::from_read(body.as_bytes(), 10_000) {
            Ok(text) => text,
            Err(err) => {
                warn!("html2text failed on loaded document: {err}");
                String::new()
            }
        }
    }
}

impl RenderSurface for HeadlessSurface {
    fn load(&mut self, html: &str) {
        self.html = html.to_string();
        self.scroll_offset = 0;
        self.loads += 1;
        debug!(chars = html.len(), "Headless surface loaded document");
    }

    async fn evaluate_script(&mut self, script: &str) -> Result<String> {
        if script != VISIBLE_TEXT_SCRIPT {
            debug!("Headless surface only understands the visible-text query");
            return Ok("null".to_string());
        }
        let text = self.plain_text();
        let blocks: Vec<&str> = text
            .split("\n\n")
            .map(str::trim)
            .filter(|block| !block.is_empty())
            .collect();
        Ok(serde_json::to_string(&blocks.join(" "))?)
    }

    fn scroll_to(&mut self, offset_pixels: u32) {
        self.scroll_offset = offset_pixels;
    }

    fn current_scroll_offset(&self) -> u32 {
        self.scroll_offset
    }
}
