use super::models::LogLevel;
use crate::segmenter::DEFAULT_MAX_CHUNK_LENGTH;

pub(crate) fn default_log_level() -> LogLevel {
    LogLevel::Info
}

pub(crate) fn default_max_chunk_length() -> usize {
    DEFAULT_MAX_CHUNK_LENGTH
}

pub(crate) fn default_storage_dir() -> String {
    "documents".to_string()
}

pub(crate) fn default_checkpoint_dir() -> String {
    ".cache/checkpoints".to_string()
}

pub(crate) fn default_picker_mime_types() -> Vec<String> {
    vec![
        crate::import::MIME_PDF.to_string(),
        crate::import::MIME_EPUB.to_string(),
    ]
}

pub(crate) fn default_tts_language() -> String {
    "en-US".to_string()
}

pub(crate) fn default_tts_speech_rate() -> f32 {
    0.8
}

pub(crate) fn default_tts_pitch() -> f32 {
    1.0
}

pub(crate) fn default_reveal_transition_ms() -> u64 {
    150
}
