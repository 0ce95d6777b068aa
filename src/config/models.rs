use crate::narration::SpeechSettings;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// High-level app configuration; deserializable from TOML.
#[derive(Debug, Clone, Deserialize, serde::Serialize, PartialEq)]
pub struct AppConfig {
    #[serde(default = "crate::config::defaults::default_log_level")]
    pub log_level: LogLevel,
    #[serde(default = "crate::config::defaults::default_max_chunk_length")]
    pub max_chunk_length: usize,
    #[serde(default = "crate::config::defaults::default_storage_dir")]
    pub storage_dir: String,
    #[serde(default = "crate::config::defaults::default_checkpoint_dir")]
    pub checkpoint_dir: String,
    #[serde(default = "crate::config::defaults::default_picker_mime_types")]
    pub picker_mime_types: Vec<String>,
    #[serde(default = "crate::config::defaults::default_tts_language")]
    pub tts_language: String,
    #[serde(default = "crate::config::defaults::default_tts_speech_rate")]
    pub tts_speech_rate: f32,
    #[serde(default = "crate::config::defaults::default_tts_pitch")]
    pub tts_pitch: f32,
    #[serde(default = "crate::config::defaults::default_reveal_transition_ms")]
    pub reveal_transition_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            log_level: crate::config::defaults::default_log_level(),
            max_chunk_length: crate::config::defaults::default_max_chunk_length(),
            storage_dir: crate::config::defaults::default_storage_dir(),
            checkpoint_dir: crate::config::defaults::default_checkpoint_dir(),
            picker_mime_types: crate::config::defaults::default_picker_mime_types(),
            tts_language: crate::config::defaults::default_tts_language(),
            tts_speech_rate: crate::config::defaults::default_tts_speech_rate(),
            tts_pitch: crate::config::defaults::default_tts_pitch(),
            reveal_transition_ms: crate::config::defaults::default_reveal_transition_ms(),
        }
    }
}

impl AppConfig {
    pub fn speech_settings(&self) -> SpeechSettings {
        SpeechSettings {
            language: self.tts_language.clone(),
            speech_rate: self.tts_speech_rate,
            pitch: self.tts_pitch,
        }
    }

    pub fn storage_path(&self) -> PathBuf {
        PathBuf::from(&self.storage_dir)
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        PathBuf::from(&self.checkpoint_dir)
    }

    pub fn reveal_transition(&self) -> Duration {
        Duration::from_millis(self.reveal_transition_ms)
    }
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, serde::Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
