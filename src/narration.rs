//! Drives a speech engine through a sequence of chunks.
//!
//! The controller is single-writer: every state change goes through
//! [`transitions::transition`], either directly from the owning thread or via
//! [`EngineCallbacks`], which engines running elsewhere use to post their
//! start/done/error notifications. Posted events are applied on [`pump`].
//!
//! [`pump`]: NarrationController::pump

mod transitions;

use crate::segmenter::SpeechChunk;
use anyhow::{Result, anyhow};
use std::fmt;
use std::str::FromStr;
use std::sync::mpsc;
use tracing::{debug, info, warn};
use transitions::{EngineCommand, NarrationModel, transition};

const UTTERANCE_PREFIX: &str = "epub_tts_";

pub const MIN_SPEECH_RATE: f32 = 0.3;
pub const MAX_SPEECH_RATE: f32 = 1.5;

/// How a new utterance relates to whatever the engine already has queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueMode {
    /// Drop everything queued or playing, then speak.
    Flush,
    /// Speak after everything already queued.
    Append,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NarrationState {
    #[default]
    Idle,
    Speaking,
}

/// Identifies one dispatched chunk within one narration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtteranceId {
    pub generation: u64,
    pub index: usize,
}

impl fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{UTTERANCE_PREFIX}{}_{}", self.generation, self.index)
    }
}

impl FromStr for UtteranceId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix(UTTERANCE_PREFIX)
            .ok_or_else(|| anyhow!("not a narration utterance id: {s}"))?;
        let (generation, index) = rest
            .split_once('_')
            .ok_or_else(|| anyhow!("malformed utterance id: {s}"))?;
        Ok(Self {
            generation: generation.parse()?,
            index: index.parse()?,
        })
    }
}

/// Voice parameters applied once when the engine is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechSettings {
    pub language: String,
    pub speech_rate: f32,
    pub pitch: f32,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            speech_rate: 0.8,
            pitch: 1.0,
        }
    }
}

/// Opaque synthesizer. Playback is serialized by the engine itself.
pub trait SpeechEngine {
    fn configure(&mut self, _settings: &SpeechSettings) -> Result<()> {
        Ok(())
    }

    /// Rate for utterances dispatched from now on.
    fn set_speech_rate(&mut self, _rate: f32) -> Result<()> {
        Ok(())
    }

    fn speak(&mut self, text: &str, mode: QueueMode, utterance_id: &str) -> Result<()>;

    /// Stop immediately and drop anything queued.
    fn stop(&mut self);

    fn shutdown(&mut self) {}
}

/// Narrow callback capability an engine reports progress through.
pub trait UtteranceListener {
    fn on_start(&self, utterance_id: &str);
    fn on_done(&self, utterance_id: &str);
    fn on_error(&self, utterance_id: &str);
}

/// Inputs to the narration state machine.
#[derive(Debug)]
pub enum NarrationEvent {
    Start(Vec<SpeechChunk>),
    EngineStarted(UtteranceId),
    EngineDone(UtteranceId),
    EngineError(UtteranceId),
    Stop,
}

/// Thread-safe handle that forwards engine callbacks to the controller.
#[derive(Debug, Clone)]
pub struct EngineCallbacks {
    tx: mpsc::Sender<NarrationEvent>,
}

impl EngineCallbacks {
    fn post(&self, utterance_id: &str, make: fn(UtteranceId) -> NarrationEvent) {
        match utterance_id.parse::<UtteranceId>() {
            Ok(id) => {
                let _ = self.tx.send(make(id));
            }
            Err(err) => debug!("Dropping engine callback: {err}"),
        }
    }
}

impl UtteranceListener for EngineCallbacks {
    fn on_start(&self, utterance_id: &str) {
        self.post(utterance_id, NarrationEvent::EngineStarted);
    }

    fn on_done(&self, utterance_id: &str) {
        self.post(utterance_id, NarrationEvent::EngineDone);
    }

    fn on_error(&self, utterance_id: &str) {
        self.post(utterance_id, NarrationEvent::EngineError);
    }
}

pub struct NarrationController<E> {
    engine: E,
    model: NarrationModel,
    speech_rate: f32,
    tx: mpsc::Sender<NarrationEvent>,
    rx: mpsc::Receiver<NarrationEvent>,
}

impl<E: SpeechEngine> NarrationController<E> {
    pub fn new(mut engine: E, settings: &SpeechSettings) -> Self {
        if let Err(err) = engine.configure(settings) {
            warn!(language = %settings.language, "Speech engine rejected settings: {err}");
        } else {
            info!(
                language = %settings.language,
                rate = settings.speech_rate,
                pitch = settings.pitch,
                "Speech engine configured"
            );
        }
        let (tx, rx) = mpsc::channel();
        Self {
            engine,
            model: NarrationModel::default(),
            speech_rate: settings.speech_rate,
            tx,
            rx,
        }
    }

    /// Handle for engines that report progress from another thread.
    pub fn callbacks(&self) -> EngineCallbacks {
        EngineCallbacks {
            tx: self.tx.clone(),
        }
    }

    pub fn state(&self) -> NarrationState {
        self.model.state
    }

    pub fn is_speaking(&self) -> bool {
        self.model.state == NarrationState::Speaking
    }

    /// True from dispatch until the last chunk finishes or narration stops.
    pub fn has_outstanding(&self) -> bool {
        self.model.outstanding
    }

    /// Most recent utterance the engine failed on in the current run.
    pub fn last_error(&self) -> Option<UtteranceId> {
        self.model.last_error
    }

    pub fn speech_rate(&self) -> f32 {
        self.speech_rate
    }

    /// Clamp `rate` to the supported range and hand it to the engine.
    /// Returns the rate now in effect; a rejected change keeps the old one.
    pub fn set_speech_rate(&mut self, rate: f32) -> f32 {
        if !rate.is_finite() {
            warn!(rate, "Ignoring non-finite speech rate");
            return self.speech_rate;
        }
        let clamped = rate.clamp(MIN_SPEECH_RATE, MAX_SPEECH_RATE);
        if let Err(err) = self.engine.set_speech_rate(clamped) {
            warn!(rate = clamped, "Speech engine rejected rate: {err}");
            return self.speech_rate;
        }
        info!(from = self.speech_rate, to = clamped, "Speech rate changed");
        self.speech_rate = clamped;
        clamped
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Dispatch all chunks: the first flushes the engine queue, the rest
    /// append. Returns the number of chunks dispatched.
    pub fn start(&mut self, chunks: Vec<SpeechChunk>) -> Result<usize> {
        let count = chunks.len();
        self.handle(NarrationEvent::Start(chunks))?;
        Ok(count)
    }

    pub fn stop(&mut self) {
        // Stop never fails; it only issues an engine stop.
        let _ = self.handle(NarrationEvent::Stop);
    }

    pub fn engine_started(&mut self, utterance_id: &str) {
        self.handle_callback(utterance_id, NarrationEvent::EngineStarted);
    }

    pub fn engine_done(&mut self, utterance_id: &str) {
        self.handle_callback(utterance_id, NarrationEvent::EngineDone);
    }

    pub fn engine_error(&mut self, utterance_id: &str) {
        self.handle_callback(utterance_id, NarrationEvent::EngineError);
    }

    /// Apply callbacks posted through [`EngineCallbacks`]. Returns how many
    /// were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.rx.try_recv() {
            let _ = self.handle(event);
            applied += 1;
        }
        applied
    }

    /// Stop narration and release the engine.
    pub fn shutdown(mut self) -> E {
        self.stop();
        self.engine.shutdown();
        self.engine
    }

    pub fn handle(&mut self, event: NarrationEvent) -> Result<()> {
        let commands = transition(&mut self.model, event);
        self.apply(commands)
    }

    fn handle_callback(&mut self, utterance_id: &str, make: fn(UtteranceId) -> NarrationEvent) {
        match utterance_id.parse::<UtteranceId>() {
            Ok(id) => {
                let _ = self.handle(make(id));
            }
            Err(err) => debug!("Ignoring engine callback: {err}"),
        }
    }

    fn apply(&mut self, commands: Vec<EngineCommand>) -> Result<()> {
        for command in commands {
            match command {
                EngineCommand::Stop => self.engine.stop(),
                EngineCommand::Speak { text, mode, id } => {
                    debug!(%id, ?mode, chars = text.chars().count(), "Dispatching utterance");
                    if let Err(err) = self.engine.speak(&text, mode, &id.to_string()) {
                        warn!(%id, "Speech engine refused utterance: {err}");
                        let stop = transition(&mut self.model, NarrationEvent::Stop);
                        for command in stop {
                            if command == EngineCommand::Stop {
                                self.engine.stop();
                            }
                        }
                        return Err(err.context(format!("dispatching utterance {id}")));
                    }
                }
            }
        }
        Ok(())
    }
}
