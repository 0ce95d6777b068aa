use super::{NarrationEvent, NarrationState, QueueMode, UtteranceId};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub(super) enum EngineCommand {
    Stop,
    Speak {
        text: String,
        mode: QueueMode,
        id: UtteranceId,
    },
}

/// Everything the controller knows about the engine's progress.
#[derive(Debug, Default)]
pub(super) struct NarrationModel {
    pub(super) state: NarrationState,
    pub(super) generation: u64,
    pub(super) active: Option<UtteranceId>,
    pub(super) dispatched: usize,
    pub(super) outstanding: bool,
    pub(super) last_error: Option<UtteranceId>,
}

impl NarrationModel {
    fn is_current(&self, id: UtteranceId) -> bool {
        id.generation == self.generation
    }

    fn is_last(&self, id: UtteranceId) -> bool {
        id.index + 1 >= self.dispatched
    }

    fn reset_to_idle(&mut self) {
        self.state = NarrationState::Idle;
        self.active = None;
        self.outstanding = false;
    }
}

pub(super) fn transition(model: &mut NarrationModel, event: NarrationEvent) -> Vec<EngineCommand> {
    match event {
        NarrationEvent::Start(chunks) => {
            let mut commands = Vec::with_capacity(chunks.len() + 1);
            if chunks.is_empty() {
                debug!("Nothing to narrate; skipping dispatch");
                return commands;
            }
            if model.outstanding || model.state == NarrationState::Speaking {
                info!(
                    generation = model.generation,
                    "Restarting narration; stopping previous utterances first"
                );
                commands.push(EngineCommand::Stop);
            }
            model.generation = model.generation.wrapping_add(1);
            model.reset_to_idle();
            model.outstanding = true;
            model.dispatched = chunks.len();
            model.last_error = None;
            info!(
                generation = model.generation,
                chunks = chunks.len(),
                "Dispatching narration"
            );
            // Ids and queue modes follow batch position, not the chunk's own index.
            for (position, chunk) in chunks.into_iter().enumerate() {
                let mode = if position == 0 {
                    QueueMode::Flush
                } else {
                    QueueMode::Append
                };
                commands.push(EngineCommand::Speak {
                    id: UtteranceId {
                        generation: model.generation,
                        index: position,
                    },
                    mode,
                    text: chunk.text,
                });
            }
            commands
        }
        NarrationEvent::EngineStarted(id) => {
            if !model.is_current(id) {
                debug!(%id, "Ignoring start callback from a previous narration");
                return Vec::new();
            }
            model.state = NarrationState::Speaking;
            model.active = Some(id);
            debug!(%id, "Utterance started");
            Vec::new()
        }
        NarrationEvent::EngineDone(id) => {
            if !model.is_current(id) {
                debug!(%id, "Ignoring done callback from a previous narration");
                return Vec::new();
            }
            if model.active == Some(id) {
                model.state = NarrationState::Idle;
                model.active = None;
            }
            if model.is_last(id) {
                info!(%id, "Narration finished");
                model.reset_to_idle();
            }
            Vec::new()
        }
        NarrationEvent::EngineError(id) => {
            if !model.is_current(id) {
                debug!(%id, "Ignoring error callback from a previous narration");
                return Vec::new();
            }
            // Queued chunks are left with the engine; only the flag flips.
            warn!(%id, "Speech engine reported an error");
            model.state = NarrationState::Idle;
            model.active = None;
            model.last_error = Some(id);
            if model.is_last(id) {
                model.outstanding = false;
            }
            Vec::new()
        }
        NarrationEvent::Stop => {
            info!(generation = model.generation, "Stopping narration");
            model.generation = model.generation.wrapping_add(1);
            model.reset_to_idle();
            vec![EngineCommand::Stop]
        }
    }
}
