use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Shared flag a host flips to abandon a background render.
///
/// Checked between archive entries; an entry already being inflated is
/// finished first.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
