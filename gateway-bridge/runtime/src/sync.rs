use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Gates the event router. While closed, notifications are dropped without
/// side effects.
///
/// Reads are relaxed: a toggle becomes visible to handlers eventually, not
/// immediately.
#[derive(Clone, Debug, Default)]
pub struct SyncGate(Arc<AtomicBool>);

impl SyncGate {
    pub fn new(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Opens or closes the gate, returning its previous state.
    pub fn set(&self, enabled: bool) -> bool {
        self.0.swap(enabled, Ordering::Relaxed)
    }
}
