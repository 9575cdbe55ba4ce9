use std::sync::atomic::{AtomicU8, Ordering};

use camcal_types::SessionState;

/// Lock-free holder for the externally visible session state
pub struct SessionStateCell(AtomicU8);

impl SessionStateCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(SessionState::NotStarted as u8))
    }

    pub fn get(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, state: SessionState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

impl Default for SessionStateCell {
    fn default() -> Self {
        Self::new()
    }
}
