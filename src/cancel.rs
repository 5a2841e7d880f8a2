use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::EmbedError;

/// Cooperative cancellation flag shared between a caller and an in-flight
/// generation.
///
/// The engine polls it before tokenizing a chunk, before dispatching
/// inference, and before yielding each streamed vector. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Returns [`EmbedError::Cancelled`] once cancellation was requested.
    pub fn check(&self) -> Result<(), EmbedError> {
        if self.is_cancelled() {
            Err(EmbedError::Cancelled)
        } else {
            Ok(())
        }
    }
}
