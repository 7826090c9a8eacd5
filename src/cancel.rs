//! Cooperative cancellation for long engine runs

use crate::error::{ChromaShadeError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Rows processed between two cancellation checks in row-blocked loops
pub const ROW_BLOCK: usize = 64;

/// Shared flag a host sets to abandon an in-flight engine call
///
/// Clones share the same flag. Engines only read it between stages and row
/// blocks, so a cancelled call returns [`ChromaShadeError::Cancelled`] within
/// one block of work and never leaves partial output behind.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of every call holding a clone of this token
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Return `Err(Cancelled)` when an attached token has fired
pub(crate) fn checkpoint(token: Option<&CancellationToken>) -> Result<()> {
    match token {
        Some(t) if t.is_cancelled() => Err(ChromaShadeError::Cancelled),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_flag() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(checkpoint(Some(&clone)).is_ok());
        token.cancel();
        assert!(clone.is_cancelled());
        assert!(matches!(checkpoint(Some(&clone)), Err(ChromaShadeError::Cancelled)));
        assert!(checkpoint(None).is_ok());
    }
}
