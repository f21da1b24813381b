//! Cooperative skip signal for the page currently being recognized.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Per-run token an outside party raises to skip the current page.
///
/// Cloning shares the flag. The pipeline polls it with [`SkipToken::take`], which also
/// clears it, so one request affects exactly one page.
#[derive(Debug, Clone, Default)]
pub struct SkipToken {
    flag: Arc<AtomicBool>,
}

impl SkipToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the pipeline to abandon the page it is working on.
    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Consume a pending request, returning whether one was set.
    pub fn take(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_clears_flag() {
        let token = SkipToken::new();
        let remote = token.clone();
        assert!(!token.take());

        remote.request();
        assert!(token.is_requested());
        assert!(token.take());
        assert!(!token.take());
        assert!(!remote.is_requested());
    }
}
