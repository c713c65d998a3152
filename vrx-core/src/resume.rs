//! One-shot continuations and cancellation.
//!
//! Lifecycle hooks, scripted waits and audio playback all finish
//! asynchronously. They receive a [`Resume`] and fire it once when done; the
//! frame driver observes it on its next pass.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

/// Shared cancellation flag. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
struct ResumeInner {
    fired: AtomicBool,
    token: CancellationToken,
}

/// Handle that advances a suspended step exactly once.
#[derive(Debug, Clone)]
pub struct Resume {
    inner: Arc<ResumeInner>,
}

impl Resume {
    /// A resume handle that can never be cancelled.
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// A resume handle bound to `token`; firing after cancellation is a no-op.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            inner: Arc::new(ResumeInner {
                fired: AtomicBool::new(false),
                token,
            }),
        }
    }

    /// Fire the continuation. Returns `true` only for the call that actually
    /// advanced it.
    pub fn resume(&self) -> bool {
        if self.inner.token.is_cancelled() {
            debug!("resume ignored: owner was cancelled");
            return false;
        }
        if self.inner.fired.swap(true, Ordering::AcqRel) {
            debug!("resume ignored: already fired");
            return false;
        }
        true
    }

    pub fn is_fired(&self) -> bool {
        self.inner.fired.load(Ordering::Acquire)
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }
}

impl Default for Resume {
    fn default() -> Self {
        Self::new()
    }
}
