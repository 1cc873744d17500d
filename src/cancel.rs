//! A minimal cancellation token.
//!
//! The engine needs cooperative cancellation at many checkpoints (each stream event, each
//! hook callback, each tool execution, each storage operation — §5) but pulling in
//! `tokio-util` for this alone is unwarranted; this is a small `Arc<AtomicBool>` plus a
//! `Notify` for anyone that wants to `.await` cancellation rather than poll it. Generalizes
//! the ad hoc interrupt handling the teacher's interrupt demo shows into a reusable type.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// A cloneable, cooperative cancellation flag.
#[derive(Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark this token (and every clone of it) as cancelled.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once this token is cancelled. A no-op future if already cancelled.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.notify.notified().await;
    }

    /// Combine this token with an optional caller-supplied token using OR semantics:
    /// the result reports cancelled as soon as either one does.
    pub fn or(&self, other: Option<&CancellationToken>) -> CombinedToken {
        CombinedToken {
            a: self.clone(),
            b: other.cloned(),
        }
    }
}

/// The OR-combination of a session's own cancellation token and an optional
/// caller-supplied one, per §5's "the loop observes the OR of the two".
#[derive(Clone)]
pub struct CombinedToken {
    a: CancellationToken,
    b: Option<CancellationToken>,
}

impl CombinedToken {
    pub fn is_cancelled(&self) -> bool {
        self.a.is_cancelled() || self.b.as_ref().is_some_and(|t| t.is_cancelled())
    }
}
