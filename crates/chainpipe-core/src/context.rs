//! Run context — value propagation and cooperative cancellation.
//!
//! Rust has no ambient context type, so the pipeline passes a small
//! cloneable struct explicitly: a string-keyed bag of shared values plus a
//! cancellation token. The engine derives a child context per run carrying
//! a fresh [`StatsRecorder`](crate::stats::StatsRecorder) under
//! [`CTX_STATS`]; tasks and runners can read it back from the context they
//! receive.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::stats::StatsRecorder;

/// Context key under which the per-run stats recorder is stored.
pub const CTX_STATS: &str = "stats";

/// Cooperative cancellation handle shared by a context and its children.
///
/// Cancellation is advisory: the engine checks the token at height and
/// group boundaries, the sync runner between tasks. Long-running tasks
/// should observe it themselves.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Cloneable run context.
///
/// Cloning is cheap; all clones share the same values and cancellation
/// token. Deriving with [`Context::with_value`] produces a child that sees
/// the parent's values plus the new entry.
#[derive(Clone, Default)]
pub struct Context {
    values: Arc<HashMap<String, Arc<dyn Any + Send + Sync>>>,
    cancel: CancelToken,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a child context with `value` stored under `key`.
    pub fn with_value<T: Any + Send + Sync>(&self, key: &str, value: Arc<T>) -> Context {
        let mut values: HashMap<_, _> = (*self.values).clone();
        values.insert(key.to_string(), value as Arc<dyn Any + Send + Sync>);
        Context {
            values: Arc::new(values),
            cancel: self.cancel.clone(),
        }
    }

    /// Look up a value by key, downcast to the requested type.
    pub fn value<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.values
            .get(key)
            .cloned()
            .and_then(|value| value.downcast::<T>().ok())
    }

    /// The per-run stats recorder, when running inside the engine.
    pub fn stats(&self) -> Option<Arc<StatsRecorder>> {
        self.value(CTX_STATS)
    }

    /// A handle onto this context's cancellation token.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_roundtrip() {
        let ctx = Context::new();
        let child = ctx.with_value("answer", Arc::new(42u64));

        assert_eq!(*child.value::<u64>("answer").unwrap(), 42);
        // Parent is unaffected, wrong types and keys miss.
        assert!(ctx.value::<u64>("answer").is_none());
        assert!(child.value::<String>("answer").is_none());
        assert!(child.value::<u64>("question").is_none());
    }

    #[test]
    fn children_share_cancellation() {
        let ctx = Context::new();
        let child = ctx.with_value("k", Arc::new(1u8));

        assert!(!child.is_cancelled());
        ctx.cancel_token().cancel();
        assert!(child.is_cancelled());
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn stats_accessor_reads_ctx_stats_key() {
        let ctx = Context::new().with_value(CTX_STATS, Arc::new(StatsRecorder::new()));
        assert!(ctx.stats().is_some());
    }
}
