//! The pluggable I/O boundary of a pipeline run.
//!
//! The engine is generic over the payload type `P`: tasks receive `&P`
//! directly, no downcasting involved. Payloads are shared across sibling
//! concurrent stages behind an `Arc`, so any mutable state a stage writes
//! must live in interior-mutable fields with disjoint write regions (or
//! its own locking) — the engine does not serialize payload access.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::PipelineError;
use crate::stage::StageName;

/// A per-height value produced by a [`PayloadFactory`].
///
/// The engine calls [`mark_as_processed`](Payload::mark_as_processed) at
/// most once per acquired payload — after sink success, or never when the
/// run aborts. Pool-backed factories recycle on that call and must
/// tolerate it never arriving.
pub trait Payload: Send + Sync + 'static {
    fn mark_as_processed(&self);
}

/// Mints a fresh payload bound to a height. Implementations are expected
/// to recycle payloads through an internal pool.
pub trait PayloadFactory<P: Payload>: Send + Sync {
    fn get_payload(&self, height: i64) -> Arc<P>;
}

/// A named unit of work executed inside a stage.
#[async_trait]
pub trait Task<P: Payload>: Send + Sync {
    /// The task's name, consulted by the whitelist gate before every run.
    fn name(&self) -> &str;

    async fn run(&self, ctx: &Context, payload: &P) -> Result<(), PipelineError>;
}

/// Predicate a runner consults before invoking each task, honoring
/// whitelist gating.
pub type TaskValidator = dyn Fn(&str) -> bool + Send + Sync;

/// Executes zero or more tasks on behalf of a stage.
#[async_trait]
pub trait StageRunner<P: Payload>: Send + Sync {
    async fn run(
        &self,
        ctx: &Context,
        payload: Arc<P>,
        can_run_task: &TaskValidator,
    ) -> Result<(), PipelineError>;
}

/// A lazy monotonic cursor over heights.
#[async_trait]
pub trait Source<P: Payload>: Send {
    /// Advance the cursor. `prev` is the most recently completed payload
    /// (`None` before the first height completes). Returns `true` while
    /// another height remains; [`current`](Source::current) must only be
    /// read when the cursor is valid.
    async fn next(&mut self, ctx: &Context, prev: Option<&P>) -> bool;

    /// The height the cursor currently points at.
    fn current(&self) -> i64;

    /// Terminal error, sampled exactly once at the end of the run and
    /// appended to the run error. Implementations may move the error out.
    fn err(&mut self) -> Option<PipelineError>;

    /// Lets a source suppress particular stages for this run (reindex
    /// scenarios and the like).
    fn skip(&self, _stage: &StageName) -> bool {
        false
    }
}

/// Consumes each successfully processed payload. A failure aborts the
/// entire run.
#[async_trait]
pub trait Sink<P: Payload>: Send {
    async fn consume(&mut self, ctx: &Context, payload: &P) -> Result<(), PipelineError>;
}
