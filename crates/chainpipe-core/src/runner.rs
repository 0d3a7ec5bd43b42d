//! Stage runners: synchronous, concurrent, retry-wrapped, and a plain
//! function adapter.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::task::JoinSet;

use crate::context::Context;
use crate::error::{MultiError, PipelineError};
use crate::metrics;
use crate::traits::{Payload, StageRunner, Task, TaskValidator};

/// Predicate deciding whether an error is worth another attempt.
pub type IsTransient = dyn Fn(&PipelineError) -> bool + Send + Sync;

/// Runs its tasks one at a time in declaration order.
///
/// Tasks rejected by the validator are skipped silently. The first error
/// stops execution and is returned as-is.
pub struct SyncRunner<P: Payload> {
    tasks: Vec<Arc<dyn Task<P>>>,
}

impl<P: Payload> SyncRunner<P> {
    pub fn new(tasks: Vec<Arc<dyn Task<P>>>) -> Self {
        Self { tasks }
    }
}

#[async_trait]
impl<P: Payload> StageRunner<P> for SyncRunner<P> {
    async fn run(
        &self,
        ctx: &Context,
        payload: Arc<P>,
        can_run_task: &TaskValidator,
    ) -> Result<(), PipelineError> {
        for task in &self.tasks {
            if ctx.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            let name = task.name();
            if !can_run_task(name) {
                continue;
            }
            let started = Instant::now();
            let result = task.run(ctx, payload.as_ref()).await;
            metrics::observe_task_duration(name, started.elapsed());
            result?;
        }
        Ok(())
    }
}

/// Runs its tasks concurrently, one spawned worker per task.
///
/// All workers are joined before the runner returns; every error is
/// preserved in the aggregate. Insertion order within the aggregate is
/// unspecified.
pub struct AsyncRunner<P: Payload> {
    tasks: Vec<Arc<dyn Task<P>>>,
}

impl<P: Payload> AsyncRunner<P> {
    pub fn new(tasks: Vec<Arc<dyn Task<P>>>) -> Self {
        Self { tasks }
    }
}

#[async_trait]
impl<P: Payload> StageRunner<P> for AsyncRunner<P> {
    async fn run(
        &self,
        ctx: &Context,
        payload: Arc<P>,
        can_run_task: &TaskValidator,
    ) -> Result<(), PipelineError> {
        if ctx.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let mut workers: JoinSet<Result<(), PipelineError>> = JoinSet::new();
        for task in &self.tasks {
            if !can_run_task(task.name()) {
                continue;
            }
            let task = Arc::clone(task);
            let ctx = ctx.clone();
            let payload = Arc::clone(&payload);
            workers.spawn(async move {
                let started = Instant::now();
                let result = task.run(&ctx, payload.as_ref()).await;
                metrics::observe_task_duration(task.name(), started.elapsed());
                result
            });
        }

        let mut errs = MultiError::new();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => errs.push(err),
                Err(err) => errs.push(PipelineError::Other(anyhow::Error::new(err))),
            }
        }
        errs.into_result()
    }
}

/// Retry shell around a whole stage runner.
///
/// Calls the wrapped runner up to `max_retries` times total. Transient
/// errors (per the predicate) are swallowed until attempts exhaust;
/// non-transient errors surface immediately. `max_retries == 0` never
/// executes and yields `Ok`.
pub struct RetryingRunner<P: Payload> {
    runner: Arc<dyn StageRunner<P>>,
    is_transient: Box<IsTransient>,
    max_retries: usize,
}

impl<P: Payload> RetryingRunner<P> {
    pub fn new(
        runner: Arc<dyn StageRunner<P>>,
        is_transient: impl Fn(&PipelineError) -> bool + Send + Sync + 'static,
        max_retries: usize,
    ) -> Self {
        Self {
            runner,
            is_transient: Box::new(is_transient),
            max_retries,
        }
    }
}

#[async_trait]
impl<P: Payload> StageRunner<P> for RetryingRunner<P> {
    async fn run(
        &self,
        ctx: &Context,
        payload: Arc<P>,
        can_run_task: &TaskValidator,
    ) -> Result<(), PipelineError> {
        let mut last: Result<(), PipelineError> = Ok(());
        for _ in 0..self.max_retries {
            last = self
                .runner
                .run(ctx, Arc::clone(&payload), can_run_task)
                .await;
            match &last {
                Ok(()) => break,
                Err(err) if !(self.is_transient)(err) => return last,
                Err(_) => {}
            }
        }
        last
    }
}

/// Retry decorator for a single task, with the same loop semantics as
/// [`RetryingRunner`]. Exposes the wrapped task's name unchanged so
/// whitelist gating is preserved.
pub struct RetryingTask<P: Payload> {
    task: Arc<dyn Task<P>>,
    is_transient: Box<IsTransient>,
    max_retries: usize,
}

impl<P: Payload> RetryingTask<P> {
    pub fn new(
        task: Arc<dyn Task<P>>,
        is_transient: impl Fn(&PipelineError) -> bool + Send + Sync + 'static,
        max_retries: usize,
    ) -> Self {
        Self {
            task,
            is_transient: Box::new(is_transient),
            max_retries,
        }
    }
}

#[async_trait]
impl<P: Payload> Task<P> for RetryingTask<P> {
    fn name(&self) -> &str {
        self.task.name()
    }

    async fn run(&self, ctx: &Context, payload: &P) -> Result<(), PipelineError> {
        let mut last: Result<(), PipelineError> = Ok(());
        for _ in 0..self.max_retries {
            last = self.task.run(ctx, payload).await;
            match &last {
                Ok(()) => break,
                Err(err) if !(self.is_transient)(err) => return last,
                Err(_) => {}
            }
        }
        last
    }
}

/// Adapter allowing a plain async function to serve as a stage runner,
/// handy for ad-hoc pre/post stages:
///
/// ```ignore
/// use futures::FutureExt;
/// let runner = RunnerFn::new(|_ctx, payload: Arc<MyPayload>| {
///     async move { Ok(()) }.boxed()
/// });
/// ```
pub struct RunnerFn<P, F>
where
    P: Payload,
    F: Fn(Context, Arc<P>) -> BoxFuture<'static, Result<(), PipelineError>> + Send + Sync,
{
    f: F,
    _payload: PhantomData<fn(Arc<P>)>,
}

impl<P, F> RunnerFn<P, F>
where
    P: Payload,
    F: Fn(Context, Arc<P>) -> BoxFuture<'static, Result<(), PipelineError>> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _payload: PhantomData,
        }
    }
}

#[async_trait]
impl<P, F> StageRunner<P> for RunnerFn<P, F>
where
    P: Payload,
    F: Fn(Context, Arc<P>) -> BoxFuture<'static, Result<(), PipelineError>> + Send + Sync,
{
    async fn run(
        &self,
        ctx: &Context,
        payload: Arc<P>,
        _can_run_task: &TaskValidator,
    ) -> Result<(), PipelineError> {
        (self.f)(ctx.clone(), payload).await
    }
}
