//! The pipeline engine.
//!
//! A pipeline walks a monotonic sequence of block heights. For each height
//! it mints a payload from the factory, pushes it through the stage graph,
//! hands the finished payload to the sink and marks it recyclable. Stage
//! execution errors abort the entire run: continuing past a failed height
//! would leave gaps in the indexed record.
//!
//! The graph is a sequence of groups. A single-stage group runs serially;
//! a multi-stage group fans out, one worker per sibling, and joins before
//! the next group starts. Dependency-configured pipelines compile their
//! dependency map into the same group sequence up front.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::task::JoinSet;

use crate::context::{Context, CTX_STATS};
use crate::error::{MultiError, PipelineError};
use crate::graph::StageGraph;
use crate::logger::{log_debug, log_info};
use crate::metrics;
use crate::options::Options;
use crate::runner::{AsyncRunner, RetryingRunner, SyncRunner};
use crate::stage::{
    Stage, StageName, STAGE_AGGREGATOR, STAGE_CLEANUP, STAGE_FETCHER, STAGE_PARSER,
    STAGE_PERSISTOR, STAGE_SEQUENCER, STAGE_SETUP, STAGE_SYNCER, STAGE_VALIDATOR,
};
use crate::stats::StatsRecorder;
use crate::traits::{Payload, PayloadFactory, Sink, Source, StageRunner, Task, TaskValidator};

/// Placeholder runner seeded into reserved stages of a default pipeline.
/// Logs a notice and does nothing; replaced via `set_tasks` and friends.
struct EmptyRunner {
    stage: StageName,
}

#[async_trait]
impl<P: Payload> StageRunner<P> for EmptyRunner {
    async fn run(
        &self,
        _ctx: &Context,
        _payload: Arc<P>,
        _can_run_task: &TaskValidator,
    ) -> Result<(), PipelineError> {
        log_info(&format!("stage {} is not set up", self.stage));
        Ok(())
    }
}

fn default_groups() -> Vec<Vec<StageName>> {
    vec![
        vec![STAGE_SETUP],
        vec![STAGE_SYNCER],
        vec![STAGE_FETCHER],
        vec![STAGE_PARSER],
        vec![STAGE_VALIDATOR],
        vec![STAGE_SEQUENCER, STAGE_AGGREGATOR],
        vec![STAGE_PERSISTOR],
        vec![STAGE_CLEANUP],
    ]
}

/// A modular, multi-stage pipeline over payloads of type `P`.
pub struct Pipeline<P: Payload> {
    payload_factory: Arc<dyn PayloadFactory<P>>,
    options: Options,

    groups: Vec<Vec<StageName>>,
    stages: HashMap<StageName, Stage<P>>,

    dependencies: StageGraph,
    before_stage: HashMap<StageName, Vec<Stage<P>>>,
    after_stage: HashMap<StageName, Vec<Stage<P>>>,
}

impl<P: Payload> Pipeline<P> {
    /// A pipeline preset with the reserved stages in the default partial
    /// order `setup → syncer → fetcher → parser → validator →
    /// {sequencer ∥ aggregator} → persistor → cleanup`, each seeded with an
    /// empty runner. Replace runners with [`set_tasks`](Self::set_tasks),
    /// [`set_async_tasks`](Self::set_async_tasks) or
    /// [`set_custom_stage`](Self::set_custom_stage).
    pub fn new_default(payload_factory: Arc<dyn PayloadFactory<P>>) -> Self {
        let mut pipeline = Self::new_custom(payload_factory);
        for group in default_groups() {
            for name in &group {
                pipeline.stages.insert(
                    name.clone(),
                    Stage::new(
                        name.clone(),
                        Arc::new(EmptyRunner {
                            stage: name.clone(),
                        }),
                    ),
                );
            }
            pipeline.groups.push(group);
        }
        pipeline
    }

    /// An empty pipeline. Stages appended with [`add_stage`](Self::add_stage)
    /// and [`add_concurrent_stages`](Self::add_concurrent_stages) execute in
    /// the order they were added.
    pub fn new_custom(payload_factory: Arc<dyn PayloadFactory<P>>) -> Self {
        Self {
            payload_factory,
            options: Options::default(),
            groups: Vec::new(),
            stages: HashMap::new(),
            dependencies: StageGraph::new(),
            before_stage: HashMap::new(),
            after_stage: HashMap::new(),
        }
    }

    /// A dependency-configured pipeline seeded with the default dependency
    /// map. Stages are registered explicitly (see
    /// [`set_custom_stage`](Self::set_custom_stage)); dependency entries can
    /// be overridden or extended with [`set_dependency`](Self::set_dependency).
    pub fn new_with_dependencies(payload_factory: Arc<dyn PayloadFactory<P>>) -> Self {
        let mut pipeline = Self::new_custom(payload_factory);
        pipeline.dependencies = StageGraph::with_defaults();
        pipeline
    }

    /// Set the per-run options outside of `start`/`run`.
    pub fn set_options(&mut self, options: Options) {
        self.options = options;
    }

    /// Replace the runner at `name` with a sync task runner.
    pub fn set_tasks(&mut self, name: impl Into<StageName>, tasks: Vec<Arc<dyn Task<P>>>) {
        let name = name.into();
        self.stages
            .insert(name.clone(), Stage::new(name, Arc::new(SyncRunner::new(tasks))));
    }

    /// Replace the runner at `name` with a concurrent task runner.
    pub fn set_async_tasks(&mut self, name: impl Into<StageName>, tasks: Vec<Arc<dyn Task<P>>>) {
        let name = name.into();
        self.stages
            .insert(name.clone(), Stage::new(name, Arc::new(AsyncRunner::new(tasks))));
    }

    /// Install an arbitrary runner at `name`.
    pub fn set_custom_stage(&mut self, name: impl Into<StageName>, runner: Arc<dyn StageRunner<P>>) {
        let name = name.into();
        self.stages.insert(name.clone(), Stage::new(name, runner));
    }

    /// Append a serial stage to the graph (custom pipelines).
    pub fn add_stage(&mut self, stage: Stage<P>) {
        self.groups.push(vec![stage.name().clone()]);
        self.stages.insert(stage.name().clone(), stage);
    }

    /// Append a group of sibling stages that execute concurrently (custom
    /// pipelines).
    pub fn add_concurrent_stages(&mut self, stages: Vec<Stage<P>>) {
        let names: Vec<StageName> = stages.iter().map(|stage| stage.name().clone()).collect();
        self.groups.push(names);
        for stage in stages {
            self.stages.insert(stage.name().clone(), stage);
        }
    }

    /// Decorate the stage at `existing` with a pre hook. Hooks run in
    /// insertion order before the stage body.
    pub fn add_stage_before(&mut self, existing: impl Into<StageName>, stage: Stage<P>) {
        self.before_stage.entry(existing.into()).or_default().push(stage);
    }

    /// Decorate the stage at `existing` with a post hook. Hooks run in
    /// insertion order after the stage body.
    pub fn add_stage_after(&mut self, existing: impl Into<StageName>, stage: Stage<P>) {
        self.after_stage.entry(existing.into()).or_default().push(stage);
    }

    /// Wrap the runner at `name` in a retry shell. Fails with
    /// [`PipelineError::MissingStage`] when `name` is not registered.
    pub fn retry_stage(
        &mut self,
        name: impl Into<StageName>,
        is_transient: impl Fn(&PipelineError) -> bool + Send + Sync + 'static,
        max_retries: usize,
    ) -> Result<(), PipelineError> {
        let name = name.into();
        let stage = self
            .stages
            .get_mut(&name)
            .ok_or(PipelineError::MissingStage)?;
        let wrapped = RetryingRunner::new(Arc::clone(stage.runner()), is_transient, max_retries);
        stage.set_runner(Arc::new(wrapped));
        Ok(())
    }

    /// Set the stages that must run (when configured) before `name` can be
    /// executed. Switches the pipeline to dependency dispatch.
    pub fn set_dependency(&mut self, name: impl Into<StageName>, dependencies: Vec<StageName>) {
        self.dependencies.set(name, dependencies);
    }

    /// Drive the pipeline from `source` to `sink` until the source is
    /// exhausted or an error aborts the run.
    pub async fn start<S, K>(
        &mut self,
        ctx: Context,
        source: &mut S,
        sink: &mut K,
        options: Options,
    ) -> Result<(), PipelineError>
    where
        S: Source<P>,
        K: Sink<P>,
    {
        let pctx = self.setup_ctx(&ctx);
        self.options = options;
        let plan = self.plan()?;

        let mut run_err: Option<PipelineError> = None;
        let mut prev: Option<Arc<P>> = None;

        loop {
            // The first height is taken from the source's initial position;
            // afterwards the cursor advances through `next`.
            if prev.is_some() && !source.next(&pctx, prev.as_deref()).await {
                break;
            }
            if pctx.is_cancelled() {
                run_err = Some(PipelineError::Cancelled);
                break;
            }

            let payload = self.payload_factory.get_payload(source.current());
            let height_started = Instant::now();

            let skipped = self.skipped_stages(&plan, &*source);
            if let Err(err) = self.run_stages(&plan, &pctx, &payload, &skipped).await {
                // No heights past a failure: gaps in the record are worse
                // than stopping.
                run_err = Some(err);
                break;
            }

            if let Err(err) = sink.consume(&pctx, payload.as_ref()).await {
                run_err = Some(err);
                break;
            }

            payload.mark_as_processed();
            metrics::observe_height_duration(height_started.elapsed());
            metrics::inc_heights_total();
            prev = Some(payload);
        }

        if let Some(err) = source.err() {
            run_err = Some(MultiError::append(run_err, err));
        }
        if run_err.is_some() {
            metrics::inc_errors_total();
        }
        match run_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Run a one-off pipeline iteration for the given height. No source or
    /// sink is involved; the processed payload is returned.
    pub async fn run(
        &mut self,
        ctx: Context,
        height: i64,
        options: Options,
    ) -> Result<Arc<P>, PipelineError> {
        let pctx = self.setup_ctx(&ctx);
        self.options = options;
        let plan = self.plan()?;

        let payload = self.payload_factory.get_payload(height);
        self.run_stages(&plan, &pctx, &payload, &HashSet::new())
            .await?;
        payload.mark_as_processed();
        Ok(payload)
    }

    /// Derive the run context: fresh stats recorder under the `"stats"`
    /// key, sharing the caller's cancellation token.
    fn setup_ctx(&self, ctx: &Context) -> Context {
        ctx.with_value(CTX_STATS, Arc::new(StatsRecorder::new()))
    }

    /// Validate the graph and produce the executable group sequence.
    fn plan(&self) -> Result<Vec<Vec<StageName>>, PipelineError> {
        let plan = if self.dependencies.is_empty() {
            for group in &self.groups {
                if group.is_empty() {
                    return Err(PipelineError::MissingStages);
                }
            }
            self.groups.clone()
        } else {
            let registered: Vec<&StageName> = self.stages.keys().collect();
            self.dependencies.compile(&registered)?
        };
        log_debug(&format!("pipeline plan has {} stage group(s)", plan.len()));
        Ok(plan)
    }

    /// Ask the source which of the planned stages to suppress this height.
    fn skipped_stages<S: Source<P>>(&self, plan: &[Vec<StageName>], source: &S) -> HashSet<StageName> {
        plan.iter()
            .flatten()
            .filter(|name| source.skip(name))
            .cloned()
            .collect()
    }

    async fn run_stages(
        &self,
        plan: &[Vec<StageName>],
        ctx: &Context,
        payload: &Arc<P>,
        skipped: &HashSet<StageName>,
    ) -> Result<(), PipelineError> {
        for group in plan {
            if ctx.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            match group.as_slice() {
                [] => return Err(PipelineError::MissingStages),
                [single] => self.run_stage(single, ctx, payload, skipped).await?,
                _ => {
                    self.run_stages_concurrently(group, ctx, payload, skipped)
                        .await?
                }
            }
        }
        Ok(())
    }

    async fn run_stages_concurrently(
        &self,
        group: &[StageName],
        ctx: &Context,
        payload: &Arc<P>,
        skipped: &HashSet<StageName>,
    ) -> Result<(), PipelineError> {
        let mut workers: JoinSet<Result<(), PipelineError>> = JoinSet::new();
        for name in group {
            if !self.can_run_stage(name, skipped) {
                continue;
            }
            let Some(stage) = self.stages.get(name) else {
                continue;
            };
            let stage = stage.clone();
            let before = self.before_stage.get(name).cloned().unwrap_or_default();
            let after = self.after_stage.get(name).cloned().unwrap_or_default();
            let ctx = ctx.clone();
            let payload = Arc::clone(payload);
            let options = self.options.clone();
            workers.spawn(async move {
                for hook in &before {
                    hook.run(&ctx, Arc::clone(&payload), &options).await?;
                }
                stage.run(&ctx, Arc::clone(&payload), &options).await?;
                for hook in &after {
                    hook.run(&ctx, Arc::clone(&payload), &options).await?;
                }
                Ok(())
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

    async fn run_stage(
        &self,
        name: &StageName,
        ctx: &Context,
        payload: &Arc<P>,
        skipped: &HashSet<StageName>,
    ) -> Result<(), PipelineError> {
        if !self.can_run_stage(name, skipped) {
            return Ok(());
        }
        if let Some(hooks) = self.before_stage.get(name) {
            for stage in hooks {
                stage.run(ctx, Arc::clone(payload), &self.options).await?;
            }
        }
        if let Some(stage) = self.stages.get(name) {
            stage.run(ctx, Arc::clone(payload), &self.options).await?;
        }
        if let Some(hooks) = self.after_stage.get(name) {
            for stage in hooks {
                stage.run(ctx, Arc::clone(payload), &self.options).await?;
            }
        }
        Ok(())
    }

    fn can_run_stage(&self, name: &StageName, skipped: &HashSet<StageName>) -> bool {
        if !self.stages.contains_key(name) {
            log_info(&format!("stage {name} is not set up, skipping"));
            return false;
        }
        if self.options.stages_blacklist.contains(name) {
            return false;
        }
        if skipped.contains(name) {
            return false;
        }
        true
    }
}
