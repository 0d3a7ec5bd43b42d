//! Demo indexing primitives: a pooled payload factory, a height-range
//! source, a logging sink and a handful of printable tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::FutureExt;
use tracing::info;

use chainpipe_core::{
    Context, Options, Payload, PayloadFactory, Pipeline, PipelineError, RetryingTask, RunnerFn,
    Sink, Source, Stage, Task, STAGE_AGGREGATOR, STAGE_CLEANUP, STAGE_FETCHER, STAGE_PARSER,
    STAGE_SEQUENCER, STAGE_SETUP, STAGE_SYNCER, STAGE_VALIDATOR,
};

// ─── Payload ─────────────────────────────────────────────────────────────────

/// Per-height scratch space the demo tasks write into.
///
/// Sibling concurrent stages share the payload, so every mutable field is
/// individually locked and each stage writes its own region.
pub struct DemoPayload {
    height: Mutex<i64>,
    raw_block: Mutex<Option<String>>,
    parsed: Mutex<Vec<String>>,
    processed: AtomicBool,
}

impl DemoPayload {
    fn new(height: i64) -> Self {
        Self {
            height: Mutex::new(height),
            raw_block: Mutex::new(None),
            parsed: Mutex::new(Vec::new()),
            processed: AtomicBool::new(false),
        }
    }

    pub fn height(&self) -> i64 {
        *self.height.lock().unwrap()
    }

    fn reset(&self, height: i64) {
        *self.height.lock().unwrap() = height;
        *self.raw_block.lock().unwrap() = None;
        self.parsed.lock().unwrap().clear();
        self.processed.store(false, Ordering::SeqCst);
    }
}

impl Payload for DemoPayload {
    fn mark_as_processed(&self) {
        self.processed.store(true, Ordering::SeqCst);
    }
}

/// Free-list payload factory. Payloads marked processed and no longer
/// shared are reset and handed out again.
#[derive(Default)]
pub struct DemoPayloadFactory {
    pool: Mutex<Vec<Arc<DemoPayload>>>,
}

impl DemoPayloadFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PayloadFactory<DemoPayload> for DemoPayloadFactory {
    fn get_payload(&self, height: i64) -> Arc<DemoPayload> {
        let mut pool = self.pool.lock().unwrap();
        let recyclable = pool
            .iter()
            .position(|p| p.processed.load(Ordering::SeqCst) && Arc::strong_count(p) == 1);
        if let Some(index) = recyclable {
            let payload = Arc::clone(&pool[index]);
            payload.reset(height);
            return payload;
        }
        let payload = Arc::new(DemoPayload::new(height));
        pool.push(Arc::clone(&payload));
        payload
    }
}

// ─── Source / sink ───────────────────────────────────────────────────────────

/// Walks a fixed inclusive height range.
pub struct HeightRangeSource {
    current: i64,
    end: i64,
}

impl HeightRangeSource {
    pub fn new(start: i64, end: i64) -> Self {
        Self {
            current: start,
            end,
        }
    }
}

#[async_trait]
impl Source<DemoPayload> for HeightRangeSource {
    async fn next(&mut self, _ctx: &Context, _prev: Option<&DemoPayload>) -> bool {
        if self.current < self.end {
            self.current += 1;
            true
        } else {
            false
        }
    }

    fn current(&self) -> i64 {
        self.current
    }

    fn err(&mut self) -> Option<PipelineError> {
        None
    }
}

/// Logs every consumed payload.
#[derive(Default)]
pub struct LoggingSink {
    consumed: usize,
}

#[async_trait]
impl Sink<DemoPayload> for LoggingSink {
    async fn consume(
        &mut self,
        _ctx: &Context,
        payload: &DemoPayload,
    ) -> Result<(), PipelineError> {
        self.consumed += 1;
        info!(
            height = payload.height(),
            raw = payload.raw_block.lock().unwrap().as_deref().unwrap_or("<none>"),
            parsed = payload.parsed.lock().unwrap().len(),
            total = self.consumed,
            "sink consumed payload"
        );
        Ok(())
    }
}

// ─── Tasks ───────────────────────────────────────────────────────────────────

macro_rules! demo_task {
    ($task:ident, $name:literal, $body:expr) => {
        pub struct $task;

        #[async_trait]
        impl Task<DemoPayload> for $task {
            fn name(&self) -> &str {
                $name
            }

            async fn run(
                &self,
                _ctx: &Context,
                payload: &DemoPayload,
            ) -> Result<(), PipelineError> {
                info!(task = $name, height = payload.height(), "running task");
                #[allow(clippy::redundant_closure_call)]
                ($body)(payload);
                Ok(())
            }
        }
    };
}

demo_task!(SetupTask, "SetupTask", |_p: &DemoPayload| {});
demo_task!(FetcherTask, "FetcherTask", |p: &DemoPayload| {
    *p.raw_block.lock().unwrap() = Some(format!("raw block {}", p.height()));
});
demo_task!(ParserTask, "ParserTask", |p: &DemoPayload| {
    p.parsed.lock().unwrap().push("header".to_string());
});
demo_task!(ParserTask2, "ParserTask2", |p: &DemoPayload| {
    p.parsed.lock().unwrap().push("transactions".to_string());
});
demo_task!(ValidatorTask, "ValidatorTask", |_p: &DemoPayload| {});
demo_task!(ValidatorTask2, "ValidatorTask2", |_p: &DemoPayload| {});
demo_task!(SyncerTask, "SyncerTask", |_p: &DemoPayload| {});
demo_task!(SequencerTask, "SequencerTask", |_p: &DemoPayload| {});
demo_task!(AggregatorTask, "AggregatorTask", |_p: &DemoPayload| {});

fn task<T: Task<DemoPayload> + 'static>(t: T) -> Arc<dyn Task<DemoPayload>> {
    Arc::new(t)
}

// ─── Pipelines ───────────────────────────────────────────────────────────────

/// The default pipeline demo: reserved stage order, retrying fetcher task,
/// retry-wrapped syncer stage, async validators, before/after hooks.
pub async fn start_default_pipeline() -> Result<(), PipelineError> {
    let mut pipeline = Pipeline::new_default(Arc::new(DemoPayloadFactory::new())
        as Arc<dyn PayloadFactory<DemoPayload>>);

    pipeline.set_tasks(STAGE_SETUP, vec![task(SetupTask)]);
    // Task-level retry: transient fetch failures are retried in place.
    pipeline.set_tasks(
        STAGE_FETCHER,
        vec![Arc::new(RetryingTask::new(task(FetcherTask), |_| true, 3))
            as Arc<dyn Task<DemoPayload>>],
    );
    pipeline.set_tasks(STAGE_PARSER, vec![task(ParserTask), task(ParserTask2)]);
    pipeline.set_async_tasks(
        STAGE_VALIDATOR,
        vec![task(ValidatorTask), task(ValidatorTask2)],
    );
    pipeline.set_tasks(STAGE_SYNCER, vec![task(SyncerTask)]);
    // Stage-level retry: the whole syncer stage reruns on failure.
    pipeline.retry_stage(STAGE_SYNCER, |_| true, 3)?;
    pipeline.set_tasks(STAGE_SEQUENCER, vec![task(SequencerTask)]);
    pipeline.set_tasks(STAGE_AGGREGATOR, vec![task(AggregatorTask)]);

    pipeline.add_stage_before(
        STAGE_FETCHER,
        Stage::new(
            "BeforeFetcher",
            Arc::new(RunnerFn::new(|_ctx, payload: Arc<DemoPayload>| {
                async move {
                    info!(height = payload.height(), "before fetcher");
                    Ok(())
                }
                .boxed()
            })),
        ),
    );
    pipeline.add_stage_after(
        STAGE_VALIDATOR,
        Stage::new(
            "AfterValidator",
            Arc::new(RunnerFn::new(|_ctx, payload: Arc<DemoPayload>| {
                async move {
                    info!(height = payload.height(), "after validator");
                    Ok(())
                }
                .boxed()
            })),
        ),
    );

    let mut source = HeightRangeSource::new(1, 5);
    let mut sink = LoggingSink::default();
    pipeline
        .start(Context::new(), &mut source, &mut sink, Options::default())
        .await
}

/// The custom pipeline demo: stages execute in declaration order, with a
/// concurrent sequencer/aggregator group and a function-adapter cleanup.
pub async fn start_custom_pipeline() -> Result<(), PipelineError> {
    let mut pipeline = Pipeline::new_custom(Arc::new(DemoPayloadFactory::new())
        as Arc<dyn PayloadFactory<DemoPayload>>);

    pipeline.add_stage(Stage::with_tasks(STAGE_FETCHER, vec![task(FetcherTask)]));
    pipeline.add_stage(Stage::with_async_tasks(
        STAGE_PARSER,
        vec![task(ParserTask), task(ParserTask2)],
    ));
    pipeline.add_stage(Stage::with_tasks(STAGE_SYNCER, vec![task(SyncerTask)]));
    pipeline.retry_stage(STAGE_SYNCER, |_| true, 3)?;
    pipeline.add_concurrent_stages(vec![
        Stage::with_tasks(STAGE_SEQUENCER, vec![task(SequencerTask)]),
        Stage::with_tasks(STAGE_AGGREGATOR, vec![task(AggregatorTask)]),
    ]);
    pipeline.add_stage(Stage::new(
        STAGE_CLEANUP,
        Arc::new(RunnerFn::new(|_ctx, payload: Arc<DemoPayload>| {
            async move {
                info!(height = payload.height(), "cleanup");
                Ok(())
            }
            .boxed()
        })),
    ));

    let mut source = HeightRangeSource::new(1, 5);
    let mut sink = LoggingSink::default();
    pipeline
        .start(Context::new(), &mut source, &mut sink, Options::default())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_recycles_processed_payloads() {
        let factory = DemoPayloadFactory::new();

        let first = factory.get_payload(10);
        first.mark_as_processed();
        drop(first);

        // The pooled payload is processed and unshared, so it is reused.
        let second = factory.get_payload(11);
        assert_eq!(second.height(), 11);
        assert_eq!(factory.pool.lock().unwrap().len(), 1);
    }

    #[test]
    fn factory_mints_while_payloads_are_live() {
        let factory = DemoPayloadFactory::new();

        let first = factory.get_payload(10);
        let second = factory.get_payload(11);
        assert_eq!(first.height(), 10);
        assert_eq!(second.height(), 11);
        assert_eq!(factory.pool.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn demo_pipelines_run_clean() {
        start_default_pipeline().await.unwrap();
        start_custom_pipeline().await.unwrap();
    }
}
