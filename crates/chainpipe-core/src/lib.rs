//! chainpipe-core — a modular, multi-stage pipeline engine for building
//! blockchain indexers.
//!
//! # Architecture
//!
//! ```text
//! Pipeline (group sequence ← optional dependency-graph compile)
//!     ├── Source          (lazy monotonic height cursor)
//!     ├── PayloadFactory  (pool-backed payload per height)
//!     ├── Stage           (name + runner, before/after hooks)
//!     │     └── SyncRunner / AsyncRunner / RetryingRunner / RunnerFn
//!     │           └── Task (named unit of work on the payload)
//!     └── Sink            (consumes finished payloads)
//! ```
//!
//! Heights are processed strictly in order; a failed stage or sink aborts
//! the run rather than leaving gaps. Sibling stages in a group, and tasks
//! in an async runner, fan out concurrently and join before the pipeline
//! moves on.

pub mod context;
pub mod error;
pub mod graph;
pub mod logger;
mod metrics;
pub mod options;
pub mod pipeline;
pub mod runner;
pub mod stage;
pub mod stats;
pub mod traits;

pub use context::{CancelToken, Context, CTX_STATS};
pub use error::{MultiError, PipelineError};
pub use graph::StageGraph;
pub use logger::{set_logger, Logger, TracingLogger};
pub use options::Options;
pub use pipeline::Pipeline;
pub use runner::{AsyncRunner, IsTransient, RetryingRunner, RetryingTask, RunnerFn, SyncRunner};
pub use stage::{
    Stage, StageName, TaskName, STAGE_AGGREGATOR, STAGE_CLEANUP, STAGE_FETCHER, STAGE_PARSER,
    STAGE_PERSISTOR, STAGE_SEQUENCER, STAGE_SETUP, STAGE_SYNCER, STAGE_VALIDATOR,
};
pub use stats::{Stat, StatsRecorder};
pub use traits::{Payload, PayloadFactory, Sink, Source, StageRunner, Task, TaskValidator};
