//! Stage names and the stage record.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::PipelineError;
use crate::metrics;
use crate::options::Options;
use crate::runner::{AsyncRunner, SyncRunner};
use crate::traits::{Payload, StageRunner, Task};

/// Identifies a stage slot in the pipeline graph.
///
/// The engine never interprets the name beyond equality and hashing;
/// anything beyond the reserved constants below is fair game.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageName(Cow<'static, str>);

impl StageName {
    pub const fn from_static(name: &'static str) -> Self {
        StageName(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StageName {
    fn from(name: &str) -> Self {
        StageName(Cow::Owned(name.to_owned()))
    }
}

impl From<String> for StageName {
    fn from(name: String) -> Self {
        StageName(Cow::Owned(name))
    }
}

/// Identifies a task, used in whitelist matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskName(Cow<'static, str>);

impl TaskName {
    pub const fn from_static(name: &'static str) -> Self {
        TaskName(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskName {
    fn from(name: &str) -> Self {
        TaskName(Cow::Owned(name.to_owned()))
    }
}

impl From<String> for TaskName {
    fn from(name: String) -> Self {
        TaskName(Cow::Owned(name))
    }
}

/// Setup stage: performs setup chores.
pub const STAGE_SETUP: StageName = StageName::from_static("stage_setup");

/// Syncer stage: saves data to the datastore.
pub const STAGE_SYNCER: StageName = StageName::from_static("stage_syncer");

/// Fetcher stage: fetches data for indexing.
pub const STAGE_FETCHER: StageName = StageName::from_static("stage_fetcher");

/// Parser stage: parses and normalizes fetched data to a single structure.
pub const STAGE_PARSER: StageName = StageName::from_static("stage_parser");

/// Validator stage: validates parsed data.
pub const STAGE_VALIDATOR: StageName = StageName::from_static("stage_validator");

/// Sequencer stage: creates sequences from synced data.
pub const STAGE_SEQUENCER: StageName = StageName::from_static("stage_sequencer");

/// Aggregator stage: creates aggregates from synced data.
pub const STAGE_AGGREGATOR: StageName = StageName::from_static("stage_aggregator");

/// Persistor stage: persists indexed data to the datastore.
pub const STAGE_PERSISTOR: StageName = StageName::from_static("stage_persistor");

/// Cleanup stage: cleans up after execution.
pub const STAGE_CLEANUP: StageName = StageName::from_static("stage_cleanup");

/// A named slot in the pipeline graph holding exactly one runner.
pub struct Stage<P: Payload> {
    name: StageName,
    runner: Arc<dyn StageRunner<P>>,
}

impl<P: Payload> Clone for Stage<P> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            runner: Arc::clone(&self.runner),
        }
    }
}

impl<P: Payload> Stage<P> {
    pub fn new(name: impl Into<StageName>, runner: Arc<dyn StageRunner<P>>) -> Self {
        Self {
            name: name.into(),
            runner,
        }
    }

    /// A stage whose tasks run one at a time in declaration order.
    pub fn with_tasks(name: impl Into<StageName>, tasks: Vec<Arc<dyn Task<P>>>) -> Self {
        Self::new(name, Arc::new(SyncRunner::new(tasks)))
    }

    /// A stage whose tasks run concurrently.
    pub fn with_async_tasks(name: impl Into<StageName>, tasks: Vec<Arc<dyn Task<P>>>) -> Self {
        Self::new(name, Arc::new(AsyncRunner::new(tasks)))
    }

    pub fn name(&self) -> &StageName {
        &self.name
    }

    pub(crate) fn runner(&self) -> &Arc<dyn StageRunner<P>> {
        &self.runner
    }

    pub(crate) fn set_runner(&mut self, runner: Arc<dyn StageRunner<P>>) {
        self.runner = runner;
    }

    /// Run the stage's runner, gating each task through the whitelist in
    /// `options`. The invocation is timed into the stage histogram.
    pub async fn run(
        &self,
        ctx: &Context,
        payload: Arc<P>,
        options: &Options,
    ) -> Result<(), PipelineError> {
        let started = Instant::now();
        let whitelist = options.task_whitelist.clone();
        let validator = move |task: &str| task_allowed(&whitelist, task);
        let result = self.runner.run(ctx, payload, &validator).await;
        metrics::observe_stage_duration(self.name.as_str(), started.elapsed());
        result
    }
}

/// Whitelist gate: an empty whitelist admits every task; otherwise the task
/// name must contain one of the whitelisted entries as a substring.
/// Case-sensitive.
fn task_allowed(whitelist: &[TaskName], task: &str) -> bool {
    whitelist.is_empty() || whitelist.iter().any(|entry| task.contains(entry.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_whitelist_admits_all() {
        assert!(task_allowed(&[], "anything"));
    }

    #[test]
    fn whitelist_matches_substrings() {
        let whitelist = vec![TaskName::from_static("Fetcher")];
        assert!(task_allowed(&whitelist, "BlockFetcherTask"));
        assert!(task_allowed(&whitelist, "Fetcher"));
        assert!(!task_allowed(&whitelist, "ParserTask"));
        // Case-sensitive containment, not equality.
        assert!(!task_allowed(&whitelist, "blockfetchertask"));
    }

    #[test]
    fn reserved_names_are_literal() {
        assert_eq!(STAGE_SETUP.as_str(), "stage_setup");
        assert_eq!(STAGE_SYNCER.as_str(), "stage_syncer");
        assert_eq!(STAGE_FETCHER.as_str(), "stage_fetcher");
        assert_eq!(STAGE_PARSER.as_str(), "stage_parser");
        assert_eq!(STAGE_VALIDATOR.as_str(), "stage_validator");
        assert_eq!(STAGE_SEQUENCER.as_str(), "stage_sequencer");
        assert_eq!(STAGE_AGGREGATOR.as_str(), "stage_aggregator");
        assert_eq!(STAGE_PERSISTOR.as_str(), "stage_persistor");
        assert_eq!(STAGE_CLEANUP.as_str(), "stage_cleanup");
    }
}
