//! Stage dependency graph.
//!
//! Dependency-configured pipelines describe a partial order instead of an
//! explicit group sequence. The graph compiles into a level-ordered
//! sequence of groups (stages whose dependencies are all satisfied run
//! together, concurrently) which feeds the same dispatcher the default and
//! custom pipelines use.

use std::collections::{HashMap, HashSet};

use crate::error::PipelineError;
use crate::stage::{
    StageName, STAGE_AGGREGATOR, STAGE_CLEANUP, STAGE_FETCHER, STAGE_PARSER, STAGE_PERSISTOR,
    STAGE_SEQUENCER, STAGE_SETUP, STAGE_SYNCER, STAGE_VALIDATOR,
};

/// Maps each stage to the stages that must complete before it may run.
#[derive(Debug, Clone, Default)]
pub struct StageGraph {
    dependencies: HashMap<StageName, Vec<StageName>>,
}

impl StageGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// The default partial order over the reserved stages:
    /// `setup → syncer → fetcher → parser → validator →
    /// {sequencer ∥ aggregator} → persistor → cleanup`.
    pub fn with_defaults() -> Self {
        let mut graph = Self::new();
        graph.set(STAGE_SETUP, vec![]);
        graph.set(STAGE_SYNCER, vec![STAGE_SETUP]);
        graph.set(STAGE_FETCHER, vec![STAGE_SYNCER]);
        graph.set(STAGE_PARSER, vec![STAGE_FETCHER]);
        graph.set(STAGE_VALIDATOR, vec![STAGE_PARSER]);
        graph.set(STAGE_SEQUENCER, vec![STAGE_VALIDATOR]);
        graph.set(STAGE_AGGREGATOR, vec![STAGE_VALIDATOR]);
        graph.set(STAGE_PERSISTOR, vec![STAGE_SEQUENCER, STAGE_AGGREGATOR]);
        graph.set(STAGE_CLEANUP, vec![STAGE_PERSISTOR]);
        graph
    }

    /// Set the dependencies that must run before `name` can be executed.
    /// Replaces any previous entry for `name`.
    pub fn set(&mut self, name: impl Into<StageName>, dependencies: Vec<StageName>) {
        self.dependencies.insert(name.into(), dependencies);
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Validate the graph and compile it into a group sequence.
    ///
    /// Rules:
    /// - every registered stage must have a dependency entry;
    /// - a dependency that is itself a graph entry orders its dependents,
    ///   whether or not that stage is registered (unregistered stages are
    ///   skipped with a log line at run time);
    /// - a dependency absent from the graph is vacuously satisfied;
    /// - cycles, and any other state from which no progress is possible,
    ///   are rejected.
    ///
    /// Groups are sorted by name; order within a group carries no
    /// execution guarantee.
    pub(crate) fn compile(
        &self,
        registered: &[&StageName],
    ) -> Result<Vec<Vec<StageName>>, PipelineError> {
        for name in registered {
            if !self.dependencies.contains_key(*name) {
                return Err(PipelineError::MisconfiguredDependency);
            }
        }

        let mut completed: HashSet<&StageName> = HashSet::new();
        let mut groups = Vec::new();

        while completed.len() < self.dependencies.len() {
            let mut next: Vec<&StageName> = self
                .dependencies
                .iter()
                .filter(|(name, _)| !completed.contains(name))
                .filter(|(_, deps)| {
                    deps.iter()
                        .all(|dep| completed.contains(dep) || !self.dependencies.contains_key(dep))
                })
                .map(|(name, _)| name)
                .collect();

            if next.is_empty() {
                return Err(PipelineError::MisconfiguredDependency);
            }

            next.sort();
            completed.extend(next.iter().copied());
            groups.push(next.into_iter().cloned().collect());
        }

        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_graph_compiles_to_expected_levels() {
        let graph = StageGraph::with_defaults();
        let groups = graph.compile(&[]).unwrap();

        assert_eq!(
            groups,
            vec![
                vec![STAGE_SETUP],
                vec![STAGE_SYNCER],
                vec![STAGE_FETCHER],
                vec![STAGE_PARSER],
                vec![STAGE_VALIDATOR],
                vec![STAGE_AGGREGATOR, STAGE_SEQUENCER],
                vec![STAGE_PERSISTOR],
                vec![STAGE_CLEANUP],
            ]
        );
    }

    #[test]
    fn cycle_is_rejected() {
        let mut graph = StageGraph::new();
        graph.set("a", vec![StageName::from("b")]);
        graph.set("b", vec![StageName::from("a")]);

        let err = graph.compile(&[]).unwrap_err();
        assert!(matches!(err, PipelineError::MisconfiguredDependency));
    }

    #[test]
    fn registered_stage_without_entry_is_rejected() {
        let mut graph = StageGraph::new();
        graph.set("a", vec![]);

        let orphan = StageName::from("orphan");
        let err = graph.compile(&[&orphan]).unwrap_err();
        assert!(matches!(err, PipelineError::MisconfiguredDependency));
    }

    #[test]
    fn dependency_outside_graph_is_vacuously_satisfied() {
        let mut graph = StageGraph::new();
        graph.set("a", vec![StageName::from("elsewhere")]);

        let groups = graph.compile(&[]).unwrap();
        assert_eq!(groups, vec![vec![StageName::from("a")]]);
    }

    #[test]
    fn unregistered_graph_entries_still_order_dependents() {
        // b depends on a; a is in the graph but never registered. b must
        // still wait for a's slot rather than running in the first level.
        let mut graph = StageGraph::new();
        graph.set("a", vec![]);
        graph.set("b", vec![StageName::from("a")]);

        let b = StageName::from("b");
        let groups = graph.compile(&[&b]).unwrap();
        assert_eq!(
            groups,
            vec![vec![StageName::from("a")], vec![StageName::from("b")]]
        );
    }

    #[test]
    fn diamond_runs_middle_stages_together() {
        let mut graph = StageGraph::new();
        graph.set("top", vec![]);
        graph.set("left", vec![StageName::from("top")]);
        graph.set("right", vec![StageName::from("top")]);
        graph.set(
            "bottom",
            vec![StageName::from("left"), StageName::from("right")],
        );

        let groups = graph.compile(&[]).unwrap();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[1], vec![StageName::from("left"), StageName::from("right")]);
    }
}
