//! Per-run selection options.

use serde::{Deserialize, Serialize};

use crate::stage::{StageName, TaskName};

/// The only per-run selection surface. Both lists empty (the default)
/// means "run everything". No wildcards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Options {
    /// Stages to turn off for this run.
    #[serde(default)]
    pub stages_blacklist: Vec<StageName>,

    /// Names of tasks to execute; matched by substring containment
    /// against each task's name.
    #[serde(default)]
    pub task_whitelist: Vec<TaskName>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::STAGE_FETCHER;

    #[test]
    fn default_runs_everything() {
        let options = Options::default();
        assert!(options.stages_blacklist.is_empty());
        assert!(options.task_whitelist.is_empty());
    }

    #[test]
    fn deserializes_with_missing_fields() {
        let options: Options = serde_json::from_str("{}").unwrap();
        assert!(options.stages_blacklist.is_empty());

        let options: Options =
            serde_json::from_str(r#"{"stages_blacklist":["stage_fetcher"]}"#).unwrap();
        assert_eq!(options.stages_blacklist, vec![STAGE_FETCHER]);
    }
}
