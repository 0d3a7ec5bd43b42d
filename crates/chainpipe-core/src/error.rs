//! Error types for the pipeline engine.

use std::fmt;

use thiserror::Error;

/// Errors surfaced by the pipeline and its collaborators.
///
/// Tasks, runners, sources and sinks all return this type. User code can
/// carry arbitrary failures through [`PipelineError::Other`] (usually via
/// [`PipelineError::msg`] or an `anyhow::Error` conversion).
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The stage dependency map is incomplete or contains a cycle.
    #[error("misconfigured stage dependency")]
    MisconfiguredDependency,

    /// A concurrent group was declared without any stages.
    #[error("provide stages to run concurrently")]
    MissingStages,

    /// The named stage is not registered with the pipeline.
    #[error("no stage to run")]
    MissingStage,

    /// The run context was cancelled.
    #[error("pipeline cancelled")]
    Cancelled,

    /// Errors collected from concurrent stages or tasks.
    #[error(transparent)]
    Aggregate(#[from] MultiError),

    /// Any other failure, typically produced by user tasks.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    /// Shorthand for an opaque error carrying just a message.
    pub fn msg(message: impl Into<String>) -> Self {
        PipelineError::Other(anyhow::Error::msg(message.into()))
    }
}

/// An aggregate of errors whose individual members remain inspectable.
///
/// Concurrent stage groups and async runners collect every failure here
/// rather than dropping all but the first. Member order is unspecified.
#[derive(Debug, Default)]
pub struct MultiError {
    errors: Vec<PipelineError>,
}

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: PipelineError) {
        self.errors.push(err);
    }

    /// The collected members.
    pub fn errors(&self) -> &[PipelineError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Ok` when no errors were collected, the aggregate otherwise.
    pub fn into_result(self) -> Result<(), PipelineError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::Aggregate(self))
        }
    }

    /// Append `err` to an accumulating run error, promoting to an
    /// aggregate when more than one error is present.
    pub fn append(existing: Option<PipelineError>, err: PipelineError) -> PipelineError {
        match existing {
            None => err,
            Some(PipelineError::Aggregate(mut multi)) => {
                multi.push(err);
                PipelineError::Aggregate(multi)
            }
            Some(prior) => {
                let mut multi = MultiError::new();
                multi.push(prior);
                multi.push(err);
                PipelineError::Aggregate(multi)
            }
        }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error(s) occurred: ", self.errors.len())?;
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_multi_error_is_ok() {
        assert!(MultiError::new().into_result().is_ok());
    }

    #[test]
    fn multi_error_preserves_members() {
        let mut multi = MultiError::new();
        multi.push(PipelineError::msg("first"));
        multi.push(PipelineError::msg("second"));

        assert_eq!(multi.len(), 2);
        let joined = multi.to_string();
        assert!(joined.contains("first"));
        assert!(joined.contains("second"));

        match multi.into_result() {
            Err(PipelineError::Aggregate(m)) => assert_eq!(m.errors().len(), 2),
            other => panic!("expected aggregate, got {other:?}"),
        }
    }

    #[test]
    fn append_promotes_to_aggregate() {
        let first = MultiError::append(None, PipelineError::msg("a"));
        assert_eq!(first.to_string(), "a");

        let both = MultiError::append(Some(first), PipelineError::msg("b"));
        match both {
            PipelineError::Aggregate(m) => assert_eq!(m.len(), 2),
            other => panic!("expected aggregate, got {other:?}"),
        }
    }

    #[test]
    fn sentinel_messages() {
        assert_eq!(
            PipelineError::MissingStages.to_string(),
            "provide stages to run concurrently"
        );
        assert_eq!(PipelineError::MissingStage.to_string(), "no stage to run");
        assert_eq!(
            PipelineError::MisconfiguredDependency.to_string(),
            "misconfigured stage dependency"
        );
    }
}
