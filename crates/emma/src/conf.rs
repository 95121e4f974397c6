use crate::error::{EmmError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_TOP_Q: usize = 15;

/// What to do with the children of a description whose callback failed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Drop the description and do not expand it.
    #[default]
    SkipSubtree,
    /// Drop the description but still expand its children.
    ExpandChildren,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionMode {
    #[default]
    Sequential,
    /// Quality evaluation and refinement of each frontier level run on the
    /// rayon pool; results are merged in frontier order.
    Parallel,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub top_q: usize,
    pub failure_policy: FailurePolicy,
    pub execution: ExecutionMode,
    /// Descriptions with more predicates are never enqueued.
    pub max_depth: Option<usize>,
    /// Wall-clock budget; the best results so far are returned when it runs out.
    pub deadline: Option<Duration>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_q: DEFAULT_TOP_Q,
            failure_policy: FailurePolicy::default(),
            execution: ExecutionMode::default(),
            max_depth: None,
            deadline: None,
        }
    }
}

impl SearchConfig {
    pub fn new(top_q: usize) -> Self {
        Self {
            top_q,
            ..Self::default()
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_execution(mut self, mode: ExecutionMode) -> Self {
        self.execution = mode;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_q == 0 {
            return Err(EmmError::InvalidConfig(
                "top_q must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: SearchConfig = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
