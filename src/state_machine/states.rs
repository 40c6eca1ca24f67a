use serde::{Deserialize, Serialize};
use std::fmt;

/// Mining state of a task as reported by the external mining engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Task created locally, not yet submitted to the engine
    New,
    /// Engine is mining
    InProgress,
    /// Mining finished, results available
    Solved,
    /// Engine reported a failure
    Failed,
    /// Mining was stopped before it finished
    Interrupted,
    /// Engine finished with rule heads only
    SolvedHeads,
}

impl TaskState {
    /// Mining will not progress any further from this state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Solved | Self::Failed | Self::Interrupted | Self::SolvedHeads
        )
    }

    /// Engine is still working on the task
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress)
    }

    pub fn is_solved(&self) -> bool {
        matches!(self, Self::Solved)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::InProgress => "in_progress",
            Self::Solved => "solved",
            Self::Failed => "failed",
            Self::Interrupted => "interrupted",
            Self::SolvedHeads => "solved_heads",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "in_progress" => Ok(Self::InProgress),
            "solved" => Ok(Self::Solved),
            "failed" => Ok(Self::Failed),
            "interrupted" => Ok(Self::Interrupted),
            "solved_heads" => Ok(Self::SolvedHeads),
            _ => Err(format!("Invalid task state: {s}")),
        }
    }
}

/// Progress of the result import into the rule graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportState {
    /// Nothing to import
    None,
    /// Further import rounds are required
    Waiting,
    /// An import round is running
    Partial,
    /// All results imported
    Done,
}

impl ImportState {
    /// Position along the forward-only `none → waiting → partial → done` order
    pub fn rank(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Waiting => 1,
            Self::Partial => 2,
            Self::Done => 3,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Waiting => "waiting",
            Self::Partial => "partial",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for ImportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ImportState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "waiting" => Ok(Self::Waiting),
            "partial" => Ok(Self::Partial),
            "done" => Ok(Self::Done),
            _ => Err(format!("Invalid import state: {s}")),
        }
    }
}

impl Default for TaskState {
    fn default() -> Self {
        Self::New
    }
}

impl Default for ImportState {
    fn default() -> Self {
        Self::None
    }
}
