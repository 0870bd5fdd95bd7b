use serde::Serialize;

use crate::error::ItemError;

/// Pipeline stage of a single batch item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Pending,
    Fetching,
    Converting,
    Publishing,
    Done,
}

/// Per-item state: `Pending → Fetching → Converting → Publishing → Done`,
/// or `Failed(stage)` from any active stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemState {
    Active(Stage),
    Failed { stage: Stage, error: ItemError },
}

impl Default for ItemState {
    fn default() -> Self {
        ItemState::Active(Stage::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("item already finished at stage {0:?}")]
    Finished(Stage),
    #[error("cannot move from {from:?} to {to:?}")]
    Backwards { from: Stage, to: Stage },
}

impl ItemState {
    pub fn stage(&self) -> Stage {
        match self {
            ItemState::Active(stage) => *stage,
            ItemState::Failed { stage, .. } => *stage,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemState::Active(Stage::Done) | ItemState::Failed { .. })
    }

    /// Move forward to `to`. Skipping stages is allowed (inline content
    /// enters at `Converting`), going back is not.
    pub fn enter(&mut self, to: Stage) -> Result<(), TransitionError> {
        let from = match self {
            ItemState::Failed { stage, .. } => return Err(TransitionError::Finished(*stage)),
            ItemState::Active(stage) => *stage,
        };
        if from == Stage::Done {
            return Err(TransitionError::Finished(Stage::Done));
        }
        if to <= from {
            return Err(TransitionError::Backwards { from, to });
        }
        *self = ItemState::Active(to);
        Ok(())
    }

    /// Mark the item failed at its current stage. A terminal item is left untouched.
    pub fn fail(&mut self, error: ItemError) {
        let stage = match self {
            ItemState::Active(Stage::Done) | ItemState::Failed { .. } => return,
            ItemState::Active(Stage::Pending) => error.stage(),
            ItemState::Active(stage) => *stage,
        };
        *self = ItemState::Failed { stage, error };
    }
}
