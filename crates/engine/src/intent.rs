use cartflow_core::{AddLineInput, CoreError, RemoveLineInput, UpdateLineInput};
use serde::{Deserialize, Serialize};

use crate::store::OptimisticDelta;

/// A requested cart change, before the server has seen it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "input", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationIntent {
    AddLines(AddLineInput),
    UpdateLine(UpdateLineInput),
    RemoveLine(RemoveLineInput),
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationKind {
    AddLines,
    UpdateLine,
    RemoveLine,
    Clear,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AddLines => "ADD_LINES",
            Self::UpdateLine => "UPDATE_LINE",
            Self::RemoveLine => "REMOVE_LINE",
            Self::Clear => "CLEAR",
        }
    }
}

impl MutationIntent {
    pub fn kind(&self) -> MutationKind {
        match self {
            Self::AddLines(_) => MutationKind::AddLines,
            Self::UpdateLine(_) => MutationKind::UpdateLine,
            Self::RemoveLine(_) => MutationKind::RemoveLine,
            Self::Clear => MutationKind::Clear,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            Self::AddLines(input) => input.validate(),
            Self::UpdateLine(input) => input.validate(),
            Self::RemoveLine(input) => input.validate(),
            Self::Clear => Ok(()),
        }
    }

    /// Line quantities the UI should show before the server confirms.
    ///
    /// Adds have no line id yet and clears are reconciled by the refetch, so
    /// neither carries a delta.
    pub fn optimistic_delta(&self) -> Option<OptimisticDelta> {
        match self {
            Self::UpdateLine(input) => Some(OptimisticDelta::from([(
                input.line_id.clone(),
                i64::from(input.quantity),
            )])),
            Self::RemoveLine(input) => Some(OptimisticDelta::from([(input.line_id.clone(), 0)])),
            Self::AddLines(_) | Self::Clear => None,
        }
    }
}
