use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLineInput {
    pub variant_id: VariantId,
    pub quantity: u32,
}

impl AddLineInput {
    pub fn new(variant_id: impl Into<VariantId>, quantity: u32) -> Self {
        Self {
            variant_id: variant_id.into(),
            quantity,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.variant_id.is_blank() {
            return Err(CoreError::validation(
                "variant_id",
                "Please select a product variant.",
            ));
        }
        if self.quantity < 1 {
            return Err(CoreError::validation("quantity", "Quantity must be at least 1."));
        }
        Ok(())
    }
}

/// Sets a line to an absolute quantity. Zero removes the line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateLineInput {
    pub line_id: LineId,
    pub quantity: u32,
}

impl UpdateLineInput {
    pub fn new(line_id: impl Into<LineId>, quantity: u32) -> Self {
        Self {
            line_id: line_id.into(),
            quantity,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.line_id.is_blank() {
            return Err(CoreError::validation("line_id", "lineId is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLineInput {
    pub line_id: LineId,
}

impl RemoveLineInput {
    pub fn new(line_id: impl Into<LineId>) -> Self {
        Self {
            line_id: line_id.into(),
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.line_id.is_blank() {
            return Err(CoreError::validation(
                "line_id",
                "A non-empty lineId was expected.",
            ));
        }
        Ok(())
    }
}
