use async_trait::async_trait;
use cartflow_core::{
    ActionError, ActionResult, AddLineInput, Cart, RemoveLineInput, UpdateLineInput,
};

use crate::error::StorageError;

/// Server-side cart mutations.
///
/// Implementations resolve with an [`ActionResult`] (which may itself report
/// `success: false`) or fail with an [`ActionError`]. Inputs have already been
/// validated by the caller.
#[async_trait]
pub trait CartActions: Send + Sync {
    async fn add_line(&self, input: AddLineInput) -> Result<ActionResult, ActionError>;

    async fn update_line_quantity(
        &self,
        input: UpdateLineInput,
    ) -> Result<ActionResult, ActionError>;

    async fn remove_line(&self, input: RemoveLineInput) -> Result<ActionResult, ActionError>;

    async fn clear_cart(&self) -> Result<ActionResult, ActionError>;
}

/// Read side of the commerce backend: the authoritative cart for the
/// current session.
#[async_trait]
pub trait CartSource: Send + Sync {
    async fn fetch_cart(&self) -> Result<Cart, StorageError>;
}
