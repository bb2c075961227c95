use cartflow_core::{ActionError, ApiErrorResponse, CartId, CoreError, LineId, VariantId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("missing cart id")]
    MissingCartId,

    #[error("cart not found: {0}")]
    CartNotFound(CartId),

    #[error("cart line not found: {0}")]
    LineNotFound(LineId),

    #[error("merchandise not found: {0}")]
    VariantNotFound(VariantId),

    #[error("upstream API error: {}", .0.top_level_message())]
    Upstream(ApiErrorResponse),

    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

impl From<StorageError> for ActionError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::MissingCartId => ActionError::MissingCartId,
            StorageError::CartNotFound(cart_id) => ActionError::Api {
                message: format!("Cart with ID {cart_id} was not found."),
                code: Some("CART_NOT_FOUND".into()),
            },
            StorageError::LineNotFound(line_id) => ActionError::Api {
                message: format!("Cart line {line_id} does not exist."),
                code: Some("INVALID_LINE".into()),
            },
            StorageError::VariantNotFound(variant_id) => ActionError::Api {
                message: format!("The merchandise with id {variant_id} does not exist."),
                code: Some("INVALID_MERCHANDISE".into()),
            },
            StorageError::Upstream(response) => {
                tracing::error!(
                    network_status = ?response.network_status,
                    errors = response.graphql_errors.len(),
                    message = response.top_level_message(),
                    "commerce API returned errors"
                );
                ActionError::from(response)
            }
            StorageError::Core(core) => ActionError::Validation(core),
        }
    }
}
