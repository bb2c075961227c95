use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use cartflow_core::{
    ActionError, ActionResult, AddLineInput, ApiErrorResponse, Cart, CartId, CartLine, LineId,
    Merchandise, RemoveLineInput, UpdateLineInput, VariantId,
};
use uuid::Uuid;

use crate::error::StorageError;
use crate::traits::{CartActions, CartSource};

struct MemoryState {
    session: Option<CartId>,
    lines: Vec<CartLine>,
    rejection: Option<ApiErrorResponse>,
}

/// In-process commerce backend holding one authoritative cart.
///
/// Behaves like the hosted cart API for the operations the coordinator uses:
/// adding a variant already in the cart bumps that line, setting a line to
/// zero removes it, unknown variants and lines are upstream errors.
pub struct MemoryCart {
    cart_id: CartId,
    currency_code: String,
    checkout_url: String,
    catalog: BTreeMap<VariantId, Merchandise>,
    state: Mutex<MemoryState>,
}

impl MemoryCart {
    pub fn new(cart_id: impl Into<CartId>, currency_code: impl Into<String>) -> Self {
        let cart_id = cart_id.into();
        Self {
            checkout_url: format!("https://checkout.cartflow.test/cart/{cart_id}"),
            currency_code: currency_code.into(),
            catalog: BTreeMap::new(),
            state: Mutex::new(MemoryState {
                session: Some(cart_id.clone()),
                lines: Vec::new(),
                rejection: None,
            }),
            cart_id,
        }
    }

    pub fn with_merchandise(mut self, merchandise: Merchandise) -> Self {
        self.catalog
            .insert(merchandise.variant_id.clone(), merchandise);
        self
    }

    /// Drops the session cookie: later calls fail with a missing cart id.
    pub fn end_session(&self) {
        self.set_session(None);
    }

    /// Points the session at another cart id, as a stale cookie would.
    pub fn set_session(&self, session: Option<CartId>) {
        self.lock().session = session;
    }

    /// The next mutation fails with `response` instead of touching the cart.
    pub fn reject_next(&self, response: ApiErrorResponse) {
        self.lock().rejection = Some(response);
    }

    pub fn cart_id(&self) -> &CartId {
        &self.cart_id
    }

    pub fn snapshot(&self) -> Result<Cart, StorageError> {
        let state = self.lock();
        self.require_session(&state)?;
        self.build_cart(&state)
    }

    /// Line id of the first line holding `variant_id`.
    pub fn line_for(&self, variant_id: &VariantId) -> Option<LineId> {
        self.lock()
            .lines
            .iter()
            .find(|line| &line.merchandise.variant_id == variant_id)
            .map(|line| line.id.clone())
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn require_session(&self, state: &MemoryState) -> Result<(), StorageError> {
        match &state.session {
            None => Err(StorageError::MissingCartId),
            Some(id) if id != &self.cart_id => Err(StorageError::CartNotFound(id.clone())),
            Some(_) => Ok(()),
        }
    }

    fn begin_mutation(&self, state: &mut MemoryState) -> Result<(), StorageError> {
        self.require_session(state)?;
        match state.rejection.take() {
            Some(response) => Err(StorageError::Upstream(response)),
            None => Ok(()),
        }
    }

    fn build_cart(&self, state: &MemoryState) -> Result<Cart, StorageError> {
        Ok(Cart::new(
            self.cart_id.clone(),
            self.currency_code.clone(),
            self.checkout_url.clone(),
            state.lines.clone(),
        )?)
    }

    fn apply_add(&self, input: &AddLineInput) -> Result<(), StorageError> {
        input.validate()?;
        let mut state = self.lock();
        self.begin_mutation(&mut state)?;
        let merchandise = self
            .catalog
            .get(&input.variant_id)
            .ok_or_else(|| StorageError::VariantNotFound(input.variant_id.clone()))?;

        if let Some(line) = state
            .lines
            .iter_mut()
            .find(|line| line.merchandise.variant_id == input.variant_id)
        {
            line.quantity = line.quantity.saturating_add(input.quantity);
            return Ok(());
        }

        state.lines.push(CartLine {
            id: LineId::new(format!("gid://cartflow/CartLine/{}", Uuid::now_v7())),
            merchandise: merchandise.clone(),
            quantity: input.quantity,
        });
        Ok(())
    }

    fn apply_update(&self, input: &UpdateLineInput) -> Result<(), StorageError> {
        input.validate()?;
        let mut state = self.lock();
        self.begin_mutation(&mut state)?;
        let index = state
            .lines
            .iter()
            .position(|line| line.id == input.line_id)
            .ok_or_else(|| StorageError::LineNotFound(input.line_id.clone()))?;

        if input.quantity == 0 {
            state.lines.remove(index);
        } else {
            state.lines[index].quantity = input.quantity;
        }
        Ok(())
    }

    fn apply_remove(&self, input: &RemoveLineInput) -> Result<(), StorageError> {
        input.validate()?;
        let mut state = self.lock();
        self.begin_mutation(&mut state)?;
        let before = state.lines.len();
        state.lines.retain(|line| line.id != input.line_id);
        if state.lines.len() == before {
            return Err(StorageError::LineNotFound(input.line_id.clone()));
        }
        Ok(())
    }

    fn apply_clear(&self) -> Result<(), StorageError> {
        let mut state = self.lock();
        self.begin_mutation(&mut state)?;
        state.lines.clear();
        Ok(())
    }
}

#[async_trait]
impl CartActions for MemoryCart {
    async fn add_line(&self, input: AddLineInput) -> Result<ActionResult, ActionError> {
        self.apply_add(&input)?;
        Ok(ActionResult::ok_with("Item added to cart."))
    }

    async fn update_line_quantity(
        &self,
        input: UpdateLineInput,
    ) -> Result<ActionResult, ActionError> {
        self.apply_update(&input)?;
        Ok(ActionResult::ok_with("Cart updated."))
    }

    async fn remove_line(&self, input: RemoveLineInput) -> Result<ActionResult, ActionError> {
        self.apply_remove(&input)?;
        Ok(ActionResult::ok_with("Item removed from cart."))
    }

    async fn clear_cart(&self) -> Result<ActionResult, ActionError> {
        self.apply_clear()?;
        Ok(ActionResult::ok_with("Cart cleared."))
    }
}

#[async_trait]
impl CartSource for MemoryCart {
    async fn fetch_cart(&self) -> Result<Cart, StorageError> {
        self.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartflow_core::result::MISSING_CART_MESSAGE;
    use cartflow_core::{ErrorCode, Money};

    fn mug() -> Merchandise {
        Merchandise {
            variant_id: VariantId::from("v-mug"),
            title: "Mug".into(),
            image: None,
            price: Money::new(19_900, "NOK"),
        }
    }

    fn shop() -> MemoryCart {
        MemoryCart::new("cart-1", "NOK").with_merchandise(mug())
    }

    #[tokio::test]
    async fn add_same_variant_bumps_line() {
        let shop = shop();
        shop.add_line(AddLineInput::new("v-mug", 1)).await.unwrap();
        shop.add_line(AddLineInput::new("v-mug", 2)).await.unwrap();

        let cart = shop.fetch_cart().await.unwrap();
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.total_quantity(), 3);
        assert_eq!(cart.subtotal(), Money::new(59_700, "NOK"));
    }

    #[tokio::test]
    async fn update_to_zero_removes_line() {
        let shop = shop();
        shop.add_line(AddLineInput::new("v-mug", 2)).await.unwrap();
        let line_id = shop.line_for(&VariantId::from("v-mug")).unwrap();

        shop.update_line_quantity(UpdateLineInput::new(line_id.clone(), 5))
            .await
            .unwrap();
        assert_eq!(shop.snapshot().unwrap().total_quantity(), 5);

        shop.update_line_quantity(UpdateLineInput::new(line_id, 0))
            .await
            .unwrap();
        assert!(shop.snapshot().unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_and_clear() {
        let shop = shop();
        shop.add_line(AddLineInput::new("v-mug", 1)).await.unwrap();
        let line_id = shop.line_for(&VariantId::from("v-mug")).unwrap();

        let result = shop.remove_line(RemoveLineInput::new(line_id.clone())).await.unwrap();
        assert!(result.success);

        let err = shop.remove_line(RemoveLineInput::new(line_id)).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ApiError);

        shop.add_line(AddLineInput::new("v-mug", 4)).await.unwrap();
        shop.clear_cart().await.unwrap();
        assert!(shop.snapshot().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_variant_is_upstream_error() {
        let err = shop()
            .add_line(AddLineInput::new("v-ghost", 1))
            .await
            .unwrap_err();
        match err {
            ActionError::Api { message, code } => {
                assert!(message.contains("v-ghost"), "unexpected message: {message}");
                assert_eq!(code.as_deref(), Some("INVALID_MERCHANDISE"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_input_is_validation_error() {
        let err = shop()
            .add_line(AddLineInput::new("v-mug", 0))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Validation);
        assert_eq!(err.user_message(), Some("Quantity must be at least 1."));
    }

    #[tokio::test]
    async fn ended_session_reports_missing_cart() {
        let shop = shop();
        shop.end_session();

        assert_eq!(shop.fetch_cart().await, Err(StorageError::MissingCartId));
        let err = shop.clear_cart().await.unwrap_err();
        assert_eq!(err, ActionError::MissingCartId);
        assert_eq!(err.user_message(), Some(MISSING_CART_MESSAGE));
    }

    #[tokio::test]
    async fn foreign_session_reports_cart_not_found() {
        let shop = shop();
        shop.set_session(Some(CartId::from("cart-expired")));

        let err = shop.fetch_cart().await.unwrap_err();
        assert_eq!(err, StorageError::CartNotFound(CartId::from("cart-expired")));

        let err = ActionError::from(err);
        assert_eq!(err.user_message(), Some("Cart with ID cart-expired was not found."));
    }

    #[tokio::test]
    async fn scripted_rejection_fails_one_mutation() {
        let shop = shop();
        shop.reject_next(ApiErrorResponse {
            graphql_errors: vec![cartflow_core::GraphQlError {
                message: Some("Throttled".into()),
                code: Some("THROTTLED".into()),
                ..Default::default()
            }],
            ..Default::default()
        });

        let err = shop.add_line(AddLineInput::new("v-mug", 1)).await.unwrap_err();
        assert_eq!(
            err,
            ActionError::Api {
                message: "Throttled".into(),
                code: Some("THROTTLED".into()),
            }
        );
        assert!(shop.snapshot().unwrap().is_empty());

        shop.add_line(AddLineInput::new("v-mug", 1)).await.unwrap();
        assert_eq!(shop.snapshot().unwrap().total_quantity(), 1);
    }
}
