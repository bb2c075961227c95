//! Derived, render-ready values for the cart drawer.

use cartflow_core::{Cart, CartLine, Money, RemoveLineInput, UpdateLineInput};

use crate::intent::MutationIntent;
use crate::store::{UiEvent, UiState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartBody {
    /// A mutation is in flight and there is nothing to show yet.
    Loading,
    Empty,
    Lines,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FooterView {
    pub subtotal: Money,
    pub checkout_url: String,
    pub checkout_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineControls {
    pub can_decrement: bool,
    pub can_increment: bool,
    pub can_remove: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartView {
    pub open: bool,
    pub pending: bool,
    pub item_count: u32,
    pub badge_count: usize,
    pub body: CartBody,
    pub footer: Option<FooterView>,
}

impl CartView {
    pub fn build(ui: &UiState, cart: Option<&Cart>) -> Self {
        Self {
            open: ui.open,
            pending: ui.is_pending(),
            item_count: item_count(cart),
            badge_count: badge_count(ui),
            body: body(ui, cart),
            footer: footer(ui, cart),
        }
    }
}

fn is_empty(cart: Option<&Cart>) -> bool {
    cart.is_none_or(Cart::is_empty)
}

pub fn item_count(cart: Option<&Cart>) -> u32 {
    cart.map_or(0, Cart::total_quantity)
}

/// Count shown on the drawer trigger: lines with an unconfirmed quantity.
pub fn badge_count(ui: &UiState) -> usize {
    ui.optimistic_lines.len()
}

pub fn body(ui: &UiState, cart: Option<&Cart>) -> CartBody {
    match (ui.is_pending(), is_empty(cart)) {
        (true, true) => CartBody::Loading,
        (false, true) => CartBody::Empty,
        (_, false) => CartBody::Lines,
    }
}

/// `None` for an empty cart: no subtotal, no checkout link.
pub fn footer(ui: &UiState, cart: Option<&Cart>) -> Option<FooterView> {
    let cart = cart.filter(|cart| !cart.is_empty())?;
    Some(FooterView {
        subtotal: cart.subtotal(),
        checkout_url: cart.checkout_url().to_string(),
        checkout_enabled: !ui.is_pending(),
    })
}

pub fn line_controls(ui: &UiState, line: &CartLine) -> LineControls {
    let pending = ui.is_pending();
    LineControls {
        can_decrement: !pending && line.quantity > 1,
        can_increment: !pending,
        can_remove: true,
    }
}

/// Quantity to display: the optimistic value if one is pending.
pub fn effective_quantity(ui: &UiState, line: &CartLine) -> u32 {
    ui.optimistic_lines
        .get(&line.id)
        .and_then(|quantity| u32::try_from(quantity).ok())
        .unwrap_or(line.quantity)
}

pub fn increment_intent(line: &CartLine) -> MutationIntent {
    MutationIntent::UpdateLine(UpdateLineInput::new(
        line.id.clone(),
        line.quantity.saturating_add(1),
    ))
}

/// `None` at quantity 1; removal goes through [`remove_intent`].
pub fn decrement_intent(line: &CartLine) -> Option<MutationIntent> {
    (line.quantity > 1).then(|| {
        MutationIntent::UpdateLine(UpdateLineInput::new(line.id.clone(), line.quantity - 1))
    })
}

pub fn remove_intent(line: &CartLine) -> MutationIntent {
    MutationIntent::RemoveLine(RemoveLineInput::new(line.id.clone()))
}

pub fn drawer_open_change(open: bool) -> UiEvent {
    if open { UiEvent::Open } else { UiEvent::Close }
}
