//! Read-only mirror of the authoritative server-side cart.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;
use crate::ids::*;

pub const PLACEHOLDER_IMAGE_URL: &str = "/placeholder.svg";

/// An amount in minor units (cents, øre) of a single currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    pub amount_minor: i64,
    pub currency_code: String,
}

impl Money {
    pub fn new(amount_minor: i64, currency_code: impl Into<String>) -> Self {
        Self {
            amount_minor,
            currency_code: currency_code.into(),
        }
    }

    pub fn zero(currency_code: impl Into<String>) -> Self {
        Self::new(0, currency_code)
    }

    pub fn checked_add(&self, other: &Money) -> Result<Money, CoreError> {
        if self.currency_code != other.currency_code {
            return Err(CoreError::CurrencyMismatch {
                expected: self.currency_code.clone(),
                found: other.currency_code.clone(),
            });
        }
        Ok(Money::new(
            self.amount_minor.saturating_add(other.amount_minor),
            self.currency_code.clone(),
        ))
    }

    pub fn times(&self, quantity: u32) -> Money {
        Money::new(
            self.amount_minor.saturating_mul(i64::from(quantity)),
            self.currency_code.clone(),
        )
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.amount_minor < 0 { "-" } else { "" };
        let abs = self.amount_minor.unsigned_abs();
        write!(f, "{sign}{}.{:02} {}", abs / 100, abs % 100, self.currency_code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    pub alt_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Merchandise {
    pub variant_id: VariantId,
    pub title: String,
    pub image: Option<Image>,
    pub price: Money,
}

impl Merchandise {
    pub fn image_url(&self) -> &str {
        self.image
            .as_ref()
            .map_or(PLACEHOLDER_IMAGE_URL, |image| image.url.as_str())
    }

    pub fn image_alt(&self) -> &str {
        self.image
            .as_ref()
            .and_then(|image| image.alt_text.as_deref())
            .unwrap_or(&self.title)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: LineId,
    pub merchandise: Merchandise,
    pub quantity: u32,
}

impl CartLine {
    pub fn line_total(&self) -> Money {
        self.merchandise.price.times(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct RawCart {
    id: CartId,
    currency_code: String,
    checkout_url: String,
    lines: Vec<CartLine>,
}

/// Ordered cart lines plus checkout URL.
///
/// Total quantity and subtotal are derived from the lines, so they always agree
/// with what is displayed. Every line has a positive quantity and is priced in
/// the cart's currency; deserialization enforces the same rules as [`Cart::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCart", into = "RawCart")]
pub struct Cart {
    id: CartId,
    currency_code: String,
    checkout_url: String,
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new(
        id: CartId,
        currency_code: impl Into<String>,
        checkout_url: impl Into<String>,
        lines: Vec<CartLine>,
    ) -> Result<Self, CoreError> {
        let currency_code = currency_code.into();
        for line in &lines {
            if line.quantity == 0 {
                return Err(CoreError::validation(
                    "quantity",
                    "Cart line quantity must be positive.",
                ));
            }
            if line.merchandise.price.currency_code != currency_code {
                return Err(CoreError::CurrencyMismatch {
                    expected: currency_code,
                    found: line.merchandise.price.currency_code.clone(),
                });
            }
        }
        Ok(Self {
            id,
            currency_code,
            checkout_url: checkout_url.into(),
            lines,
        })
    }

    pub fn empty(
        id: CartId,
        currency_code: impl Into<String>,
        checkout_url: impl Into<String>,
    ) -> Self {
        Self {
            id,
            currency_code: currency_code.into(),
            checkout_url: checkout_url.into(),
            lines: Vec::new(),
        }
    }

    pub fn id(&self) -> &CartId {
        &self.id
    }

    pub fn currency_code(&self) -> &str {
        &self.currency_code
    }

    pub fn checkout_url(&self) -> &str {
        &self.checkout_url
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line(&self, line_id: &LineId) -> Option<&CartLine> {
        self.lines.iter().find(|line| &line.id == line_id)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn total_quantity(&self) -> u32 {
        self.lines
            .iter()
            .fold(0u32, |total, line| total.saturating_add(line.quantity))
    }

    pub fn subtotal(&self) -> Money {
        let amount = self
            .lines
            .iter()
            .fold(0i64, |total, line| total.saturating_add(line.line_total().amount_minor));
        Money::new(amount, self.currency_code.clone())
    }
}

impl TryFrom<RawCart> for Cart {
    type Error = CoreError;

    fn try_from(raw: RawCart) -> Result<Self, Self::Error> {
        Cart::new(raw.id, raw.currency_code, raw.checkout_url, raw.lines)
    }
}

impl From<Cart> for RawCart {
    fn from(cart: Cart) -> Self {
        RawCart {
            id: cart.id,
            currency_code: cart.currency_code,
            checkout_url: cart.checkout_url,
            lines: cart.lines,
        }
    }
}
