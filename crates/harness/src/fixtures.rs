use cartflow_core::{Image, Merchandise, Money, VariantId};

pub const CURRENCY: &str = "NOK";
pub const MUG: &str = "gid://cartflow/ProductVariant/mug";
pub const POSTER: &str = "gid://cartflow/ProductVariant/poster";
pub const TOTE: &str = "gid://cartflow/ProductVariant/tote";

pub fn mug() -> Merchandise {
    Merchandise {
        variant_id: VariantId::from(MUG),
        title: "Enamel Mug".into(),
        image: Some(Image {
            url: "https://cdn.cartflow.test/mug.png".into(),
            alt_text: Some("White enamel mug".into()),
        }),
        price: Money::new(19_900, CURRENCY),
    }
}

pub fn poster() -> Merchandise {
    Merchandise {
        variant_id: VariantId::from(POSTER),
        title: "Fjord Poster".into(),
        image: None,
        price: Money::new(34_950, CURRENCY),
    }
}

pub fn tote() -> Merchandise {
    Merchandise {
        variant_id: VariantId::from(TOTE),
        title: "Canvas Tote".into(),
        image: None,
        price: Money::new(14_900, CURRENCY),
    }
}
