pub mod actions;
pub mod fixtures;
pub mod shop;

pub use actions::GatedActions;
pub use shop::{ShopActions, TestShop};

use tracing_subscriber::filter::LevelFilter;

/// Routes `tracing` output through the test writer. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(LevelFilter::DEBUG)
        .try_init();
}
