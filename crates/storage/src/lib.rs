pub mod cache;
pub mod error;
pub mod memory;
pub mod traits;

pub use cache::{CacheEntry, CartCache};
pub use error::StorageError;
pub use memory::MemoryCart;
pub use traits::*;
