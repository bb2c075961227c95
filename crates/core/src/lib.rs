pub mod cart;
pub mod error;
pub mod ids;
pub mod input;
pub mod result;

pub use cart::{Cart, CartLine, Image, Merchandise, Money};
pub use error::CoreError;
pub use ids::*;
pub use input::{AddLineInput, RemoveLineInput, UpdateLineInput};
pub use result::{ActionError, ActionResult, ApiErrorResponse, ErrorCode, GraphQlError};
