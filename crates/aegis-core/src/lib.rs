pub mod constants;
pub mod error;
pub mod merchant;
pub mod types;

pub use constants::*;
pub use error::AegisError;
pub use merchant::{Merchant, Payment, PaymentStatus};
pub use types::*;
