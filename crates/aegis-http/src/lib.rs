//! aegis-http
//!
//! The clearinghouse's JSON-over-HTTP surface. Handlers are thin: parse the
//! request, push a command through the clearing handle, map the outcome. The
//! two payment-gated routes (`/subscribe`, `/slash`) answer `402 Payment
//! Required` with x402 requirement objects until a verified payload arrives.

pub mod app;
pub mod error;
pub mod handlers;
pub mod types;

pub use app::{router, App, GateConfig};
