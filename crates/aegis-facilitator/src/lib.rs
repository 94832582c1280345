//! aegis-facilitator
//!
//! The x402 payment-gate contract: requirement objects advertised on `402
//! Payment Required` responses, the opaque payment payload clients echo back,
//! and the [`Facilitator`] capability that verifies and settles those payloads
//! against the value ledger.
//!
//! The payload itself is never interpreted here — it is scheme-specific wire
//! data the facilitator service understands. The clearinghouse only cares about
//! the verdict (`is_valid` + payer) and the settlement receipt.

pub mod client;
pub mod types;

pub use client::HttpFacilitator;
pub use types::{
    Facilitator, PaymentRequiredBody, PaymentRequirements, PaymentSubmission, RequirementExtra,
    SettleOutcome, VerifyOutcome, X402_VERSION,
};
