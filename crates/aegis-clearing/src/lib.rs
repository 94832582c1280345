//! aegis-clearing
//!
//! The clearing core: a single-writer state machine that drives the registry
//! and the on-ledger adapters through the four state-changing operations
//! (subscribe, settle, slash, auto-expire) plus payment attribution and
//! read-only discovery.
//!
//! Every mutation follows the same shape: validate against the local tables,
//! perform the on-ledger write, and only then commit the local transition — so
//! the ledger remains the single source of truth and a lost race (e.g. slash vs
//! expiry sweep) simply surfaces the ledger's rejection to the loser.

pub mod command;
pub mod core;
pub mod recovery;
pub mod sweeper;

pub use crate::command::{spawn_writer, ClearingHandle, Command};
pub use crate::core::{
    ClearingConfig, ClearingCore, QuoteEntry, SettleResponse, SlashResponse, SubscribeRequest,
    SubscribeResponse,
};
pub use crate::recovery::RecoveryReport;
pub use crate::sweeper::DeadlineSweeper;
