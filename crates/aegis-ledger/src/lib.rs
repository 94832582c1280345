//! aegis-ledger
//!
//! Adapters for the two on-ledger collaborators:
//!
//! - the **value asset** (Transfer log, approve/allowance) behind the
//!   [`LedgerView`] capability trait
//! - the **credit-manager contract** (merchant state, the five state-changing
//!   writes, historical events) behind the [`CreditOps`] capability trait
//!
//! Both speak JSON-RPC 2.0 through one shared [`RpcClient`]. The clearing core
//! depends only on the traits, so tests swap in in-memory fakes.

pub mod asset;
pub mod client;
pub mod credit;
pub mod traits;
pub mod types;

pub use asset::AssetAdapter;
pub use client::RpcClient;
pub use credit::CreditManagerAdapter;
pub use traits::{CreditOps, LedgerView};
pub use types::{CreditEvent, CreditEventKind, MerchantState, Receipt, Transfer};
