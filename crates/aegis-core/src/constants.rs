//! ─── Aegis402 Protocol Constants ────────────────────────────────────────────
//!
//! The clearinghouse prices everything in atomic units of a single fungible
//! value asset with 6 decimals (1 token = 1,000,000 units).

// ── Value asset ──────────────────────────────────────────────────────────────

/// Atomic units per whole token of the value asset.
pub const UNITS_PER_TOKEN: u128 = 1_000_000;

// ── Reputation band ──────────────────────────────────────────────────────────

/// Lower clamp for the reputation factor, permille (ρ_min = 0.5).
pub const REP_MIN_PERMILLE: u32 = 500;

/// Upper clamp for the reputation factor, permille (ρ_max = 3.0).
pub const REP_MAX_PERMILLE: u32 = 3_000;

/// Neutral reputation (ρ = 1.0); the stub oracle returns this.
pub const REP_NEUTRAL_PERMILLE: u32 = 1_000;

// ── Payment lifecycle ────────────────────────────────────────────────────────

/// Delivery deadline added to a detected payment's timestamp (seconds).
pub const DEFAULT_DEADLINE_SECS: i64 = 3_600;

/// Period of the deadline sweeper that auto-expires overdue payments (seconds).
pub const SWEEP_INTERVAL_SECS: u64 = 30;

// ── Payment gates ────────────────────────────────────────────────────────────

/// Minimum stake a merchant must lock to subscribe (10 tokens).
pub const DEFAULT_MIN_STAKE_UNITS: u128 = 10 * UNITS_PER_TOKEN;

/// Anti-griefing bond a client posts to invoke slashing (1 token).
pub const DEFAULT_SLASH_BOND_UNITS: u128 = UNITS_PER_TOKEN;

/// Validity window advertised in x402 payment requirements (seconds).
pub const GATE_TIMEOUT_SECS: u64 = 300;

// ── Ledger polling / queries ─────────────────────────────────────────────────

/// Chain watcher poll period (milliseconds).
pub const POLL_INTERVAL_MS: u64 = 15_000;

/// Block-range size for chunked historical event queries.
pub const EVENT_CHUNK_BLOCKS: u64 = 2_000;

/// How far behind an `ExposureIncreased` record recovery searches for the
/// originating Transfer (blocks).
pub const FIND_TRANSFER_LOOKBACK_BLOCKS: u64 = 5;

/// Settling delay between `subscribe_for` confirmation and `set_credit_limit`
/// (milliseconds).
pub const CREDIT_SETTLE_DELAY_MS: u64 = 2_000;
