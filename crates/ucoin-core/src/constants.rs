/// ─── uCoin Protocol Constants ───────────────────────────────────────────────
///
/// Defaults for `Parameters`. A currency fixes its own values at creation
/// and every node of that currency must share them.

// ── Documents ────────────────────────────────────────────────────────────────

/// Version written in every raw document.
pub const DOCUMENT_VERSION: u32 = 1;

/// Default currency name.
pub const DEFAULT_CURRENCY: &str = "beta_brousouf";

/// Name of the amendment algorithm served to peers.
pub const DEFAULT_ALGORITHM: &str = "AnyKey";

// ── Epochs ───────────────────────────────────────────────────────────────────

/// Start of validity of amendment #0 (2014-06-20 22:00:00 UTC).
pub const DEFAULT_EPOCH0_START: i64 = 1_403_301_600;

/// Seconds between two amendments. Default: 1 day.
pub const DEFAULT_EPOCH_LENGTH: i64 = 24 * 3600;

/// Fraction of voters required to promote the next amendment
/// (numerator / denominator).
pub const CONSENSUS_NUM: u64 = 2;
pub const CONSENSUS_DEN: u64 = 3;

/// A confirmed IN membership older than this is "too old" and must be
/// renewed. Default: 1 year.
pub const DEFAULT_MS_EXPIRES: i64 = 365 * 24 * 3600;

// ── Universal Dividend ───────────────────────────────────────────────────────

/// First dividend ever issued, in base units.
pub const DEFAULT_UD0: u64 = 100;

/// Seconds between two dividends. Default: 1 day.
pub const DEFAULT_UD_PERIOD: i64 = 24 * 3600;

/// Growth rate of the dividend relative to the monetary mass
/// (numerator / denominator). Default: 10%.
pub const UD_PERCENT_NUM: u64 = 1;
pub const UD_PERCENT_DEN: u64 = 10;

/// Maximum dividend per member for a single epoch.
pub const DEFAULT_UD_CAP: u64 = 1_000_000_000_000;
