use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Error raised when a persisted enum tag does not match any known variant.
#[derive(Debug, thiserror::Error)]
#[error("unrecognized {kind}: {value}")]
pub struct ParseTagError {
    pub kind: &'static str,
    pub value: String,
}

/// Per-token trading algorithm. `Simple` and `Turbo` share the same state
/// machine and differ only in the configured cycle sizes, interval, and
/// rate-limit share. `Rebalance` is reserved and rejected by validation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmMode {
    #[default]
    Simple,
    Turbo,
    Rebalance,
}

impl AlgorithmMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Turbo => "turbo",
            Self::Rebalance => "rebalance",
        }
    }
}

impl FromStr for AlgorithmMode {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(Self::Simple),
            "turbo" => Ok(Self::Turbo),
            "rebalance" => Ok(Self::Rebalance),
            other => Err(ParseTagError {
                kind: "algorithm mode",
                value: other.to_string(),
            }),
        }
    }
}

/// Current half of a trading cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Buy,
    Sell,
}

impl Phase {
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl FromStr for Phase {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            other => Err(ParseTagError {
                kind: "phase",
                value: other.to_string(),
            }),
        }
    }
}

/// Outcome of the most recent scheduler tick for a token.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckResult {
    Traded,
    InsufficientFunds,
    Balanced,
    RateLimited,
    Error,
}

impl CheckResult {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Traded => "traded",
            Self::InsufficientFunds => "insufficient_funds",
            Self::Balanced => "balanced",
            Self::RateLimited => "rate_limited",
            Self::Error => "error",
        }
    }
}

impl FromStr for CheckResult {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "traded" => Ok(Self::Traded),
            "insufficient_funds" => Ok(Self::InsufficientFunds),
            "balanced" => Ok(Self::Balanced),
            "rate_limited" => Ok(Self::RateLimited),
            "error" => Ok(Self::Error),
            other => Err(ParseTagError {
                kind: "check result",
                value: other.to_string(),
            }),
        }
    }
}

/// Configuration rejected at write time. Invalid configs never reach the
/// scheduler.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cycle sizes must be at least 1 (buys: {buys}, sells: {sells})")]
    ZeroCycleSize { buys: u32, sells: u32 },
    #[error("algorithm mode '{0}' is not implemented")]
    UnsupportedMode(&'static str),
    #[error("confirmation timeout must be at least 1 second")]
    ZeroTimeout,
    #[error("job interval must be at least 1 second")]
    ZeroInterval,
}

/// Non-fatal configuration findings surfaced to the user alongside a
/// successful validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConfigWarning {
    /// The interval is shorter than the time one phase's worth of operations
    /// could take at the configured timeout; ticks will simply find the token
    /// not yet due, but the cadence the user expects will not be met.
    IntervalShorterThanPhaseWork { interval_secs: u64, phase_secs: u64 },
    /// Auto-claim enabled with a zero threshold claims on every traded tick.
    ZeroClaimThreshold,
}

/// Per-token trading parameters. Read-only to the engine; mutated only by
/// explicit user update, never deleted while the token is active.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenConfig {
    #[serde(default)]
    pub algorithm: AlgorithmMode,
    #[serde(default = "default_cycle_size")]
    pub cycle_buys: u32,
    #[serde(default = "default_cycle_size")]
    pub cycle_sells: u32,
    /// Seconds between scheduler ticks for this token.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// Upper bound on a single trade's confirmation wait, in seconds.
    #[serde(default = "default_timeout")]
    pub confirmation_timeout_secs: u64,
    /// This token's intended share of the global rate limit, in operations
    /// per minute. An operator hint carried into logs; every trade attempt
    /// spends one unit of the global bucket regardless of this value.
    #[serde(default = "default_rate_limit_share")]
    pub rate_limit_share: u32,
    #[serde(default = "default_true")]
    pub auto_claim: bool,
    /// Ops-wallet balance above which accumulated fees are claimed.
    #[serde(default = "default_claim_threshold")]
    pub auto_claim_threshold: Decimal,
    /// When set, cycle-state writes are buffered and flushed on a cadence
    /// instead of persisted every tick.
    #[serde(default)]
    pub batch_state_updates: bool,
}

const fn default_cycle_size() -> u32 {
    3
}

const fn default_interval() -> u64 {
    300
}

const fn default_timeout() -> u64 {
    60
}

const fn default_rate_limit_share() -> u32 {
    3
}

const fn default_true() -> bool {
    true
}

fn default_claim_threshold() -> Decimal {
    Decimal::new(5, 1) // 0.5
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            algorithm: AlgorithmMode::Simple,
            cycle_buys: default_cycle_size(),
            cycle_sells: default_cycle_size(),
            interval_secs: default_interval(),
            confirmation_timeout_secs: default_timeout(),
            rate_limit_share: default_rate_limit_share(),
            auto_claim: true,
            auto_claim_threshold: default_claim_threshold(),
            batch_state_updates: false,
        }
    }
}

impl TokenConfig {
    /// Validates the configuration at write time.
    ///
    /// Returns the list of non-fatal warnings on success.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for configurations that must never reach the
    /// scheduler: zero cycle sizes, zero interval/timeout, or the
    /// unimplemented `rebalance` mode.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, ConfigError> {
        if self.algorithm == AlgorithmMode::Rebalance {
            return Err(ConfigError::UnsupportedMode("rebalance"));
        }
        if self.cycle_buys < 1 || self.cycle_sells < 1 {
            return Err(ConfigError::ZeroCycleSize {
                buys: self.cycle_buys,
                sells: self.cycle_sells,
            });
        }
        if self.interval_secs < 1 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.confirmation_timeout_secs < 1 {
            return Err(ConfigError::ZeroTimeout);
        }

        let mut warnings = Vec::new();
        // One phase's worth of operations at worst case: every trade running
        // to its confirmation timeout.
        let phase_ops = u64::from(self.cycle_buys.max(self.cycle_sells));
        let phase_secs = phase_ops.saturating_mul(self.confirmation_timeout_secs);
        if self.interval_secs < phase_secs {
            warnings.push(ConfigWarning::IntervalShorterThanPhaseWork {
                interval_secs: self.interval_secs,
                phase_secs,
            });
        }
        if self.auto_claim && self.auto_claim_threshold <= Decimal::ZERO {
            warnings.push(ConfigWarning::ZeroClaimThreshold);
        }
        Ok(warnings)
    }

    /// Target count for the given phase.
    #[must_use]
    pub const fn target_for(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Buy => self.cycle_buys,
            Phase::Sell => self.cycle_sells,
        }
    }
}

/// Per-token mutable cycle record. Exactly one per token, created alongside
/// its [`TokenConfig`] and mutated after every scheduler tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CycleState {
    pub token_id: Uuid,
    pub phase: Phase,
    pub buy_count: u32,
    pub sell_count: u32,
    pub last_trade_at: Option<DateTime<Utc>>,
    pub last_check_at: Option<DateTime<Utc>>,
    pub last_check_result: Option<CheckResult>,
}

impl CycleState {
    /// Fresh state for a newly registered token: phase `buy`, counters zero.
    #[must_use]
    pub const fn new(token_id: Uuid) -> Self {
        Self {
            token_id,
            phase: Phase::Buy,
            buy_count: 0,
            sell_count: 0,
            last_trade_at: None,
            last_check_at: None,
            last_check_result: None,
        }
    }

    /// Counter for the current phase.
    #[must_use]
    pub const fn current_count(&self) -> u32 {
        match self.phase {
            Phase::Buy => self.buy_count,
            Phase::Sell => self.sell_count,
        }
    }
}
