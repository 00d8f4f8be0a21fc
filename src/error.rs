//! Crate-wide error type.
//!
//! Mirrors the error taxonomy of the original HTB module: malformed profiles
//! are rejected at tree-build time, and a non-monotonic `replenish` call
//! indicates a driver bug. Everything else (`account_cir`/`account_pir`,
//! `can_send`/`can_borrow`) is a normal boolean outcome, not an error, and
//! never reaches this type.

use std::fmt;

/// Why a [`Profile`][crate::profile::Profile] failed to build into a tree.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConfigError {
    /// Two nodes in the profile share a name.
    DuplicateName,
    /// `ceil < rate` for some node.
    CeilBelowRate,
    /// `prio` outside `[HIGHEST_PRIO, LOWEST_PRIO]` (a leaf only).
    PrioOutOfRange,
    /// `rate` or `ceil` is negative.
    NegativeRate,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::DuplicateName => f.write_str("duplicate node name in profile"),
            ConfigError::CeilBelowRate => f.write_str("ceil must be >= rate"),
            ConfigError::PrioOutOfRange => f.write_str("prio must be in [0, 7]"),
            ConfigError::NegativeRate => f.write_str("rate and ceil must be non-negative"),
        }
    }
}

/// Errors raised by the simulation core.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Error {
    /// Profile failed validation; see [`ConfigError`] for which rule broke.
    Config(ConfigError),
    /// `replenish` was called with a timestamp earlier than the node's
    /// `update_time`. Always a driver bug: time must advance monotonically.
    InvalidTime {
        /// The timestamp `replenish` was called with.
        at: f64,
        /// The node's last replenish timestamp.
        update_time: f64,
    },
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(inner) => write!(f, "invalid profile: {inner}"),
            Error::InvalidTime { at, update_time } => write!(
                f,
                "replenish called with non-monotonic time: t={at} < update_time={update_time}"
            ),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(inner: ConfigError) -> Self {
        Error::Config(inner)
    }
}
