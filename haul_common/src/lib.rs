//! Shared value types for the Haul workspace.
//!
//! All money in the system is an integer count of minor currency units ([`Won`]) and all commission rates are
//! integer basis points ([`Rate`]). Nothing in the lifecycle engine touches floating point.
mod helpers;
mod rate;
mod secret;
mod won;

pub mod op;

pub use helpers::parse_boolean_flag;
pub use rate::{Rate, RateConversionError, BASIS_POINTS_PER_UNIT};
pub use secret::Secret;
pub use won::{Won, WonConversionError, CURRENCY_CODE};
