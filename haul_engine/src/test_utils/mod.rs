//! Helpers for tests in this crate and in crates that depend on it. Enabled by the `test_utils` feature.
pub mod market;
pub mod payment_gateway;
pub mod prepare_env;
