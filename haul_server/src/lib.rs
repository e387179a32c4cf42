//! # Haul server
//! This crate hosts the HTTP surface of the Haul logistics marketplace. It is responsible for:
//! * Authenticating callers from the bearer token in the `Authorization` header and turning them into engine actors.
//! * Routing JSON requests to the lifecycle engine APIs (orders, matching, settlement, incidents and commission).
//! * Running the housekeeping worker that retries failed deduction dispatches and hides old settled orders.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/...`: The authenticated marketplace routes. See [routes](routes/index.html).

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod worker;

#[cfg(test)]
mod endpoint_tests;
