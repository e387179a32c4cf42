//! Haul Lifecycle Engine
//!
//! The engine holds the core of the Haul logistics marketplace: the order and application state machines, the matching
//! engine that freezes the commission split at acceptance time, the closing and settlement calculator, and the
//! incident and dispute resolver. It is transport-agnostic; `haul_server` puts an HTTP surface over it.
//!
//! The library is divided into these sections:
//! 1. Storage contracts ([`mod@traits`]) and their SQLite implementation ([`SqliteDatabase`]). Each state transition
//!    is one atomic unit of work in the backend, guarded by compare-and-set writes and backed by storage constraints.
//!    The data types stored are defined in [`mod@db_types`] and are public.
//! 2. Pure helpers ([`mod@helpers`]): the commission resolver and the settlement calculator. Neither touches storage.
//! 3. The public API ([`OrderFlowApi`], [`MatchingApi`], [`SettlementApi`], [`IncidentApi`], [`CommissionApi`]). Every
//!    call takes the [`Actor`](db_types::Actor) making it and checks that they may.
//!
//! The engine also publishes events after each committed transition (see [`mod@events`]). Hooks are fire-and-forget.
mod api;
#[cfg(feature = "sqlite")]
mod sqlite;

pub mod db_types;
pub mod events;
pub mod helpers;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use api::{
    commission_api::CommissionApi,
    errors::{ErrorKind, LifecycleError},
    incident_api::{IncidentApi, DEFAULT_RESPONSE_WINDOW_HOURS},
    matching_api::MatchingApi,
    order_flow_api::OrderFlowApi,
    settlement_api::SettlementApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    CommissionManagement,
    IncidentManagement,
    LifecycleDatabase,
    OrderManagement,
    PaymentGateway,
    PaymentGatewayError,
    PaymentRequest,
    PaymentResult,
};
