//! # Lifecycle engine public API
//!
//! The API is modular, so that clients can pick the parts they need:
//!
//! * [`order_flow_api`] covers the order itself: posting, deposit, moderation, scheduling, check-in and closing.
//! * [`matching_api`] is the matching engine: applications, and the accept transition that freezes the commission
//!   snapshot.
//! * [`settlement_api`] derives settlement statements and finalizes settlement.
//! * [`incident_api`] is the incident and dispute resolver, including deductions and forced processing.
//! * [`commission_api`] manages commission policies and team membership.
//!
//! Every API is created from a backend that implements the traits it needs, and every call takes the [`Actor`]
//! making it. Authentication happens upstream; the APIs only check that the actor may perform the call.
//!
//! ```rust,ignore
//! let db = SqliteDatabase::new_with_url(url, 5).await?;
//! let api = MatchingApi::new(db, producers);
//! let application = api.apply(&Actor::helper(42), order_id, None).await?;
//! ```
//!
//! [`Actor`]: crate::db_types::Actor
pub mod commission_api;
pub mod errors;
pub mod incident_api;
pub mod matching_api;
pub mod order_flow_api;
pub mod settlement_api;

mod access;
