//! Adapters for the collaborators the engine talks to.
pub mod notifications;
pub mod payment_provider;
