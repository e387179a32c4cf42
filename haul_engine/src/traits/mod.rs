//! # Storage and collaborator contracts
//!
//! This module defines the interfaces that lifecycle *backends* and external collaborators must provide.
//!
//! * [`OrderManagement`] provides read-only queries for orders, applications, closing reports and deduction legs.
//! * [`LifecycleDatabase`] is the highest level of behaviour for a backend. It owns every order and application
//!   transition, including the match commit point, and each method is a single atomic unit of work.
//! * [`CommissionManagement`] stores commission policies and team membership.
//! * [`IncidentManagement`] stores incidents, their audit trail and the deduction ledger.
//! * [`PaymentGateway`] is the external payment collaborator. Its failures are recorded, never rolled back.
//!
//! Backends report failures as [`LifecycleError`](crate::LifecycleError). Guard violations that can only be detected
//! atomically (capacity, duplicate applications, double resolution) are reported with the same conflict variants the
//! API layer uses for its own pre-checks.
mod commission_policies;
mod data_objects;
mod incident_management;
mod lifecycle_database;
mod order_management;
mod payment_gateway;

pub use commission_policies::CommissionManagement;
pub use data_objects::{
    ClosingSubmission,
    DeductionCommand,
    DeductionOutcome,
    HelperResponse,
    IncidentStatusChange,
    IncidentStatusChanged,
    MatchCommand,
    MatchOutcome,
    SettlementOutcome,
};
pub use incident_management::IncidentManagement;
pub use lifecycle_database::LifecycleDatabase;
pub use order_management::OrderManagement;
pub use payment_gateway::{PaymentGateway, PaymentGatewayError, PaymentRequest, PaymentResult};
