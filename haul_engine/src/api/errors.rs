use thiserror::Error;

use crate::db_types::{ApplicationStatus, IncidentStatus, OrderStatusType};

/// The broad class of a [`LifecycleError`]. Transport layers map these onto their own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Authorization,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("Invalid request. {0}")]
    Validation(String),
    #[error("The requested order #{0} does not exist")]
    OrderNotFound(i64),
    #[error("The requested application #{0} does not exist")]
    ApplicationNotFound(i64),
    #[error("The requested incident #{0} does not exist")]
    IncidentNotFound(i64),
    #[error("No closing report has been submitted for order #{0}")]
    ClosingReportNotFound(i64),
    #[error("No commission policy applies to helper #{0}")]
    PolicyNotFound(i64),
    #[error("Order #{0} is not open for applications")]
    OrderNotOpen(i64),
    #[error("Order #{0} has no remaining helper capacity")]
    CapacityExceeded(i64),
    #[error("Helper #{helper_id} has already applied to order #{order_id}")]
    DuplicateApplication { order_id: i64, helper_id: i64 },
    #[error("Order #{0} has already been matched to a helper")]
    OrderAlreadyMatched(i64),
    #[error("Incident #{0} has already been resolved")]
    AlreadyResolved(i64),
    #[error("The helper has already responded to incident #{0}")]
    HelperAlreadyResponded(i64),
    #[error("Order #{id} cannot move from {from} to {to}")]
    InvalidOrderTransition { id: i64, from: OrderStatusType, to: OrderStatusType },
    #[error("Application #{id} cannot move from {from} to {to}")]
    InvalidApplicationTransition { id: i64, from: ApplicationStatus, to: ApplicationStatus },
    #[error("Incident #{id} cannot move from {from} to {to}")]
    InvalidIncidentTransition { id: i64, from: IncidentStatus, to: IncidentStatus },
    #[error("Order #{0} still has open incidents")]
    OpenIncidents(i64),
    #[error("Not authorized. {0}")]
    Unauthorized(String),
    #[error("The payment provider rejected the request. {0}")]
    PaymentRejected(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl LifecycleError {
    pub fn kind(&self) -> ErrorKind {
        use LifecycleError::*;
        match self {
            Validation(_) | PaymentRejected(_) => ErrorKind::Validation,
            OrderNotFound(_) |
            ApplicationNotFound(_) |
            IncidentNotFound(_) |
            ClosingReportNotFound(_) |
            PolicyNotFound(_) => ErrorKind::NotFound,
            OrderNotOpen(_) |
            CapacityExceeded(_) |
            DuplicateApplication { .. } |
            OrderAlreadyMatched(_) |
            AlreadyResolved(_) |
            HelperAlreadyResponded(_) |
            InvalidOrderTransition { .. } |
            InvalidApplicationTransition { .. } |
            InvalidIncidentTransition { .. } |
            OpenIncidents(_) => ErrorKind::Conflict,
            Unauthorized(_) => ErrorKind::Authorization,
            DatabaseError(_) => ErrorKind::Internal,
        }
    }

    /// A stable, machine-readable code for the error, so that callers can tell conflicts apart without parsing
    /// messages.
    pub fn reason(&self) -> &'static str {
        use LifecycleError::*;
        match self {
            Validation(_) => "validation_error",
            OrderNotFound(_) => "order_not_found",
            ApplicationNotFound(_) => "application_not_found",
            IncidentNotFound(_) => "incident_not_found",
            ClosingReportNotFound(_) => "closing_report_not_found",
            PolicyNotFound(_) => "policy_not_found",
            OrderNotOpen(_) => "order_not_open",
            CapacityExceeded(_) => "capacity_exceeded",
            DuplicateApplication { .. } => "duplicate_application",
            OrderAlreadyMatched(_) => "order_already_matched",
            AlreadyResolved(_) => "already_resolved",
            HelperAlreadyResponded(_) => "helper_already_responded",
            InvalidOrderTransition { .. } | InvalidApplicationTransition { .. } | InvalidIncidentTransition { .. } => {
                "invalid_transition"
            },
            OpenIncidents(_) => "open_incidents",
            Unauthorized(_) => "unauthorized",
            PaymentRejected(_) => "payment_rejected",
            DatabaseError(_) => "database_error",
        }
    }

    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unauthorized<S: Into<String>>(msg: S) -> Self {
        Self::Unauthorized(msg.into())
    }
}

impl From<sqlx::Error> for LifecycleError {
    fn from(e: sqlx::Error) -> Self {
        LifecycleError::DatabaseError(e.to_string())
    }
}
