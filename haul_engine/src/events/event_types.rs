use serde::{Deserialize, Serialize};

use crate::db_types::{Application, DeductionLeg, Incident, Order, OrderStatusType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub order: Order,
    pub old_status: OrderStatusType,
}

impl OrderStatusChangedEvent {
    pub fn new(order: Order, old_status: OrderStatusType) -> Self {
        Self { order, old_status }
    }
}

/// Published once per order, when an application is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderMatchedEvent {
    pub order: Order,
    pub application: Application,
}

impl OrderMatchedEvent {
    pub fn new(order: Order, application: Application) -> Self {
        Self { order, application }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentOpenedEvent {
    pub incident: Incident,
}

impl IncidentOpenedEvent {
    pub fn new(incident: Incident) -> Self {
        Self { incident }
    }
}

/// Published when an incident reaches `resolved`, whether by an ordinary decision, a confirmed deduction or forced
/// processing. `legs` is empty when no deduction was made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentResolvedEvent {
    pub incident: Incident,
    pub legs: Vec<DeductionLeg>,
}

impl IncidentResolvedEvent {
    pub fn new(incident: Incident, legs: Vec<DeductionLeg>) -> Self {
        Self { incident, legs }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchFailedEvent {
    pub leg: DeductionLeg,
    pub reason: String,
}

impl DispatchFailedEvent {
    pub fn new<S: Into<String>>(leg: DeductionLeg, reason: S) -> Self {
        Self { leg, reason: reason.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    OrderStatusChanged(OrderStatusChangedEvent),
    OrderMatched(OrderMatchedEvent),
    IncidentOpened(IncidentOpenedEvent),
    IncidentResolved(IncidentResolvedEvent),
    DispatchFailed(DispatchFailedEvent),
}
