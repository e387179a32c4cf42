//! Authorization checks shared by the APIs.
use crate::{
    api::errors::LifecycleError,
    db_types::{Actor, Order},
};

pub(crate) fn ensure_admin(actor: &Actor, action: &str) -> Result<(), LifecycleError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(LifecycleError::unauthorized(format!("Only admins may {action}")))
    }
}

pub(crate) fn ensure_helper(actor: &Actor, action: &str) -> Result<(), LifecycleError> {
    if actor.is_helper() {
        Ok(())
    } else {
        Err(LifecycleError::unauthorized(format!("Only helpers may {action}")))
    }
}

pub(crate) fn is_order_requester(actor: &Actor, order: &Order) -> bool {
    actor.is_requester() && actor.id == order.requester_id
}

pub(crate) fn is_matched_helper(actor: &Actor, order: &Order) -> bool {
    actor.is_helper() && order.matched_helper_id == Some(actor.id)
}

pub(crate) fn ensure_requester_or_admin(actor: &Actor, order: &Order, action: &str) -> Result<(), LifecycleError> {
    if actor.is_admin() || is_order_requester(actor, order) {
        Ok(())
    } else {
        Err(LifecycleError::unauthorized(format!("Only the requester of order #{} or an admin may {action}", order.id)))
    }
}

/// Admins, the requester, and the matched helper are the parties to an order.
pub(crate) fn ensure_party(actor: &Actor, order: &Order, action: &str) -> Result<(), LifecycleError> {
    if actor.is_admin() || is_order_requester(actor, order) || is_matched_helper(actor, order) {
        Ok(())
    } else {
        Err(LifecycleError::unauthorized(format!("{actor} is not a party to order #{} and may not {action}", order.id)))
    }
}
