//! Notification hooks.
//!
//! The lifecycle APIs publish an event after each committed transition. Subscribers (push, SMS, audit feeds) receive
//! the event on their own task; a slow or failing subscriber never blocks or fails the transition that produced it.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
