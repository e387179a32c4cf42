use std::{future::Future, pin::Pin, sync::Arc};

use log::*;

use crate::events::{
    DispatchFailedEvent,
    EventHandler,
    EventProducer,
    Handler,
    IncidentOpenedEvent,
    IncidentResolvedEvent,
    OrderMatchedEvent,
    OrderStatusChangedEvent,
};

type BoxedHook = Pin<Box<dyn Future<Output = ()> + Send>>;

/// The publishing side of every configured hook. The APIs hold one of these and publish to each producer in turn.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_status_changed_producer: Vec<EventProducer<OrderStatusChangedEvent>>,
    pub order_matched_producer: Vec<EventProducer<OrderMatchedEvent>>,
    pub incident_opened_producer: Vec<EventProducer<IncidentOpenedEvent>>,
    pub incident_resolved_producer: Vec<EventProducer<IncidentResolvedEvent>>,
    pub dispatch_failed_producer: Vec<EventProducer<DispatchFailedEvent>>,
}

macro_rules! publish_fn {
    ($name:ident, $field:ident, $event:ty) => {
        pub async fn $name(&self, event: $event) {
            for producer in &self.$field {
                producer.publish_event(event.clone()).await;
            }
        }
    };
}

impl EventProducers {
    publish_fn!(publish_order_status_changed, order_status_changed_producer, OrderStatusChangedEvent);

    publish_fn!(publish_order_matched, order_matched_producer, OrderMatchedEvent);

    publish_fn!(publish_incident_opened, incident_opened_producer, IncidentOpenedEvent);

    publish_fn!(publish_incident_resolved, incident_resolved_producer, IncidentResolvedEvent);

    publish_fn!(publish_dispatch_failed, dispatch_failed_producer, DispatchFailedEvent);
}

pub struct EventHandlers {
    pub on_order_status_changed: Option<EventHandler<OrderStatusChangedEvent>>,
    pub on_order_matched: Option<EventHandler<OrderMatchedEvent>>,
    pub on_incident_opened: Option<EventHandler<IncidentOpenedEvent>>,
    pub on_incident_resolved: Option<EventHandler<IncidentResolvedEvent>>,
    pub on_dispatch_failed: Option<EventHandler<DispatchFailedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_order_status_changed: hooks.on_order_status_changed.map(|f| EventHandler::new(buffer_size, f)),
            on_order_matched: hooks.on_order_matched.map(|f| EventHandler::new(buffer_size, f)),
            on_incident_opened: hooks.on_incident_opened.map(|f| EventHandler::new(buffer_size, f)),
            on_incident_resolved: hooks.on_incident_resolved.map(|f| EventHandler::new(buffer_size, f)),
            on_dispatch_failed: hooks.on_dispatch_failed.map(|f| EventHandler::new(buffer_size, f)),
        }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_status_changed {
            result.order_status_changed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_matched {
            result.order_matched_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_incident_opened {
            result.incident_opened_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_incident_resolved {
            result.incident_resolved_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_dispatch_failed {
            result.dispatch_failed_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns every configured handler onto the runtime. Each one exits once all of its producers are dropped.
    pub async fn start_handlers(self) {
        fn spawn<E: Send + Sync + 'static>(handler: Option<EventHandler<E>>) {
            if let Some(handler) = handler {
                tokio::spawn(async move {
                    handler.start_handler().await;
                });
            }
        }
        debug!("📬️ Starting event handlers");
        spawn(self.on_order_status_changed);
        spawn(self.on_order_matched);
        spawn(self.on_incident_opened);
        spawn(self.on_incident_resolved);
        spawn(self.on_dispatch_failed);
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_status_changed: Option<Handler<OrderStatusChangedEvent>>,
    pub on_order_matched: Option<Handler<OrderMatchedEvent>>,
    pub on_incident_opened: Option<Handler<IncidentOpenedEvent>>,
    pub on_incident_resolved: Option<Handler<IncidentResolvedEvent>>,
    pub on_dispatch_failed: Option<Handler<DispatchFailedEvent>>,
}

impl EventHooks {
    pub fn on_order_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderStatusChangedEvent) -> BoxedHook) + Send + Sync + 'static {
        self.on_order_status_changed = Some(Arc::new(f));
        self
    }

    pub fn on_order_matched<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderMatchedEvent) -> BoxedHook) + Send + Sync + 'static {
        self.on_order_matched = Some(Arc::new(f));
        self
    }

    pub fn on_incident_opened<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(IncidentOpenedEvent) -> BoxedHook) + Send + Sync + 'static {
        self.on_incident_opened = Some(Arc::new(f));
        self
    }

    pub fn on_incident_resolved<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(IncidentResolvedEvent) -> BoxedHook) + Send + Sync + 'static {
        self.on_incident_resolved = Some(Arc::new(f));
        self
    }

    pub fn on_dispatch_failed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(DispatchFailedEvent) -> BoxedHook) + Send + Sync + 'static {
        self.on_dispatch_failed = Some(Arc::new(f));
        self
    }
}
