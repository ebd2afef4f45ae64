use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    DisplayChangedEvent,
    DisplayStateUpdatedEvent,
    EventHandler,
    EventProducer,
    Handler,
    SaleCompletedEvent,
};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub sale_completed_producer: Vec<EventProducer<SaleCompletedEvent>>,
    pub display_changed_producer: Vec<EventProducer<DisplayChangedEvent>>,
    pub display_state_updated_producer: Vec<EventProducer<DisplayStateUpdatedEvent>>,
}

pub struct EventHandlers {
    pub on_sale_completed: Option<EventHandler<SaleCompletedEvent>>,
    pub on_display_changed: Option<EventHandler<DisplayChangedEvent>>,
    pub on_display_state_updated: Option<EventHandler<DisplayStateUpdatedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_sale_completed = hooks.on_sale_completed.map(|f| EventHandler::new(buffer_size, f));
        let on_display_changed = hooks.on_display_changed.map(|f| EventHandler::new(buffer_size, f));
        let on_display_state_updated = hooks.on_display_state_updated.map(|f| EventHandler::new(buffer_size, f));
        Self { on_sale_completed, on_display_changed, on_display_state_updated }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_sale_completed {
            result.sale_completed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_display_changed {
            result.display_changed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_display_state_updated {
            result.display_state_updated_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_sale_completed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_display_changed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_display_state_updated {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_sale_completed: Option<Handler<SaleCompletedEvent>>,
    pub on_display_changed: Option<Handler<DisplayChangedEvent>>,
    pub on_display_state_updated: Option<Handler<DisplayStateUpdatedEvent>>,
}

impl EventHooks {
    pub fn on_sale_completed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(SaleCompletedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_sale_completed = Some(Arc::new(f));
        self
    }

    pub fn on_display_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(DisplayChangedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_display_changed = Some(Arc::new(f));
        self
    }

    pub fn on_display_state_updated<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(DisplayStateUpdatedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_display_state_updated = Some(Arc::new(f));
        self
    }
}
