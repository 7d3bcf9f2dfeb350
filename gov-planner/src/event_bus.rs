use std::sync::{Arc, RwLock};

use tracing::info;

/// Published once a schema registration commits. The only subscriber
/// shipped in this repository logs it.
#[derive(Debug, Clone)]
pub struct SchemaRegisteredEvent {
    pub subject: String,
    pub version: i32,
    pub schema_id: i32,
    pub change_id: String,
}

pub trait SchemaEventSubscriber: Send + Sync {
    fn on_schema_registered(&self, event: &SchemaRegisteredEvent);
}

pub struct LoggingSubscriber;

impl SchemaEventSubscriber for LoggingSubscriber {
    fn on_schema_registered(&self, event: &SchemaRegisteredEvent) {
        info!(
            subject = %event.subject,
            version = event.version,
            schema_id = event.schema_id,
            change_id = %event.change_id,
            "schema registered"
        );
    }
}

/// Minimal in-process publish/subscribe registry. A publish failure in one
/// subscriber must never block or fail the others, and must never
/// propagate back to the applier.
pub struct EventBus {
    subscribers: RwLock<Vec<Arc<dyn SchemaEventSubscriber>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self {
            subscribers: RwLock::new(vec![Arc::new(LoggingSubscriber)]),
        }
    }
}

impl EventBus {
    pub fn empty() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, subscriber: Arc<dyn SchemaEventSubscriber>) {
        self.subscribers.write().unwrap().push(subscriber);
    }

    pub fn publish(&self, event: SchemaRegisteredEvent) {
        for subscriber in self.subscribers.read().unwrap().iter() {
            subscriber.on_schema_registered(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSubscriber(Arc<AtomicUsize>);

    impl SchemaEventSubscriber for CountingSubscriber {
        fn on_schema_registered(&self, _event: &SchemaRegisteredEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn publish_notifies_all_subscribers() {
        let bus = EventBus::empty();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe(Arc::new(CountingSubscriber(count.clone())));
        bus.subscribe(Arc::new(CountingSubscriber(count.clone())));
        bus.publish(SchemaRegisteredEvent {
            subject: "dev.user-value".to_string(),
            version: 1,
            schema_id: 1,
            change_id: "CHG-1".to_string(),
        });
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn default_bus_has_logging_subscriber() {
        let bus = EventBus::default();
        assert_eq!(bus.subscribers.read().unwrap().len(), 1);
    }
}
