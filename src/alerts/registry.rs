use std::sync::{Arc, PoisonError, RwLock};

use super::event::AlertEvent;
use crate::traits::AlertSubscriber;

/// Fan-out of alert events to registered subscribers, in registration order
#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: RwLock<Vec<Arc<dyn AlertSubscriber>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber. Registering the same `Arc` twice is a no-op.
    /// Returns whether it was added.
    pub fn register(&self, subscriber: Arc<dyn AlertSubscriber>) -> bool {
        let mut subscribers = self.subscribers.write().unwrap_or_else(PoisonError::into_inner);
        if subscribers.iter().any(|s| same_subscriber(s, &subscriber)) {
            return false;
        }
        subscribers.push(subscriber);
        true
    }

    pub fn unregister(&self, subscriber: &Arc<dyn AlertSubscriber>) -> bool {
        let mut subscribers = self.subscribers.write().unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|s| !same_subscriber(s, subscriber));
        subscribers.len() != before
    }

    pub fn len(&self) -> usize {
        self.subscribers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn notify(&self, event: &AlertEvent) {
        // Clone the list so subscribers may (un)register from inside on_alert
        let subscribers = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        log::debug!("notifying {} subscribers: {}", subscribers.len(), event.title);
        for subscriber in subscribers {
            subscriber.on_alert(event);
        }
    }
}

fn same_subscriber(a: &Arc<dyn AlertSubscriber>, b: &Arc<dyn AlertSubscriber>) -> bool {
    // Compare data pointers only; vtable pointers may differ across codegen units
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::event::AlertCategory;
    use chrono::Utc;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl AlertSubscriber for Recorder {
        fn on_alert(&self, event: &AlertEvent) {
            self.seen.lock().unwrap().push(event.title.clone());
        }
    }

    fn event(title: &str) -> AlertEvent {
        AlertEvent::new(title, "msg", Utc::now(), AlertCategory::Outdoor)
    }

    #[test]
    fn test_duplicate_registration_is_ignored() {
        let registry = SubscriberRegistry::new();
        let recorder = Arc::new(Recorder::default());
        let subscriber: Arc<dyn AlertSubscriber> = recorder.clone();

        assert!(registry.register(subscriber.clone()));
        assert!(!registry.register(subscriber.clone()));
        assert_eq!(registry.len(), 1);

        registry.notify(&event("a"));
        assert_eq!(*recorder.seen.lock().unwrap(), vec!["a".to_string()]);
    }

    #[test]
    fn test_unregister_stops_delivery() {
        let registry = SubscriberRegistry::new();
        let recorder = Arc::new(Recorder::default());
        let subscriber: Arc<dyn AlertSubscriber> = recorder.clone();
        registry.register(subscriber.clone());

        assert!(registry.unregister(&subscriber));
        assert!(!registry.unregister(&subscriber));
        assert!(registry.is_empty());

        registry.notify(&event("dropped"));
        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_every_subscriber_receives_event() {
        let registry = SubscriberRegistry::new();
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        registry.register(first.clone());
        registry.register(second.clone());

        registry.notify(&event("both"));
        assert_eq!(first.seen.lock().unwrap().len(), 1);
        assert_eq!(second.seen.lock().unwrap().len(), 1);
    }
}
