//! Change notifications for connection stores.
//!
//! Subscribers register a callback and get a `Subscription` back. Dropping the
//! handle (or calling `unsubscribe`) removes the callback. Every live callback
//! sees every event.

use std::sync::{Arc, Mutex, Weak};

/// Something changed in a connection store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Saved { id: String },
    Removed { id: String },
}

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Registry<E> {
    next_id: u64,
    callbacks: Vec<(u64, Callback<E>)>,
}

/// Callback list with unsubscribe handles
pub struct ChangeNotifier<E> {
    registry: Arc<Mutex<Registry<E>>>,
}

impl<E: 'static> ChangeNotifier<E> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                callbacks: Vec::new(),
            })),
        }
    }

    /// Register `callback`; it stays registered while the returned handle lives
    pub fn subscribe(&self, callback: impl Fn(&E) + Send + Sync + 'static) -> Subscription {
        let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        let id = registry.next_id;
        registry.next_id += 1;
        registry.callbacks.push((id, Arc::new(callback)));

        let weak: Weak<Mutex<Registry<E>>> = Arc::downgrade(&self.registry);
        Subscription {
            remove: Some(Box::new(move || {
                if let Some(registry) = weak.upgrade() {
                    let mut registry = registry.lock().unwrap_or_else(|e| e.into_inner());
                    registry.callbacks.retain(|(other, _)| *other != id);
                }
            })),
        }
    }

    /// Call every registered callback with `event`
    pub fn notify(&self, event: &E) {
        // Callbacks run outside the lock so they may subscribe or unsubscribe.
        let callbacks: Vec<Callback<E>> = {
            let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
            registry.callbacks.iter().map(|(_, cb)| cb.clone()).collect()
        };
        for callback in callbacks {
            callback(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .callbacks
            .len()
    }
}

impl<E: 'static> Default for ChangeNotifier<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for ChangeNotifier<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier").finish_non_exhaustive()
    }
}

/// Handle returned by `ChangeNotifier::subscribe`
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}
