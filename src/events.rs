//! Change notifications.
//!
//! Containers publish one batch of events per completed operation, after the
//! new state is committed. Listeners are registered through
//! [`ChangeNotifier::subscribe`] and stay registered for as long as the
//! returned [`Subscription`] guard lives.
//!
//! A notifier built with [`ChangeNotifier::deferred`] only queues events.
//! The owner delivers them with [`ChangeNotifier::flush`] once it no longer
//! holds a mutable borrow of any container, so listeners are free to call
//! back into the inventory or the stash.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::items::ItemRef;

#[derive(Clone, Debug)]
pub enum InventoryEvent {
    /// Backpack, equipment or craft slot contents changed.
    InventoryChanged,
    ItemEquipped(ItemRef),
    ItemUnequipped(ItemRef),
    /// Stash contents, tab list or current tab changed.
    StashChanged,
}

type Listener = Box<dyn FnMut(&InventoryEvent)>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
    dispatching: bool,
    removed_while_dispatching: Vec<u64>,
    pending: Vec<InventoryEvent>,
    deferred: bool,
}

/// Shared event hub. Clones refer to the same set of listeners.
#[derive(Clone, Default)]
pub struct ChangeNotifier {
    registry: Rc<RefCell<Registry>>,
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier").field("listeners", &self.listener_count()).finish()
    }
}

impl ChangeNotifier {
    /// Delivers every batch as soon as it is committed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues batches until [`ChangeNotifier::flush`] is called.
    pub fn deferred() -> Self {
        let notifier = Self::default();
        notifier.registry.borrow_mut().deferred = true;
        notifier
    }

    pub fn subscribe(&self, listener: impl FnMut(&InventoryEvent) + 'static) -> Subscription {
        let mut registry = self.registry.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push((id, Box::new(listener)));
        Subscription { id, registry: Rc::downgrade(&self.registry) }
    }

    pub fn listener_count(&self) -> usize {
        self.registry.borrow().listeners.len()
    }

    /// Number of queued events not yet delivered.
    pub fn pending_count(&self) -> usize {
        self.registry.borrow().pending.len()
    }

    /// Queues `events` and, unless the notifier is deferred, delivers them.
    pub(crate) fn emit(&self, events: Vec<InventoryEvent>) {
        if events.is_empty() {
            return;
        }
        let deferred = {
            let mut registry = self.registry.borrow_mut();
            registry.pending.extend(events);
            registry.deferred
        };
        if !deferred {
            self.flush();
        }
    }

    /// Delivers queued events to every listener in registration order.
    /// Events raised by a listener while a batch is being delivered are
    /// queued and delivered after the current batch, within the same call.
    pub fn flush(&self) {
        {
            let mut registry = self.registry.borrow_mut();
            if registry.dispatching || registry.pending.is_empty() {
                return;
            }
            registry.dispatching = true;
        }
        loop {
            let (batch, mut active) = {
                let mut registry = self.registry.borrow_mut();
                if registry.pending.is_empty() {
                    registry.dispatching = false;
                    break;
                }
                (std::mem::take(&mut registry.pending), std::mem::take(&mut registry.listeners))
            };
            // The registry is not borrowed while listeners run.
            for event in &batch {
                for (_, listener) in active.iter_mut() {
                    listener(event);
                }
            }
            let mut registry = self.registry.borrow_mut();
            let removed = std::mem::take(&mut registry.removed_while_dispatching);
            active.retain(|(id, _)| !removed.contains(id));
            let added = std::mem::take(&mut registry.listeners);
            active.extend(added);
            registry.listeners = active;
        }
    }
}

/// Keeps a listener registered; dropping it unregisters the listener.
#[must_use = "dropping a Subscription unregisters its listener"]
pub struct Subscription {
    id: u64,
    registry: Weak<RefCell<Registry>>,
}

impl Subscription {
    /// Explicit form of dropping the guard.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = registry.borrow_mut();
            registry.listeners.retain(|(id, _)| *id != self.id);
            if registry.dispatching {
                registry.removed_while_dispatching.push(self.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(notifier: &ChangeNotifier) -> (Rc<RefCell<Vec<String>>>, Subscription) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let sub = notifier.subscribe(move |event| sink.borrow_mut().push(format!("{:?}", event)));
        (log, sub)
    }

    #[test]
    fn dropping_the_guard_unregisters() {
        let notifier = ChangeNotifier::new();
        let (log, sub) = recorder(&notifier);
        notifier.emit(vec![InventoryEvent::StashChanged]);
        drop(sub);
        notifier.emit(vec![InventoryEvent::StashChanged]);
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(notifier.listener_count(), 0);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let notifier = ChangeNotifier::new();
        let (log, sub) = recorder(&notifier);
        sub.unsubscribe();
        notifier.emit(vec![InventoryEvent::InventoryChanged]);
        assert!(log.borrow().is_empty());
        assert_eq!(notifier.listener_count(), 0);
    }

    #[test]
    fn deferred_notifier_holds_events_until_flushed() {
        let notifier = ChangeNotifier::deferred();
        let (log, _sub) = recorder(&notifier);
        notifier.emit(vec![InventoryEvent::InventoryChanged]);
        notifier.emit(vec![InventoryEvent::StashChanged]);
        assert!(log.borrow().is_empty());
        assert_eq!(notifier.pending_count(), 2);
        notifier.flush();
        assert_eq!(*log.borrow(), vec!["InventoryChanged".to_string(), "StashChanged".to_string()]);
        assert_eq!(notifier.pending_count(), 0);
    }

    #[test]
    fn events_raised_inside_a_listener_are_delivered_after_the_batch() {
        let notifier = ChangeNotifier::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let inner = notifier.clone();
        let _sub = notifier.subscribe(move |event| {
            sink.borrow_mut().push(format!("{:?}", event));
            if matches!(event, InventoryEvent::InventoryChanged) {
                inner.emit(vec![InventoryEvent::StashChanged]);
            }
        });
        notifier.emit(vec![InventoryEvent::InventoryChanged]);
        assert_eq!(*seen.borrow(), vec!["InventoryChanged".to_string(), "StashChanged".to_string()]);
    }

    #[test]
    fn listener_may_subscribe_during_dispatch() {
        let notifier = ChangeNotifier::new();
        let late: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let late_slot = Rc::clone(&late);
        let hub = notifier.clone();
        let _sub = notifier.subscribe(move |_| {
            if late_slot.borrow().is_none() {
                *late_slot.borrow_mut() = Some(hub.subscribe(|_| {}));
            }
        });
        notifier.emit(vec![InventoryEvent::InventoryChanged]);
        assert_eq!(notifier.listener_count(), 2);
    }
}
