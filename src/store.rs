//! Minimal reactive store: shared state plus explicit change notification.
//!
//! Observers are called synchronously after every `update`, with the new
//! value borrowed. They must not call back into the same store's `update`.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

type Observer<T> = Rc<dyn Fn(&T)>;

struct Shared<T> {
    value: RefCell<T>,
    observers: RefCell<Vec<(usize, Observer<T>)>>,
    next_id: Cell<usize>,
}

/// Single-threaded observable value. Clones share the same state.
pub struct Store<T> {
    shared: Rc<Shared<T>>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("value", &self.shared.value.borrow())
            .field("observers", &self.shared.observers.borrow().len())
            .finish()
    }
}

impl<T: 'static> Store<T> {
    pub fn new(value: T) -> Self {
        Self {
            shared: Rc::new(Shared {
                value: RefCell::new(value),
                observers: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
            }),
        }
    }

    /// Read the current value.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.shared.value.borrow())
    }

    /// Clone of the current value.
    pub fn snapshot(&self) -> T
    where
        T: Clone,
    {
        self.shared.value.borrow().clone()
    }

    /// Mutate the value, then notify every observer.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let result = f(&mut self.shared.value.borrow_mut());
        self.notify();
        result
    }

    /// Register an observer. It stays registered until the returned
    /// [`Subscription`] is dropped.
    pub fn subscribe(&self, observer: impl Fn(&T) + 'static) -> Subscription {
        let id = self.shared.next_id.get();
        self.shared.next_id.set(id + 1);
        self.shared
            .observers
            .borrow_mut()
            .push((id, Rc::new(observer)));

        let shared: Weak<Shared<T>> = Rc::downgrade(&self.shared);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(shared) = shared.upgrade() {
                    shared.observers.borrow_mut().retain(|(other, _)| *other != id);
                }
            })),
        }
    }

    fn notify(&self) {
        // Snapshot so observers may subscribe or unsubscribe while notified.
        let observers: Vec<Observer<T>> = self
            .shared
            .observers
            .borrow()
            .iter()
            .map(|(_, observer)| Rc::clone(observer))
            .collect();
        let value = self.shared.value.borrow();
        for observer in observers {
            observer(&value);
        }
    }
}

/// Keeps an observer registered; dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}
