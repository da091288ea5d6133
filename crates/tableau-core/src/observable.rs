#![forbid(unsafe_code)]

//! Single-threaded reactive values.
//!
//! [`Property`] is a single-slot observable container and [`Emitter`] is a
//! stateless notification channel. Both hand out a [`Subscription`] from
//! `subscribe`; dropping it unsubscribes the listener.
//!
//! # Notification order
//!
//! Listeners are notified synchronously, inside the call to
//! [`Property::set`] or [`Emitter::emit`], in the order they subscribed.
//! There is no batching and no transaction: each `set` notifies before it
//! returns. The stored value is updated before the first listener runs, so
//! every listener observes the new value through `get`.
//!
//! # Invariants
//!
//! 1. `set` with a value equal to the current one notifies nobody.
//! 2. A listener unsubscribed by an earlier listener during the same
//!    notification is not called.
//! 3. A listener that re-enters its own notification (for example by setting
//!    the property it listens to, which would call it again) panics.
//!
//! # Example
//!
//! ```
//! use tableau_core::observable::Property;
//!
//! let width = Property::new(800.0);
//! let sub = width.subscribe(|new, old| println!("{old} -> {new}"));
//! width.set(1024.0);
//! drop(sub);
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

type ListenerId = u64;

struct Listeners<F: ?Sized> {
    next_id: Cell<ListenerId>,
    entries: RefCell<Vec<(ListenerId, Rc<RefCell<F>>)>>,
}

impl<F: ?Sized> Listeners<F> {
    fn new() -> Self {
        Self {
            next_id: Cell::new(0),
            entries: RefCell::new(Vec::new()),
        }
    }

    fn add(&self, listener: Rc<RefCell<F>>) -> ListenerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.entries.borrow_mut().push((id, listener));
        id
    }

    fn remove(&self, id: ListenerId) {
        self.entries.borrow_mut().retain(|(entry, _)| *entry != id);
    }

    fn contains(&self, id: ListenerId) -> bool {
        self.entries.borrow().iter().any(|(entry, _)| *entry == id)
    }

    fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Run `call` for each listener registered at the time of the call,
    /// skipping those removed mid-notification.
    fn notify(&self, mut call: impl FnMut(&mut F)) {
        let snapshot: Vec<(ListenerId, Rc<RefCell<F>>)> = self.entries.borrow().clone();
        for (id, listener) in snapshot {
            if !self.contains(id) {
                continue;
            }
            let Ok(mut listener) = listener.try_borrow_mut() else {
                panic!("listener re-entered its own notification");
            };
            call(&mut *listener);
        }
    }
}

/// Type-erased removal hook used by [`Subscription`].
trait Unsubscribe {
    fn unsubscribe(&self, id: ListenerId);
}

/// Disposer returned by `subscribe`.
///
/// Dropping the subscription removes the listener. Call
/// [`detach`](Self::detach) to keep the listener for the lifetime of the
/// source instead.
#[must_use = "dropping a Subscription immediately unsubscribes the listener"]
pub struct Subscription {
    source: Weak<dyn Unsubscribe>,
    id: ListenerId,
    active: bool,
}

impl Subscription {
    /// Remove the listener now.
    pub fn dispose(mut self) {
        self.release();
    }

    /// Keep the listener registered until the source itself is dropped.
    pub fn detach(mut self) {
        self.active = false;
    }

    /// Whether the listener is still registered with a live source.
    pub fn is_active(&self) -> bool {
        self.active && self.source.strong_count() > 0
    }

    fn release(&mut self) {
        if self.active {
            self.active = false;
            if let Some(source) = self.source.upgrade() {
                source.unsubscribe(self.id);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Property
// ---------------------------------------------------------------------------

type ChangeListener<T> = dyn FnMut(&T, &T);

struct PropertyInner<T> {
    value: RefCell<T>,
    listeners: Listeners<ChangeListener<T>>,
}

impl<T> Unsubscribe for PropertyInner<T> {
    fn unsubscribe(&self, id: ListenerId) {
        self.listeners.remove(id);
    }
}

/// A single-slot observable value.
///
/// Cloning a `Property` yields another handle to the same slot.
pub struct Property<T> {
    inner: Rc<PropertyInner<T>>,
}

impl<T> Clone for Property<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("value", &*self.inner.value.borrow())
            .field("listeners", &self.inner.listeners.len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Property<T> {
    /// Create a property holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(PropertyInner {
                value: RefCell::new(value),
                listeners: Listeners::new(),
            }),
        }
    }

    /// Current value.
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Store `value` and notify listeners with `(new, old)`.
    ///
    /// Returns `false` (and notifies nobody) when the value is unchanged.
    pub fn set(&self, value: T) -> bool {
        let old = {
            let mut slot = self.inner.value.borrow_mut();
            if *slot == value {
                return false;
            }
            std::mem::replace(&mut *slot, value.clone())
        };
        self.inner
            .listeners
            .notify(|listener| listener(&value, &old));
        true
    }

    /// Register a change listener, called with `(new, old)`.
    pub fn subscribe(&self, listener: impl FnMut(&T, &T) + 'static) -> Subscription {
        let listener: Rc<RefCell<ChangeListener<T>>> = Rc::new(RefCell::new(listener));
        let id = self.inner.listeners.add(listener);
        let source: Weak<dyn Unsubscribe> = Rc::downgrade(&self.inner) as Weak<dyn Unsubscribe>;
        Subscription {
            source,
            id,
            active: true,
        }
    }

    /// Like [`subscribe`](Self::subscribe), but first calls the listener with
    /// the current value (as both `new` and `old`).
    pub fn link(&self, mut listener: impl FnMut(&T, &T) + 'static) -> Subscription {
        let current = self.get();
        listener(&current, &current);
        self.subscribe(listener)
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// A handle that can observe but not set this property.
    pub fn read_only(&self) -> ReadOnlyProperty<T> {
        ReadOnlyProperty {
            inner: self.clone(),
        }
    }
}

/// Observe-only view of a [`Property`] owned elsewhere.
#[derive(Clone)]
pub struct ReadOnlyProperty<T> {
    inner: Property<T>,
}

impl<T: fmt::Debug> fmt::Debug for ReadOnlyProperty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

impl<T: Clone + PartialEq + 'static> ReadOnlyProperty<T> {
    pub fn get(&self) -> T {
        self.inner.get()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.with(f)
    }

    pub fn subscribe(&self, listener: impl FnMut(&T, &T) + 'static) -> Subscription {
        self.inner.subscribe(listener)
    }

    pub fn link(&self, listener: impl FnMut(&T, &T) + 'static) -> Subscription {
        self.inner.link(listener)
    }
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

type EventListener<A> = dyn FnMut(&A);

struct EmitterInner<A> {
    listeners: Listeners<EventListener<A>>,
}

impl<A> Unsubscribe for EmitterInner<A> {
    fn unsubscribe(&self, id: ListenerId) {
        self.listeners.remove(id);
    }
}

/// A stateless notification channel carrying an argument of type `A`.
pub struct Emitter<A> {
    inner: Rc<EmitterInner<A>>,
}

impl<A> Clone for Emitter<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<A> fmt::Debug for Emitter<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("listeners", &self.inner.listeners.len())
            .finish()
    }
}

impl<A: 'static> Default for Emitter<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: 'static> Emitter<A> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(EmitterInner {
                listeners: Listeners::new(),
            }),
        }
    }

    /// Notify every listener, in subscription order.
    pub fn emit(&self, arg: &A) {
        self.inner.listeners.notify(|listener| listener(arg));
    }

    pub fn subscribe(&self, listener: impl FnMut(&A) + 'static) -> Subscription {
        let listener: Rc<RefCell<EventListener<A>>> = Rc::new(RefCell::new(listener));
        let id = self.inner.listeners.add(listener);
        let source: Weak<dyn Unsubscribe> = Rc::downgrade(&self.inner) as Weak<dyn Unsubscribe>;
        Subscription {
            source,
            id,
            active: true,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Rc<RefCell<Vec<String>>>, impl Fn(&str) + Clone) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = {
            let log = Rc::clone(&log);
            move |entry: &str| log.borrow_mut().push(entry.to_string())
        };
        (log, sink)
    }

    #[test]
    fn set_notifies_with_new_and_old() {
        let prop = Property::new(1);
        let (log, sink) = recorder();
        let _sub = prop.subscribe(move |new, old| sink(&format!("{old}->{new}")));
        assert!(prop.set(2));
        assert!(prop.set(5));
        assert_eq!(*log.borrow(), vec!["1->2", "2->5"]);
        assert_eq!(prop.get(), 5);
    }

    #[test]
    fn equal_value_does_not_notify() {
        let prop = Property::new("a".to_string());
        let (log, sink) = recorder();
        let _sub = prop.subscribe(move |new: &String, _: &String| sink(new.as_str()));
        assert!(!prop.set("a".to_string()));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn listeners_run_in_subscription_order() {
        let prop = Property::new(0);
        let (log, sink) = recorder();
        let first = sink.clone();
        let second = sink.clone();
        let third = sink;
        let _a = prop.subscribe(move |_, _| first("a"));
        let _b = prop.subscribe(move |_, _| second("b"));
        let _c = prop.subscribe(move |_, _| third("c"));
        prop.set(1);
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn listener_sees_updated_value_through_handle() {
        let prop = Property::new(0);
        let seen = Rc::new(Cell::new(-1));
        let handle = prop.clone();
        let seen_in = Rc::clone(&seen);
        let _sub = prop.subscribe(move |_, _| seen_in.set(handle.get()));
        prop.set(7);
        assert_eq!(seen.get(), 7);
    }

    #[test]
    fn drop_unsubscribes() {
        let prop = Property::new(0);
        let count = Rc::new(Cell::new(0));
        let counter = Rc::clone(&count);
        let sub = prop.subscribe(move |_, _| counter.set(counter.get() + 1));
        prop.set(1);
        drop(sub);
        prop.set(2);
        assert_eq!(count.get(), 1);
        assert_eq!(prop.listener_count(), 0);
    }

    #[test]
    fn detach_keeps_listener() {
        let prop = Property::new(0);
        let count = Rc::new(Cell::new(0));
        let counter = Rc::clone(&count);
        prop.subscribe(move |_, _| counter.set(counter.get() + 1))
            .detach();
        prop.set(1);
        prop.set(2);
        assert_eq!(count.get(), 2);
        assert_eq!(prop.listener_count(), 1);
    }

    #[test]
    fn link_fires_immediately() {
        let prop = Property::new(3);
        let (log, sink) = recorder();
        let _sub = prop.link(move |new, old| sink(&format!("{old}->{new}")));
        prop.set(4);
        assert_eq!(*log.borrow(), vec!["3->3", "3->4"]);
    }

    #[test]
    fn listener_removed_mid_notification_is_skipped() {
        let prop = Property::new(0);
        let later: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let count = Rc::new(Cell::new(0));

        let slot = Rc::clone(&later);
        let _first = prop.subscribe(move |_, _| {
            slot.borrow_mut().take();
        });
        let counter = Rc::clone(&count);
        *later.borrow_mut() = Some(prop.subscribe(move |_, _| counter.set(counter.get() + 1)));

        prop.set(1);
        assert_eq!(count.get(), 0);
    }

    #[test]
    #[should_panic(expected = "re-entered")]
    fn reentrant_set_panics() {
        let prop = Property::new(0);
        let handle = prop.clone();
        prop.subscribe(move |new, _| {
            handle.set(new + 1);
        })
        .detach();
        prop.set(1);
    }

    #[test]
    fn subscription_outlives_source() {
        let prop = Property::new(0);
        let sub = prop.subscribe(|_, _| {});
        assert!(sub.is_active());
        drop(prop);
        assert!(!sub.is_active());
        drop(sub);
    }

    #[test]
    fn read_only_view_observes() {
        let prop = Property::new(false);
        let view = prop.read_only();
        let seen = Rc::new(Cell::new(false));
        let seen_in = Rc::clone(&seen);
        let _sub = view.subscribe(move |new, _| seen_in.set(*new));
        prop.set(true);
        assert!(view.get());
        assert!(seen.get());
    }

    #[test]
    fn emitter_notifies_in_order() {
        let emitter: Emitter<u32> = Emitter::new();
        let (log, sink) = recorder();
        let a = sink.clone();
        let _x = emitter.subscribe(move |v| a(&format!("x{v}")));
        let _y = emitter.subscribe(move |v| sink(&format!("y{v}")));
        emitter.emit(&1);
        emitter.emit(&2);
        assert_eq!(*log.borrow(), vec!["x1", "y1", "x2", "y2"]);
    }

    #[test]
    fn emitter_dispose() {
        let emitter: Emitter<()> = Emitter::new();
        let count = Rc::new(Cell::new(0));
        let counter = Rc::clone(&count);
        let sub = emitter.subscribe(move |_| counter.set(counter.get() + 1));
        emitter.emit(&());
        sub.dispose();
        emitter.emit(&());
        assert_eq!(count.get(), 1);
        assert_eq!(emitter.listener_count(), 0);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn listeners_see_every_change_exactly_once(values in proptest::collection::vec(0u8..4, 0..40)) {
                let prop = Property::new(0u8);
                let seen = Rc::new(RefCell::new(Vec::new()));
                let sink = Rc::clone(&seen);
                let _sub = prop.subscribe(move |new, old| sink.borrow_mut().push((*old, *new)));

                let mut expected = Vec::new();
                let mut current = 0u8;
                for v in values {
                    let changed = prop.set(v);
                    prop_assert_eq!(changed, v != current);
                    if changed {
                        expected.push((current, v));
                        current = v;
                    }
                }
                prop_assert_eq!(seen.borrow().clone(), expected);
                prop_assert_eq!(prop.get(), current);
            }
        }
    }
}
