//! Observer / Observable pattern.
//!
//! * An **Observable** notifies registered **Observer**s whenever it changes
//!   state.
//! * Observers react in `update()` by marking themselves stale; values are
//!   recomputed on the next read, never pushed.
//!
//! The graph is single-threaded: observers are held as `Weak<dyn Observer>`
//! so an observable never keeps its dependents alive, and dead entries are
//! pruned during notification.
//!
//! Update suspension lives in an explicit [`ObservableSettings`] context.
//! Observables attached to a settings object (see
//! [`ObservableImpl::with_settings`]) stop notifying while updates are
//! disabled and, in deferred mode, queue their observers for a single flush
//! when updates are re-enabled.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::errors::{Error, Result};

/// An object that reacts to changes in [`Observable`]s it has subscribed to.
pub trait Observer {
    /// Called by every observable this observer is registered with when that
    /// observable changes state.
    fn update(&self) -> Result<()>;
}

/// An object that can notify interested parties when it changes.
///
/// Implementors only expose their embedded [`ObservableImpl`]; registration
/// and notification are provided.
pub trait Observable {
    /// The observer list backing this object.
    fn observable(&self) -> &ObservableImpl;

    /// Register an observer to receive future change notifications.
    fn register_observer(&self, observer: Weak<dyn Observer>) {
        self.observable().register(observer);
    }

    /// Remove a previously registered observer.
    fn unregister_observer(&self, observer: &Weak<dyn Observer>) {
        self.observable().unregister(observer);
    }

    /// Notify all currently registered observers that this object has changed.
    fn notify_observers(&self) -> Result<()> {
        self.observable().notify()
    }
}

/// Downgrade a strong observer reference into the form stored by observables.
pub fn downgrade_observer<T: Observer + 'static>(observer: &Rc<T>) -> Weak<dyn Observer> {
    let weak: Weak<T> = Rc::downgrade(observer);
    weak
}

/// Run `update()` on each observer, collecting every failure.
fn deliver(observers: Vec<Rc<dyn Observer>>) -> Result<()> {
    let mut failures = Vec::new();
    for observer in observers {
        if let Err(e) = observer.update() {
            failures.extend(e.into_messages());
        }
    }
    if failures.is_empty() {
        Ok(())
    } else {
        Err(Error::Notification(failures))
    }
}

/// Update-suspension switch shared by a group of observables.
///
/// While updates are disabled, attached observables do not notify. If the
/// suspension was requested as *deferred*, their observers are remembered
/// (each at most once) and updated when [`enable_updates`] is called.
///
/// [`enable_updates`]: ObservableSettings::enable_updates
pub struct ObservableSettings {
    updates_enabled: Cell<bool>,
    updates_deferred: Cell<bool>,
    deferred: RefCell<Vec<Weak<dyn Observer>>>,
}

impl std::fmt::Debug for ObservableSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableSettings")
            .field("updates_enabled", &self.updates_enabled.get())
            .field("updates_deferred", &self.updates_deferred.get())
            .field("deferred", &self.deferred.borrow().len())
            .finish()
    }
}

impl ObservableSettings {
    /// Create a shared settings object with updates enabled.
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            updates_enabled: Cell::new(true),
            updates_deferred: Cell::new(false),
            deferred: RefCell::new(Vec::new()),
        })
    }

    /// Suspend notifications. With `deferred = true` the observers that
    /// would have been notified are flushed by [`enable_updates`].
    ///
    /// [`enable_updates`]: ObservableSettings::enable_updates
    pub fn disable_updates(&self, deferred: bool) {
        self.updates_enabled.set(false);
        self.updates_deferred.set(deferred);
    }

    /// Resume notifications and flush deferred observers once each.
    ///
    /// Every deferred observer is updated even if some of them fail; the
    /// failures are then returned together as [`Error::Notification`].
    pub fn enable_updates(&self) -> Result<()> {
        self.updates_enabled.set(true);
        self.updates_deferred.set(false);

        let pending: Vec<Rc<dyn Observer>> = self
            .deferred
            .borrow_mut()
            .drain(..)
            .filter_map(|w| w.upgrade())
            .collect();
        if pending.is_empty() {
            return Ok(());
        }
        let count = pending.len();
        let outcome = deliver(pending);
        match &outcome {
            Ok(()) => tracing::debug!(observers = count, "flushed deferred notifications"),
            Err(e) => tracing::debug!(observers = count, error = %e, "deferred flush had failures"),
        }
        outcome
    }

    /// Whether notifications are currently delivered immediately.
    pub fn updates_enabled(&self) -> bool {
        self.updates_enabled.get()
    }

    /// Whether suppressed notifications are being queued for later.
    pub fn updates_deferred(&self) -> bool {
        self.updates_deferred.get()
    }

    fn register_deferred(&self, observers: &[Weak<dyn Observer>]) {
        if !self.updates_deferred.get() {
            return;
        }
        let mut deferred = self.deferred.borrow_mut();
        for observer in observers {
            if !deferred.iter().any(|d| Weak::ptr_eq(d, observer)) {
                deferred.push(observer.clone());
            }
        }
    }

    fn unregister_deferred(&self, observer: &Weak<dyn Observer>) {
        if self.updates_deferred.get() {
            self.deferred
                .borrow_mut()
                .retain(|d| !Weak::ptr_eq(d, observer));
        }
    }
}

/// Observer-list management embedded in every observable type.
///
/// Registration, unregistration and notification work through `&self`.
#[derive(Default)]
pub struct ObservableImpl {
    observers: RefCell<Vec<Weak<dyn Observer>>>,
    settings: Option<Rc<ObservableSettings>>,
}

impl std::fmt::Debug for ObservableImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableImpl")
            .field("observers", &self.observers.borrow().len())
            .field("attached", &self.settings.is_some())
            .finish()
    }
}

impl ObservableImpl {
    /// Create an observer list that always notifies immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an observer list that honours the update suspension of
    /// `settings`.
    pub fn with_settings(settings: &Rc<ObservableSettings>) -> Self {
        Self {
            observers: RefCell::new(Vec::new()),
            settings: Some(Rc::clone(settings)),
        }
    }

    /// Register an observer. Registering the same observer twice is a no-op.
    pub fn register(&self, observer: Weak<dyn Observer>) {
        let mut observers = self.observers.borrow_mut();
        if !observers.iter().any(|o| Weak::ptr_eq(o, &observer)) {
            observers.push(observer);
        }
    }

    /// Remove an observer (by pointer equality of the `Weak`).
    pub fn unregister(&self, observer: &Weak<dyn Observer>) {
        if let Some(settings) = &self.settings {
            settings.unregister_deferred(observer);
        }
        self.observers
            .borrow_mut()
            .retain(|o| !Weak::ptr_eq(o, observer));
    }

    /// Number of live registered observers.
    pub fn observer_count(&self) -> usize {
        self.observers
            .borrow()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Notify all live observers, removing dead `Weak` references.
    ///
    /// Each observer receives exactly one `update()` call; failures do not
    /// stop the sweep and are returned together afterwards.
    pub fn notify(&self) -> Result<()> {
        if let Some(settings) = &self.settings {
            if !settings.updates_enabled() {
                settings.register_deferred(&self.observers.borrow());
                return Ok(());
            }
        }
        let live: Vec<Rc<dyn Observer>> = {
            let mut observers = self.observers.borrow_mut();
            observers.retain(|w| w.strong_count() > 0);
            observers.iter().filter_map(|w| w.upgrade()).collect()
        };
        // Delivered outside the borrow so observers may (un)register.
        deliver(live)
    }
}

/// A value wrapper that notifies its observers whenever it is set.
pub struct ObservableValue<T> {
    value: RefCell<T>,
    inner: ObservableImpl,
}

impl<T: Clone> ObservableValue<T> {
    /// Create a new `ObservableValue` with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            value: RefCell::new(value),
            inner: ObservableImpl::new(),
        }
    }

    /// Like [`new`](Self::new), attached to an update-suspension context.
    pub fn with_settings(value: T, settings: &Rc<ObservableSettings>) -> Self {
        Self {
            value: RefCell::new(value),
            inner: ObservableImpl::with_settings(settings),
        }
    }

    /// Return a clone of the current value without triggering a notification.
    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }

    /// Set a new value and notify all registered observers.
    pub fn set(&self, value: T) -> Result<()> {
        *self.value.borrow_mut() = value;
        self.inner.notify()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ObservableValue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ObservableValue")
            .field(&*self.value.borrow())
            .finish()
    }
}

impl<T> Observable for ObservableValue<T> {
    fn observable(&self) -> &ObservableImpl {
        &self.inner
    }
}
