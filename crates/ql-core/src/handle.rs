//! `Handle<T>`: a shared, observable, possibly relinkable reference.
//!
//! All copies of a handle share one *link*. The link observes the current
//! target and is itself observable, so objects that register with a handle
//! are notified both when the target changes and when a
//! [`RelinkableHandle`] points the link somewhere else. This lets market
//! data be swapped under a model without rebuilding its dependents.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::errors::{Error, Result};
use crate::patterns::observable::{Observable, ObservableImpl, Observer};

struct Link<T: ?Sized> {
    target: RefCell<Option<Rc<T>>>,
    is_observer: Cell<bool>,
    observable: ObservableImpl,
    this: Weak<Link<T>>,
}

impl<T: ?Sized + Observable + 'static> Link<T> {
    fn new(target: Option<Rc<T>>, register_as_observer: bool) -> Rc<Self> {
        let link = Rc::new_cyclic(|this| Link {
            target: RefCell::new(None),
            is_observer: Cell::new(false),
            observable: ObservableImpl::new(),
            this: this.clone(),
        });
        link.attach(target, register_as_observer);
        link
    }

    fn as_observer(&self) -> Weak<dyn Observer> {
        let weak: Weak<Link<T>> = self.this.clone();
        weak
    }

    /// Swap the target without notifying; returns whether anything changed.
    fn attach(&self, target: Option<Rc<T>>, register_as_observer: bool) -> bool {
        let same_target = match (&*self.target.borrow(), &target) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        if same_target && self.is_observer.get() == register_as_observer {
            return false;
        }
        let me = self.as_observer();
        if let Some(old) = self.target.borrow().as_ref() {
            if self.is_observer.get() {
                old.unregister_observer(&me);
            }
        }
        if let Some(new) = target.as_ref() {
            if register_as_observer {
                new.register_observer(me);
            }
        }
        *self.target.borrow_mut() = target;
        self.is_observer.set(register_as_observer);
        true
    }

    fn link_to(&self, target: Option<Rc<T>>, register_as_observer: bool) -> Result<()> {
        if self.attach(target, register_as_observer) {
            tracing::trace!(empty = self.target.borrow().is_none(), "handle relinked");
            self.observable.notify()?;
        }
        Ok(())
    }
}

impl<T: ?Sized> Observer for Link<T> {
    fn update(&self) -> Result<()> {
        if self.target.borrow().is_some() {
            self.observable.notify()
        } else {
            Ok(())
        }
    }
}

/// A shared, observable reference to a `T`, possibly empty.
///
/// A plain handle never changes what it points to; copies always see the
/// same underlying object. Register with the handle (it is
/// [`Observable`]) to be notified when that object changes.
pub struct Handle<T: ?Sized> {
    link: Rc<Link<T>>,
}

impl<T: ?Sized> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            link: Rc::clone(&self.link),
        }
    }
}

impl<T: ?Sized + Observable + 'static> Handle<T> {
    /// Create a handle that forwards notifications from `target`.
    pub fn new(target: Rc<T>) -> Self {
        Self::with_observer(target, true)
    }

    /// Create a handle, choosing whether it forwards `target`'s
    /// notifications.
    pub fn with_observer(target: Rc<T>, register_as_observer: bool) -> Self {
        Self {
            link: Link::new(Some(target), register_as_observer),
        }
    }

    /// Create an empty handle.
    pub fn empty() -> Self {
        Self {
            link: Link::new(None, true),
        }
    }
}

impl<T: ?Sized> Handle<T> {
    /// The object currently pointed to.
    ///
    /// Fails if the handle is empty.
    pub fn current_link(&self) -> Result<Rc<T>> {
        self.link
            .target
            .borrow()
            .clone()
            .ok_or_else(|| Error::Runtime("empty Handle cannot be dereferenced".into()))
    }

    /// Return `true` if the handle points to nothing.
    pub fn is_empty(&self) -> bool {
        self.link.target.borrow().is_none()
    }

    /// Return `true` if both handles point to the same object (or are both
    /// empty).
    pub fn same_target(&self, other: &Handle<T>) -> bool {
        match (&*self.link.target.borrow(), &*other.link.target.borrow()) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: ?Sized + Observable + 'static> Default for Handle<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ?Sized> Observable for Handle<T> {
    fn observable(&self) -> &ObservableImpl {
        &self.link.observable
    }
}

impl<T: ?Sized> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "Handle(empty)")
        } else {
            write!(f, "Handle(linked)")
        }
    }
}

/// A [`Handle`] whose target can be replaced at runtime.
///
/// Every handle obtained through [`handle`](Self::handle) shares the link,
/// so relinking notifies all of their holders.
pub struct RelinkableHandle<T: ?Sized> {
    handle: Handle<T>,
}

impl<T: ?Sized> Clone for RelinkableHandle<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
        }
    }
}

impl<T: ?Sized + Observable + 'static> RelinkableHandle<T> {
    /// Create a relinkable handle pointing to `target`.
    pub fn new(target: Rc<T>) -> Self {
        Self {
            handle: Handle::new(target),
        }
    }

    /// Create an empty relinkable handle.
    pub fn empty() -> Self {
        Self {
            handle: Handle::empty(),
        }
    }

    /// Point every sharing handle at `target` and notify their holders.
    pub fn link_to(&self, target: Option<Rc<T>>) -> Result<()> {
        self.handle.link.link_to(target, true)
    }

    /// Like [`link_to`](Self::link_to), choosing whether the link forwards
    /// the new target's notifications.
    pub fn link_to_with_observer(
        &self,
        target: Option<Rc<T>>,
        register_as_observer: bool,
    ) -> Result<()> {
        self.handle.link.link_to(target, register_as_observer)
    }
}

impl<T: ?Sized> RelinkableHandle<T> {
    /// A read-only handle sharing this handle's link.
    pub fn handle(&self) -> Handle<T> {
        self.handle.clone()
    }

    /// The object currently pointed to.
    pub fn current_link(&self) -> Result<Rc<T>> {
        self.handle.current_link()
    }

    /// Return `true` if the handle points to nothing.
    pub fn is_empty(&self) -> bool {
        self.handle.is_empty()
    }
}

impl<T: ?Sized + Observable + 'static> Default for RelinkableHandle<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ?Sized> Observable for RelinkableHandle<T> {
    fn observable(&self) -> &ObservableImpl {
        self.handle.observable()
    }
}

impl<T: ?Sized> fmt::Debug for RelinkableHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Relinkable{:?}", self.handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::observable::{downgrade_observer, ObservableValue};

    #[derive(Default)]
    struct Listener {
        hits: Cell<u32>,
    }

    impl Observer for Listener {
        fn update(&self) -> Result<()> {
            self.hits.set(self.hits.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn empty_handle_cannot_be_dereferenced() {
        let h: Handle<ObservableValue<f64>> = Handle::empty();
        assert!(h.is_empty());
        assert!(h.current_link().is_err());
    }

    #[test]
    fn handle_forwards_target_notifications() {
        let value = Rc::new(ObservableValue::new(1.0));
        let h = Handle::new(Rc::clone(&value));
        let listener = Rc::new(Listener::default());
        h.register_observer(downgrade_observer(&listener));

        value.set(2.0).unwrap();
        assert_eq!(listener.hits.get(), 1);
        assert_eq!(h.current_link().unwrap().get(), 2.0);
    }

    #[test]
    fn non_observing_handle_stays_quiet() {
        let value = Rc::new(ObservableValue::new(1.0));
        let h = Handle::with_observer(Rc::clone(&value), false);
        let listener = Rc::new(Listener::default());
        h.register_observer(downgrade_observer(&listener));
        value.set(2.0).unwrap();
        assert_eq!(listener.hits.get(), 0);
    }

    #[test]
    fn relinking_notifies_every_holder() {
        let first = Rc::new(ObservableValue::new(1.0));
        let second = Rc::new(ObservableValue::new(2.0));
        let rh = RelinkableHandle::new(Rc::clone(&first));
        let h1 = rh.handle();
        let h2 = h1.clone();

        let a = Rc::new(Listener::default());
        let b = Rc::new(Listener::default());
        h1.register_observer(downgrade_observer(&a));
        h2.register_observer(downgrade_observer(&b));

        rh.link_to(Some(Rc::clone(&second))).unwrap();
        assert_eq!(a.hits.get(), 1);
        assert_eq!(b.hits.get(), 1);
        assert_eq!(h2.current_link().unwrap().get(), 2.0);

        // The old target no longer reaches the holders.
        first.set(10.0).unwrap();
        assert_eq!(a.hits.get(), 1);
        second.set(20.0).unwrap();
        assert_eq!(a.hits.get(), 2);
    }

    #[test]
    fn relinking_to_the_same_target_is_silent() {
        let value = Rc::new(ObservableValue::new(1.0));
        let rh = RelinkableHandle::new(Rc::clone(&value));
        let listener = Rc::new(Listener::default());
        rh.register_observer(downgrade_observer(&listener));
        rh.link_to(Some(value)).unwrap();
        assert_eq!(listener.hits.get(), 0);
        rh.link_to(None).unwrap();
        assert_eq!(listener.hits.get(), 1);
        assert!(rh.is_empty());
    }
}
