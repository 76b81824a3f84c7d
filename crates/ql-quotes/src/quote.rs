//! `Quote` trait and `SimpleQuote` implementation.

use std::cell::Cell;
use std::rc::Rc;

use ql_core::{
    errors::{Error, Result},
    Observable, ObservableImpl, ObservableSettings, Real,
};

/// A single observable market value.
///
/// Observers registered with a quote are notified whenever its value
/// changes.
pub trait Quote: Observable {
    /// The current value; fails if the quote is not set.
    fn value(&self) -> Result<Real>;

    /// Return `true` if the quote currently holds a value.
    fn is_valid(&self) -> bool;
}

/// A mutable market quote.
///
/// An unset quote is a distinct state rather than a magic number:
/// [`value`](Quote::value) fails until a value has been set.
#[derive(Debug, Default)]
pub struct SimpleQuote {
    value: Cell<Option<Real>>,
    observable: ObservableImpl,
}

impl SimpleQuote {
    /// Create a quote holding `value`.
    pub fn new(value: Real) -> Self {
        Self {
            value: Cell::new(Some(value)),
            observable: ObservableImpl::new(),
        }
    }

    /// Create a quote with no value.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a quote whose notifications honour `settings`' update
    /// suspension.
    pub fn with_settings(value: Option<Real>, settings: &Rc<ObservableSettings>) -> Self {
        Self {
            value: Cell::new(value),
            observable: ObservableImpl::with_settings(settings),
        }
    }

    /// Set a new value and return the change.
    ///
    /// Observers are notified only if the value actually changed; setting
    /// a previously unset quote always notifies and returns `value`.
    pub fn set_value(&self, value: Real) -> Result<Real> {
        let diff = match self.value.get() {
            Some(old) => value - old,
            None => value,
        };
        if diff != 0.0 || self.value.get().is_none() {
            self.value.set(Some(value));
            tracing::trace!(value, diff, "quote changed");
            self.observable.notify()?;
        }
        Ok(diff)
    }

    /// Go back to the unset state, notifying observers if a value was held.
    pub fn reset(&self) -> Result<()> {
        if self.value.replace(None).is_some() {
            self.observable.notify()?;
        }
        Ok(())
    }
}

impl Observable for SimpleQuote {
    fn observable(&self) -> &ObservableImpl {
        &self.observable
    }
}

impl Quote for SimpleQuote {
    fn value(&self) -> Result<Real> {
        self.value
            .get()
            .ok_or_else(|| Error::Runtime("invalid SimpleQuote".into()))
    }

    fn is_valid(&self) -> bool {
        self.value.get().is_some()
    }
}
