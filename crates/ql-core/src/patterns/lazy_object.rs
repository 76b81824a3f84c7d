//! LazyObject pattern.
//!
//! A lazy object is both an [`Observer`](super::observable::Observer) and an
//! [`Observable`]: it caches an expensive computation, marks the cache stale
//! when one of its inputs notifies it, and forwards that notification to its
//! own observers. Results are recomputed on the next read.
//!
//! The bookkeeping lives in [`LazyState`] (interior mutability, so everything
//! works through `&self`). Types embed a `LazyState`, implement
//! [`perform_calculations`](LazyObject::perform_calculations), and route
//! their `Observer::update` to [`LazyObject::lazy_update`].

use std::cell::Cell;

use super::observable::Observable;
use crate::errors::Result;

/// Flags driving [`LazyObject`].
#[derive(Debug)]
pub struct LazyState {
    calculated: Cell<bool>,
    frozen: Cell<bool>,
    always_forward: Cell<bool>,
    updating: Cell<bool>,
}

impl LazyState {
    /// Create a new `LazyState` where the cache is initially stale.
    pub fn new() -> Self {
        Self {
            calculated: Cell::new(false),
            frozen: Cell::new(false),
            always_forward: Cell::new(false),
            updating: Cell::new(false),
        }
    }
}

impl Default for LazyState {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for objects that lazily compute and cache their results.
///
/// # Example
/// ```
/// use std::cell::Cell;
/// use ql_core::patterns::lazy_object::{LazyObject, LazyState};
/// use ql_core::patterns::observable::{Observable, ObservableImpl};
///
/// #[derive(Default)]
/// struct Squared {
///     lazy: LazyState,
///     observable: ObservableImpl,
///     input: Cell<f64>,
///     result: Cell<f64>,
/// }
///
/// impl Observable for Squared {
///     fn observable(&self) -> &ObservableImpl { &self.observable }
/// }
///
/// impl LazyObject for Squared {
///     fn lazy_state(&self) -> &LazyState { &self.lazy }
///     fn perform_calculations(&self) -> ql_core::Result<()> {
///         self.result.set(self.input.get() * self.input.get());
///         Ok(())
///     }
/// }
///
/// let obj = Squared::default();
/// obj.input.set(3.0);
/// obj.calculate().unwrap();
/// assert_eq!(obj.result.get(), 9.0);
/// ```
pub trait LazyObject: Observable {
    /// The embedded flags.
    fn lazy_state(&self) -> &LazyState;

    /// Perform the actual (expensive) calculation.
    ///
    /// Called by [`calculate`](Self::calculate) when the cached result is
    /// stale.
    fn perform_calculations(&self) -> Result<()>;

    /// Ensure results are up to date.
    ///
    /// The cache is marked valid *before* `perform_calculations` runs, so a
    /// calculation that reaches itself through the dependency graph sees a
    /// valid cache instead of recursing. If the calculation fails the cache
    /// reverts to stale and the error is returned; the next call retries.
    fn calculate(&self) -> Result<()> {
        let state = self.lazy_state();
        if !state.calculated.get() && !state.frozen.get() {
            state.calculated.set(true);
            if let Err(e) = self.perform_calculations() {
                state.calculated.set(false);
                tracing::debug!(error = %e, "lazy calculation failed");
                return Err(e);
            }
        }
        Ok(())
    }

    /// Mark the cache stale and forward the notification.
    ///
    /// Only the first notification after a calculation is forwarded unless
    /// [`always_forward_notifications`](Self::always_forward_notifications)
    /// was called. Re-entrant calls are ignored.
    fn lazy_update(&self) -> Result<()> {
        let state = self.lazy_state();
        if state.updating.get() {
            return Ok(());
        }
        state.updating.set(true);
        let mut outcome = Ok(());
        if state.calculated.get() || state.always_forward.get() {
            state.calculated.set(false);
            if !state.frozen.get() {
                outcome = self.notify_observers();
            }
        }
        state.updating.set(false);
        outcome
    }

    /// Force an immediate recalculation, even if frozen, and notify
    /// observers.
    fn recalculate(&self) -> Result<()> {
        let state = self.lazy_state();
        let was_frozen = state.frozen.get();
        state.calculated.set(false);
        state.frozen.set(false);
        let outcome = self.calculate();
        state.frozen.set(was_frozen);
        let notified = self.notify_observers();
        outcome.and(notified)
    }

    /// Stop recalculation and outward notification until
    /// [`unfreeze`](Self::unfreeze).
    fn freeze(&self) {
        self.lazy_state().frozen.set(true);
    }

    /// Resume normal behaviour and tell observers something may have
    /// changed while frozen.
    fn unfreeze(&self) -> Result<()> {
        let state = self.lazy_state();
        if state.frozen.get() {
            state.frozen.set(false);
            self.notify_observers()?;
        }
        Ok(())
    }

    /// Forward every notification, not just the first after a calculation.
    fn always_forward_notifications(&self) {
        self.lazy_state().always_forward.set(true);
    }

    /// Forward only the first notification after each calculation.
    fn forward_first_notification_only(&self) {
        self.lazy_state().always_forward.set(false);
    }

    /// Return `true` if the cache is currently valid.
    fn is_calculated(&self) -> bool {
        self.lazy_state().calculated.get()
    }

    /// Return `true` if the object is frozen.
    fn is_frozen(&self) -> bool {
        self.lazy_state().frozen.get()
    }
}
