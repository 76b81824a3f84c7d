//! `FlatForward`: a yield term structure with a constant forward rate.
//!
//! The rate is read from a quote handle, so moving the quote (or relinking
//! the handle) reprices everything built on the curve.

use std::fmt;
use std::rc::Rc;

use crate::term_structure::TermStructure;
use crate::yield_term_structure::YieldTermStructure;
use ql_core::{
    downgrade_observer, errors::Result, Date, DiscountFactor, Handle, Observable, ObservableImpl,
    Observer, Rate, Time,
};
use ql_quotes::{Quote, SimpleQuote};
use ql_time::DayCounter;

/// A flat, continuously-compounded forward-rate curve.
///
/// Discount factors are `P(t) = exp(-r t)`.
pub struct FlatForward {
    reference_date: Date,
    forward: Handle<dyn Quote>,
    day_counter: Box<dyn DayCounter>,
    observable: ObservableImpl,
}

impl FlatForward {
    /// Create a curve whose rate follows `forward`.
    pub fn new(
        reference_date: Date,
        forward: Handle<dyn Quote>,
        day_counter: impl DayCounter + 'static,
    ) -> Rc<Self> {
        let curve = Rc::new(Self {
            reference_date,
            forward,
            day_counter: Box::new(day_counter),
            observable: ObservableImpl::new(),
        });
        curve.forward.register_observer(downgrade_observer(&curve));
        curve
    }

    /// Create a curve at a fixed rate.
    pub fn with_rate(
        reference_date: Date,
        rate: Rate,
        day_counter: impl DayCounter + 'static,
    ) -> Rc<Self> {
        let quote: Rc<dyn Quote> = Rc::new(SimpleQuote::new(rate));
        Self::new(reference_date, Handle::new(quote), day_counter)
    }

    /// The current flat rate.
    pub fn rate(&self) -> Result<Rate> {
        self.forward.current_link()?.value()
    }
}

impl fmt::Debug for FlatForward {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlatForward")
            .field("reference_date", &self.reference_date)
            .field("rate", &self.rate().ok())
            .field("day_counter", &self.day_counter.name())
            .finish()
    }
}

impl Observable for FlatForward {
    fn observable(&self) -> &ObservableImpl {
        &self.observable
    }
}

impl Observer for FlatForward {
    fn update(&self) -> Result<()> {
        self.observable.notify()
    }
}

impl TermStructure for FlatForward {
    fn reference_date(&self) -> Date {
        self.reference_date
    }

    fn day_counter(&self) -> &dyn DayCounter {
        self.day_counter.as_ref()
    }
}

impl YieldTermStructure for FlatForward {
    fn discount_impl(&self, t: Time) -> Result<DiscountFactor> {
        Ok((-self.rate()? * t).exp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ql_core::RelinkableHandle;
    use ql_time::{Actual360, Actual365Fixed};
    use std::cell::Cell;

    fn ref_date() -> Date {
        Date::from_ymd_opt(2025, 1, 2).unwrap()
    }

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
    fn discount_and_rates() {
        let curve = FlatForward::with_rate(ref_date(), 0.05, Actual365Fixed);
        assert_abs_diff_eq!(curve.discount(0.0).unwrap(), 1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(
            curve.discount(2.0).unwrap(),
            (-0.1_f64).exp(),
            epsilon = 1e-14
        );
        assert_abs_diff_eq!(curve.zero_rate(3.0).unwrap(), 0.05, epsilon = 1e-12);
        assert_abs_diff_eq!(curve.zero_rate(0.0).unwrap(), 0.05, epsilon = 1e-12);
        assert_abs_diff_eq!(curve.forward_rate(1.0, 2.5).unwrap(), 0.05, epsilon = 1e-12);
        assert_abs_diff_eq!(curve.forward_rate(1.0, 1.0).unwrap(), 0.05, epsilon = 1e-9);
    }

    #[test]
    fn dates_use_the_day_counter() {
        let curve = FlatForward::with_rate(ref_date(), 0.04, Actual360);
        let d = Date::from_ymd_opt(2025, 7, 1).unwrap();
        let t = 180.0 / 360.0;
        assert_abs_diff_eq!(curve.time_from_reference(d), t, epsilon = 1e-15);
        assert_abs_diff_eq!(
            curve.discount_date(d).unwrap(),
            (-0.04 * t).exp(),
            epsilon = 1e-15
        );
    }

    #[test]
    fn negative_time_is_rejected() {
        let curve = FlatForward::with_rate(ref_date(), 0.05, Actual365Fixed);
        assert!(curve.discount(-0.5).is_err());
        assert!(curve.forward_rate(2.0, 1.0).is_err());
    }

    #[test]
    fn quote_changes_reach_curve_observers() {
        let quote = Rc::new(SimpleQuote::new(0.03));
        let handle: Handle<dyn Quote> = Handle::new(quote.clone() as Rc<dyn Quote>);
        let curve = FlatForward::new(ref_date(), handle, Actual365Fixed);
        let listener = Rc::new(Listener::default());
        curve.register_observer(downgrade_observer(&listener));

        quote.set_value(0.06).unwrap();
        assert_eq!(listener.hits.get(), 1);
        assert_abs_diff_eq!(curve.zero_rate(1.0).unwrap(), 0.06, epsilon = 1e-12);
    }

    #[test]
    fn relinking_the_rate_handle_notifies() {
        let rh: RelinkableHandle<dyn Quote> =
            RelinkableHandle::new(Rc::new(SimpleQuote::new(0.01)) as Rc<dyn Quote>);
        let curve = FlatForward::new(ref_date(), rh.handle(), Actual365Fixed);
        let listener = Rc::new(Listener::default());
        curve.register_observer(downgrade_observer(&listener));

        rh.link_to(Some(Rc::new(SimpleQuote::new(0.02)) as Rc<dyn Quote>))
            .unwrap();
        assert_eq!(listener.hits.get(), 1);
        assert_abs_diff_eq!(curve.rate().unwrap(), 0.02, epsilon = 1e-15);

        rh.link_to(None).unwrap();
        assert!(curve.discount(1.0).is_err());
    }
}
