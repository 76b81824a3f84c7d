//! Library settings as an explicit context object.
//!
//! [`Settings`] bundles the **evaluation date** (the date at which
//! calculations are performed) with the [`ObservableSettings`] that govern
//! update suspension. It is created by the application and shared as an
//! `Rc<Settings>` with whatever needs it; there is no global instance.

use std::cell::Cell;
use std::rc::Rc;

use crate::errors::Result;
use crate::patterns::observable::{Observable, ObservableImpl, ObservableSettings, ObservableValue};
use crate::Date;

/// Shared configuration for one pricing context.
#[derive(Debug)]
pub struct Settings {
    evaluation_date: ObservableValue<Option<Date>>,
    include_reference_date_events: Cell<bool>,
    observable_settings: Rc<ObservableSettings>,
}

impl Settings {
    /// Create a context whose evaluation date tracks the system date until
    /// one is set explicitly.
    pub fn new() -> Rc<Self> {
        Self::build(None)
    }

    /// Create a context with a fixed evaluation date.
    pub fn with_evaluation_date(date: Date) -> Rc<Self> {
        Self::build(Some(date))
    }

    fn build(date: Option<Date>) -> Rc<Self> {
        let observable_settings = ObservableSettings::new();
        Rc::new(Self {
            evaluation_date: ObservableValue::with_settings(date, &observable_settings),
            include_reference_date_events: Cell::new(false),
            observable_settings,
        })
    }

    /// The evaluation date; today's local date if none was set.
    pub fn evaluation_date(&self) -> Date {
        self.evaluation_date
            .get()
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    /// Set the evaluation date and notify everything that depends on it.
    pub fn set_evaluation_date(&self, date: Date) -> Result<()> {
        self.evaluation_date.set(Some(date))
    }

    /// Go back to tracking the system date.
    pub fn reset_evaluation_date(&self) -> Result<()> {
        self.evaluation_date.set(None)
    }

    /// Whether cash flows or exercises falling on the evaluation date still
    /// count as live.
    pub fn include_reference_date_events(&self) -> bool {
        self.include_reference_date_events.get()
    }

    /// See [`include_reference_date_events`](Self::include_reference_date_events).
    pub fn set_include_reference_date_events(&self, include: bool) {
        self.include_reference_date_events.set(include);
    }

    /// The update-suspension context observables should attach to.
    pub fn observable_settings(&self) -> &Rc<ObservableSettings> {
        &self.observable_settings
    }
}

/// Register with the settings to be notified when the evaluation date moves.
impl Observable for Settings {
    fn observable(&self) -> &ObservableImpl {
        self.evaluation_date.observable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::observable::{downgrade_observer, Observer};
    use chrono::NaiveDate;

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
    fn moving_the_evaluation_date_notifies() {
        let d = NaiveDate::from_ymd_opt(2024, 5, 17).unwrap();
        let settings = Settings::with_evaluation_date(d);
        assert_eq!(settings.evaluation_date(), d);

        let listener = Rc::new(Listener::default());
        settings.register_observer(downgrade_observer(&listener));
        settings.set_evaluation_date(d.succ_opt().unwrap()).unwrap();
        assert_eq!(listener.hits.get(), 1);
    }

    #[test]
    fn deferred_date_change_is_flushed_on_enable() {
        let settings = Settings::new();
        let listener = Rc::new(Listener::default());
        settings.register_observer(downgrade_observer(&listener));

        settings.observable_settings().disable_updates(true);
        settings
            .set_evaluation_date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
            .unwrap();
        assert_eq!(listener.hits.get(), 0);
        settings.observable_settings().enable_updates().unwrap();
        assert_eq!(listener.hits.get(), 1);
    }
}
