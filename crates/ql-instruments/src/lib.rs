//! # ql-instruments
//!
//! Payoffs, exercise schedules, and the instrument side of the
//! pricing-engine protocol, with vanilla options on a single underlying.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod dividend;
pub mod exercise;
pub mod instrument;
pub mod option;
pub mod payoff;

pub use dividend::{dividend_vector, Dividend, DividendSchedule};
pub use exercise::{Exercise, ExerciseType};
pub use instrument::{
    GenericEngine, Instrument, InstrumentResults, InstrumentState, PricingEngine,
    PricingEngineArguments, PricingEngineResults,
};
pub use option::{
    DividendVanillaOption, Greeks, MoreGreeks, OneAssetOptionArguments, OneAssetOptionResults,
    VanillaOption, VanillaOptionEngine,
};
pub use payoff::{BasketKind, OptionType, Payoff};
