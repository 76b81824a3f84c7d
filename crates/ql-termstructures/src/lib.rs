//! # ql-termstructures
//!
//! Yield curves, Black and local volatility surfaces, and the ABCD
//! volatility function with its calibration.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Modules ───────────────────────────────────────────────────────────────────

/// `TermStructure`: base trait for all term structures.
pub mod term_structure;

/// `YieldTermStructure`: yield / interest-rate term structures.
pub mod yield_term_structure;

/// `FlatForward`: constant forward-rate yield curve.
pub mod flat_forward;

/// `VolatilityTermStructure`: base trait for volatility term structures.
pub mod volatility_term_structure;

/// `BlackVolTermStructure`: Black-volatility term structures and `BlackConstantVol`.
pub mod black_vol_term_structure;

/// `LocalVolTermStructure`: local-volatility term structures, `LocalConstantVol` and `LocalVolCurve`.
pub mod local_vol_term_structure;

/// `LocalVolSurface`: Dupire local volatility surface from a Black vol surface.
pub mod local_vol_surface;

/// The ABCD instantaneous volatility function.
pub mod abcd;

/// Least-squares fit of the ABCD function to Black volatilities.
pub mod abcd_calibration;

// ── Convenience re-exports ────────────────────────────────────────────────────

pub use abcd::AbcdFunction;
pub use abcd_calibration::AbcdCalibration;
pub use black_vol_term_structure::{BlackConstantVol, BlackVolTermStructure};
pub use flat_forward::FlatForward;
pub use local_vol_surface::LocalVolSurface;
pub use local_vol_term_structure::{LocalConstantVol, LocalVolCurve, LocalVolTermStructure};
pub use term_structure::TermStructure;
pub use volatility_term_structure::VolatilityTermStructure;
pub use yield_term_structure::YieldTermStructure;
