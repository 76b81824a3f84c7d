//! Day-count conventions against published reference cases.

use ql_time::{Actual360, Actual365Fixed, Date, DayCounter, Thirty360};

fn date(y: i32, m: u32, d: u32) -> Date {
    Date::from_ymd_opt(y, m, d).unwrap()
}

// ─── 30/360 (Bond Basis) ─────────────────────────────────────────────────────

/// ISDA 30/360 Bond Basis examples.
/// Source: <https://www.isda.org/2008/12/22/30-360-day-count-conventions/>
#[test]
fn test_thirty360_bond_basis() {
    let dc = Thirty360;

    let cases: Vec<(Date, Date, i64)> = vec![
        // Example 1: End dates do not involve the last day of February
        (date(2006, 8, 20), date(2007, 2, 20), 180),
        (date(2007, 2, 20), date(2007, 8, 20), 180),
        (date(2007, 8, 20), date(2008, 2, 20), 180),
        (date(2008, 2, 20), date(2008, 8, 20), 180),
        // Example 2: End dates include some end-February dates
        (date(2006, 8, 31), date(2007, 2, 28), 178),
        (date(2007, 2, 28), date(2007, 8, 31), 183),
        (date(2007, 8, 31), date(2008, 2, 29), 179),
        (date(2008, 2, 29), date(2008, 8, 31), 182),
        // Example 3: Miscellaneous calculations
        (date(2006, 1, 31), date(2006, 2, 28), 28),
        (date(2006, 2, 28), date(2006, 3, 3), 5),
        (date(2006, 9, 30), date(2006, 10, 31), 30),
        (date(2006, 10, 31), date(2006, 11, 28), 28),
        (date(2007, 2, 26), date(2008, 2, 29), 363),
        (date(2008, 2, 29), date(2009, 2, 28), 359),
        (date(2008, 2, 28), date(2008, 3, 31), 33),
    ];

    for (d1, d2, expected) in &cases {
        let calculated = dc.day_count(*d1, *d2);
        assert_eq!(
            calculated, *expected,
            "30/360: from {d1} to {d2}: calculated {calculated}, expected {expected}"
        );
        assert!((dc.year_fraction(*d1, *d2) - *expected as f64 / 360.0).abs() < 1e-15);
    }
}

// ─── Actual conventions ──────────────────────────────────────────────────────

/// Actual/360 and Actual/365 (Fixed) count the same days and differ only
/// in the denominator.
#[test]
fn test_actual_consistency() {
    let today = date(2022, 1, 12);
    let test_dates = [
        date(2023, 2, 1),
        date(2024, 5, 16),
        date(2024, 12, 17),
        date(2026, 12, 19),
        date(2028, 3, 13),
        date(2036, 7, 26),
    ];

    for d in &test_dates {
        assert_eq!(Actual365Fixed.day_count(today, *d), Actual360.day_count(today, *d));
        let t365 = Actual365Fixed.year_fraction(today, *d);
        let t360 = Actual360.year_fraction(today, *d);
        assert!(
            (t365 * 365.0 / 360.0 - t360).abs() < 1e-14,
            "365/360 consistency failed at {d}"
        );
    }
}

#[test]
fn test_year_fraction_symmetry() {
    let counters: Vec<Box<dyn DayCounter>> = vec![Box::new(Actual365Fixed), Box::new(Actual360)];
    let d1 = date(2003, 11, 1);
    let d2 = date(2004, 5, 1);

    for dc in &counters {
        let fwd = dc.year_fraction(d1, d2);
        let bwd = dc.year_fraction(d2, d1);
        assert!(
            (fwd + bwd).abs() < 1.0e-12,
            "{}: yf({d1}, {d2}) = {fwd}, yf({d2}, {d1}) = {bwd}",
            dc.name()
        );
    }
}

#[test]
fn test_zero_period() {
    let counters: Vec<Box<dyn DayCounter>> = vec![
        Box::new(Actual365Fixed),
        Box::new(Actual360),
        Box::new(Thirty360),
    ];
    let d = date(2004, 6, 15);

    for dc in &counters {
        assert_eq!(dc.day_count(d, d), 0, "{}: day_count(d, d) should be 0", dc.name());
        assert_eq!(dc.year_fraction(d, d), 0.0);
    }
}
