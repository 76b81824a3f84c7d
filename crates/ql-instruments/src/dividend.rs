//! Discrete cash dividends.

use ql_core::{ensure, errors::Result, Date, Real};

/// A cash dividend paid on `date`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dividend {
    /// Ex-dividend date.
    pub date: Date,
    /// Cash amount.
    pub amount: Real,
}

impl Dividend {
    /// A dividend of `amount` on `date`.
    pub fn new(date: Date, amount: Real) -> Self {
        Self { date, amount }
    }
}

/// A dividend schedule, ordered by date.
pub type DividendSchedule = Vec<Dividend>;

/// Pair up dividend dates and amounts into a schedule sorted by date.
pub fn dividend_vector(dates: &[Date], amounts: &[Real]) -> Result<DividendSchedule> {
    ensure!(
        dates.len() == amounts.len(),
        "size mismatch between dividend dates ({}) and amounts ({})",
        dates.len(),
        amounts.len()
    );
    let mut schedule: DividendSchedule = dates
        .iter()
        .zip(amounts)
        .map(|(&date, &amount)| Dividend::new(date, amount))
        .collect();
    schedule.sort_by_key(|d| d.date);
    Ok(schedule)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_is_sorted_by_date() {
        let d1 = Date::from_ymd_opt(2025, 9, 1).unwrap();
        let d2 = Date::from_ymd_opt(2025, 3, 1).unwrap();
        let schedule = dividend_vector(&[d1, d2], &[1.0, 2.0]).unwrap();
        assert_eq!(schedule[0], Dividend::new(d2, 2.0));
        assert_eq!(schedule[1], Dividend::new(d1, 1.0));
    }

    #[test]
    fn mismatched_sizes_are_rejected() {
        let d1 = Date::from_ymd_opt(2025, 9, 1).unwrap();
        assert!(dividend_vector(&[d1], &[1.0, 2.0]).is_err());
    }
}
