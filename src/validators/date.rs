//! Date sanity checks

use chrono::NaiveDate;

/// Dates of birth and similar may not lie after `today`
pub fn is_not_in_future(date: NaiveDate, today: NaiveDate) -> bool {
    date <= today
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_future_date() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert!(is_not_in_future(today, today));
        assert!(is_not_in_future(today.pred_opt().unwrap(), today));
        assert!(!is_not_in_future(today.succ_opt().unwrap(), today));
    }
}
