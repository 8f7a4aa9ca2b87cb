//! Age computation for registration rules

use chrono::{Datelike, NaiveDate};

/// Completed years between `birth` and `today`
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth.year();
    if (birth.month(), birth.day()) > (today.month(), today.day()) {
        age -= 1;
    }
    age
}

pub fn meets_minimum_age(birth: NaiveDate, minimum: u32, today: NaiveDate) -> bool {
    age_on(birth, today) >= minimum as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_birthday_not_yet_reached() {
        assert_eq!(age_on(date(2000, 6, 15), date(2024, 6, 14)), 23);
        assert_eq!(age_on(date(2000, 6, 15), date(2024, 6, 15)), 24);
    }

    #[test]
    fn test_leap_day_birthday() {
        assert_eq!(age_on(date(2000, 2, 29), date(2021, 2, 28)), 20);
        assert_eq!(age_on(date(2000, 2, 29), date(2021, 3, 1)), 21);
    }

    #[test]
    fn test_minimum_age() {
        let today = date(2024, 1, 10);
        assert!(meets_minimum_age(date(2011, 1, 10), 13, today));
        assert!(!meets_minimum_age(date(2011, 1, 11), 13, today));
    }
}
