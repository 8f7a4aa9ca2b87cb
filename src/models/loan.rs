//! Loan model and related types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::enums::LoanStatus;

/// Loan model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    pub book_id: i32,
    pub user_id: i32,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: LoanStatus,
    pub late_fee: Option<Decimal>,
    pub notes: Option<String>,
}

impl Loan {
    /// Active and past its due date
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == LoanStatus::Active && now > self.due_date
    }

    /// Whole days past due, 0 when not overdue
    pub fn days_overdue(&self, now: DateTime<Utc>) -> i64 {
        if self.is_overdue(now) {
            (now - self.due_date).num_days()
        } else {
            0
        }
    }
}

/// Loan as shown to clients, with derived overdue state
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoanDetails {
    #[serde(flatten)]
    pub loan: Loan,
    pub is_overdue: bool,
    pub days_overdue: i64,
}

impl LoanDetails {
    pub fn new(loan: Loan, now: DateTime<Utc>) -> Self {
        Self {
            is_overdue: loan.is_overdue(now),
            days_overdue: loan.days_overdue(now),
            loan,
        }
    }
}

/// Values for a loan about to be inserted
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub book_id: i32,
    pub user_id: i32,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

/// Selection criteria for loan listings
#[derive(Debug, Clone, Default)]
pub struct LoanFilter {
    pub user_id: Option<i32>,
    pub book_id: Option<i32>,
    pub status: Option<LoanStatus>,
    /// Only loans due strictly before this instant
    pub due_before: Option<DateTime<Utc>>,
}

impl LoanFilter {
    pub fn matches(&self, loan: &Loan) -> bool {
        self.user_id.map_or(true, |id| loan.user_id == id)
            && self.book_id.map_or(true, |id| loan.book_id == id)
            && self.status.map_or(true, |s| loan.status == s)
            && self.due_before.map_or(true, |d| loan.due_date < d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn active_loan(due: DateTime<Utc>) -> Loan {
        Loan {
            id: 1,
            book_id: 1,
            user_id: 1,
            loan_date: due - Duration::days(14),
            due_date: due,
            return_date: None,
            status: LoanStatus::Active,
            late_fee: None,
            notes: None,
        }
    }

    #[test]
    fn test_overdue_is_derived() {
        let due = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let loan = active_loan(due);
        assert!(!loan.is_overdue(due));
        assert!(loan.is_overdue(due + Duration::seconds(1)));
        assert_eq!(loan.days_overdue(due + Duration::hours(47)), 1);

        let returned = Loan { status: LoanStatus::Returned, ..loan };
        assert!(!returned.is_overdue(due + Duration::days(30)));
    }

    #[test]
    fn test_filter() {
        let due = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let loan = active_loan(due);
        let filter = LoanFilter {
            status: Some(LoanStatus::Active),
            due_before: Some(due + Duration::days(1)),
            ..Default::default()
        };
        assert!(filter.matches(&loan));
        assert!(!LoanFilter { user_id: Some(2), ..Default::default() }.matches(&loan));
    }
}
