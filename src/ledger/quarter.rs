use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use strum::Display;
use utoipa::ToSchema;

/// One of the four 3-month buckets annual leave is credited into and drawn
/// down from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, ToSchema)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    /// Bucket for a calendar month, `ceil(month / 3)`.
    pub fn of_month(month: u32) -> Option<Quarter> {
        match month {
            1..=3 => Some(Quarter::Q1),
            4..=6 => Some(Quarter::Q2),
            7..=9 => Some(Quarter::Q3),
            10..=12 => Some(Quarter::Q4),
            _ => None,
        }
    }

    /// The quarterly credit job only fires on the first month of a quarter;
    /// every other month maps to `None`.
    pub fn credit_month(month: u32) -> Option<Quarter> {
        match month {
            1 => Some(Quarter::Q1),
            4 => Some(Quarter::Q2),
            7 => Some(Quarter::Q3),
            10 => Some(Quarter::Q4),
            _ => None,
        }
    }

    pub fn of_date(date: NaiveDate) -> Quarter {
        // chrono months are always in 1..=12
        Quarter::of_month(date.month()).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_to_quarter_mapping_is_exhaustive() {
        let expected = [
            (1, Quarter::Q1),
            (2, Quarter::Q1),
            (3, Quarter::Q1),
            (4, Quarter::Q2),
            (5, Quarter::Q2),
            (6, Quarter::Q2),
            (7, Quarter::Q3),
            (8, Quarter::Q3),
            (9, Quarter::Q3),
            (10, Quarter::Q4),
            (11, Quarter::Q4),
            (12, Quarter::Q4),
        ];
        for (month, quarter) in expected {
            assert_eq!(Quarter::of_month(month), Some(quarter), "month {month}");
        }
    }

    #[test]
    fn out_of_range_months_map_to_none() {
        assert_eq!(Quarter::of_month(0), None);
        assert_eq!(Quarter::of_month(13), None);
    }

    #[test]
    fn only_quarter_start_months_trigger_a_credit() {
        for month in 1..=12u32 {
            let expected = match month {
                1 => Some(Quarter::Q1),
                4 => Some(Quarter::Q2),
                7 => Some(Quarter::Q3),
                10 => Some(Quarter::Q4),
                _ => None,
            };
            assert_eq!(Quarter::credit_month(month), expected, "month {month}");
        }
    }

    #[test]
    fn quarter_of_date_uses_the_month() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 15).unwrap();
        assert_eq!(Quarter::of_date(date), Quarter::Q3);
    }
}
