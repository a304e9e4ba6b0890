use chrono::{Days, NaiveDate};

/// The school fiscal year closes at the end of July and opens in August.
pub const FISCAL_YEAR_END_MONTH: u32 = 7;

/// Turkish month names in fiscal order, index 0 = August.
pub const FISCAL_MONTH_NAMES: [&str; 12] = [
    "Ağustos", "Eylül", "Ekim", "Kasım", "Aralık", "Ocak", "Şubat", "Mart", "Nisan", "Mayıs",
    "Haziran", "Temmuz",
];

pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.checked_sub_days(Days::new(1)))
        .unwrap_or(NaiveDate::MAX)
}

/// Returns the 0-based index of the month within the fiscal year.
///
/// # Examples
/// - August = 0, December = 4, January = 5, July = 11
pub fn fiscal_month_index(calendar_month: u32) -> usize {
    let fy_start_month = FISCAL_YEAR_END_MONTH + 1;

    if calendar_month >= fy_start_month {
        (calendar_month - fy_start_month) as usize
    } else {
        (calendar_month + 12 - fy_start_month) as usize
    }
}

/// Inverse of [`fiscal_month_index`]: 0 → 8 (August), 11 → 7 (July).
pub fn calendar_month_for_fiscal_index(index: usize) -> u32 {
    ((FISCAL_YEAR_END_MONTH as usize + index) % 12 + 1) as u32
}
