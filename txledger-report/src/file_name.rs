//! Report file naming.

use chrono::NaiveDate;

fn long_date(date: NaiveDate) -> String {
    date.format("%Y-%B-%d").to_string()
}

/// `transaction_report_{address}_{2024-March-18}_{2024-March-31}.csv`
pub fn report_file_name(address: &str, start: NaiveDate, end: NaiveDate) -> String {
    format!(
        "transaction_report_{address}_{}_{}.csv",
        long_date(start),
        long_date(end)
    )
}
