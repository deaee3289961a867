//! txledger-report: CSV rendering of reconstructed ledgers and transfer lists

pub mod file_name;
pub mod ledger_csv;
pub mod transfers_csv;

pub use file_name::report_file_name;
pub use ledger_csv::{ledger_csv_string, write_ledger_csv};
pub use transfers_csv::{transfers_csv_string, write_transfers_csv};
