//! Results export and history

mod storage;

pub use storage::{export, test_records, write_csv, ExportFormat, ResultsStorage, RunInfo, TestRecord};
