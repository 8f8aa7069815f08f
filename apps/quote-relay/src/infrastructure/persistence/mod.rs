//! Report Persistence Adapters
//!
//! Implementations of `ReportStorePort`.

mod in_memory;

pub use in_memory::InMemoryReportStore;
