pub mod cache;
pub mod error;
pub mod extract;
pub mod humanize;
pub mod provider;
pub mod report;
pub mod session;
pub mod types;

pub use cache::{PartialProductSource, Snapshot, SnapshotCache};
pub use error::{CacheError, TransactError};
pub use extract::{ColumnOffsets, ExtractOutcome, LocationProducts, RecordExtractor, RowExtractor};
pub use humanize::human_duration;
pub use provider::{FetchSummary, ProviderSettings, TransactProvider};
pub use report::{parse_report_csv, report_names, ReportRequest};
pub use session::{SessionManager, SessionSettings, SessionStatus};
pub use types::{PartialProduct, ReportDescriptor};
