use chrono::{DateTime, Utc};

use signoff_core::StoreError;

pub mod assignment;
pub mod document;
pub mod process;
pub mod task;
pub mod transaction;

pub use assignment::SqlAssigneeDirectory;
pub use document::SqlDocumentStore;
pub use process::SqlProcessDirectory;
pub use task::SqlTaskBoard;
pub use transaction::SqlTransactionLedger;

pub(crate) fn backend(error: sqlx::Error) -> StoreError {
    StoreError::Backend(error.to_string())
}

pub(crate) fn decode(message: impl Into<String>) -> StoreError {
    StoreError::Decode(message.into())
}

pub(crate) fn parse_timestamp(raw: &str, column: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|error| decode(format!("column `{column}`: {error}")))
}
