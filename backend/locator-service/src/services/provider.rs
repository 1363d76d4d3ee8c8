//! Collaborator contracts the query engine reads restaurant records through.
//!
//! Implementations own persistence; the engine only ever reads. Every call may
//! fail independently and the orchestrators treat each failure as "nothing in
//! that partition".
use crate::error::ProviderResult;
use crate::models::RestaurantCandidate;
use async_trait::async_trait;

/// Partition-scoped lookup: every record whose bucket key is `cell`.
#[async_trait]
pub trait RecordsByCell: Send + Sync {
    async fn records_by_cell(&self, cell: &str) -> ProviderResult<Vec<RestaurantCandidate>>;
}

/// Secondary index: member record ids for a canonical category key.
#[async_trait]
pub trait MemberIdsByCategory: Send + Sync {
    async fn member_ids(&self, category_key: &str) -> ProviderResult<Vec<String>>;
}

/// Point lookup. `Ok(None)` means the record does not exist.
#[async_trait]
pub trait RecordById: Send + Sync {
    async fn record_by_id(&self, id: &str) -> ProviderResult<Option<RestaurantCandidate>>;
}

/// Full scan, used by free-text search.
#[async_trait]
pub trait RecordScan: Send + Sync {
    async fn scan_records(&self) -> ProviderResult<Vec<RestaurantCandidate>>;
}
