use crate::error::{LocatorError, ProviderError, Result};
use crate::models::{RankedResult, RestaurantCandidate};
use crate::services::provider::{RecordById, RecordScan};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Single-record detail and free-text search over the whole catalog.
pub struct CatalogLookup {
    records: Arc<dyn RecordById>,
    scan: Arc<dyn RecordScan>,
    timeout: Duration,
}

impl CatalogLookup {
    pub fn new(records: Arc<dyn RecordById>, scan: Arc<dyn RecordScan>, timeout: Duration) -> Self {
        Self {
            records,
            scan,
            timeout,
        }
    }

    /// Restaurant by id. A failed lookup is logged and reported as absent.
    pub async fn detail(&self, id: &str) -> Result<Option<RestaurantCandidate>> {
        let id = id.trim();
        if id.is_empty() {
            return Err(LocatorError::EmptyIdentifier);
        }

        let outcome = match tokio::time::timeout(self.timeout, self.records.record_by_id(id)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ProviderError::Timeout(self.timeout)),
        };

        match outcome {
            Ok(record) => Ok(record),
            Err(e) => {
                warn!(id = %id, error = %e, "Restaurant detail lookup failed");
                Ok(None)
            }
        }
    }

    /// Restaurants whose name or cuisines contain `query` (case-insensitive),
    /// in scan order, at most `limit`. An empty query matches everything.
    ///
    /// Text matches carry no distance or ETA.
    pub async fn search_text(&self, query: &str, limit: usize) -> Vec<RankedResult> {
        let needle = query.trim().to_lowercase();

        let records = match tokio::time::timeout(self.timeout, self.scan.scan_records()).await {
            Ok(Ok(records)) => records,
            Ok(Err(e)) => {
                warn!(error = %e, "Catalog scan failed");
                return Vec::new();
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "Catalog scan timed out");
                return Vec::new();
            }
        };

        let results: Vec<RankedResult> = records
            .into_iter()
            .filter(|r| needle.is_empty() || matches_text(r, &needle))
            .take(limit)
            .map(RankedResult::unranked)
            .collect();

        info!(query = %needle, returned = results.len(), "Text search completed");
        results
    }
}

fn matches_text(record: &RestaurantCandidate, needle: &str) -> bool {
    let contains = |field: &Option<String>| {
        field
            .as_deref()
            .is_some_and(|value| value.to_lowercase().contains(needle))
    };
    contains(&record.name) || contains(&record.cuisines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderResult;
    use async_trait::async_trait;

    struct Catalog {
        records: Vec<RestaurantCandidate>,
        healthy: bool,
    }

    #[async_trait]
    impl RecordById for Catalog {
        async fn record_by_id(&self, id: &str) -> ProviderResult<Option<RestaurantCandidate>> {
            if !self.healthy {
                return Err(ProviderError::Unavailable("table offline".into()));
            }
            Ok(self.records.iter().find(|r| r.id == id).cloned())
        }
    }

    #[async_trait]
    impl RecordScan for Catalog {
        async fn scan_records(&self) -> ProviderResult<Vec<RestaurantCandidate>> {
            if !self.healthy {
                return Err(ProviderError::Unavailable("table offline".into()));
            }
            Ok(self.records.clone())
        }
    }

    fn lookup(healthy: bool) -> CatalogLookup {
        let record = |id: &str, name: &str, cuisines: &str| RestaurantCandidate {
            id: id.to_string(),
            name: Some(name.to_string()),
            cuisines: Some(cuisines.to_string()),
            ..Default::default()
        };
        let catalog = Arc::new(Catalog {
            records: vec![
                record("r1", "Goiko", "hamburguesas,americana"),
                record("r2", "La Tagliatella", "italiana,pizza"),
                record("r3", "Pizza Hut", "pizza"),
                record("r4", "Sushi Shop", "japonesa,sushi"),
            ],
            healthy,
        });
        CatalogLookup::new(catalog.clone(), catalog, Duration::from_secs(1))
    }

    fn ids(results: &[RankedResult]) -> Vec<&str> {
        results.iter().map(|r| r.restaurant.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_detail() {
        let lookup = lookup(true);
        let found = lookup.detail("r3").await.unwrap();
        assert_eq!(found.unwrap().display_name(), "Pizza Hut");
        assert_eq!(lookup.detail("missing").await.unwrap(), None);
        assert_eq!(lookup.detail(" ").await, Err(LocatorError::EmptyIdentifier));
    }

    #[tokio::test]
    async fn test_detail_provider_failure_reads_as_absent() {
        assert_eq!(lookup(false).detail("r1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_search_matches_name_or_cuisine() {
        let lookup = lookup(true);

        assert_eq!(ids(&lookup.search_text("PIZZA", 20).await), vec!["r2", "r3"]);
        assert_eq!(ids(&lookup.search_text("goi", 20).await), vec!["r1"]);
        assert_eq!(ids(&lookup.search_text("", 3).await), vec!["r1", "r2", "r3"]);
        assert!(lookup.search_text("tacos", 20).await.is_empty());

        let results = lookup.search_text("sushi", 20).await;
        assert!(results.iter().all(|r| r.distance_m.is_none()));
    }

    #[tokio::test]
    async fn test_search_stops_at_limit() {
        assert_eq!(ids(&lookup(true).search_text("pizza", 1).await), vec!["r2"]);
    }

    #[tokio::test]
    async fn test_search_scan_failure_is_empty() {
        assert!(lookup(false).search_text("pizza", 20).await.is_empty());
    }
}
