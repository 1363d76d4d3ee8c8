use crate::config::EngineSettings;
use crate::error::Result;
use crate::models::{Coordinate, QueryOutput, QueryStats, RankedResult};
use crate::services::fanout::{fan_out, CancelSignal};
use crate::services::geo::neighbors;
use crate::services::provider::RecordsByCell;
use crate::services::ranking::{annotate, sort_by_distance};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Nearby search: scan the user's cell and its neighbors, rank by distance.
///
/// Only the 3x3 neighborhood is ever scanned. With a large `limit` the true
/// nearest restaurants can sit in a cell just outside it and will be missed.
pub struct ProximityQuery {
    provider: Arc<dyn RecordsByCell>,
    settings: EngineSettings,
}

impl ProximityQuery {
    pub fn new(provider: Arc<dyn RecordsByCell>, settings: EngineSettings) -> Self {
        Self { provider, settings }
    }

    /// Nearest restaurants to `origin`, at most `limit` of them.
    pub async fn query_nearby(&self, origin: Coordinate, limit: usize) -> Result<QueryOutput> {
        self.query_nearby_with(origin, limit, self.settings.precision, None)
            .await
    }

    /// As [`query_nearby`](Self::query_nearby) with an explicit cell precision
    /// and an optional cancellation signal.
    pub async fn query_nearby_with(
        &self,
        origin: Coordinate,
        limit: usize,
        precision: usize,
        cancel: Option<&CancelSignal>,
    ) -> Result<QueryOutput> {
        let codec = &self.settings.codec;
        let user_cell = codec.encode(&origin, precision)?;
        let cells = neighbors(codec, &user_cell)?;

        debug!(
            user_cell = %user_cell,
            cells = ?cells,
            "Scanning neighbor cells"
        );

        let provider = &self.provider;
        let report = fan_out(cells, &self.settings.fanout, cancel, |cell: String| async move {
            provider.records_by_cell(&cell).await
        })
        .await;

        let mut stats = QueryStats {
            partitions_queried: report.slots.len(),
            partitions_failed: report.failed(),
            cancelled: report.cancelled,
            ..Default::default()
        };

        let mut results: Vec<RankedResult> = Vec::new();
        for (cell, outcome) in report.slots {
            let candidates = match outcome {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!(cell = %cell, error = %e, "Cell scan failed; skipping partition");
                    continue;
                }
            };

            debug!(cell = %cell, count = candidates.len(), "Cell scanned");
            stats.candidates_seen += candidates.len();

            for candidate in candidates {
                match annotate(candidate, &origin, &self.settings.eta) {
                    Ok(ranked) => results.push(ranked),
                    Err(_) => stats.candidates_without_coordinates += 1,
                }
            }
        }

        sort_by_distance(&mut results);
        results.truncate(limit);
        stats.returned = results.len();

        info!(
            user_cell = %user_cell,
            cells = stats.partitions_queried,
            failed_cells = stats.partitions_failed,
            candidates = stats.candidates_seen,
            returned = stats.returned,
            cancelled = stats.cancelled,
            "Nearby query completed"
        );

        Ok(QueryOutput { results, stats })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LocatorError, ProviderError, ProviderResult};
    use crate::models::RestaurantCandidate;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Cell -> records map; cells listed in `failing` return an error.
    struct FixedCells {
        cells: HashMap<String, Vec<RestaurantCandidate>>,
        failing: Vec<String>,
    }

    #[async_trait]
    impl RecordsByCell for FixedCells {
        async fn records_by_cell(&self, cell: &str) -> ProviderResult<Vec<RestaurantCandidate>> {
            if self.failing.iter().any(|c| c == cell) {
                return Err(ProviderError::Unavailable(format!("{} offline", cell)));
            }
            Ok(self.cells.get(cell).cloned().unwrap_or_default())
        }
    }

    fn restaurant(id: &str, lat: f64, lon: f64) -> RestaurantCandidate {
        RestaurantCandidate {
            id: id.to_string(),
            name: Some(id.to_string()),
            lat: Some(lat),
            lon: Some(lon),
            ..Default::default()
        }
    }

    fn provider(records: Vec<RestaurantCandidate>, failing: &[&str]) -> Arc<FixedCells> {
        let codec = crate::services::geo::GeohashCodec::new();
        let mut cells: HashMap<String, Vec<RestaurantCandidate>> = HashMap::new();
        for record in records {
            let cell = codec
                .encode_lat_lon(record.lat.unwrap(), record.lon.unwrap(), 6)
                .unwrap();
            cells.entry(cell).or_default().push(record);
        }
        Arc::new(FixedCells {
            cells,
            failing: failing.iter().map(|c| c.to_string()).collect(),
        })
    }

    fn origin() -> Coordinate {
        Coordinate::new(40.4168, -3.7038).unwrap()
    }

    fn single_cell(cell: &str, records: Vec<RestaurantCandidate>) -> Arc<FixedCells> {
        let mut cells = HashMap::new();
        cells.insert(cell.to_string(), records);
        Arc::new(FixedCells {
            cells,
            failing: Vec::new(),
        })
    }

    #[tokio::test]
    async fn test_nearby_returns_nearest_within_limit() {
        // ~100m, ~5km and ~50km north of the origin, all bucketed in the user's cell
        let records = vec![
            restaurant("far", 40.8665, -3.7038),
            restaurant("near", 40.4177, -3.7038),
            restaurant("mid", 40.4618, -3.7038),
        ];
        let query = ProximityQuery::new(single_cell("ezjmgt", records), EngineSettings::default());

        let output = query.query_nearby(origin(), 2).await.unwrap();
        let ids: Vec<_> = output.results.iter().map(|r| r.restaurant.id.as_str()).collect();

        assert_eq!(ids, vec!["near", "mid"]);
        assert_eq!(output.results[0].distance_m, Some(100));
        let mid = output.results[1].distance_m.unwrap();
        assert!((4_950..=5_050).contains(&mid), "got {}", mid);
        assert_eq!(output.stats.returned, 2);
        assert_eq!(output.stats.candidates_seen, 3);
    }

    #[tokio::test]
    async fn test_nearby_merges_neighbor_cells() {
        let records = vec![
            restaurant("east", 40.4168, -3.6950),  // ezjmgv, ~745m
            restaurant("north", 40.4230, -3.7038), // ezjmgw, ~689m
            restaurant("home", 40.4177, -3.7038),  // ezjmgt, ~100m
        ];
        let query = ProximityQuery::new(provider(records, &[]), EngineSettings::default());

        let output = query.query_nearby(origin(), 10).await.unwrap();
        let ids: Vec<_> = output.results.iter().map(|r| r.restaurant.id.as_str()).collect();

        assert_eq!(ids, vec!["home", "north", "east"]);
        assert_eq!(output.stats.partitions_queried, 9);
        assert_eq!(output.stats.partitions_failed, 0);
    }

    #[tokio::test]
    async fn test_nearby_skips_failing_cell() {
        let records = vec![
            restaurant("home", 40.4168, -3.7038),   // ezjmgt
            restaurant("across", 40.4200, -3.7100), // ezjmgw
        ];
        let query = ProximityQuery::new(provider(records, &["ezjmgw"]), EngineSettings::default());

        let output = query.query_nearby(origin(), 10).await.unwrap();

        assert_eq!(output.results.len(), 1);
        assert_eq!(output.results[0].restaurant.id, "home");
        assert_eq!(output.stats.partitions_queried, 9);
        assert_eq!(output.stats.partitions_failed, 1);
    }

    #[tokio::test]
    async fn test_nearby_drops_records_without_coordinates() {
        let records = vec![
            restaurant("ok", 40.4168, -3.7040),
            RestaurantCandidate {
                id: "no-coords".into(),
                ..Default::default()
            },
        ];
        let query = ProximityQuery::new(single_cell("ezjmgt", records), EngineSettings::default());

        let output = query.query_nearby(origin(), 10).await.unwrap();
        assert_eq!(output.results.len(), 1);
        assert_eq!(output.stats.candidates_without_coordinates, 1);
    }

    #[tokio::test]
    async fn test_nearby_ignores_records_outside_neighborhood() {
        let records = vec![
            // ~900m north but in ezjmgx, one row past the 3x3 block
            restaurant("just-outside", 40.4249, -3.7038),
            restaurant("bcn", 41.3874, 2.1686),
        ];
        let query = ProximityQuery::new(provider(records, &[]), EngineSettings::default());

        let output = query.query_nearby(origin(), 100).await.unwrap();
        assert!(output.results.is_empty());
    }

    #[tokio::test]
    async fn test_nearby_rejects_invalid_precision() {
        let query = ProximityQuery::new(provider(Vec::new(), &[]), EngineSettings::default());
        let err = query
            .query_nearby_with(origin(), 10, 0, None)
            .await
            .unwrap_err();
        assert_eq!(err, LocatorError::InvalidPrecision(0));
    }

    #[tokio::test]
    async fn test_nearby_ties_keep_cell_order() {
        let records = vec![
            restaurant("first", 40.4170, -3.7038),
            restaurant("second", 40.4170, -3.7038),
        ];
        let query = ProximityQuery::new(single_cell("ezjmgt", records), EngineSettings::default());

        for _ in 0..5 {
            let output = query.query_nearby(origin(), 10).await.unwrap();
            let ids: Vec<_> = output.results.iter().map(|r| r.restaurant.id.as_str()).collect();
            assert_eq!(ids, vec!["first", "second"]);
        }
    }
}
