//! In-memory restaurant store.
//!
//! Keeps records partitioned the same way the persistent tables are: one
//! partition per geohash cell plus a cuisine secondary index. Serves the
//! provider contracts for the binary and for tests.
pub mod keys;

use crate::error::{LocatorError, ProviderResult, StoreError};
use crate::models::{Coordinate, RestaurantCandidate};
use crate::services::geo::GeohashCodec;
use crate::services::provider::{MemberIdsByCategory, RecordById, RecordScan, RecordsByCell};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use tracing::{debug, info};

pub use keys::{cuisine_index_keys, partition_key_for};

/// Where a record is currently indexed.
#[derive(Debug, Clone, Default)]
struct Placement {
    cell: Option<String>,
    cuisines: Vec<String>,
}

pub struct InMemoryStore {
    codec: GeohashCodec,
    precision: usize,
    records: DashMap<String, RestaurantCandidate>,
    cells: DashMap<String, Vec<String>>,
    cuisines: DashMap<String, Vec<String>>,
    placements: DashMap<String, Placement>,
    /// Insertion order, for deterministic scans
    order: RwLock<Vec<String>>,
    /// Serializes writers so the indexes move together
    writer: Mutex<()>,
}

impl InMemoryStore {
    pub fn new(codec: GeohashCodec, precision: usize) -> Self {
        Self {
            codec,
            precision,
            records: DashMap::new(),
            cells: DashMap::new(),
            cuisines: DashMap::new(),
            placements: DashMap::new(),
            order: RwLock::new(Vec::new()),
            writer: Mutex::new(()),
        }
    }

    pub fn from_records(
        codec: GeohashCodec,
        precision: usize,
        records: impl IntoIterator<Item = RestaurantCandidate>,
    ) -> Result<Self, StoreError> {
        let store = Self::new(codec, precision);
        for record in records {
            store.upsert(record)?;
        }
        Ok(store)
    }

    /// Seed from a JSON array of restaurant records. Returns the number loaded.
    pub async fn load_json(&self, path: impl AsRef<Path>) -> Result<usize, StoreError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await?;
        let loaded = self.load_json_str(&raw)?;
        info!(path = %path.display(), loaded, "Seeded restaurant store");
        Ok(loaded)
    }

    pub fn load_json_str(&self, raw: &str) -> Result<usize, StoreError> {
        let records: Vec<RestaurantCandidate> = serde_json::from_str(raw)?;
        let count = records.len();
        for record in records {
            self.upsert(record)?;
        }
        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert or replace a record, moving it between cell and cuisine
    /// partitions when its coordinate or cuisines changed.
    ///
    /// Records without a coordinate are stored but belong to no cell.
    pub fn upsert(&self, mut record: RestaurantCandidate) -> Result<(), StoreError> {
        record.id = record.id.trim().to_string();
        if record.id.is_empty() {
            return Err(StoreError::InvalidRecord {
                id: record.id,
                source: LocatorError::EmptyIdentifier,
            });
        }

        let placement = self.placement_for(&record).map_err(|source| StoreError::InvalidRecord {
            id: record.id.clone(),
            source,
        })?;

        let _guard = self.writer.lock();
        let id = record.id.clone();

        if let Some((_, previous)) = self.placements.remove(&id) {
            self.unindex(&id, &previous);
        } else {
            self.order.write().push(id.clone());
        }

        if let Some(cell) = &placement.cell {
            self.cells.entry(cell.clone()).or_default().push(id.clone());
        }
        for cuisine in &placement.cuisines {
            self.cuisines
                .entry(cuisine.clone())
                .or_default()
                .push(id.clone());
        }

        debug!(id = %id, cell = ?placement.cell, cuisines = ?placement.cuisines, "Record indexed");
        self.placements.insert(id.clone(), placement);
        self.records.insert(id, record);
        Ok(())
    }

    fn placement_for(&self, record: &RestaurantCandidate) -> Result<Placement, LocatorError> {
        let cell = match (record.lat, record.lon) {
            (Some(lat), Some(lon)) => {
                let location = Coordinate::new(lat, lon)?;
                Some(partition_key_for(&self.codec, &location, self.precision)?)
            }
            _ => None,
        };
        let cuisines = record
            .cuisines
            .as_deref()
            .map(cuisine_index_keys)
            .unwrap_or_default();

        Ok(Placement { cell, cuisines })
    }

    fn unindex(&self, id: &str, placement: &Placement) {
        if let Some(cell) = &placement.cell {
            remove_member(&self.cells, cell, id);
        }
        for cuisine in &placement.cuisines {
            remove_member(&self.cuisines, cuisine, id);
        }
    }
}

fn remove_member(index: &DashMap<String, Vec<String>>, key: &str, id: &str) {
    if let Some(mut members) = index.get_mut(key) {
        members.retain(|member| member != id);
    }
    index.remove_if(key, |_, members| members.is_empty());
}

#[async_trait]
impl RecordsByCell for InMemoryStore {
    async fn records_by_cell(&self, cell: &str) -> ProviderResult<Vec<RestaurantCandidate>> {
        let ids = self
            .cells
            .get(cell)
            .map(|ids| ids.value().clone())
            .unwrap_or_default();

        Ok(ids
            .iter()
            .filter_map(|id| self.records.get(id).map(|r| r.value().clone()))
            .collect())
    }
}

#[async_trait]
impl MemberIdsByCategory for InMemoryStore {
    async fn member_ids(&self, category_key: &str) -> ProviderResult<Vec<String>> {
        Ok(self
            .cuisines
            .get(category_key)
            .map(|ids| ids.value().clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl RecordById for InMemoryStore {
    async fn record_by_id(&self, id: &str) -> ProviderResult<Option<RestaurantCandidate>> {
        Ok(self.records.get(id).map(|r| r.value().clone()))
    }
}

#[async_trait]
impl RecordScan for InMemoryStore {
    async fn scan_records(&self) -> ProviderResult<Vec<RestaurantCandidate>> {
        let order = self.order.read().clone();
        Ok(order
            .iter()
            .filter_map(|id| self.records.get(id).map(|r| r.value().clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemoryStore {
        InMemoryStore::new(GeohashCodec::new(), 6)
    }

    fn record(id: &str, lat: f64, lon: f64, cuisines: &str) -> RestaurantCandidate {
        RestaurantCandidate {
            id: id.to_string(),
            name: Some(format!("Restaurant {}", id)),
            lat: Some(lat),
            lon: Some(lon),
            cuisines: Some(cuisines.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_upsert_indexes_cell_and_cuisines() {
        let store = store();
        store
            .upsert(record("r1", 40.4168, -3.7038, "Hamburguesas, americana"))
            .unwrap();

        let in_cell = store.records_by_cell("ezjmgt").await.unwrap();
        assert_eq!(in_cell.len(), 1);
        assert_eq!(store.member_ids("hamburguesas").await.unwrap(), vec!["r1"]);
        assert_eq!(store.member_ids("americana").await.unwrap(), vec!["r1"]);
        assert!(store.member_ids("Hamburguesas").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_moves_record_between_partitions() {
        let store = store();
        store.upsert(record("r1", 40.4168, -3.7038, "pizza")).unwrap();
        store.upsert(record("r1", 40.4200, -3.7100, "sushi")).unwrap();

        assert!(store.records_by_cell("ezjmgt").await.unwrap().is_empty());
        assert_eq!(store.records_by_cell("ezjmgw").await.unwrap().len(), 1);
        assert!(store.member_ids("pizza").await.unwrap().is_empty());
        assert_eq!(store.member_ids("sushi").await.unwrap(), vec!["r1"]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.scan_records().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_records_without_coordinates_have_no_cell() {
        let store = store();
        store
            .upsert(RestaurantCandidate {
                id: "r9".into(),
                cuisines: Some("poke".into()),
                ..Default::default()
            })
            .unwrap();

        assert!(store.cells.is_empty());
        assert_eq!(store.member_ids("poke").await.unwrap(), vec!["r9"]);
        assert!(store.record_by_id("r9").await.unwrap().is_some());
    }

    #[test]
    fn test_upsert_rejects_invalid_records() {
        let store = store();
        assert!(matches!(
            store.upsert(record(" ", 1.0, 1.0, "")),
            Err(StoreError::InvalidRecord {
                source: LocatorError::EmptyIdentifier,
                ..
            })
        ));
        assert!(matches!(
            store.upsert(record("bad", 95.0, 1.0, "")),
            Err(StoreError::InvalidRecord {
                source: LocatorError::InvalidLatitude(_),
                ..
            })
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_json_str() {
        let store = store();
        let raw = r#"[
            {"id": "r1", "name": "Goiko", "lat": 40.42, "lon": -3.71, "cuisines": "hamburguesas"},
            {"id": "r2", "name": "Sin coordenadas"}
        ]"#;
        assert_eq!(store.load_json_str(raw).unwrap(), 2);
        assert_eq!(store.len(), 2);

        let scanned = tokio_test::block_on(store.scan_records()).unwrap();
        assert_eq!(scanned[1].display_name(), "Sin coordenadas");
        assert_eq!(
            tokio_test::block_on(store.records_by_cell("ezjmgw")).unwrap()[0].id,
            "r1"
        );

        assert!(matches!(
            store.load_json_str("{not json"),
            Err(StoreError::Serialization(_))
        ));
    }
}
