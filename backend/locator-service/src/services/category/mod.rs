use crate::config::EngineSettings;
use crate::error::{LocatorError, ProviderError, ProviderResult, Result};
use crate::models::{Coordinate, QueryOutput, QueryStats, RankedResult};
use crate::services::fanout::{fan_out, CancelSignal};
use crate::services::provider::{MemberIdsByCategory, RecordById};
use crate::services::ranking::{annotate, sort_by_distance, sort_by_name};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Public cuisine names mapped to the keys the cuisine index is written with.
const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("burgers", "hamburguesas"),
    ("chinese", "china"),
    ("mexican", "mexicana"),
    ("indian", "india"),
    ("thai", "tailandesa"),
    ("pizza", "pizza"),
    ("sushi", "sushi"),
    ("japanese", "japonesa"),
    ("italian", "italiana"),
    ("american", "americana"),
    ("spanish", "espanola"),
    ("kebab", "kebab"),
    ("poke", "poke"),
    ("chicken", "pollo"),
];

/// Case-insensitive alias table for category keys.
#[derive(Debug, Clone)]
pub struct CuisineAliases {
    map: HashMap<String, String>,
}

impl Default for CuisineAliases {
    fn default() -> Self {
        Self::from_pairs(DEFAULT_ALIASES.iter().copied())
    }
}

impl CuisineAliases {
    pub fn empty() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut aliases = Self::empty();
        for (alias, canonical) in pairs {
            aliases.insert(alias, canonical);
        }
        aliases
    }

    pub fn insert(&mut self, alias: &str, canonical: &str) {
        self.map.insert(
            alias.trim().to_lowercase(),
            canonical.trim().to_lowercase(),
        );
    }

    /// Merge `alias=canonical` pairs separated by commas.
    pub fn extend_from_list(&mut self, list: &str) -> Result<()> {
        for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let Some((alias, canonical)) = entry.split_once('=') else {
                return Err(LocatorError::Config(format!(
                    "cuisine alias {:?} is not alias=canonical",
                    entry
                )));
            };
            if alias.trim().is_empty() || canonical.trim().is_empty() {
                return Err(LocatorError::Config(format!(
                    "cuisine alias {:?} has an empty side",
                    entry
                )));
            }
            self.insert(alias, canonical);
        }
        Ok(())
    }

    /// Canonical index key for `key`; unmapped keys come back lower-cased.
    pub fn canonical(&self, key: &str) -> String {
        let normalized = key.trim().to_lowercase();
        match self.map.get(&normalized) {
            Some(canonical) => canonical.clone(),
            None => normalized,
        }
    }
}

/// Category search: resolve the members of a cuisine index entry, optionally
/// ranked by distance from the user.
pub struct CategoryQuery {
    index: Arc<dyn MemberIdsByCategory>,
    records: Arc<dyn RecordById>,
    aliases: CuisineAliases,
    settings: EngineSettings,
}

impl CategoryQuery {
    pub fn new(
        index: Arc<dyn MemberIdsByCategory>,
        records: Arc<dyn RecordById>,
        aliases: CuisineAliases,
        settings: EngineSettings,
    ) -> Self {
        Self {
            index,
            records,
            aliases,
            settings,
        }
    }

    pub async fn query_by_category(
        &self,
        category: &str,
        origin: Option<Coordinate>,
        limit: usize,
    ) -> Result<QueryOutput> {
        self.query_by_category_with(category, origin, limit, None)
            .await
    }

    /// Members of `category`, at most `limit`.
    ///
    /// With an origin, results are ordered by distance and records without a
    /// coordinate trail the rest. Without one, every result is unranked and
    /// ordered by name (case-insensitive), unnamed records last.
    pub async fn query_by_category_with(
        &self,
        category: &str,
        origin: Option<Coordinate>,
        limit: usize,
        cancel: Option<&CancelSignal>,
    ) -> Result<QueryOutput> {
        if category.trim().is_empty() {
            return Err(LocatorError::EmptyCategory);
        }
        let key = self.aliases.canonical(category);
        let mut stats = QueryStats::default();

        let ids = match self.member_ids(&key).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(category = %key, error = %e, "Category index lookup failed");
                stats.partitions_failed += 1;
                return Ok(QueryOutput {
                    results: Vec::new(),
                    stats,
                });
            }
        };
        debug!(category = %key, members = ids.len(), "Category members fetched");

        let records = &self.records;
        let report = fan_out(ids, &self.settings.fanout, cancel, |id: String| async move {
            records.record_by_id(&id).await
        })
        .await;

        stats.partitions_queried = report.slots.len();
        stats.partitions_failed += report.failed();
        stats.cancelled = report.cancelled;

        let mut results: Vec<RankedResult> = Vec::new();
        for (id, outcome) in report.slots {
            match outcome {
                Ok(Some(restaurant)) => {
                    stats.candidates_seen += 1;
                    let ranked = match origin.as_ref() {
                        Some(origin) => annotate(restaurant, origin, &self.settings.eta)
                            .unwrap_or_else(|unplaced| {
                                stats.candidates_without_coordinates += 1;
                                RankedResult::unranked(unplaced)
                            }),
                        None => RankedResult::unranked(restaurant),
                    };
                    results.push(ranked);
                }
                Ok(None) => debug!(id = %id, category = %key, "Indexed restaurant not found"),
                Err(e) => warn!(id = %id, error = %e, "Restaurant lookup failed; skipping"),
            }
        }

        sort_by_name(&mut results);
        if origin.is_some() {
            sort_by_distance(&mut results);
        }
        results.truncate(limit);
        stats.returned = results.len();

        info!(
            category = %key,
            members = stats.partitions_queried,
            failed = stats.partitions_failed,
            returned = stats.returned,
            ranked = origin.is_some(),
            cancelled = stats.cancelled,
            "Category query completed"
        );

        Ok(QueryOutput { results, stats })
    }

    /// Member ids in index order, duplicates dropped.
    async fn member_ids(&self, key: &str) -> ProviderResult<Vec<String>> {
        let budget = self.settings.fanout.timeout;
        let ids = match tokio::time::timeout(budget, self.index.member_ids(key)).await {
            Ok(result) => result?,
            Err(_) => return Err(ProviderError::Timeout(budget)),
        };

        let mut seen = HashSet::new();
        Ok(ids
            .into_iter()
            .filter(|id| !id.is_empty() && seen.insert(id.clone()))
            .collect())
    }
}
