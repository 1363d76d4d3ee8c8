//! JSON-lines request handling.
//!
//! One request object per line in, one envelope per line out:
//!
//! ```text
//! {"op":"nearby","lat":40.4168,"lon":-3.7038,"limit":5}
//! {"op":"cuisine","cuisine":"burgers","lat":40.4168,"lon":-3.7038}
//! {"op":"search","q":"pizza"}
//! {"op":"detail","id":"r1"}
//! ```
use crate::config::Config;
use crate::error::LocatorError;
use crate::models::{Coordinate, RankedResult};
use crate::services::fanout::CancelSignal;
use crate::services::provider::{MemberIdsByCategory, RecordById, RecordScan, RecordsByCell};
use crate::services::{CatalogLookup, CategoryQuery, ProximityQuery};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Restaurants nearest to a point
    Nearby {
        lat: f64,
        lon: f64,
        #[serde(default)]
        limit: Option<usize>,
        /// Overrides the configured cell precision for this request
        #[serde(default)]
        precision: Option<usize>,
    },

    /// Members of a cuisine, ranked by distance when a point is given
    Cuisine {
        cuisine: String,
        #[serde(default)]
        lat: Option<f64>,
        #[serde(default)]
        lon: Option<f64>,
        #[serde(default)]
        limit: Option<usize>,
    },

    /// Name or cuisine substring search
    Search {
        #[serde(default)]
        q: String,
        #[serde(default)]
        limit: Option<usize>,
    },

    /// Single restaurant by id
    Detail { id: String },
}

#[derive(Debug, Error, PartialEq)]
pub enum ApiError {
    #[error("Malformed request: {0}")]
    Malformed(String),

    #[error("lat and lon must be given together")]
    PartialCoordinate,

    #[error("Restaurant not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Invalid(#[from] LocatorError),

    #[error("Response serialization failed: {0}")]
    Serialization(String),
}

/// Response line written for every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Envelope {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(error: impl ToString) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
        }
    }
}

/// The query engine wired to one record backend.
pub struct Locator {
    config: Config,
    proximity: ProximityQuery,
    category: CategoryQuery,
    lookup: CatalogLookup,
    shutdown: Option<CancelSignal>,
}

impl Locator {
    pub fn new<S>(config: Config, backend: Arc<S>) -> Result<Self, LocatorError>
    where
        S: RecordsByCell + MemberIdsByCategory + RecordById + RecordScan + 'static,
    {
        config.validate()?;
        let settings = config.engine_settings();
        let timeout = settings.fanout.timeout;

        Ok(Self {
            proximity: ProximityQuery::new(backend.clone(), settings.clone()),
            category: CategoryQuery::new(
                backend.clone(),
                backend.clone(),
                config.aliases()?,
                settings,
            ),
            lookup: CatalogLookup::new(backend.clone(), backend, timeout),
            config,
            shutdown: None,
        })
    }

    /// Queries observe `signal` and return partial results once it fires.
    pub fn with_shutdown(mut self, signal: CancelSignal) -> Self {
        self.shutdown = Some(signal);
        self
    }

    /// Handle one raw request line and return the envelope as a JSON line
    /// (without the trailing newline).
    pub async fn handle_line(&self, line: &str) -> String {
        let envelope = match serde_json::from_str::<Request>(line) {
            Ok(request) => self.respond(request).await,
            Err(e) => {
                debug!(error = %e, "Rejected malformed request");
                Envelope::error(ApiError::Malformed(e.to_string()))
            }
        };

        serde_json::to_string(&envelope).unwrap_or_else(|e| {
            warn!(error = %e, "Envelope serialization failed");
            r#"{"success":false,"error":"response serialization failed"}"#.to_string()
        })
    }

    pub async fn respond(&self, request: Request) -> Envelope {
        match self.handle(request).await {
            Ok(data) => Envelope::ok(data),
            Err(e) => Envelope::error(e),
        }
    }

    pub async fn handle(&self, request: Request) -> Result<Value, ApiError> {
        let cancel = self.shutdown.as_ref();

        match request {
            Request::Nearby {
                lat,
                lon,
                limit,
                precision,
            } => {
                let origin = Coordinate::new(lat, lon)?;
                let precision = precision.unwrap_or(self.config.geohash_precision);
                let output = self
                    .proximity
                    .query_nearby_with(origin, self.config.clamp_limit(limit), precision, cancel)
                    .await?;
                results_value(&output.results)
            }
            Request::Cuisine {
                cuisine,
                lat,
                lon,
                limit,
            } => {
                let origin = match (lat, lon) {
                    (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)?),
                    (None, None) => None,
                    _ => return Err(ApiError::PartialCoordinate),
                };
                let output = self
                    .category
                    .query_by_category_with(&cuisine, origin, self.config.clamp_limit(limit), cancel)
                    .await?;
                results_value(&output.results)
            }
            Request::Search { q, limit } => {
                let results = self
                    .lookup
                    .search_text(&q, self.config.clamp_limit(limit))
                    .await;
                results_value(&results)
            }
            Request::Detail { id } => match self.lookup.detail(&id).await? {
                Some(restaurant) => serde_json::to_value(restaurant)
                    .map_err(|e| ApiError::Serialization(e.to_string())),
                None => Err(ApiError::NotFound(id.trim().to_string())),
            },
        }
    }
}

fn results_value(results: &[RankedResult]) -> Result<Value, ApiError> {
    serde_json::to_value(results).map_err(|e| ApiError::Serialization(e.to_string()))
}
