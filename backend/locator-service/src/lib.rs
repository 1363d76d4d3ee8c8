pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod store;

pub use api::{Envelope, Locator, Request};
pub use config::{Config, EngineSettings};
pub use error::{LocatorError, ProviderError, StoreError};
pub use services::{CatalogLookup, CategoryQuery, CuisineAliases, ProximityQuery};
pub use store::InMemoryStore;
