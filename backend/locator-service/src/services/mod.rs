pub mod category;
pub mod fanout;
pub mod geo;
pub mod lookup;
pub mod provider;
pub mod proximity;
pub mod ranking;

pub use category::{CategoryQuery, CuisineAliases};
pub use fanout::{cancel_pair, CancelHandle, CancelSignal, FanOutConfig};
pub use lookup::CatalogLookup;
pub use proximity::ProximityQuery;
