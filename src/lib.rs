//! Time series catalog resolution service.
//!
//! Resolves structured time series identifiers against a remote catalog,
//! disambiguates each to exactly one catalog entry, and produces normalized
//! series whose timestamps follow the interval-ending convention regardless
//! of the source system's native stamping.

pub mod align;
pub mod catalog;
pub mod config;
pub mod datastore;
pub mod ident;
pub mod interval;
pub mod logging;
pub mod model;
pub mod query;
pub mod requirement;
pub mod store;
pub mod time;
pub mod transport;

pub use catalog::CatalogEntry;
pub use datastore::{NormalizedTimeSeries, TimeSeriesDatastore};
pub use ident::{AlignmentOptions, RequestedIdentifier};
pub use model::CatalogError;
pub use store::CatalogStore;
