//! Sampling engine for WMI performance counters.
//!
//! Connects to a WMI instrumentation service, issues WQL queries against a
//! class/property schema, and keeps the previous/current sample pair needed
//! to derive rates from cumulative (raw) counters. Formatted performance
//! classes are sampled as-is; raw classes get a bootstrap query so a rate
//! can be computed from the very first visible sample.
//!
//! The service sits behind the [`Locator`] and [`Connection`] traits so
//! transports and test doubles can be swapped in. Rate math itself is left
//! to a downstream counter-type calculator: this crate guarantees it the
//! right ingredients, namely the current item, the matching previous item
//! with its timestamp/frequency metadata, and the cached per-property
//! counter type.

pub mod config;
pub mod connection;
pub mod error;
pub mod query;
pub mod results;
pub mod sampler;

pub use config::{Filter, SamplerConfig, FREQUENCY_PROPERTY, TIMESTAMP_PROPERTY};
pub use connection::{Connection, ConnectionCache, ConnectionKey, Locator, Property, Qualifier, Row};
pub use error::Error;
pub use results::{CaseInsensitiveMap, CounterTypeCache, Item, Sample, Value};
pub use sampler::{SampledItem, WmiSampler};
