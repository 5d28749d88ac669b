use log::{debug, warn};

use std::fmt;
use std::sync::Arc;

use crate::config::SamplerConfig;
use crate::connection::{
    ConnectionCache, QUERY_LANGUAGE, WBEM_FLAG_FORWARD_ONLY, WBEM_FLAG_RETURN_IMMEDIATELY,
    WBEM_FLAG_USE_AMENDED_QUALIFIERS,
};
use crate::error::Error;
use crate::query::build_query;
use crate::results::{parse_rows, CounterTypeCache, Item, Sample};

/// Samples one WMI class, holding the previous/current sample pair taken
/// from raw performance classes so new values can be computed downstream.
///
/// Driven by a single caller: one [`sample`](WmiSampler::sample) per poll
/// cycle, then iteration to read the items. The sampler never computes
/// rates itself; for raw classes it pairs each current item with its
/// previous counterpart and exposes the cached per-property counter type,
/// which together are the ingredients a counter-type calculator needs.
pub struct WmiSampler {
    config: SamplerConfig,
    is_raw_performance_class: bool,
    connections: Arc<ConnectionCache>,
    counter_types: Option<CounterTypeCache>,
    current: Sample,
    previous: Sample,
}

impl WmiSampler {
    pub fn new(mut config: SamplerConfig, connections: Arc<ConnectionCache>) -> Self {
        let is_raw_performance_class = config.is_raw_performance_class();

        if is_raw_performance_class {
            config.append_raw_performance_properties();
        }

        Self {
            config,
            is_raw_performance_class,
            connections,
            counter_types: None,
            current: Sample::new(),
            previous: Sample::new(),
        }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Whether the sampled class exposes cumulative counters.
    pub fn is_raw_performance_class(&self) -> bool {
        self.is_raw_performance_class
    }

    /// Compute a new sample.
    ///
    /// Shifts the current sample into the previous slot and queries a fresh
    /// one. For raw performance classes with no previous sample yet, a
    /// bootstrap query runs first so the very first visible sample already
    /// has a partner to compute rates against.
    ///
    /// A failed query degrades to an empty sample; only connection
    /// establishment failures are returned as errors.
    pub async fn sample(&mut self) -> Result<(), Error> {
        if self.is_raw_performance_class && self.previous.is_empty() {
            debug!("querying for initial sample for raw performance counter");
            self.current = self.query().await?;
        }

        self.previous = std::mem::take(&mut self.current);
        self.current = self.query().await?;

        debug!("sample: {:?}", self.current);

        Ok(())
    }

    /// The counter type cached for a property from the first query's
    /// qualifiers, if the property is a counter at all.
    pub fn counter_type(&self, property: &str) -> Option<u32> {
        self.counter_types.as_ref()?.get(property).copied().flatten()
    }

    /// Number of items in the current sample.
    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    pub fn current_sample(&self) -> &Sample {
        &self.current
    }

    pub fn previous_sample(&self) -> &Sample {
        &self.previous
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            sampler: self,
            index: 0,
        }
    }

    async fn query(&mut self) -> Result<Sample, Error> {
        let wql = build_query(
            self.config.class_name(),
            self.config.properties(),
            self.config.filters(),
        );
        debug!("querying WMI: {wql}");

        let mut flags = WBEM_FLAG_RETURN_IMMEDIATELY | WBEM_FLAG_FORWARD_ONLY;

        // the first query fetches the qualifiers to determine each
        // property's CounterType; the cache never leaves the fetched state
        // afterwards, even if this query fails
        let fetch_qualifiers = self.counter_types.is_none();
        if fetch_qualifiers {
            flags |= WBEM_FLAG_USE_AMENDED_QUALIFIERS;
        }
        let counter_types = self.counter_types.get_or_insert_with(CounterTypeCache::new);

        let connection = self
            .connections
            .get(
                self.config.host(),
                self.config.namespace(),
                self.config.username(),
                self.config.password(),
            )
            .await?;

        match connection.exec_query(&wql, QUERY_LANGUAGE, flags).await {
            Ok(rows) => Ok(parse_rows(
                rows,
                self.config.properties(),
                counter_types,
                fetch_qualifiers,
                self.config.class_name(),
            )),
            Err(error) => {
                warn!("failed to execute WMI query ({wql}): {error}");
                Ok(Sample::new())
            }
        }
    }
}

/// A current item, paired with its previous counterpart when the class is
/// a raw performance class.
#[derive(Clone, Debug, PartialEq)]
pub struct SampledItem<'a> {
    pub current: &'a Item,
    pub previous: Option<&'a Item>,
}

pub struct Iter<'a> {
    sampler: &'a WmiSampler,
    index: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = SampledItem<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.sampler.current.get(self.index)?;

        // raw classes pair positionally with the previous sample and stop
        // at the shorter of the two
        let previous = if self.sampler.is_raw_performance_class {
            Some(self.sampler.previous.get(self.index)?)
        } else {
            None
        };

        self.index += 1;

        Some(SampledItem { current, previous })
    }
}

impl<'a> IntoIterator for &'a WmiSampler {
    type Item = SampledItem<'a>;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Equality is based on the current sample.
impl PartialEq<Sample> for WmiSampler {
    fn eq(&self, other: &Sample) -> bool {
        &self.current == other
    }
}

impl PartialEq<[Item]> for WmiSampler {
    fn eq(&self, other: &[Item]) -> bool {
        self.current.as_slice() == other
    }
}

/// Renders the current sample, for diagnostics.
impl fmt::Display for WmiSampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.current, f)
    }
}
