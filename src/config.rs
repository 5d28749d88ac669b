use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;

/// Marker identifying classes that expose cumulative (raw) counters, which
/// only make sense as a delta between two samples.
const RAW_PERFORMANCE_MARKER: &str = "_PERFRAWDATA_";

/// Metadata properties required to turn raw counter deltas into rates.
/// Only the Sys100NS pair is requested; the PerfTime and Object variants
/// are unused and left out of the query.
pub const TIMESTAMP_PROPERTY: &str = "Timestamp_Sys100NS";
pub const FREQUENCY_PROPERTY: &str = "Frequency_Sys100NS";

fn host() -> String {
    "localhost".to_string()
}

fn namespace() -> String {
    "root\\cimv2".to_string()
}

/// One `property = 'value'` conjunct of a WHERE clause.
///
/// Deserializes from a single-entry mapping (`[{"Name": "_Total"}]`), the
/// shape filters take in monitoring configuration files.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, String>",
    into = "BTreeMap<String, String>"
)]
pub struct Filter {
    property: String,
    value: String,
}

impl Filter {
    pub fn new(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
        }
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl TryFrom<BTreeMap<String, String>> for Filter {
    type Error = String;

    fn try_from(mut map: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        let (property, value) = match map.pop_first() {
            Some(entry) => entry,
            None => return Err("filter must name a property".to_string()),
        };

        if !map.is_empty() {
            return Err(format!(
                "filter must hold a single property, found {} extra",
                map.len()
            ));
        }

        Ok(Self { property, value })
    }
}

impl From<Filter> for BTreeMap<String, String> {
    fn from(filter: Filter) -> Self {
        BTreeMap::from([(filter.property, filter.value)])
    }
}

/// Everything a sampler needs to know: the class and properties to query,
/// optional filters, and the connection target. Immutable once the sampler
/// is constructed.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SamplerConfig {
    #[serde(rename = "class")]
    class_name: String,
    properties: Vec<String>,
    #[serde(default)]
    filters: Vec<Filter>,
    #[serde(default = "host")]
    host: String,
    #[serde(default = "namespace")]
    namespace: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

impl SamplerConfig {
    pub fn new(
        class_name: impl Into<String>,
        properties: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            properties: properties.into_iter().map(Into::into).collect(),
            filters: Vec::new(),
            host: host(),
            namespace: namespace(),
            username: String::new(),
            password: String::new(),
        }
    }

    pub fn with_filters(mut self, filters: Vec<Filter>) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn properties(&self) -> &[String] {
        &self.properties
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Whether the class exposes cumulative counters that need the
    /// previous/current sample pair to compute rates.
    pub fn is_raw_performance_class(&self) -> bool {
        self.class_name.to_uppercase().contains(RAW_PERFORMANCE_MARKER)
    }

    /// Add the timestamp and frequency metadata properties raw counter
    /// calculations require. Idempotent, so the properties appear exactly
    /// once no matter how the config was produced.
    pub(crate) fn append_raw_performance_properties(&mut self) {
        for name in [TIMESTAMP_PROPERTY, FREQUENCY_PROPERTY] {
            if !self.properties.iter().any(|p| p.eq_ignore_ascii_case(name)) {
                self.properties.push(name.to_string());
            }
        }
    }
}
