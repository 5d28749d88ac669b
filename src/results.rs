use log::debug;
use serde::{Deserialize, Serialize};

use std::collections::HashMap;

use crate::connection::{Property, Row};

/// A property value as returned by the WMI service.
///
/// `Null` is the explicit marker for a property the service did not return;
/// every property declared on a sampler is present in every [`Item`], so
/// downstream code can detect a missing value without a lookup failure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Number(f64),
    Text(String),
}

impl Value {
    /// Numeric view of the value, if it has one. Textual values are parsed,
    /// matching how the service returns numeric counters as strings.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(t) => t.trim().parse().ok(),
            Value::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Coerce to a number where possible, keeping the original value
    /// unchanged otherwise. Some properties (names, paths) are legitimately
    /// non-numeric.
    pub(crate) fn coerced(self) -> Value {
        match self.as_f64() {
            Some(n) => Value::Number(n),
            None => self,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(t: &str) -> Self {
        Value::Text(t.to_string())
    }
}

impl From<String> for Value {
    fn from(t: String) -> Self {
        Value::Text(t)
    }
}

/// A mapping that lower-cases keys on every write, read, and containment
/// check. The service returns property names with inconsistent casing from
/// one query to the next.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "HashMap<String, V>")]
pub struct CaseInsensitiveMap<V>(HashMap<String, V>);

impl<V> CaseInsensitiveMap<V> {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn insert(&mut self, key: &str, value: V) -> Option<V> {
        self.0.insert(key.to_lowercase(), value)
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.get(&key.to_lowercase())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(&key.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &V)> {
        self.0.iter()
    }
}

impl<V> Default for CaseInsensitiveMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> From<HashMap<String, V>> for CaseInsensitiveMap<V> {
    fn from(map: HashMap<String, V>) -> Self {
        Self(
            map.into_iter()
                .map(|(key, value)| (key.to_lowercase(), value))
                .collect(),
        )
    }
}

/// One row of a sample: property name to [`Value`], case-insensitive.
pub type Item = CaseInsensitiveMap<Value>;

/// One full query result set, ordered as returned by the service.
pub type Sample = Vec<Item>;

/// Per-property counter-type classifications, cached from the service-side
/// qualifiers of the first query. An entry of `None` means the property was
/// inspected and carries no `CounterType` qualifier (names and timestamps
/// are not counters); it is never re-probed.
pub type CounterTypeCache = CaseInsensitiveMap<Option<u32>>;

/// Parse raw query rows into a [`Sample`].
///
/// Every declared property starts out [`Value::Null`] so missing properties
/// are visible rather than absent. When `fetch_qualifiers` is set, each
/// property's qualifiers are inspected once and its `CounterType` recorded
/// in `counter_types`; the caller only sets it on a sampler's first query,
/// so the qualifier path runs at most once per property.
pub(crate) fn parse_rows(
    rows: Vec<Row>,
    property_names: &[String],
    counter_types: &mut CounterTypeCache,
    fetch_qualifiers: bool,
    class_name: &str,
) -> Sample {
    let mut results = Vec::with_capacity(rows.len());

    for row in rows {
        let mut item = Item::new();

        for name in property_names {
            item.insert(name, Value::Null);
        }

        for property in row.properties {
            // only touch the qualifiers while the CounterType hasn't been
            // cached, qualifier access is expensive
            if fetch_qualifiers && !counter_types.contains_key(&property.name) {
                match counter_type(&property) {
                    Some(counter_type) => {
                        debug!(
                            "caching property qualifier CounterType: {}.{} = {}",
                            class_name, property.name, counter_type
                        );
                        counter_types.insert(&property.name, Some(counter_type));
                    }
                    None => {
                        debug!(
                            "CounterType qualifier not found for {}.{}",
                            class_name, property.name
                        );
                        counter_types.insert(&property.name, None);
                    }
                }
            }

            item.insert(&property.name, property.value.coerced());
        }

        results.push(item);
    }

    results
}

fn counter_type(property: &Property) -> Option<u32> {
    property
        .qualifiers
        .iter()
        .find(|q| q.name == "CounterType")
        .and_then(|q| q.value.as_f64())
        .map(|t| t as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Qualifier;

    fn property(name: &str, value: Value) -> Property {
        Property {
            name: name.to_string(),
            value,
            qualifiers: Vec::new(),
        }
    }

    fn counter_property(name: &str, value: Value, counter_type: u32) -> Property {
        Property {
            name: name.to_string(),
            value,
            qualifiers: vec![Qualifier {
                name: "CounterType".to_string(),
                value: Value::Number(counter_type as f64),
            }],
        }
    }

    #[test]
    fn numeric_coercion() {
        assert_eq!(Value::from("1536").coerced(), Value::Number(1536.0));
        assert_eq!(Value::from("C:").coerced(), Value::from("C:"));
        assert_eq!(Value::Number(19742.0).coerced(), Value::Number(19742.0));
        assert_eq!(Value::Null.coerced(), Value::Null);
    }

    #[test]
    fn case_insensitive_access() {
        let mut item = Item::new();
        item.insert("Name", Value::from("C:"));

        assert_eq!(item.get("Name"), Some(&Value::from("C:")));
        assert_eq!(item.get("name"), Some(&Value::from("C:")));
        assert_eq!(item.get("NAME"), Some(&Value::from("C:")));
        assert!(item.contains_key("nAmE"));
        assert_eq!(item.len(), 1);

        item.insert("NAME", Value::from("D:"));
        assert_eq!(item.len(), 1);
        assert_eq!(item.get("name"), Some(&Value::from("D:")));
    }

    #[test]
    fn declared_properties_default_to_null() {
        let properties = vec!["UnknownCounter".to_string(), "MissingProperty".to_string()];
        let rows = vec![Row {
            properties: vec![property("UnknownCounter", Value::Number(999.0))],
        }];

        let mut counter_types = CounterTypeCache::new();
        let sample = parse_rows(rows, &properties, &mut counter_types, false, "Win32_PerfRawData_PerfOS_System");

        assert_eq!(sample.len(), 1);
        assert_eq!(sample[0].get("UnknownCounter"), Some(&Value::Number(999.0)));
        assert_eq!(sample[0].get("MissingProperty"), Some(&Value::Null));
    }

    #[test]
    fn counter_types_cached_from_qualifiers() {
        let properties = vec!["FreeMegabytes".to_string(), "Name".to_string()];
        let rows = vec![Row {
            properties: vec![
                counter_property("FreeMegabytes", Value::Number(19742.0), 65792),
                property("Name", Value::from("C:")),
            ],
        }];

        let mut counter_types = CounterTypeCache::new();
        parse_rows(
            rows,
            &properties,
            &mut counter_types,
            true,
            "Win32_PerfFormattedData_PerfDisk_LogicalDisk",
        );

        // a counter property is recorded with its type, a non-counter
        // property is recorded without one so it is never re-probed
        assert_eq!(counter_types.get("freemegabytes"), Some(&Some(65792)));
        assert_eq!(counter_types.get("Name"), Some(&None));
    }

    #[test]
    fn cached_counter_types_are_not_refetched() {
        let properties = vec!["FreeMegabytes".to_string()];
        let rows = vec![Row {
            properties: vec![counter_property("FreeMegabytes", Value::Number(1.0), 65792)],
        }];

        let mut counter_types = CounterTypeCache::new();
        counter_types.insert("FreeMegabytes", Some(1));

        parse_rows(
            rows.clone(),
            &properties,
            &mut counter_types,
            true,
            "Win32_PerfFormattedData_PerfDisk_LogicalDisk",
        );

        // the existing entry wins over the freshly returned qualifier
        assert_eq!(counter_types.get("FreeMegabytes"), Some(&Some(1)));

        // with qualifier fetching disabled nothing new is recorded
        let mut counter_types = CounterTypeCache::new();
        parse_rows(
            rows,
            &properties,
            &mut counter_types,
            false,
            "Win32_PerfFormattedData_PerfDisk_LogicalDisk",
        );
        assert!(counter_types.is_empty());
    }
}
