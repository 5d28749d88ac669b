use async_trait::async_trait;
use log::debug;
use tokio::sync::Mutex;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::results::Value;

/// Ask the service to return without blocking for the full result set.
pub const WBEM_FLAG_RETURN_IMMEDIATELY: u32 = 0x10;
/// Forward-only cursor over the result set.
pub const WBEM_FLAG_FORWARD_ONLY: u32 = 0x20;
/// Include service-side metadata (qualifiers) with each property. Only set
/// on a sampler's first query, when counter types are cached.
pub const WBEM_FLAG_USE_AMENDED_QUALIFIERS: u32 = 0x2_0000;

/// Query language tag passed along with every query.
pub const QUERY_LANGUAGE: &str = "WQL";

/// Service-side metadata attached to a property, used to classify its
/// counter type.
#[derive(Clone, Debug, PartialEq)]
pub struct Qualifier {
    pub name: String,
    pub value: Value,
}

/// One named property of a result row. Qualifiers are only populated when
/// the query was issued with [`WBEM_FLAG_USE_AMENDED_QUALIFIERS`].
#[derive(Clone, Debug, PartialEq)]
pub struct Property {
    pub name: String,
    pub value: Value,
    pub qualifiers: Vec<Qualifier>,
}

/// One row of a query result set.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    pub properties: Vec<Property>,
}

/// An established connection to the instrumentation service.
///
/// Implementations wrap the actual transport. A query either completes or
/// fails; there is no mid-query cancellation, so timeouts belong to the
/// transport.
#[async_trait]
pub trait Connection: Send + Sync {
    async fn exec_query(&self, query: &str, language: &str, flags: u32) -> Result<Vec<Row>, Error>;
}

/// Establishes connections to the instrumentation service.
#[async_trait]
pub trait Locator: Send + Sync {
    async fn connect(
        &self,
        host: &str,
        namespace: &str,
        username: &str,
        password: &str,
    ) -> Result<Arc<dyn Connection>, Error>;
}

/// Identifies a cacheable connection.
///
/// Credentials are deliberately not part of the key: two samplers pointed
/// at the same host and namespace share a connection even when their
/// passwords differ, and the first to connect wins.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    host: String,
    namespace: String,
    username: String,
}

impl ConnectionKey {
    pub fn new(
        host: impl Into<String>,
        namespace: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            namespace: namespace.into(),
            username: username.into(),
        }
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.host, self.namespace, self.username)
    }
}

/// Process-wide cache of service connections.
///
/// Owned by the hosting application and shared between samplers. Unbounded
/// and never evicted; the set of distinct (host, namespace, username)
/// triples in one process is small and static. Lookup and insert happen
/// under one lock so concurrent samplers cannot race duplicate
/// establishment.
pub struct ConnectionCache {
    locator: Box<dyn Locator>,
    connections: Mutex<HashMap<ConnectionKey, Arc<dyn Connection>>>,
}

impl ConnectionCache {
    pub fn new(locator: impl Locator + 'static) -> Self {
        Self {
            locator: Box::new(locator),
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached connection for (host, namespace, username),
    /// establishing it on first use. A failed establishment is not cached,
    /// the next call retries.
    pub async fn get(
        &self,
        host: &str,
        namespace: &str,
        username: &str,
        password: &str,
    ) -> Result<Arc<dyn Connection>, Error> {
        let key = ConnectionKey::new(host, namespace, username);

        let mut connections = self.connections.lock().await;

        if let Some(connection) = connections.get(&key) {
            debug!(
                "using cached connection (host={}, namespace={}, username={})",
                host, namespace, username
            );
            return Ok(connection.clone());
        }

        debug!(
            "connecting to WMI server (host={}, namespace={}, username={})",
            host, namespace, username
        );

        let connection = self
            .locator
            .connect(host, namespace, username, password)
            .await?;
        connections.insert(key, connection.clone());

        Ok(connection)
    }
}
