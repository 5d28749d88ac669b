use thiserror::Error;

/// Possible errors surfaced while sampling.
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to connect to WMI server (host={host}, namespace={namespace}, username={username}): {message}")]
    /// Establishing or authenticating a connection to the WMI service
    /// failed. Failed connections are never cached, so the next sampling
    /// cycle retries.
    Connection {
        host: String,
        namespace: String,
        username: String,
        message: String,
    },
    #[error("failed to execute WMI query: {message}")]
    /// The service rejected or failed to execute a WQL query. Absorbed by
    /// the sampler into an empty sample rather than raised.
    Query { message: String },
}

impl Error {
    pub fn connection(
        host: impl Into<String>,
        namespace: impl Into<String>,
        username: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Connection {
            host: host.into(),
            namespace: namespace.into(),
            username: username.into(),
            message: message.into(),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }
}
