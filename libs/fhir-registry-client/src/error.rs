//! Error types for the registry client.

use std::error::Error as _;
use std::io;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// How a failed request should be classified for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The request or connection attempt timed out.
    Timeout,
    /// The host could not be resolved.
    Dns,
    /// The peer dropped an established connection.
    ConnectionReset,
    /// The peer actively refused the connection.
    ConnectionRefused,
    /// Anything else: TLS, protocol or request construction failures.
    Other,
}

impl FailureKind {
    /// Transient failures may succeed on a later attempt; refused
    /// connections and protocol errors will not.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            FailureKind::Timeout | FailureKind::Dns | FailureKind::ConnectionReset
        )
    }
}

/// Registry client errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("Request to {url} failed: {message}")]
    Network {
        url: String,
        kind: FailureKind,
        message: String,
    },

    #[error("Unexpected HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Failed to parse response from {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the retry wrapper may run the failed operation again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Network { kind, .. } if kind.is_transient())
    }

    /// Wrap a transport-level failure, classifying it for retry.
    pub(crate) fn network(url: &str, err: reqwest::Error) -> Self {
        Error::Network {
            url: url.to_string(),
            kind: classify(&err),
            message: err.to_string(),
        }
    }
}

/// Map a transport failure onto the retry taxonomy.
///
/// reqwest does not expose OS error codes directly, so the underlying
/// `io::Error` is fished out of the source chain where one exists.
fn classify(err: &reqwest::Error) -> FailureKind {
    if err.is_timeout() {
        return FailureKind::Timeout;
    }

    let mut cause: Option<&(dyn std::error::Error + 'static)> = err.source();
    while let Some(inner) = cause {
        if let Some(io_err) = inner.downcast_ref::<io::Error>() {
            if let Some(kind) = io_failure_kind(io_err.kind()) {
                return kind;
            }
        }
        cause = inner.source();
    }

    // Connect errors with no recognisable cause are almost always
    // name-resolution trouble.
    if err.is_connect() {
        FailureKind::Dns
    } else {
        FailureKind::Other
    }
}

fn io_failure_kind(kind: io::ErrorKind) -> Option<FailureKind> {
    match kind {
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
            Some(FailureKind::ConnectionReset)
        }
        io::ErrorKind::ConnectionRefused => Some(FailureKind::ConnectionRefused),
        io::ErrorKind::TimedOut => Some(FailureKind::Timeout),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_kinds() {
        assert!(FailureKind::Timeout.is_transient());
        assert!(FailureKind::Dns.is_transient());
        assert!(FailureKind::ConnectionReset.is_transient());
        assert!(!FailureKind::ConnectionRefused.is_transient());
        assert!(!FailureKind::Other.is_transient());
    }

    #[test]
    fn io_error_kinds_map_to_failure_kinds() {
        assert_eq!(
            io_failure_kind(io::ErrorKind::ConnectionReset),
            Some(FailureKind::ConnectionReset)
        );
        assert_eq!(
            io_failure_kind(io::ErrorKind::ConnectionAborted),
            Some(FailureKind::ConnectionReset)
        );
        assert_eq!(
            io_failure_kind(io::ErrorKind::ConnectionRefused),
            Some(FailureKind::ConnectionRefused)
        );
        assert_eq!(
            io_failure_kind(io::ErrorKind::TimedOut),
            Some(FailureKind::Timeout)
        );
        assert_eq!(io_failure_kind(io::ErrorKind::BrokenPipe), None);
    }

    #[test]
    fn only_transient_network_errors_are_retryable() {
        let reset = Error::Network {
            url: "http://registry.test/pkg".into(),
            kind: FailureKind::ConnectionReset,
            message: "connection reset by peer".into(),
        };
        assert!(reset.is_transient());

        let refused = Error::Network {
            url: "http://registry.test/pkg".into(),
            kind: FailureKind::ConnectionRefused,
            message: "connection refused".into(),
        };
        assert!(!refused.is_transient());

        let status = Error::HttpStatus {
            status: 503,
            url: "http://registry.test/pkg".into(),
        };
        assert!(!status.is_transient());

        let parse = Error::Parse {
            url: "http://registry.test/pkg".into(),
            source: serde_json::from_str::<serde_json::Value>("{").unwrap_err(),
        };
        assert!(!parse.is_transient());
    }
}
