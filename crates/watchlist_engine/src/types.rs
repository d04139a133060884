use std::fmt;

/// Error returned by every [`RemoteFetcher`](crate::RemoteFetcher) operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    pub kind: RemoteFailure,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: RemoteFailure, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn bad_request() -> Self {
        Self::new(RemoteFailure::BadRequest, "bad request")
    }

    pub fn too_many_requests() -> Self {
        Self::new(RemoteFailure::TooManyRequests, "too many requests")
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() || self.message == self.kind.to_string() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for RemoteError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteFailure {
    /// The service rejected the request itself (unknown or malformed username).
    BadRequest,
    /// The service is rate limiting this caller.
    TooManyRequests,
    HttpStatus(u16),
    UnsupportedContentType { content_type: String },
    TooLarge { max_bytes: u64, actual: Option<u64> },
    /// The response body did not have the expected shape.
    Malformed,
    InvalidUrl,
    InvalidSelector,
    Timeout,
    Network,
}

impl fmt::Display for RemoteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteFailure::BadRequest => write!(f, "bad request"),
            RemoteFailure::TooManyRequests => write!(f, "too many requests"),
            RemoteFailure::HttpStatus(code) => write!(f, "http status {code}"),
            RemoteFailure::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            RemoteFailure::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            RemoteFailure::Malformed => write!(f, "malformed response"),
            RemoteFailure::InvalidUrl => write!(f, "invalid url"),
            RemoteFailure::InvalidSelector => write!(f, "invalid selector"),
            RemoteFailure::Timeout => write!(f, "timeout"),
            RemoteFailure::Network => write!(f, "network error"),
        }
    }
}
