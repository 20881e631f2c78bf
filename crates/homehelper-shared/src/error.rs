use thiserror::Error;

#[derive(Error, Debug)]
pub enum HomeHelperError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Transport not connected")]
    NotConnected,

    #[error("Transport command channel closed")]
    Closed,

    #[error("Broker handshake failed: {0}")]
    Handshake(String),

    #[error("Malformed frame: {0}")]
    Frame(String),

    #[error("Broker error: {0}")]
    Broker(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Invalid response body: {0}")]
    Body(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Message cannot be blank")]
    Blank,

    #[error("Message must be {max} characters or less (got {length})")]
    TooLong { length: usize, max: usize },
}
