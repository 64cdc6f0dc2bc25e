use thiserror::Error;

/// Top-level error type for the `thingdash-link` crate.
///
/// Transport-level failures are never fatal to the client: the connection
/// loop routes every one of them through the same reconnect-backoff path.
#[derive(Debug, Error)]
pub enum LinkError {
    /// WebSocket connection failed (DNS, refused, TLS, handshake).
    #[error("WebSocket connection failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),
}
