use thiserror::Error;

/// Handler-level errors, caught and logged at the router boundary.
///
/// None of these terminate the session; the worst case is a dropped
/// message and a stale display.
#[derive(Debug, Error)]
pub enum SessionError {
    /// `edit_data` carried a kind the client has no dialog for.
    #[error("unknown edit kind: {0}")]
    UnknownEditKind(String),
}
