//! Wire protocol and connection management for the thingdash client.
//!
//! Two halves:
//!
//! - **[`message`]** — typed `ServerMessage` / `ClientMessage` envelopes.
//!   Every frame on the wire is a UTF-8 JSON object with a mandatory
//!   `type` discriminator; the enums here mirror that with
//!   `#[serde(tag = "type")]`.
//! - **[`connection`]** — the [`Link`](connection::Link): a background task
//!   owning the WebSocket, its `Connecting → Open → Closing → Closed`
//!   state machine, linear reconnect backoff, visibility gating, and the
//!   periodic `last_seen` poll.

pub mod connection;
pub mod error;
pub mod message;

pub use connection::{Link, LinkEvent, LinkState};
pub use error::LinkError;
pub use message::{ClientMessage, ServerMessage, StateValue, ThingId};
