//! Client-side synchronization engine for thingdash.
//!
//! The engine mirrors the state of remote-controlled devices ("things")
//! published by a server over a persistent connection, and applies user
//! commands optimistically before confirmation arrives:
//!
//! - **[`Session`]** — owns every stateful component and the message
//!   router. Driven by a single [`SessionEvent`] channel; each handler
//!   runs to completion before the next event, so session state needs
//!   no locks.
//! - **[`EntityStore`]** — authoritative `ThingId → Entity` mapping,
//!   upserted from server snapshots, plus staleness classification.
//! - **[`CommandTracker`]** — per-entity in-flight command with rollback
//!   timer; cancel-before-replace, cancelled on confirmation.
//! - **[`ViewIndex`]** — view name → member ids; drives visibility.
//! - **[`DialogStack`]** — LIFO registry of open modal dialogs.
//! - **[`CountdownRegistry`]** — per-key repeating timers for
//!   remaining-time displays.
//! - **[`RenderSink`]** — the narrow interface through which a rendering
//!   collaborator (out of scope here) observes the engine.

pub mod countdown;
pub mod dialog;
pub mod error;
pub mod model;
pub mod pending;
pub mod render;
pub mod session;
pub mod store;
pub mod views;

pub use countdown::CountdownRegistry;
pub use dialog::{Dialog, DialogData, DialogId, DialogKind, DialogStack};
pub use error::SessionError;
pub use model::{Capability, Entity, EntityKind, Staleness};
pub use pending::CommandTracker;
pub use render::{RecordingRender, RenderSink};
pub use session::{Session, SessionEvent};
pub use store::EntityStore;
pub use views::ViewIndex;

pub use thingdash_link::message::{StateValue, ThingId};
