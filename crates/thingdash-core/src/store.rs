//! Authoritative entity store.
//!
//! Snapshots upsert, they never delete: a thing absent from a later
//! `things` message keeps its entry (and its display binding) for the
//! rest of the session.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::warn;

use thingdash_link::message::{StateValue, ThingId, ThingSnapshot};

use crate::model::{describe_time_diff, Entity, EntityKind, Staleness};
use crate::render::RenderSink;
use crate::views::ViewIndex;

/// Age beyond which a reporting thing is flagged as timed out.
pub const LAST_SEEN_WARNING_SECS: i64 = 180;

/// `ThingId → Entity` mapping mirrored from server snapshots.
#[derive(Debug, Default)]
pub struct EntityStore {
    entities: HashMap<ThingId, Entity>,
}

impl EntityStore {
    /// Register or update one snapshot entry.
    ///
    /// First sighting of an id creates the entity and, when its type is
    /// supported, a display binding. Later sightings update fields in
    /// place; identity and any confirmed value survive. Rendered
    /// visibility combines the thing's own flag with membership in the
    /// active view.
    pub fn upsert<R: RenderSink>(
        &mut self,
        snapshot: &ThingSnapshot,
        views: &ViewIndex,
        render: &mut R,
    ) {
        let in_active_view = match views.active() {
            Some(active) => views.is_member(active, snapshot.id),
            // No view selected yet: the thing's own flag decides.
            None => true,
        };
        let rendered_visible = snapshot.visible && in_active_view;

        if let Some(entity) = self.entities.get_mut(&snapshot.id) {
            entity.raw_type = snapshot.thing_type.clone();
            entity.kind = EntityKind::from_type(&snapshot.thing_type);
            entity.name = snapshot.name.clone();
            entity.visible = snapshot.visible;
            entity.ordering = snapshot.ordering;
            entity.view_memberships = snapshot.views.clone();
            if entity.has_display {
                render.update_name(snapshot.id, &snapshot.name);
                render.set_visible(snapshot.id, rendered_visible);
            }
            return;
        }

        let kind = EntityKind::from_type(&snapshot.thing_type);
        if kind.is_none() {
            warn!(
                id = snapshot.id,
                thing_type = %snapshot.thing_type,
                "unsupported thing type, no display created"
            );
        }

        let entity = Entity {
            id: snapshot.id,
            kind,
            raw_type: snapshot.thing_type.clone(),
            name: snapshot.name.clone(),
            visible: snapshot.visible,
            ordering: snapshot.ordering,
            view_memberships: snapshot.views.clone(),
            last_confirmed: None,
            has_display: kind.is_some(),
            staleness: Staleness::Unknown,
        };

        if let Some(kind) = kind {
            render.create_display(snapshot.id, kind, &snapshot.name, rendered_visible);
        }
        self.entities.insert(snapshot.id, entity);
    }

    /// Whether state updates for `id` may reach the render layer.
    /// False for ids never seen in a snapshot and for unsupported types.
    pub fn display_gate(&self, id: ThingId) -> bool {
        self.entities.get(&id).is_some_and(|e| e.has_display)
    }

    /// Record a server-confirmed value. The caller has already passed
    /// [`display_gate`](Self::display_gate) and settled any in-flight
    /// command for this id.
    pub fn apply_confirmed(&mut self, id: ThingId, value: StateValue) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.last_confirmed = Some(value);
        }
    }

    /// Reclassify staleness from a last-seen report entry and push the
    /// classification (with a relative-time label) to the render layer.
    pub fn apply_last_seen<R: RenderSink>(
        &mut self,
        id: ThingId,
        seen: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        render: &mut R,
    ) {
        let Some(entity) = self.entities.get_mut(&id) else {
            return;
        };
        if !entity.has_display {
            return;
        }

        let (staleness, label) = match seen {
            // Never reported: distinct from seen-but-old.
            None => (Staleness::Unknown, None),
            Some(ts) => {
                let age = now.signed_duration_since(ts).num_seconds();
                let staleness = if age > LAST_SEEN_WARNING_SECS {
                    Staleness::TimedOut
                } else {
                    Staleness::Fresh
                };
                let label = format!("Last seen {}", describe_time_diff(age.max(0) as f64));
                (staleness, Some(label))
            }
        };

        entity.staleness = staleness;
        render.set_staleness(id, staleness, label.as_deref());
    }

    pub fn get(&self, id: ThingId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: ThingId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// All known ids, for visibility recomputation on view switches.
    pub fn ids(&self) -> impl Iterator<Item = ThingId> + '_ {
        self.entities.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

// ── Tests ────────────────────────────────────────────────────────────
