//! View membership index.
//!
//! Views are named, curated subsets of entities. A `views` message
//! replaces the whole mapping; the active view filters visibility.

use indexmap::IndexMap;
use thingdash_link::message::ThingId;

/// Result of an activation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activate {
    /// The requested view is already active; nothing to do.
    AlreadyActive,
    /// No view of that name is known.
    Unknown,
    /// The active view changed; visibility must be recomputed.
    Switched,
}

/// View name → ordered member ids, plus the active view.
#[derive(Debug, Default)]
pub struct ViewIndex {
    views: IndexMap<String, Vec<ThingId>>,
    active: Option<String>,
}

impl ViewIndex {
    /// Replace all views wholesale (old views are discarded, not merged)
    /// and reset the active view. Returns the initial view to activate:
    /// the fragment hint when it names a known view, else the first view
    /// in message iteration order.
    pub fn replace_all(
        &mut self,
        views: IndexMap<String, Vec<ThingId>>,
        fragment_hint: Option<&str>,
    ) -> Option<String> {
        self.views = views;
        self.active = None;

        fragment_hint
            .filter(|hint| self.views.contains_key(*hint))
            .map(str::to_owned)
            .or_else(|| self.views.keys().next().cloned())
    }

    /// Record `name` as the active view. Visibility recomputation is the
    /// caller's job (it owns the entity store and the render sink).
    pub fn activate(&mut self, name: &str) -> Activate {
        if !self.views.contains_key(name) {
            return Activate::Unknown;
        }
        if self.active.as_deref() == Some(name) {
            return Activate::AlreadyActive;
        }
        self.active = Some(name.to_owned());
        Activate::Switched
    }

    /// Whether `id` is a member of the named view. Dangling member ids
    /// are tolerated throughout: an id for an unknown entity simply never
    /// passes any visibility check.
    pub fn is_member(&self, view: &str, id: ThingId) -> bool {
        self.views.get(view).is_some_and(|ids| ids.contains(&id))
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.views.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

// ── Tests ────────────────────────────────────────────────────────────
