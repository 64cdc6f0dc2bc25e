//! Domain model: entities, capabilities, staleness.

use thingdash_link::message::{StateValue, ThingId};

// ── Capabilities ─────────────────────────────────────────────────────

/// What a thing's display can do, determined by its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// On/off control with optimistic toggling.
    Toggle,
    /// Read-only numeric reading.
    Reading,
}

/// Thing types with a known capability handler. Unknown type strings get
/// no display binding and state updates for them are no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Switch,
    Shelly,
    Temperature,
    Humidity,
    ShellyTemperature,
    ShellyHumidity,
    SoilMoisture,
    Pressure,
    Co2,
}

impl EntityKind {
    /// Map a wire type string to a kind, `None` when unsupported.
    pub fn from_type(thing_type: &str) -> Option<Self> {
        match thing_type {
            "switch" => Some(Self::Switch),
            "shelly" => Some(Self::Shelly),
            "temperature" => Some(Self::Temperature),
            "humidity" => Some(Self::Humidity),
            "shelly_temperature" => Some(Self::ShellyTemperature),
            "shelly_humidity" => Some(Self::ShellyHumidity),
            "soilmoisture" => Some(Self::SoilMoisture),
            "pressure" => Some(Self::Pressure),
            "frischluftworks-co2" => Some(Self::Co2),
            _ => None,
        }
    }

    pub fn capability(self) -> Capability {
        match self {
            Self::Switch | Self::Shelly => Capability::Toggle,
            Self::Temperature
            | Self::Humidity
            | Self::ShellyTemperature
            | Self::ShellyHumidity
            | Self::SoilMoisture
            | Self::Pressure
            | Self::Co2 => Capability::Reading,
        }
    }
}

// ── Staleness ────────────────────────────────────────────────────────

/// Last-seen classification. Advisory only: it never affects command
/// eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Staleness {
    /// Never reported, or reported as `null` (distinct from seen-but-old).
    #[default]
    Unknown,
    /// Seen within the warning interval.
    Fresh,
    /// Last report older than the warning interval.
    TimedOut,
}

// ── Entity ───────────────────────────────────────────────────────────

/// One mirrored thing. Created on the first snapshot referencing its id,
/// updated in place afterwards, never deleted during a session.
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: ThingId,
    /// Capability kind, `None` for unsupported types.
    pub kind: Option<EntityKind>,
    /// Wire type string as received.
    pub raw_type: String,
    pub name: String,
    pub visible: bool,
    pub ordering: i64,
    pub view_memberships: Vec<String>,
    /// Last server-confirmed value; the rollback target for optimistic
    /// commands.
    pub last_confirmed: Option<StateValue>,
    /// Whether the rendering collaborator holds a display binding for
    /// this entity. False for unsupported types.
    pub has_display: bool,
    pub staleness: Staleness,
}

// ── Relative time ────────────────────────────────────────────────────

/// Human-readable relative-time label for last-seen diagnostics.
///
/// Threshold boundaries: 15s, 60s, 1h, 24h, 7d, 30d, 356d.
pub fn describe_time_diff(seconds: f64) -> String {
    const MINUTE: f64 = 60.0;
    const HOUR: f64 = 60.0 * MINUTE;
    const DAY: f64 = 24.0 * HOUR;
    const WEEK: f64 = 7.0 * DAY;
    const MONTH: f64 = 30.0 * DAY;
    const YEAR: f64 = 356.0 * DAY;

    if seconds < 15.0 {
        "Just now".to_owned()
    } else if seconds < MINUTE {
        format!("{:.0} seconds ago", seconds)
    } else if seconds < HOUR {
        format!("{:.0} minutes ago", seconds / MINUTE)
    } else if seconds < DAY {
        format!("{:.0} hours ago", seconds / HOUR)
    } else if seconds < WEEK {
        format!("{:.0} days ago", seconds / DAY)
    } else if seconds < MONTH {
        format!("{:.0} weeks ago", seconds / WEEK)
    } else if seconds < YEAR {
        format!("{:.0} months ago", seconds / MONTH)
    } else {
        format!("{:.0} years ago", seconds / YEAR)
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn capability_table_covers_known_types() {
        assert_eq!(
            EntityKind::from_type("switch").map(EntityKind::capability),
            Some(Capability::Toggle)
        );
        assert_eq!(
            EntityKind::from_type("shelly").map(EntityKind::capability),
            Some(Capability::Toggle)
        );
        for reading in [
            "temperature",
            "humidity",
            "shelly_temperature",
            "shelly_humidity",
            "soilmoisture",
            "pressure",
            "frischluftworks-co2",
        ] {
            assert_eq!(
                EntityKind::from_type(reading).map(EntityKind::capability),
                Some(Capability::Reading),
                "{reading} should be a reading"
            );
        }
    }

    #[test]
    fn unsupported_type_has_no_kind() {
        assert_eq!(EntityKind::from_type("doorbell"), None);
        assert_eq!(EntityKind::from_type(""), None);
    }

    #[test]
    fn time_diff_thresholds() {
        assert_eq!(describe_time_diff(0.0), "Just now");
        assert_eq!(describe_time_diff(14.9), "Just now");
        assert_eq!(describe_time_diff(15.0), "15 seconds ago");
        assert_eq!(describe_time_diff(59.0), "59 seconds ago");
        assert_eq!(describe_time_diff(120.0), "2 minutes ago");
        assert_eq!(describe_time_diff(2.0 * 3600.0), "2 hours ago");
        assert_eq!(describe_time_diff(3.0 * 86400.0), "3 days ago");
        assert_eq!(describe_time_diff(14.0 * 86400.0), "2 weeks ago");
        assert_eq!(describe_time_diff(60.0 * 86400.0), "2 months ago");
        assert_eq!(describe_time_diff(800.0 * 86400.0), "2 years ago");
    }
}
