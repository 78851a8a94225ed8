//! Mission records shared by the MAVLink codec, the uplink runtime and the
//! `mission-push` tool.
//!
//! These are read-only inputs: whatever persistence or import layer built
//! them, the uplink only reads and encodes them. Collection order is the
//! mission order; do not sort.

use serde::{Deserialize, Serialize};

// ── Waypoint ─────────────────────────────────────────────────────────────────

/// One mission item as stored by the mission planner.
///
/// Optional fields fall back to protocol defaults when encoded (0 for the
/// numeric params and altitude, frame 3, autocontinue 1).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Waypoint {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: Option<f64>,
    /// Command name such as `WAYPOINT`, `TAKEOFF` or `LAND`.
    #[serde(default)]
    pub command: Option<String>,

    // ── Command params 1-4 ───────────────────────────────────────────────────
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub acceptance_radius: Option<f64>,
    #[serde(default)]
    pub pass_radius: Option<f64>,
    #[serde(default)]
    pub yaw: Option<f64>,

    // ── Item flags ───────────────────────────────────────────────────────────
    #[serde(default)]
    pub frame: Option<u8>,
    #[serde(default)]
    pub autocontinue: Option<u8>,
}

impl Waypoint {
    /// A waypoint with only position and command set.
    pub fn new(latitude: f64, longitude: f64, altitude: f64, command: &str) -> Self {
        Waypoint {
            latitude,
            longitude,
            altitude: Some(altitude),
            command: Some(command.to_string()),
            ..Waypoint::default()
        }
    }
}

// ── Geofence ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FenceType {
    #[default]
    Inclusion,
    Exclusion,
}

/// One vertex of the mission's geofence polygon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofencePoint {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub fence_type: FenceType,
}

impl GeofencePoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        GeofencePoint { latitude, longitude, fence_type: FenceType::Inclusion }
    }
}

// ── Rally points ─────────────────────────────────────────────────────────────

/// Alternate landing/loiter location used instead of home on RTL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RallyPoint {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: Option<f64>,
    #[serde(default)]
    pub break_altitude: Option<f64>,
    #[serde(default)]
    pub land_direction: Option<f64>,
}

// ── Vehicle parameters ───────────────────────────────────────────────────────

/// A named autopilot parameter. The value stays textual until upload, where
/// it must parse as a 32-bit float.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleParameter {
    pub name: String,
    pub value: String,
}

impl VehicleParameter {
    pub fn new(name: &str, value: &str) -> Self {
        VehicleParameter { name: name.to_string(), value: value.to_string() }
    }
}

// ── Mission ──────────────────────────────────────────────────────────────────

/// Everything deployed to the vehicle in one `upload_complete_mission` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mission {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub geofence_enabled: bool,
    #[serde(default)]
    pub waypoints: Vec<Waypoint>,
    #[serde(default)]
    pub geofence_points: Vec<GeofencePoint>,
    #[serde(default)]
    pub rally_points: Vec<RallyPoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waypoint_new_leaves_params_unset() {
        let wp = Waypoint::new(10.0, 20.0, 50.0, "WAYPOINT");
        assert_eq!(wp.altitude, Some(50.0));
        assert_eq!(wp.command.as_deref(), Some("WAYPOINT"));
        assert!(wp.speed.is_none());
        assert!(wp.frame.is_none());
    }

    #[test]
    fn mission_json_uses_camel_case_and_defaults() {
        let json = r#"{
            "name": "survey",
            "geofenceEnabled": true,
            "waypoints": [
                { "latitude": 10.0, "longitude": 20.0, "altitude": 50.0, "command": "TAKEOFF" },
                { "latitude": 10.1, "longitude": 20.1, "acceptanceRadius": 2.5 }
            ],
            "geofencePoints": [
                { "latitude": 1.0, "longitude": 2.0, "fenceType": "EXCLUSION" }
            ]
        }"#;
        let m: Mission = serde_json::from_str(json).unwrap();
        assert!(m.geofence_enabled);
        assert_eq!(m.waypoints.len(), 2);
        assert_eq!(m.waypoints[1].acceptance_radius, Some(2.5));
        assert_eq!(m.waypoints[1].altitude, None);
        assert_eq!(m.geofence_points[0].fence_type, FenceType::Exclusion);
        assert!(m.rally_points.is_empty());
    }
}
