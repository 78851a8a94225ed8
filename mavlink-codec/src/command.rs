//! Mission command name → `MAV_CMD` id.

/// The navigation commands a stored mission can name.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MavCmd {
    NavWaypoint         = 16,
    NavLoiterUnlimited  = 17,
    NavLoiterTime       = 19,
    NavReturnToLaunch   = 20,
    NavLand             = 21,
    NavTakeoff          = 22,
}

impl MavCmd {
    /// Case-insensitive lookup. Unknown or missing names fall back to
    /// [`MavCmd::NavWaypoint`], so this never fails.
    pub fn from_name(name: Option<&str>) -> Self {
        let Some(name) = name else { return Self::NavWaypoint };
        match name.to_ascii_uppercase().as_str() {
            "WAYPOINT"         => Self::NavWaypoint,
            "TAKEOFF"          => Self::NavTakeoff,
            "LAND"             => Self::NavLand,
            "LOITER_UNLIMITED" => Self::NavLoiterUnlimited,
            "LOITER_TIME"      => Self::NavLoiterTime,
            "RTL" | "RETURN_TO_LAUNCH" => Self::NavReturnToLaunch,
            _ => Self::NavWaypoint,
        }
    }

    pub fn id(self) -> u16 {
        self as u16
    }
}

/// Shorthand for `MavCmd::from_name(name).id()`.
pub fn command_id(name: Option<&str>) -> u16 {
    MavCmd::from_name(name).id()
}
