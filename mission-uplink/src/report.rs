//! Per-phase upload results and the composite mission report.

use std::fmt;

use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::error::{ErrorKind, UploadError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    MissionItems,
    Geofence,
    RallyPoints,
    Parameters,
    Command,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::MissionItems => "mission items",
            Phase::Geofence => "geofence",
            Phase::RallyPoints => "rally points",
            Phase::Parameters => "parameters",
            Phase::Command => "command",
        };
        f.write_str(s)
    }
}

/// Where in a phase the first failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePoint {
    /// Connectivity or limit check, before any frame was built.
    Preflight,
    /// The leading `MISSION_COUNT` frame.
    CountFrame,
    /// The item at this 0-based index.
    Item(usize),
}

#[derive(Debug)]
pub struct UploadFailure {
    pub at: FailurePoint,
    pub error: UploadError,
}

impl Serialize for UploadFailure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("UploadFailure", 3)?;
        s.serialize_field("at", &self.at)?;
        s.serialize_field("kind", &self.error.kind())?;
        s.serialize_field("reason", &self.error.to_string())?;
        s.end()
    }
}

/// Outcome of one upload phase.
#[derive(Debug, serde::Serialize)]
pub struct UploadResult {
    pub phase: Phase,
    /// Items the phase was asked to send.
    pub total: usize,
    /// Item frames accepted by the transport (the count frame is not an item).
    pub sent: usize,
    pub failure: Option<UploadFailure>,
}

impl UploadResult {
    pub(crate) fn new(phase: Phase, total: usize) -> Self {
        UploadResult { phase, total, sent: 0, failure: None }
    }

    pub(crate) fn failed(mut self, at: FailurePoint, error: UploadError) -> Self {
        self.failure = Some(UploadFailure { at, error });
        self
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Index of the last item the receiver was sent, if any.
    pub fn last_delivered(&self) -> Option<usize> {
        self.sent.checked_sub(1)
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.failure.as_ref().map(|f| f.error.kind())
    }

    pub fn outcome(&self) -> PhaseOutcome {
        PhaseOutcome {
            phase: self.phase,
            total: self.total,
            sent: self.sent,
            error: self.error_kind(),
        }
    }
}

/// Compact, cloneable summary of an [`UploadResult`] kept by the session for
/// status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PhaseOutcome {
    pub phase: Phase,
    pub total: usize,
    pub sent: usize,
    pub error: Option<ErrorKind>,
}

/// Result of `upload_complete_mission`.
///
/// Waypoints are mandatory; geofence and rally phases are best-effort and
/// only present when attempted.
#[derive(Debug, serde::Serialize)]
pub struct MissionReport {
    pub mission: String,
    pub waypoints: UploadResult,
    pub geofence: Option<UploadResult>,
    pub rally_points: Option<UploadResult>,
}

impl MissionReport {
    /// The mission is deployed once the waypoint phase succeeded.
    pub fn is_success(&self) -> bool {
        self.waypoints.is_success()
    }

    /// Waypoints and every attempted optional phase succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.phases().all(UploadResult::is_success)
    }

    pub fn phases(&self) -> impl Iterator<Item = &UploadResult> {
        std::iter::once(&self.waypoints)
            .chain(self.geofence.as_ref())
            .chain(self.rally_points.as_ref())
    }

    /// The first failed phase in upload order.
    pub fn first_failure(&self) -> Option<&UploadResult> {
        self.phases().find(|r| !r.is_success())
    }
}
