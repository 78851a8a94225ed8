//! Upload orchestration: sequences mission items, geofence, rally points,
//! parameters and single commands onto an [`UploadSession`].
//!
//! Each phase runs `Idle → InFlight(i of n) → Complete | Failed(at i)` and
//! stops at the first failure. Frames are fire-and-forget; the [`Pacing`]
//! policy decides how long to wait between them.

use log::{error, info, warn};
use mavlink_codec::{
    CommandLong, FencePoint, MavCmd, Message, MissionCount, MissionItemInt, ParamSet, RallyPoint,
};
use mission_schema::{GeofencePoint, Mission, RallyPoint as RallyRecord, VehicleParameter, Waypoint};

use crate::error::UploadError;
use crate::pacing::{CancelToken, FixedDelay, Pacing, Pause};
use crate::report::{FailurePoint, MissionReport, Phase, UploadResult};
use crate::session::UploadSession;

/// `MISSION_COUNT.count` is 16-bit.
pub const MAX_MISSION_ITEMS: usize = u16::MAX as usize;
/// Fence and rally `idx`/`count` are 8-bit.
pub const MAX_FENCE_POINTS: usize = u8::MAX as usize;
pub const MAX_RALLY_POINTS: usize = u8::MAX as usize;

pub struct MissionUploader {
    pacing: Box<dyn Pacing>,
    cancel: CancelToken,
}

impl Default for MissionUploader {
    fn default() -> Self {
        Self::new(FixedDelay::default())
    }
}

impl MissionUploader {
    pub fn new(pacing: impl Pacing + 'static) -> Self {
        MissionUploader { pacing: Box::new(pacing), cancel: CancelToken::new() }
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Handle for cancelling uploads run by this uploader from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    // ── Public phases ────────────────────────────────────────────────────────

    /// `MISSION_COUNT` followed by one `MISSION_ITEM_INT` per waypoint.
    ///
    /// An empty list succeeds without sending anything, not even a count of 0.
    pub fn upload_mission_items(&self, session: &UploadSession, items: &[Waypoint]) -> UploadResult {
        let _transfer = session.begin_transfer();
        let result = self.mission_items(session, items);
        self.finish(session, result)
    }

    pub fn upload_geofence(&self, session: &UploadSession, points: &[GeofencePoint]) -> UploadResult {
        let _transfer = session.begin_transfer();
        let result = self.geofence(session, points);
        self.finish(session, result)
    }

    pub fn upload_rally_points(&self, session: &UploadSession, points: &[RallyRecord]) -> UploadResult {
        let _transfer = session.begin_transfer();
        let result = self.rally_points(session, points);
        self.finish(session, result)
    }

    /// One `PARAM_SET` per parameter. A value that does not parse as `f32`
    /// stops the phase at that index; earlier parameters stay sent.
    pub fn upload_parameters(&self, session: &UploadSession, params: &[VehicleParameter]) -> UploadResult {
        let _transfer = session.begin_transfer();
        let mut result = UploadResult::new(Phase::Parameters, params.len());
        if let Err(e) = self.preflight(session, "parameters", params.len(), usize::MAX) {
            return self.finish(session, result.failed(FailurePoint::Preflight, e));
        }
        info!("Uploading {} parameters", params.len());
        result = self.send_items(session, result, params, |_, p| {
            let msg = ParamSet::from_parameter(p)?;
            info!("PARAM_SET {}={}", p.name, msg.param_value);
            Ok(Message::ParamSet(msg))
        });
        self.finish(session, result)
    }

    /// Waypoints first; geofence (when enabled) and rally points only if the
    /// waypoint phase succeeded. Optional phases never gate each other.
    pub fn upload_complete_mission(&self, session: &UploadSession, mission: &Mission) -> MissionReport {
        let _transfer = session.begin_transfer();
        info!("Uploading complete mission '{}'", mission.name);

        let waypoints = self.mission_items(session, &mission.waypoints);
        let mut report = MissionReport {
            mission: mission.name.clone(),
            waypoints: self.finish(session, waypoints),
            geofence: None,
            rally_points: None,
        };
        if !report.waypoints.is_success() {
            error!("Mission '{}' not deployed: waypoint upload failed", mission.name);
            return report;
        }

        if mission.geofence_enabled && !mission.geofence_points.is_empty() {
            let r = self.geofence(session, &mission.geofence_points);
            report.geofence = Some(self.finish(session, r));
        }
        if !mission.rally_points.is_empty() {
            let r = self.rally_points(session, &mission.rally_points);
            report.rally_points = Some(self.finish(session, r));
        }

        if report.all_succeeded() {
            info!("Complete mission '{}' uploaded", mission.name);
        } else {
            warn!("Mission '{}' deployed, but an optional phase failed", mission.name);
        }
        report
    }

    /// Single `COMMAND_LONG`.
    pub fn send_command(&self, session: &UploadSession, command: u16, params: [f32; 7]) -> UploadResult {
        let _transfer = session.begin_transfer();
        let mut result = UploadResult::new(Phase::Command, 1);
        if let Err(e) = self.preflight(session, "commands", 1, 1) {
            return self.finish(session, result.failed(FailurePoint::Preflight, e));
        }
        info!("Sending COMMAND_LONG: command={command}");
        result = self.send_items(session, result, &[command], |_, &cmd| {
            Ok(Message::CommandLong(CommandLong::new(cmd, params)))
        });
        self.finish(session, result)
    }

    /// [`send_command`](Self::send_command) with the id looked up by name.
    pub fn send_named_command(&self, session: &UploadSession, name: &str, params: [f32; 7]) -> UploadResult {
        self.send_command(session, MavCmd::from_name(Some(name)).id(), params)
    }

    // ── Phase bodies (caller holds the transfer lock) ────────────────────────

    fn mission_items(&self, session: &UploadSession, items: &[Waypoint]) -> UploadResult {
        let result = UploadResult::new(Phase::MissionItems, items.len());
        if let Err(e) = self.preflight(session, "mission items", items.len(), MAX_MISSION_ITEMS) {
            return result.failed(FailurePoint::Preflight, e);
        }
        if items.is_empty() {
            info!("No mission items to upload");
            return result;
        }

        info!("Uploading mission with {} waypoints", items.len());
        let count = Message::MissionCount(MissionCount::new(items.len() as u16));
        if let Err(e) = self.checkpoint().and_then(|()| session.send(&count)) {
            return result.failed(FailurePoint::CountFrame, e);
        }
        self.pacing.pause(Pause::CountFrame);

        self.send_items(session, result, items, |i, wp| {
            info!(
                "MISSION_ITEM {i}: {} at {},{},{}",
                wp.command.as_deref().unwrap_or("WAYPOINT"),
                wp.latitude,
                wp.longitude,
                wp.altitude.unwrap_or(0.0)
            );
            Ok(Message::MissionItemInt(MissionItemInt::from_waypoint(i as u16, wp)?))
        })
    }

    fn geofence(&self, session: &UploadSession, points: &[GeofencePoint]) -> UploadResult {
        let result = UploadResult::new(Phase::Geofence, points.len());
        if let Err(e) = self.preflight(session, "geofence points", points.len(), MAX_FENCE_POINTS) {
            return result.failed(FailurePoint::Preflight, e);
        }
        info!("Uploading {} geofence points", points.len());
        let count = points.len() as u8;
        self.send_items(session, result, points, |i, p| {
            Ok(Message::FencePoint(FencePoint::from_point(i as u8, count, p)?))
        })
    }

    fn rally_points(&self, session: &UploadSession, points: &[RallyRecord]) -> UploadResult {
        let result = UploadResult::new(Phase::RallyPoints, points.len());
        if let Err(e) = self.preflight(session, "rally points", points.len(), MAX_RALLY_POINTS) {
            return result.failed(FailurePoint::Preflight, e);
        }
        info!("Uploading {} rally points", points.len());
        let count = points.len() as u8;
        self.send_items(session, result, points, |i, p| {
            Ok(Message::RallyPoint(RallyPoint::from_point(i as u8, count, p)?))
        })
    }

    // ── Helpers ──────────────────────────────────────────────────────────────

    fn preflight(
        &self,
        session: &UploadSession,
        what: &'static str,
        count: usize,
        max: usize,
    ) -> Result<(), UploadError> {
        if !session.is_connected() {
            return Err(UploadError::NotConnected);
        }
        if count > max {
            return Err(UploadError::TooManyItems { what, count, max });
        }
        Ok(())
    }

    fn checkpoint(&self) -> Result<(), UploadError> {
        if self.cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }
        Ok(())
    }

    /// Build, send and pace each item in order; stop at the first failure.
    fn send_items<T>(
        &self,
        session: &UploadSession,
        mut result: UploadResult,
        items: &[T],
        build: impl Fn(usize, &T) -> Result<Message, UploadError>,
    ) -> UploadResult {
        for (i, item) in items.iter().enumerate() {
            let sent = self
                .checkpoint()
                .and_then(|()| build(i, item))
                .and_then(|msg| session.send(&msg));
            if let Err(e) = sent {
                return result.failed(FailurePoint::Item(i), e);
            }
            result.sent += 1;
            self.pacing.pause(Pause::Item);
        }
        result
    }

    fn finish(&self, session: &UploadSession, result: UploadResult) -> UploadResult {
        match &result.failure {
            None => info!("{} upload complete: {}/{} sent", result.phase, result.sent, result.total),
            Some(f) => error!(
                "{} upload failed at {:?} after {} of {} items: {}",
                result.phase, f.at, result.sent, result.total, f.error
            ),
        }
        session.record_outcome(result.outcome());
        result
    }
}
