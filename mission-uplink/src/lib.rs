//! Mission uplink: streams stored missions to a MAVLink ground station.
//!
//! An [`UploadSession`] owns the UDP link and the frame sequence counter; a
//! [`MissionUploader`] drives the upload phases over it. Both are usable from
//! several threads at once; the session serialises every frame.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod pacing;
pub mod report;
pub mod session;
pub mod telemetry;
pub mod transport;

pub use config::UplinkConfig;
pub use error::{ConfigError, ErrorKind, UploadError};
pub use orchestrator::{MissionUploader, MAX_FENCE_POINTS, MAX_MISSION_ITEMS, MAX_RALLY_POINTS};
pub use pacing::{CancelToken, FixedDelay, NoPacing, Pacing, Pause};
pub use report::{FailurePoint, MissionReport, Phase, PhaseOutcome, UploadFailure, UploadResult};
pub use session::{SessionStatus, UploadSession};
pub use telemetry::{LinkSample, TelemetryTicker};
pub use transport::{Connector, Endpoint, MockConnector, Transport, UdpConnector};

// ── Re-exports used by the CLI and integration tests ─────────────────────────

pub use mavlink_codec::{MavCmd, STX};
pub use mission_schema::{FenceType, GeofencePoint, Mission, RallyPoint, VehicleParameter, Waypoint};
