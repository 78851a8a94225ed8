//! End-to-end upload scenarios against the mock transport and a loopback
//! UDP socket.

use std::net::UdpSocket;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use mavlink_codec::{command_id, decode_frame, Frame, Message};
use mission_uplink::{
    FailurePoint, GeofencePoint, Mission, MissionUploader, MockConnector, NoPacing, Pacing, Pause,
    Phase, RallyPoint, UploadError, UploadSession, VehicleParameter, Waypoint,
};

fn connected() -> (MockConnector, UploadSession) {
    let mock = MockConnector::new();
    let session = UploadSession::new(Box::new(mock.clone()));
    session.connect("127.0.0.1", 14550).unwrap();
    (mock, session)
}

fn decoded(mock: &MockConnector) -> Vec<Frame> {
    mock.frames().iter().map(|f| decode_frame(f).expect("invalid frame")).collect()
}

fn three_waypoints() -> Vec<Waypoint> {
    vec![
        Waypoint::new(10.0, 20.0, 50.0, "WAYPOINT"),
        Waypoint::new(10.1, 20.1, 60.0, "WAYPOINT"),
        Waypoint::new(10.2, 20.2, 0.0, "LAND"),
    ]
}

fn uploader() -> MissionUploader {
    MissionUploader::new(NoPacing)
}

// ── Mission items ────────────────────────────────────────────────────────────

#[test]
fn three_waypoints_produce_count_then_items() {
    let (mock, session) = connected();
    let result = uploader().upload_mission_items(&session, &three_waypoints());

    assert!(result.is_success());
    assert_eq!((result.sent, result.total), (3, 3));
    assert_eq!(result.last_delivered(), Some(2));

    let frames = decoded(&mock);
    assert_eq!(frames.len(), 4);
    match frames[0].message {
        Message::MissionCount(c) => assert_eq!(c.count, 3),
        ref other => panic!("expected MISSION_COUNT, got {other:?}"),
    }
    for (i, frame) in frames[1..].iter().enumerate() {
        let Message::MissionItemInt(item) = frame.message else {
            panic!("expected MISSION_ITEM_INT at {i}");
        };
        assert_eq!(item.seq as usize, i);
        assert_eq!(item.current, u8::from(i == 0));
        assert_eq!((item.target_system, item.target_component), (0, 0));
    }
    let Message::MissionItemInt(last) = frames[3].message else { unreachable!() };
    assert_eq!(last.command, command_id(Some("LAND")));
    assert_eq!(last.x, 102_000_000);
    assert_eq!(last.y, 202_000_000);

    let seqs: Vec<u8> = frames.iter().map(|f| f.header.sequence).collect();
    assert_eq!(seqs, vec![0, 1, 2, 3]);
}

#[test]
fn empty_mission_sends_nothing() {
    let (mock, session) = connected();
    let result = uploader().upload_mission_items(&session, &[]);
    assert!(result.is_success());
    assert_eq!(result.sent, 0);
    assert_eq!(mock.send_attempts(), 0);
}

#[test]
fn transport_failure_reports_index_and_last_delivered() {
    let (mock, session) = connected();
    mock.fail_on_send(2); // count, item 0, item 1 ← fails
    let result = uploader().upload_mission_items(&session, &three_waypoints());

    let failure = result.failure.as_ref().unwrap();
    assert_eq!(failure.at, FailurePoint::Item(1));
    assert!(matches!(failure.error, UploadError::Transport(_)));
    assert_eq!(result.last_delivered(), Some(0));
    assert_eq!(mock.send_attempts(), 3, "no frames after the failure");
}

#[test]
fn count_frame_failure_sends_no_items() {
    let (mock, session) = connected();
    mock.fail_on_send(0);
    let result = uploader().upload_mission_items(&session, &three_waypoints());
    assert_eq!(result.failure.unwrap().at, FailurePoint::CountFrame);
    assert_eq!(result.sent, 0);
    assert_eq!(mock.send_attempts(), 1);
}

// ── Disconnected guard ───────────────────────────────────────────────────────

#[test]
fn every_operation_refuses_while_disconnected() {
    let mock = MockConnector::new();
    let session = UploadSession::new(Box::new(mock.clone()));
    let up = uploader();

    let results = vec![
        up.upload_mission_items(&session, &three_waypoints()),
        up.upload_mission_items(&session, &[]),
        up.upload_geofence(&session, &[GeofencePoint::new(1.0, 2.0)]),
        up.upload_rally_points(&session, &[RallyPoint::default()]),
        up.upload_parameters(&session, &[VehicleParameter::new("RTL_ALT", "1500")]),
        up.send_command(&session, 20, [0.0; 7]),
        up.upload_complete_mission(&session, &Mission::default()).waypoints,
    ];
    for r in results {
        let f = r.failure.unwrap_or_else(|| panic!("{} succeeded while disconnected", r.phase));
        assert!(matches!(f.error, UploadError::NotConnected), "{}", r.phase);
        assert_eq!(f.at, FailurePoint::Preflight);
    }
    assert_eq!(mock.send_attempts(), 0);
}

// ── Geofence / rally / parameters / command ──────────────────────────────────

#[test]
fn geofence_items_carry_idx_and_count() {
    let (mock, session) = connected();
    let points = [GeofencePoint::new(1.0, 2.0), GeofencePoint::new(1.5, 2.5), GeofencePoint::new(2.0, 2.0)];
    assert!(uploader().upload_geofence(&session, &points).is_success());

    let frames = decoded(&mock);
    assert_eq!(frames.len(), 3, "no leading count frame");
    for (i, frame) in frames.iter().enumerate() {
        let Message::FencePoint(p) = frame.message else { panic!("expected FENCE_POINT") };
        assert_eq!((p.idx as usize, p.count), (i, 3));
        assert_eq!(p.lat, points[i].latitude as f32);
    }
}

#[test]
fn rally_points_scale_coordinates() {
    let (mock, session) = connected();
    let rally = RallyPoint {
        latitude: -35.363_261,
        longitude: 149.165_230,
        altitude: Some(60.0),
        break_altitude: Some(40.0),
        land_direction: None,
    };
    assert!(uploader().upload_rally_points(&session, &[rally]).is_success());

    let Message::RallyPoint(p) = decoded(&mock)[0].message else { panic!("expected RALLY_POINT") };
    assert_eq!((p.lat, p.lng), (-353_632_610, 1_491_652_300));
    assert_eq!((p.alt, p.break_alt, p.land_dir), (60, 40, 0));
    assert_eq!((p.idx, p.count), (0, 1));
}

#[test]
fn malformed_parameter_aborts_at_its_index() {
    let (mock, session) = connected();
    let params = [
        VehicleParameter::new("WPNAV_SPEED", "500"),
        VehicleParameter::new("RTL_ALT", "fifteen"),
        VehicleParameter::new("FENCE_ENABLE", "1"),
    ];
    let result = uploader().upload_parameters(&session, &params);

    let failure = result.failure.as_ref().unwrap();
    assert_eq!(failure.at, FailurePoint::Item(1));
    assert!(matches!(failure.error, UploadError::Encoding(_)));
    assert_eq!(result.sent, 1);

    let frames = decoded(&mock);
    assert_eq!(frames.len(), 1);
    let Message::ParamSet(p) = frames[0].message else { panic!("expected PARAM_SET") };
    assert_eq!(p.name(), "WPNAV_SPEED");
    assert_eq!(p.param_value, 500.0);
}

#[test]
fn corrupt_position_aborts_instead_of_sending_null_island() {
    let (mock, session) = connected();
    let mut items = three_waypoints();
    items[1].latitude = f64::NAN;
    let result = uploader().upload_mission_items(&session, &items);

    let failure = result.failure.as_ref().unwrap();
    assert_eq!(failure.at, FailurePoint::Item(1));
    assert!(matches!(failure.error, UploadError::Encoding(_)));
    assert_eq!(result.last_delivered(), Some(0));
    assert_eq!(mock.frames().len(), 2, "count frame and item 0 only");

    let fence = [GeofencePoint::new(1.0, 2.0), GeofencePoint::new(95.0, 2.0)];
    let result = uploader().upload_geofence(&session, &fence);
    assert_eq!(result.failure.as_ref().unwrap().at, FailurePoint::Item(1));
    assert_eq!(result.sent, 1);
}

#[test]
fn named_command_is_a_single_frame() {
    let (mock, session) = connected();
    let result = uploader().send_named_command(&session, "rtl", [0.0; 7]);
    assert!(result.is_success());
    assert_eq!(result.phase, Phase::Command);

    let frames = decoded(&mock);
    assert_eq!(frames.len(), 1);
    let Message::CommandLong(c) = frames[0].message else { panic!("expected COMMAND_LONG") };
    assert_eq!(c.command, 20);
    assert_eq!(c.confirmation, 0);
}

// ── Complete mission ─────────────────────────────────────────────────────────

fn full_mission() -> Mission {
    Mission {
        name: "survey".into(),
        geofence_enabled: true,
        waypoints: three_waypoints(),
        geofence_points: vec![GeofencePoint::new(9.9, 19.9), GeofencePoint::new(10.3, 20.3)],
        rally_points: vec![RallyPoint { latitude: 10.0, longitude: 20.05, ..Default::default() }],
        ..Default::default()
    }
}

#[test]
fn complete_mission_uploads_all_phases_in_order() {
    let (mock, session) = connected();
    let report = uploader().upload_complete_mission(&session, &full_mission());
    assert!(report.is_success());
    assert!(report.all_succeeded());
    assert_eq!(report.geofence.as_ref().map(|r| r.sent), Some(2));
    assert_eq!(report.rally_points.as_ref().map(|r| r.sent), Some(1));

    let kinds: Vec<&str> = decoded(&mock).iter().map(|f| f.message.spec().name).collect();
    assert_eq!(
        kinds,
        vec![
            "MISSION_COUNT",
            "MISSION_ITEM_INT",
            "MISSION_ITEM_INT",
            "MISSION_ITEM_INT",
            "FENCE_POINT",
            "FENCE_POINT",
            "RALLY_POINT",
        ]
    );
}

#[test]
fn waypoint_failure_skips_optional_phases() {
    let (mock, session) = connected();
    mock.fail_on_send(2);
    let report = uploader().upload_complete_mission(&session, &full_mission());

    assert!(!report.is_success());
    assert_eq!(report.waypoints.failure.as_ref().unwrap().at, FailurePoint::Item(1));
    assert!(report.geofence.is_none());
    assert!(report.rally_points.is_none());
    assert_eq!(mock.send_attempts(), 3);
}

#[test]
fn optional_phase_failure_does_not_gate_the_other() {
    let (mock, session) = connected();
    mock.fail_on_send(4); // first FENCE_POINT
    let report = uploader().upload_complete_mission(&session, &full_mission());

    assert!(report.is_success(), "waypoints were delivered");
    assert!(!report.all_succeeded());
    let fence = report.geofence.as_ref().unwrap();
    assert_eq!(fence.failure.as_ref().unwrap().at, FailurePoint::Item(0));
    assert!(report.rally_points.as_ref().unwrap().is_success());
    assert_eq!(report.first_failure().map(|r| r.phase), Some(Phase::Geofence));

    let frames = decoded(&mock);
    let last = frames.last().unwrap();
    assert!(matches!(last.message, Message::RallyPoint(_)));
    assert_eq!(last.header.sequence, 4, "failed frame did not consume a sequence number");
}

#[test]
fn disabled_geofence_is_skipped() {
    let (mock, session) = connected();
    let mission = Mission { geofence_enabled: false, ..full_mission() };
    let report = uploader().upload_complete_mission(&session, &mission);
    assert!(report.geofence.is_none());
    assert!(report.rally_points.is_some());
    assert_eq!(mock.frames().len(), 5);
}

// ── Concurrency ──────────────────────────────────────────────────────────────

#[test]
fn concurrent_uploads_share_one_counter_and_never_interleave() {
    let (mock, session) = connected();
    let session = Arc::new(session);

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let session = Arc::clone(&session);
            thread::spawn(move || {
                let items = vec![Waypoint::new(1.0, 1.0, 10.0, "WAYPOINT"); 5];
                uploader().upload_mission_items(&session, &items).is_success()
            })
        })
        .collect();
    for h in handles {
        assert!(h.join().unwrap());
    }

    let frames = decoded(&mock);
    assert_eq!(frames.len(), 12);
    for (k, f) in frames.iter().enumerate() {
        assert_eq!(f.header.sequence as usize, k);
    }
    for block in frames.chunks(6) {
        assert!(matches!(block[0].message, Message::MissionCount(_)));
        for (i, f) in block[1..].iter().enumerate() {
            let Message::MissionItemInt(item) = f.message else { panic!("interleaved upload") };
            assert_eq!(item.seq as usize, i);
        }
    }
}

/// Pulls the link out from under the uploader after a number of items.
struct DisconnectAfter {
    session: Arc<UploadSession>,
    items: usize,
    seen: AtomicUsize,
}

impl Pacing for DisconnectAfter {
    fn pause(&self, after: Pause) {
        if after == Pause::Item && self.seen.fetch_add(1, Ordering::SeqCst) + 1 == self.items {
            self.session.disconnect();
        }
    }
}

#[test]
fn disconnect_mid_upload_fails_cleanly() {
    let (mock, session) = connected();
    let session = Arc::new(session);
    let up = MissionUploader::new(DisconnectAfter {
        session: Arc::clone(&session),
        items: 2,
        seen: AtomicUsize::new(0),
    });

    let result = up.upload_mission_items(&session, &three_waypoints());
    let failure = result.failure.as_ref().unwrap();
    assert_eq!(failure.at, FailurePoint::Item(2));
    assert!(matches!(failure.error, UploadError::NotConnected));
    assert_eq!(result.last_delivered(), Some(1));
    assert_eq!(mock.send_attempts(), 3);
    assert_eq!(mock.close_count(), 1);
}

#[test]
fn cancel_from_another_thread_between_frames() {
    let (mock, session) = connected();
    let up = MissionUploader::new(mission_uplink::FixedDelay {
        after_count: Duration::from_millis(200),
        between_items: Duration::ZERO,
    });
    let token = up.cancel_token();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        token.cancel();
    });

    let result = up.upload_mission_items(&session, &three_waypoints());
    canceller.join().unwrap();

    let failure = result.failure.as_ref().unwrap();
    assert_eq!(failure.at, FailurePoint::Item(0));
    assert!(matches!(failure.error, UploadError::Cancelled));
    assert_eq!(mock.frames().len(), 1, "only the count frame went out");
}

// ── UDP loopback ─────────────────────────────────────────────────────────────

#[test]
fn udp_session_delivers_valid_frames() {
    let rx = UdpSocket::bind("127.0.0.1:0").unwrap();
    rx.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let port = rx.local_addr().unwrap().port();

    let session = UploadSession::udp();
    session.connect("127.0.0.1", port).unwrap();
    let result = uploader().upload_mission_items(&session, &three_waypoints()[..2]);
    assert!(result.is_success());

    let mut buf = [0u8; 300];
    let mut frames = Vec::new();
    for _ in 0..3 {
        let (n, _) = rx.recv_from(&mut buf).unwrap();
        frames.push(decode_frame(&buf[..n]).expect("receiver rejected frame"));
    }
    assert!(matches!(frames[0].message, Message::MissionCount(c) if c.count == 2));
    assert!(matches!(frames[2].message, Message::MissionItemInt(i) if i.seq == 1));

    session.disconnect();
    assert!(!session.is_connected());
}
