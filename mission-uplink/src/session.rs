//! UploadSession: connection state, transport handle and sequence counter.
//!
//! All senders share one session. The state lock is held for exactly one
//! frame (encode + send + counter bump), so every frame gets the next
//! sequence number no matter which thread sends it. Whole upload phases also
//! take the transfer lock so two uploads never interleave their frames.

use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, error, info};
use mavlink_codec::{encode_frame, Message};
use serde::Serialize;

use crate::error::UploadError;
use crate::report::PhaseOutcome;
use crate::transport::{Connector, Endpoint, Transport, UdpConnector};

/// Held for the duration of one orchestrated upload phase.
pub type TransferGuard<'a> = MutexGuard<'a, ()>;

struct Link {
    endpoint: Endpoint,
    transport: Box<dyn Transport>,
}

#[derive(Default)]
struct SessionState {
    link: Option<Link>,
    /// Sequence number of the next frame.
    sequence: u8,
    frames_sent: u64,
    last_outcome: Option<PhaseOutcome>,
}

/// Point-in-time view of a session, safe to publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub connected: bool,
    pub endpoint: Option<Endpoint>,
    pub next_sequence: u8,
    pub frames_sent: u64,
    pub last_outcome: Option<PhaseOutcome>,
}

pub struct UploadSession {
    connector: Box<dyn Connector>,
    state: Mutex<SessionState>,
    transfer: Mutex<()>,
}

impl UploadSession {
    pub fn new(connector: Box<dyn Connector>) -> Self {
        UploadSession {
            connector,
            state: Mutex::new(SessionState::default()),
            transfer: Mutex::new(()),
        }
    }

    /// A session that sends over UDP.
    pub fn udp() -> Self {
        Self::new(Box::new(UdpConnector))
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Connection ───────────────────────────────────────────────────────────

    /// Open the transport. Connecting while already connected is a no-op.
    pub fn connect(&self, host: &str, port: u16) -> Result<(), UploadError> {
        let mut st = self.state();
        if let Some(link) = &st.link {
            debug!("Already connected to {}", link.endpoint);
            return Ok(());
        }

        let endpoint = Endpoint::new(host, port);
        info!("Connecting to ground station at {endpoint}");
        let transport = self.connector.open(&endpoint).map_err(|e| {
            error!("Failed to connect to {endpoint}: {e}");
            UploadError::Transport(e)
        })?;

        st.link = Some(Link { endpoint, transport });
        st.sequence = 0;
        st.frames_sent = 0;
        info!("Connected to ground station");
        Ok(())
    }

    /// Close the transport and reset the sequence counter. Safe to call when
    /// already disconnected, and while another thread is mid-upload: that
    /// upload's next frame fails with `NotConnected`.
    pub fn disconnect(&self) {
        let mut st = self.state();
        if let Some(mut link) = st.link.take() {
            link.transport.close();
            info!("Disconnected from {}", link.endpoint);
        }
        st.sequence = 0;
    }

    pub fn is_connected(&self) -> bool {
        self.state().link.is_some()
    }

    pub fn status(&self) -> SessionStatus {
        let st = self.state();
        SessionStatus {
            connected: st.link.is_some(),
            endpoint: st.link.as_ref().map(|l| l.endpoint.clone()),
            next_sequence: st.sequence,
            frames_sent: st.frames_sent,
            last_outcome: st.last_outcome,
        }
    }

    // ── Sending ──────────────────────────────────────────────────────────────

    /// Frame and send one message. Returns the sequence number it carried.
    ///
    /// Fails with `NotConnected` without touching the transport when the
    /// session is disconnected. The counter only advances when the transport
    /// accepted the frame.
    pub fn send(&self, message: &Message) -> Result<u8, UploadError> {
        let mut guard = self.state();
        let st = &mut *guard;
        let link = st.link.as_mut().ok_or(UploadError::NotConnected)?;

        let seq = st.sequence;
        let frame = encode_frame(seq, message);
        link.transport.send(&frame)?;

        st.sequence = seq.wrapping_add(1);
        st.frames_sent += 1;
        debug!("Sent {} seq={seq} ({} bytes)", message.spec().name, frame.len());
        Ok(seq)
    }

    /// Serialise whole upload phases against each other.
    pub fn begin_transfer(&self) -> TransferGuard<'_> {
        self.transfer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn record_outcome(&self, outcome: PhaseOutcome) {
        self.state().last_outcome = Some(outcome);
    }

    #[cfg(test)]
    pub(crate) fn set_sequence(&self, seq: u8) {
        self.state().sequence = seq;
    }
}

impl Drop for UploadSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockConnector;
    use mavlink_codec::{decode_frame, MissionCount};

    fn mock_session() -> (MockConnector, UploadSession) {
        let mock = MockConnector::new();
        let session = UploadSession::new(Box::new(mock.clone()));
        (mock, session)
    }

    fn count(n: u16) -> Message {
        Message::MissionCount(MissionCount::new(n))
    }

    #[test]
    fn send_while_disconnected_does_no_io() {
        let (mock, session) = mock_session();
        assert!(!session.is_connected());
        assert!(matches!(session.send(&count(1)), Err(UploadError::NotConnected)));
        assert_eq!(mock.send_attempts(), 0);
        assert!(mock.opened().is_empty());
    }

    #[test]
    fn connect_is_idempotent() {
        let (mock, session) = mock_session();
        session.connect("127.0.0.1", 14550).unwrap();
        session.connect("10.0.0.9", 14551).unwrap();
        assert!(session.is_connected());
        assert_eq!(mock.opened(), vec![Endpoint::new("127.0.0.1", 14550)]);
        assert_eq!(session.status().endpoint, Some(Endpoint::new("127.0.0.1", 14550)));
    }

    #[test]
    fn disconnect_closes_once_and_is_safe_to_repeat() {
        let (mock, session) = mock_session();
        session.connect("127.0.0.1", 14550).unwrap();
        session.disconnect();
        session.disconnect();
        assert!(!session.is_connected());
        assert_eq!(mock.close_count(), 1);
        assert!(matches!(session.send(&count(1)), Err(UploadError::NotConnected)));
    }

    #[test]
    fn failed_connect_leaves_session_disconnected() {
        let (mock, session) = mock_session();
        mock.refuse_connections();
        assert!(matches!(session.connect("127.0.0.1", 14550), Err(UploadError::Transport(_))));
        assert!(!session.is_connected());
    }

    #[test]
    fn sequence_increments_and_wraps() {
        let (mock, session) = mock_session();
        session.connect("127.0.0.1", 14550).unwrap();
        session.set_sequence(250);

        for k in 0..10u32 {
            let seq = session.send(&count(1)).unwrap();
            assert_eq!(u32::from(seq), (250 + k) % 256);
        }

        let seqs: Vec<u8> = mock
            .frames()
            .iter()
            .map(|f| decode_frame(f).unwrap().header.sequence)
            .collect();
        assert_eq!(seqs, vec![250, 251, 252, 253, 254, 255, 0, 1, 2, 3]);
        assert_eq!(session.status().next_sequence, 4);
        assert_eq!(session.status().frames_sent, 10);
    }

    #[test]
    fn full_cycle_of_sequence_numbers() {
        let (mock, session) = mock_session();
        session.connect("127.0.0.1", 14550).unwrap();
        for _ in 0..300 {
            session.send(&count(0)).unwrap();
        }
        let frames = mock.frames();
        for (k, f) in frames.iter().enumerate() {
            assert_eq!(decode_frame(f).unwrap().header.sequence as usize, k % 256);
        }
    }

    #[test]
    fn failed_send_does_not_consume_a_sequence_number() {
        let (mock, session) = mock_session();
        session.connect("127.0.0.1", 14550).unwrap();
        mock.fail_on_send(1);
        assert_eq!(session.send(&count(1)).unwrap(), 0);
        assert!(matches!(session.send(&count(1)), Err(UploadError::Transport(_))));
        assert_eq!(session.send(&count(1)).unwrap(), 1);
    }

    #[test]
    fn disconnect_resets_sequence() {
        let (_mock, session) = mock_session();
        session.connect("127.0.0.1", 14550).unwrap();
        session.send(&count(1)).unwrap();
        session.send(&count(1)).unwrap();
        session.disconnect();
        session.connect("127.0.0.1", 14550).unwrap();
        assert_eq!(session.send(&count(1)).unwrap(), 0);
    }

    #[test]
    fn drop_closes_transport() {
        let (mock, session) = mock_session();
        session.connect("127.0.0.1", 14550).unwrap();
        drop(session);
        assert_eq!(mock.close_count(), 1);
    }
}
