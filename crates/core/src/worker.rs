//! The retrieval worker: one session, start to finish, on its own thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::error::{Result, RetrieverError};
use crate::event::{
    ApplicationData, EventSender, RetrieverEvent, SessionInfo, Stats, VideoFrame,
};
use crate::media::{CaptureTimestamp, FragmentReassembler, RtpPacket};
use crate::protocol::MediaKind;
use crate::retriever::RetrieverConfig;
use crate::session::{InterleavedChannels, RtspCredentials, RtspSession};
use crate::transport::{ChannelDemux, ChannelHandler, DemuxExit};

type LatestTimestamp = Arc<Mutex<Option<CaptureTimestamp>>>;

/// Runs connect → DESCRIBE → SETUP → PLAY → receive → TEARDOWN and turns
/// what arrives into events.
pub(crate) struct RetrievalWorker {
    credentials: RtspCredentials,
    config: RetrieverConfig,
    events: EventSender,
    stop: Arc<AtomicBool>,
    stats: Arc<Stats>,
}

impl RetrievalWorker {
    pub(crate) fn new(
        credentials: RtspCredentials,
        config: RetrieverConfig,
        events: EventSender,
        stop: Arc<AtomicBool>,
        stats: Arc<Stats>,
    ) -> Self {
        RetrievalWorker {
            credentials,
            config,
            events,
            stop,
            stats,
        }
    }

    /// Thread entry point. Never panics on session errors; they become a
    /// fatal error event.
    pub(crate) fn run(self) {
        tracing::info!(url = %self.credentials.base_url, "worker started");
        match self.retrieve() {
            Ok(DemuxExit::Stopped) => tracing::info!("worker stopped"),
            Ok(DemuxExit::ConnectionClosed) => tracing::info!("stream ended by server"),
            Err(RetrieverError::Cancelled) => tracing::info!("worker stopped during setup"),
            Err(e) => {
                tracing::error!(error = %e, "retrieval failed");
                let report = self.stats.report(&e, true);
                self.events.send_control(RetrieverEvent::Error(report));
            }
        }
    }

    fn retrieve(&self) -> Result<DemuxExit> {
        let mut session = RtspSession::connect(
            self.credentials.clone(),
            self.config.connection_timeout,
            self.config.read_timeout,
        )?;
        session.set_stop_flag(self.stop.clone());
        if self.stopped() {
            session.teardown();
            return Ok(DemuxExit::Stopped);
        }
        session.describe()?;

        // Look up every wanted track before the first SETUP.
        let video = self
            .config
            .enable_video
            .then(|| session.find_track(&MediaKind::Video))
            .transpose()?;
        let application = self
            .config
            .enable_application
            .then(|| session.find_track(&MediaKind::Application))
            .transpose()?;

        let latest: LatestTimestamp = Arc::new(Mutex::new(None));
        let mut demux = ChannelDemux::new();

        if let Some(track) = &video {
            let channels = session.setup(track, InterleavedChannels::VIDEO)?;
            demux.register(channels.rtp_channel, self.video_handler(latest.clone()));
            demux.register(channels.rtcp_channel, rtcp_handler("video"));
        }
        if let Some(track) = &application {
            let channels = session.setup(track, InterleavedChannels::APPLICATION)?;
            demux.register(channels.rtp_channel, self.application_handler(latest.clone()));
            demux.register(channels.rtcp_channel, rtcp_handler("application"));
        }

        session.play()?;
        self.events.send_control(RetrieverEvent::SessionStart(SessionInfo {
            session_id: session.session_id().unwrap_or_default().to_string(),
            tracks: session.tracks().to_vec(),
            sdp: session.sdp().unwrap_or_default().to_string(),
            latency: self.config.latency,
            session_timeout: session.session_timeout(),
            parameter_sets: video
                .as_ref()
                .map(|t| t.sprop_parameter_sets().into_iter().map(Bytes::from).collect())
                .unwrap_or_default(),
        }));

        tracing::debug!(channels = ?demux.channels().collect::<Vec<_>>(), "receiving");
        let exit = session.receive(&mut demux, &self.stop)?;
        session.teardown();
        Ok(exit)
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn video_handler(&self, latest: LatestTimestamp) -> VideoHandler {
        VideoHandler {
            events: self.events.clone(),
            stats: self.stats.clone(),
            latest,
        }
    }

    fn application_handler(&self, latest: LatestTimestamp) -> ApplicationHandler {
        ApplicationHandler {
            events: self.events.clone(),
            stats: self.stats.clone(),
            latest,
            reassembler: FragmentReassembler::new(),
        }
    }
}

fn rtcp_handler(stream: &'static str) -> impl ChannelHandler + 'static {
    move |packet: &[u8]| tracing::trace!(stream, len = packet.len(), "RTCP packet ignored")
}

/// Report a per-packet error: counted, logged and queued, never fatal.
fn packet_error(events: &EventSender, stats: &Stats, err: RetrieverError) {
    tracing::warn!(error = %err, "dropping packet");
    let report = stats.report(&err, false);
    events.send_control(RetrieverEvent::Error(report));
}

fn update_latest(latest: &LatestTimestamp, pkt: &RtpPacket<'_>) -> Option<CaptureTimestamp> {
    let mut guard = latest.lock();
    if let Some(ts) = CaptureTimestamp::from_packet(pkt) {
        tracing::trace!(capture_time = %ts, "capture timestamp");
        *guard = Some(ts);
    }
    *guard
}

struct VideoHandler {
    events: EventSender,
    stats: Arc<Stats>,
    latest: LatestTimestamp,
}

impl ChannelHandler for VideoHandler {
    fn handle_packet(&mut self, packet: &[u8]) {
        let pkt = match RtpPacket::parse(packet) {
            Ok(pkt) => pkt,
            Err(e) => return packet_error(&self.events, &self.stats, e),
        };
        self.stats.video_sample();
        let capture_time = update_latest(&self.latest, &pkt);
        let frame = VideoFrame::from_packet(&pkt, capture_time, self.stats.snapshot());
        tracing::trace!(seq = frame.sequence_number, len = frame.payload.len(), "video packet");
        self.events.send_video(frame);
    }
}

struct ApplicationHandler {
    events: EventSender,
    stats: Arc<Stats>,
    latest: LatestTimestamp,
    reassembler: FragmentReassembler,
}

impl ChannelHandler for ApplicationHandler {
    fn handle_packet(&mut self, packet: &[u8]) {
        let pkt = match RtpPacket::parse(packet) {
            Ok(pkt) => pkt,
            Err(e) => {
                self.reassembler.reset();
                return packet_error(&self.events, &self.stats, e);
            }
        };
        self.stats.application_sample();
        let capture_time = update_latest(&self.latest, &pkt);
        match self.reassembler.push(&pkt) {
            Ok(None) => {}
            Ok(Some(xml)) => {
                self.stats.xml_message();
                tracing::debug!(len = xml.len(), "application message complete");
                self.events
                    .send_control(RetrieverEvent::ApplicationData(ApplicationData {
                        xml,
                        capture_time,
                        diagnostics: self.stats.snapshot(),
                    }));
            }
            Err(e) => packet_error(&self.events, &self.stats, e),
        }
    }
}
