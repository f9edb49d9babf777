//! Events delivered to consumers, and the queues that carry them.
//!
//! Video frames travel on a single-slot queue where a new frame replaces an
//! undelivered one. Everything else shares a bounded queue whose sender
//! blocks while it is full, re-checking the stop flag every poll interval.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use crossbeam_channel::{Receiver, SendTimeoutError, Sender, TrySendError, bounded};

use crate::error::{ErrorKind, RetrieverError};
use crate::media::{CaptureTimestamp, RtpPacket};
use crate::protocol::MediaTrack;

/// One event produced by a retrieval worker.
#[derive(Debug, Clone)]
pub enum RetrieverEvent {
    Video(VideoFrame),
    ApplicationData(ApplicationData),
    SessionStart(SessionInfo),
    Error(ErrorReport),
}

/// A raw video RTP payload, as handed to an external depacketizer/decoder.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub payload: Bytes,
    pub sequence_number: u16,
    pub rtp_timestamp: u32,
    pub marker: bool,
    pub payload_type: u8,
    pub ssrc: u32,
    /// Most recent capture time seen on any stream.
    pub capture_time: Option<CaptureTimestamp>,
    pub diagnostics: Diagnostics,
}

impl VideoFrame {
    pub(crate) fn from_packet(
        pkt: &RtpPacket<'_>,
        capture_time: Option<CaptureTimestamp>,
        diagnostics: Diagnostics,
    ) -> Self {
        VideoFrame {
            payload: Bytes::copy_from_slice(pkt.payload()),
            sequence_number: pkt.sequence_number(),
            rtp_timestamp: pkt.timestamp(),
            marker: pkt.mark(),
            payload_type: pkt.payload_type(),
            ssrc: pkt.ssrc(),
            capture_time,
            diagnostics,
        }
    }
}

/// One reassembled application (XML) message.
#[derive(Debug, Clone)]
pub struct ApplicationData {
    pub xml: String,
    pub capture_time: Option<CaptureTimestamp>,
    pub diagnostics: Diagnostics,
}

/// Emitted once PLAY succeeds.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub session_id: String,
    pub tracks: Vec<MediaTrack>,
    pub sdp: String,
    /// Jitter-buffer latency requested for the downstream pipeline.
    pub latency: Duration,
    pub session_timeout: Duration,
    /// H.264 SPS/PPS from the video track's `sprop-parameter-sets`, for
    /// initializing a decoder before the first frame. Empty when absent.
    pub parameter_sets: Vec<Bytes>,
}

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    /// The worker stops after a fatal error.
    pub fatal: bool,
    /// Errors seen so far in this run, this one included.
    pub error_count: u64,
    pub uptime: Duration,
}

/// Counters snapshotted into every data event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub video_samples: u64,
    pub application_samples: u64,
    pub xml_messages: u64,
    pub error_count: u64,
    pub uptime: Duration,
}

/// Per-run counters, shared by the worker and the dispatch thread.
#[derive(Debug)]
pub(crate) struct Stats {
    started: Instant,
    video_samples: AtomicU64,
    application_samples: AtomicU64,
    xml_messages: AtomicU64,
    errors: AtomicU64,
}

impl Stats {
    pub(crate) fn new() -> Self {
        Stats {
            started: Instant::now(),
            video_samples: AtomicU64::new(0),
            application_samples: AtomicU64::new(0),
            xml_messages: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    pub(crate) fn video_sample(&self) {
        self.video_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn application_sample(&self) {
        self.application_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn xml_message(&self) {
        self.xml_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub(crate) fn snapshot(&self) -> Diagnostics {
        Diagnostics {
            video_samples: self.video_samples.load(Ordering::Relaxed),
            application_samples: self.application_samples.load(Ordering::Relaxed),
            xml_messages: self.xml_messages.load(Ordering::Relaxed),
            error_count: self.errors.load(Ordering::Relaxed),
            uptime: self.uptime(),
        }
    }

    /// Count `err` and build its report.
    pub(crate) fn report(&self, err: &RetrieverError, fatal: bool) -> ErrorReport {
        let error_count = self.errors.fetch_add(1, Ordering::Relaxed) + 1;
        ErrorReport {
            kind: err.kind(),
            message: err.to_string(),
            fatal,
            error_count,
            uptime: self.uptime(),
        }
    }
}

/// Receiving ends, owned by the dispatch thread.
pub(crate) struct EventQueues {
    pub video: Receiver<RetrieverEvent>,
    pub control: Receiver<RetrieverEvent>,
}

/// Sending ends, owned by the worker and its channel handlers.
#[derive(Clone)]
pub(crate) struct EventSender {
    video_tx: Sender<RetrieverEvent>,
    /// Lets the sender evict the undelivered frame.
    video_rx: Receiver<RetrieverEvent>,
    control_tx: Sender<RetrieverEvent>,
    stop: Arc<AtomicBool>,
    poll_interval: Duration,
}

pub(crate) fn event_queues(
    control_capacity: usize,
    stop: Arc<AtomicBool>,
    poll_interval: Duration,
) -> (EventSender, EventQueues) {
    let (video_tx, video_rx) = bounded(1);
    let (control_tx, control_rx) = bounded(control_capacity.max(1));
    let sender = EventSender {
        video_tx,
        video_rx: video_rx.clone(),
        control_tx,
        stop,
        poll_interval,
    };
    let queues = EventQueues {
        video: video_rx,
        control: control_rx,
    };
    (sender, queues)
}

impl EventSender {
    /// Queue a video frame, replacing any frame not yet delivered.
    pub(crate) fn send_video(&self, frame: VideoFrame) {
        match self.video_tx.try_send(RetrieverEvent::Video(frame)) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                if self.video_rx.try_recv().is_ok() {
                    tracing::trace!("dropping undelivered video frame");
                }
                if self.video_tx.try_send(event).is_err() {
                    tracing::trace!("video queue contended, frame dropped");
                }
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    /// Queue a non-video event, blocking while the queue is full.
    ///
    /// Gives up once the stop flag is set. Returns whether it was queued.
    pub(crate) fn send_control(&self, mut event: RetrieverEvent) -> bool {
        loop {
            match self.control_tx.send_timeout(event, self.poll_interval) {
                Ok(()) => return true,
                Err(SendTimeoutError::Timeout(back)) => {
                    if self.stop.load(Ordering::SeqCst) {
                        tracing::debug!("stop requested, event not queued");
                        return false;
                    }
                    event = back;
                }
                Err(SendTimeoutError::Disconnected(_)) => return false,
            }
        }
    }
}
