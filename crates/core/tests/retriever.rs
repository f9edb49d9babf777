//! Integration tests: RetrieverHandle end to end over loopback.

mod common;

use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

use common::{
    Script, ScriptedServer, application_frames, interleave, ten_piece_document, video_frame,
};
use parking_lot::Mutex;
use retriever::{
    ApplicationData, ErrorKind, ErrorReport, RetrieverConfig, RetrieverError, RetrieverHandle,
    SessionInfo, VideoFrame,
};

fn fast_config() -> RetrieverConfig {
    RetrieverConfig {
        connection_timeout: Duration::from_secs(2),
        read_timeout: Duration::from_millis(50),
        poll_interval: Duration::from_millis(20),
        join_timeout: Duration::from_secs(3),
        ..RetrieverConfig::default()
    }
}

fn wait_until_stopped(handle: &RetrieverHandle, limit: Duration) {
    let deadline = Instant::now() + limit;
    while handle.is_running() {
        assert!(Instant::now() < deadline, "retriever still running");
        thread::sleep(Duration::from_millis(10));
    }
}

#[derive(Default)]
struct Recorded {
    video: Vec<VideoFrame>,
    application: Vec<ApplicationData>,
    sessions: Vec<SessionInfo>,
    errors: Vec<ErrorReport>,
}

fn record(handle: &RetrieverHandle) -> Arc<Mutex<Recorded>> {
    let rec = Arc::new(Mutex::new(Recorded::default()));
    let (v, a, s, e) = (rec.clone(), rec.clone(), rec.clone(), rec.clone());
    handle
        .on_video(move |f| {
            v.lock().video.push(f);
            Ok(())
        })
        .on_application_data(move |d| {
            a.lock().application.push(d);
            Ok(())
        })
        .on_session_start(move |i| {
            s.lock().sessions.push(i);
            Ok(())
        })
        .on_error(move |r| {
            e.lock().errors.push(r);
            Ok(())
        });
    rec
}

#[test]
fn ten_packets_make_one_application_event() {
    let server = ScriptedServer::start(Script {
        after_play: application_frames(&ten_piece_document(), 100),
        hold_after_play: Duration::from_millis(300),
        ..Script::default()
    });
    let handle = RetrieverHandle::new(&server.url(), RetrieverConfig::application()).unwrap();
    let rec = record(&handle);
    handle.start().unwrap();
    wait_until_stopped(&handle, Duration::from_secs(5));

    let rec = rec.lock();
    assert_eq!(rec.sessions.len(), 1);
    assert_eq!(rec.sessions[0].session_id, "ABCD1234");
    assert_eq!(rec.sessions[0].tracks.len(), 1);
    assert_eq!(rec.sessions[0].latency, Duration::from_millis(200));
    assert_eq!(rec.application.len(), 1);
    let data = &rec.application[0];
    assert!(data.xml.starts_with("<tt:MetadataStream"));
    assert!(data.xml.ends_with("</tt:MetadataStream>"));
    assert!(data.xml.contains("<tt:Event n=\"7\"/>"));
    assert_eq!(data.diagnostics.application_samples, 10);
    assert_eq!(data.diagnostics.xml_messages, 1);
    assert!(rec.video.is_empty());
    assert!(rec.errors.is_empty());

    // Only the application track was set up.
    let setups = server.methods().iter().filter(|m| *m == "SETUP").count();
    assert_eq!(setups, 1);
}

#[test]
fn video_frames_carry_capture_time() {
    let mut after_play = Vec::new();
    for seq in 1..=3u16 {
        after_play.extend(video_frame(seq, 3_871_129_600 + u32::from(seq)));
    }
    let server = ScriptedServer::start(Script {
        after_play,
        hold_after_play: Duration::from_millis(300),
        ..Script::default()
    });
    let handle = RetrieverHandle::new(&server.url(), RetrieverConfig::video()).unwrap();
    let rec = record(&handle);
    handle.start().unwrap();
    wait_until_stopped(&handle, Duration::from_secs(5));

    let rec = rec.lock();
    assert_eq!(rec.sessions.len(), 1);
    let sets: Vec<Vec<u8>> = rec.sessions[0].parameter_sets.iter().map(|b| b.to_vec()).collect();
    assert_eq!(sets, [vec![0x67, 0x4d, 0x00, 0x29], vec![0x68, 0xee, 0x3c, 0x80]]);
    assert!(!rec.video.is_empty());
    let last = rec.video.last().unwrap();
    assert_eq!(last.sequence_number, 3);
    assert_eq!(last.payload_type, 96);
    assert_eq!(last.ssrc, 0x1234_5678);
    assert_eq!(last.payload.as_ref(), &[0x65, 0x88, 3]);
    let capture = last.capture_time.expect("capture time");
    assert_eq!(capture.ntp_seconds, 3_871_129_603);
    assert!(capture.c);
    assert_eq!(
        capture.to_datetime().unwrap().to_rfc3339(),
        "2022-09-02T17:46:43+00:00"
    );
    assert_eq!(last.diagnostics.video_samples, 3);
}

#[test]
fn lifecycle() {
    let server = ScriptedServer::start(Script::default());
    let handle = RetrieverHandle::new(&server.url(), fast_config()).unwrap();
    let rec = record(&handle);

    handle.stop();
    assert!(!handle.is_running());

    handle.start().unwrap();
    assert!(handle.is_running());
    assert!(matches!(handle.start(), Err(RetrieverError::AlreadyRunning)));

    let deadline = Instant::now() + Duration::from_secs(2);
    while rec.lock().sessions.is_empty() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(rec.lock().sessions.len(), 1);

    let begun = Instant::now();
    handle.stop();
    assert!(begun.elapsed() < Duration::from_secs(3));
    assert!(!handle.is_running());
    handle.stop();

    let counts = {
        let r = rec.lock();
        (r.sessions.len(), r.errors.len())
    };
    thread::sleep(Duration::from_millis(200));
    let r = rec.lock();
    assert_eq!((r.sessions.len(), r.errors.len()), counts);
    assert!(server.methods().contains(&"TEARDOWN".to_string()));
}

#[test]
fn times_out_without_data() {
    let server = ScriptedServer::start(Script::default());
    let config = RetrieverConfig {
        data_timeout: Some(Duration::from_millis(500)),
        ..fast_config()
    };
    let handle = RetrieverHandle::new(&server.url(), config).unwrap();
    let rec = record(&handle);
    handle.start().unwrap();
    wait_until_stopped(&handle, Duration::from_secs(5));

    let rec = rec.lock();
    assert_eq!(rec.errors.len(), 1);
    assert!(matches!(rec.errors[0].kind, ErrorKind::Timeout));
    assert!(rec.errors[0].fatal);
    assert!(rec.errors[0].uptime >= Duration::from_millis(500));
}

#[test]
fn refused_connection_is_fatal() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let url = format!("rtsp://127.0.0.1:{port}/stream");
    let handle = RetrieverHandle::new(&url, fast_config()).unwrap();
    let rec = record(&handle);
    handle.start().unwrap();
    wait_until_stopped(&handle, Duration::from_secs(5));

    let rec = rec.lock();
    assert_eq!(rec.errors.len(), 1);
    assert!(rec.errors[0].fatal);
    assert_eq!(rec.errors[0].error_count, 1);
    assert!(matches!(rec.errors[0].kind, ErrorKind::Io | ErrorKind::Timeout));
    assert!(rec.sessions.is_empty());
}

#[test]
fn callback_failures_are_counted() {
    let server = ScriptedServer::start(Script {
        after_play: application_frames(&ten_piece_document(), 0),
        hold_after_play: Duration::from_millis(300),
        ..Script::default()
    });
    let handle = RetrieverHandle::new(&server.url(), RetrieverConfig::application()).unwrap();
    handle
        .on_session_start(|_| Err("rejected".into()))
        .on_application_data(|_| panic!("consumer bug"));
    handle.start().unwrap();
    wait_until_stopped(&handle, Duration::from_secs(5));
    assert_eq!(handle.callback_failures(), 2);
}

#[test]
fn restarts_after_server_closes() {
    let server = ScriptedServer::start(Script {
        after_play: application_frames(&ten_piece_document(), 0),
        hold_after_play: Duration::from_millis(200),
        ..Script::default()
    });
    let handle = RetrieverHandle::new(&server.url(), RetrieverConfig::application()).unwrap();
    let rec = record(&handle);

    handle.start().unwrap();
    wait_until_stopped(&handle, Duration::from_secs(5));
    handle.start().unwrap();
    wait_until_stopped(&handle, Duration::from_secs(5));

    let rec = rec.lock();
    assert_eq!(rec.sessions.len(), 2);
    assert_eq!(rec.application.len(), 2);
    assert_eq!(rec.application[1].diagnostics.xml_messages, 1);
}

#[test]
fn stop_interrupts_unanswered_handshake() {
    let server = ScriptedServer::start(Script {
        mute: true,
        ..Script::default()
    });
    let config = RetrieverConfig {
        connection_timeout: Duration::from_secs(10),
        data_timeout: None,
        join_timeout: Duration::from_secs(1),
        ..fast_config()
    };
    let handle = RetrieverHandle::new(&server.url(), config).unwrap();
    let rec = record(&handle);
    handle.start().unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    while server.requests.lock().is_empty() {
        assert!(Instant::now() < deadline, "DESCRIBE never arrived");
        thread::sleep(Duration::from_millis(10));
    }

    let begun = Instant::now();
    handle.stop();
    assert!(begun.elapsed() < Duration::from_millis(900));
    assert!(!handle.is_running());

    // The worker exited and released the socket.
    let deadline = Instant::now() + Duration::from_secs(1);
    while server.closed.load(Ordering::SeqCst) == 0 {
        assert!(Instant::now() < deadline, "socket still open after stop");
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(server.methods(), ["DESCRIBE"]);
    assert!(rec.lock().errors.is_empty());
}

#[test]
fn no_data_timeout_when_disabled() {
    let server = ScriptedServer::start(Script::default());
    let config = RetrieverConfig {
        data_timeout: None,
        ..fast_config()
    };
    let handle = RetrieverHandle::new(&server.url(), config).unwrap();
    let rec = record(&handle);
    handle.start().unwrap();
    thread::sleep(Duration::from_millis(800));
    assert!(handle.is_running());
    handle.stop();

    let rec = rec.lock();
    assert_eq!(rec.sessions.len(), 1);
    assert!(rec.errors.is_empty());
}

#[test]
fn bad_packets_are_reported_and_session_continues() {
    let mut after_play = interleave(2, &[0x80, 107, 0, 1]);
    after_play.extend(application_frames(&["no markup here".to_string()], 2));
    after_play.extend(application_frames(&ten_piece_document(), 3));
    let server = ScriptedServer::start(Script {
        after_play,
        hold_after_play: Duration::from_millis(300),
        ..Script::default()
    });
    let handle = RetrieverHandle::new(&server.url(), RetrieverConfig::application()).unwrap();
    let rec = record(&handle);
    handle.start().unwrap();
    wait_until_stopped(&handle, Duration::from_secs(5));

    let rec = rec.lock();
    assert_eq!(rec.errors.len(), 2);
    assert!(matches!(rec.errors[0].kind, ErrorKind::TruncatedPacket));
    assert!(matches!(rec.errors[1].kind, ErrorKind::NoXmlStart));
    assert!(rec.errors.iter().all(|e| !e.fatal));
    assert_eq!(rec.errors[0].error_count, 1);
    assert_eq!(rec.errors[1].error_count, 2);

    assert_eq!(rec.application.len(), 1);
    let data = &rec.application[0];
    assert!(data.xml.starts_with("<tt:MetadataStream"));
    assert_eq!(data.diagnostics.error_count, 2);
    assert_eq!(data.diagnostics.xml_messages, 1);
}
