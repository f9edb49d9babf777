use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use retriever::axis::AxisUrlBuilder;
use retriever::media::onvif::SceneSummary;
use retriever::{RetrieverConfig, RetrieverHandle, RtspCredentials};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "rtsp-retriever",
    about = "Pull live video and ONVIF application data from an RTSP camera"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connect to an Axis device by address
    Device {
        /// Device IP address or hostname
        #[arg(long, env = "AX_DEVIL_TARGET_ADDR")]
        ip: String,
        #[arg(long, env = "AX_DEVIL_TARGET_USER", default_value = "")]
        username: String,
        #[arg(long, env = "AX_DEVIL_TARGET_PASS", default_value = "", hide_env_values = true)]
        password: String,
        /// Video source (camera=N)
        #[arg(long, default_value_t = 1)]
        source: u32,
        /// Request capture timestamps in the RTP header extension
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        rtp_ext: bool,
        /// Stream resolution, e.g. 1920x1080
        #[arg(long)]
        resolution: Option<String>,
        #[command(flatten)]
        common: Common,
    },
    /// Connect to a full rtsp:// URL
    Url {
        rtsp_url: String,
        #[command(flatten)]
        common: Common,
    },
}

#[derive(Args)]
struct Common {
    /// Pipeline latency in milliseconds
    #[arg(long, default_value_t = 200)]
    latency: u64,
    /// Retrieve video only
    #[arg(long, conflicts_with = "only_application_data")]
    only_video: bool,
    /// Retrieve application data only
    #[arg(long)]
    only_application_data: bool,
    /// Seconds allowed for connecting and for each RTSP exchange
    #[arg(long, default_value_t = 30)]
    connection_timeout: u64,
    /// Seconds to wait for the first data, 0 to wait forever
    #[arg(long, default_value_t = 30)]
    timeout: u64,
    /// Stop after this many seconds
    #[arg(long)]
    duration: Option<u64>,
    /// Log filter, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Common {
    fn config(&self) -> RetrieverConfig {
        RetrieverConfig {
            connection_timeout: Duration::from_secs(self.connection_timeout),
            data_timeout: (self.timeout > 0).then(|| Duration::from_secs(self.timeout)),
            latency: Duration::from_millis(self.latency),
            enable_video: !self.only_application_data,
            enable_application: !self.only_video,
            ..RetrieverConfig::default()
        }
    }
}

/// The URL with user info removed, for printing.
fn without_credentials(url: &str) -> anyhow::Result<String> {
    Ok(RtspCredentials::from_url(url)?.base_url)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (url, common) = match cli.command {
        Command::Device {
            ip,
            username,
            password,
            source,
            rtp_ext,
            resolution,
            common,
        } => {
            let url = AxisUrlBuilder::new(&ip)
                .credentials(&username, &password)
                .camera(source)
                .video(!common.only_application_data)
                .application_data(!common.only_video)
                .rtp_ext(rtp_ext)
                .resolution(resolution.as_deref())
                .build()?;
            (url, common)
        }
        Command::Url { rtsp_url, common } => (rtsp_url, common),
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&common.log_level))
        .context("invalid log level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let handle = RetrieverHandle::new(&url, common.config()).context("invalid retriever setup")?;
    handle
        .on_session_start(|info| {
            tracing::info!(
                session_id = %info.session_id,
                tracks = info.tracks.len(),
                parameter_sets = info.parameter_sets.len(),
                timeout = ?info.session_timeout,
                "session started"
            );
            Ok(())
        })
        .on_video(|frame| {
            tracing::debug!(
                seq = frame.sequence_number,
                len = frame.payload.len(),
                capture_time = ?frame.capture_time.map(|t| t.to_string()),
                samples = frame.diagnostics.video_samples,
                "video"
            );
            Ok(())
        })
        .on_application_data(|data| {
            let capture_time = data.capture_time.map(|t| t.to_string());
            match SceneSummary::parse(&data.xml) {
                Some(summary) => tracing::info!(
                    bytes = data.xml.len(),
                    utc_time = ?summary.utc_time,
                    objects = summary.objects.len(),
                    ?capture_time,
                    "application data"
                ),
                None => tracing::info!(bytes = data.xml.len(), ?capture_time, "application data"),
            }
            tracing::debug!(xml = %data.xml);
            Ok(())
        })
        .on_error(|report| {
            tracing::error!(
                kind = %report.kind,
                fatal = report.fatal,
                errors = report.error_count,
                "{}",
                report.message
            );
            Ok(())
        });

    handle.start()?;
    println!("Streaming from {}, press Enter to stop", without_credentials(&url)?);

    let enter = Arc::new(AtomicBool::new(false));
    let flag = enter.clone();
    thread::spawn(move || {
        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_ok() {
            flag.store(true, Ordering::SeqCst);
        }
    });

    let deadline = common.duration.map(|s| Instant::now() + Duration::from_secs(s));
    while handle.is_running()
        && !enter.load(Ordering::SeqCst)
        && deadline.is_none_or(|d| Instant::now() < d)
    {
        thread::sleep(Duration::from_millis(100));
    }

    handle.stop();
    Ok(())
}
