// SPDX-License-Identifier: Apache-2.0

//! Diagnostic chunk gateway
//!
//! Connects to a streaming-capable HID device, reads its upload
//! configuration, enables streaming, and forwards every received chunk to
//! the ingestion endpoint the device names. Ctrl-C stops the loop; streaming
//! is disabled and delivery statistics are printed on the way out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use mds_protocol::{ChunkUpload, ReadTimeout, Session, UploadError};
use mds_uploader::HttpUploader;

#[derive(Debug, Parser)]
#[command(name = "mds-gateway", about, version)]
struct Args {
    /// USB vendor ID (hex, e.g. 1234 or 0x1234)
    #[arg(long, value_parser = parse_hex_u16, requires = "pid")]
    vid: Option<u16>,

    /// USB product ID (hex)
    #[arg(long, value_parser = parse_hex_u16, requires = "vid")]
    pid: Option<u16>,

    /// Only match a device with this serial number
    #[arg(long, requires = "vid")]
    serial: Option<String>,

    /// Open a device by platform path instead of VID/PID
    #[arg(long, conflicts_with_all = ["vid", "pid", "serial"])]
    path: Option<String>,

    /// Per-iteration stream read timeout in milliseconds
    #[arg(long, default_value_t = 1000)]
    read_timeout_ms: u64,

    /// HTTP upload timeout in milliseconds
    #[arg(long, default_value_t = 30_000)]
    upload_timeout_ms: u64,

    /// Log received chunks instead of uploading them
    #[arg(long)]
    no_upload: bool,

    /// Verbose logging (also controllable via RUST_LOG)
    #[arg(short, long)]
    verbose: bool,
}

fn parse_hex_u16(s: &str) -> Result<u16, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(digits, 16).map_err(|e| format!("not a hex u16: {e}"))
}

fn open_session(args: &Args) -> Result<Session> {
    if let Some(path) = &args.path {
        info!(path = %path, "opening device by path");
        return Session::open_hid_path(path).context("failed to open device by path");
    }
    match (args.vid, args.pid) {
        (Some(vid), Some(pid)) => {
            info!("opening device {vid:#06x}:{pid:#06x}");
            Session::open_hid(vid, pid, args.serial.as_deref()).context("failed to open device")
        }
        _ => bail!("specify either --path or both --vid and --pid"),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })
        .context("failed to install Ctrl-C handler")?;
    }

    let mut session = open_session(&args)?;

    let config = session.read_config().context("failed to read device config")?;
    info!(
        device = %config.device_identifier,
        uri = %config.data_uri,
        features = config.supported_features,
        "device configuration"
    );

    let uploader = if args.no_upload {
        info!("upload disabled; chunks will only be logged");
        session.set_upload_hook(|chunk: &ChunkUpload<'_>| -> Result<(), UploadError> {
            info!(bytes = chunk.payload.len(), uri = chunk.uri, "chunk received");
            Ok(())
        });
        None
    } else {
        let uploader = HttpUploader::with_timeout(Duration::from_millis(args.upload_timeout_ms))
            .context("failed to build HTTP uploader")?;
        uploader.set_verbose(args.verbose);
        session.set_upload_hook(uploader.clone());
        Some(uploader)
    };

    session
        .enable_streaming()
        .context("failed to enable streaming")?;
    info!("streaming enabled; forwarding chunks (Ctrl-C to stop)");

    let timeout = ReadTimeout::from_millis(args.read_timeout_ms);
    while running.load(Ordering::SeqCst) {
        match session.process_from_backend(&config, timeout) {
            Ok(packet) => {
                debug!(sequence = packet.sequence, bytes = packet.len(), "chunk processed");
            }
            // Nothing to do this tick.
            Err(err) if err.is_timeout() => continue,
            Err(err) => {
                error!(%err, "stream processing failed; stopping");
                break;
            }
        }
    }

    let anomalies = session.sequence_anomalies();
    if let Err(err) = session.disable_streaming() {
        debug!(%err, "failed to disable streaming on shutdown");
    }
    drop(session);

    if anomalies > 0 {
        info!(anomalies, "stream had sequence anomalies");
    }
    if let Some(uploader) = uploader {
        println!("{}", serde_json::to_string_pretty(&uploader.stats())?);
    }

    Ok(())
}
