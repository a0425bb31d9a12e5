mod decoder;
mod render;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;

use clap::Parser;
use tracing::{info, warn};

use decoder::{DecodedFrame, MjpegDecoder};
use roverlink::video::{self, FrameSlot};
use roverlink::{Config, Link, LinkEvent, run_control_loop};

/// Operator console for the rover: drive, aim the camera, watch the video feed.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// TOML config file. Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Robot host for the control channel.
    #[arg(long)]
    host: Option<String>,

    /// Robot TCP control port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Local UDP port for incoming video.
    #[arg(long)]
    video_port: Option<u16>,
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.control_port = port;
    }
    if let Some(port) = args.video_port {
        config.video_port = port;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    roverlink::init_tracing();
    let args = Args::parse();
    let config = load_config(&args)?;

    let running = Arc::new(AtomicBool::new(true));
    let (tx_events, rx_events) = mpsc::channel::<LinkEvent>();
    let (tx_updates, rx_updates) = mpsc::channel();
    let frames = FrameSlot::<DecodedFrame>::new();

    // Ctrl+C clears `running` and wakes the control loop.
    {
        let r = running.clone();
        let tx = tx_events.clone();
        ctrlc::set_handler(move || {
            r.store(false, Ordering::SeqCst);
            let _ = tx.send(LinkEvent::Shutdown);
        })?;
    }

    // Video is received whether or not the control channel is up.
    let socket = video::bind(config.video_port)?;
    let video_thread = video::spawn_video_receiver(
        socket,
        config.max_datagram,
        MjpegDecoder::new,
        frames.clone(),
        running.clone(),
    );

    let link = Link::new(&config, tx_events.clone(), tx_updates);
    let control_thread = {
        let running = running.clone();
        thread::spawn(move || run_control_loop(link, rx_events, running))
    };

    let ui = render::UI::new(config)?;
    let result = ui.run(frames, rx_updates, tx_events.clone(), running.clone());

    running.store(false, Ordering::SeqCst);
    let _ = tx_events.send(LinkEvent::Shutdown);
    if control_thread.join().is_err() {
        warn!("Control loop panicked.");
    }
    if video_thread.join().is_err() {
        warn!("Video receiver panicked.");
    }
    info!("Shutting down.");
    result
}
