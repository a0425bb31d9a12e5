//! Best-effort video ingestion over UDP.
//!
//! Every datagram is one complete encoded image. There is no header, no
//! sequence number and no reassembly: a payload either decodes on its own
//! or is dropped. Frames are shown in arrival order, so network reordering
//! can briefly show an older frame.
//!
//! Frames larger than `MAX_DATAGRAM` cannot arrive in one datagram and will
//! never decode; the robot must keep its encoded frames below that size.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, info, warn};

/// Largest UDP payload over IPv4.
pub const MAX_DATAGRAM: usize = 65_507;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

pub trait FrameDecoder {
    type Frame: Send + 'static;

    fn decode(&mut self, payload: &[u8]) -> anyhow::Result<Self::Frame>;
}

/// Holds the newest decoded frame until the display takes it.
///
/// Publishing replaces whatever the display has not yet picked up, so a
/// slow display always shows the latest frame and never falls behind.
pub struct FrameSlot<F> {
    latest: Arc<Mutex<Option<F>>>,
}

impl<F> FrameSlot<F> {
    pub fn new() -> Self {
        Self {
            latest: Arc::new(Mutex::new(None)),
        }
    }

    pub fn publish(&self, frame: F) {
        *self.lock() = Some(frame);
    }

    pub fn take(&self) -> Option<F> {
        self.lock().take()
    }

    /// Discards a frame that has not been shown yet.
    pub fn clear(&self) {
        self.lock().take();
    }

    fn lock(&self) -> MutexGuard<'_, Option<F>> {
        // The slot is only ever wholly replaced, so a poisoned lock is still consistent.
        self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<F> Clone for FrameSlot<F> {
    fn clone(&self) -> Self {
        Self {
            latest: Arc::clone(&self.latest),
        }
    }
}

impl<F> Default for FrameSlot<F> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct VideoReceiver<D> {
    socket: UdpSocket,
    decoder: D,
    buf: Vec<u8>,
}

impl<D: FrameDecoder> VideoReceiver<D> {
    /// Wraps an already bound socket and switches it to non-blocking mode.
    pub fn new(socket: UdpSocket, max_datagram: usize, decoder: D) -> io::Result<Self> {
        socket.set_nonblocking(true)?;
        Ok(Self {
            socket,
            decoder,
            buf: vec![0u8; max_datagram],
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Reads every datagram currently queued on the socket, decoding each on
    /// its own. Undecodable payloads are dropped silently. Returns how many
    /// frames were handed to `on_frame`.
    pub fn drain(&mut self, mut on_frame: impl FnMut(D::Frame)) -> io::Result<usize> {
        let mut frames = 0;
        loop {
            let len = match self.socket.recv_from(&mut self.buf) {
                Ok((len, _)) => len,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(frames),
                // ICMP port-unreachable echoes surface here on some platforms.
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::Interrupted | io::ErrorKind::ConnectionReset
                    ) =>
                {
                    continue;
                }
                Err(e) => return Err(e),
            };
            let payload = &self.buf[..len];
            match self.decoder.decode(payload) {
                Ok(frame) => {
                    frames += 1;
                    on_frame(frame);
                }
                Err(err) => {
                    debug!(
                        len,
                        head = %hex::encode(&payload[..len.min(8)]),
                        "dropping undecodable datagram: {err:#}"
                    );
                }
            }
        }
    }

    /// Publishes every decoded frame into `frames` until `running` is
    /// cleared. Each successful decode replaces the one before it.
    pub fn run(mut self, frames: FrameSlot<D::Frame>, running: Arc<AtomicBool>) -> io::Result<()> {
        while running.load(Ordering::SeqCst) {
            if let Err(e) = self.drain(|frame| frames.publish(frame)) {
                warn!("video socket error: {e}");
            }
            thread::sleep(POLL_INTERVAL);
        }
        Ok(())
    }
}

/// Binds the video port on all interfaces.
pub fn bind(port: u16) -> anyhow::Result<UdpSocket> {
    UdpSocket::bind(("0.0.0.0", port)).with_context(|| format!("Failed to bind video port {port}"))
}

/// Starts the receiver thread on an already bound socket.
///
/// The decoder is built inside the thread, so decoders holding non-`Send`
/// codec state are fine.
pub fn spawn_video_receiver<D, F>(
    socket: UdpSocket,
    max_datagram: usize,
    make_decoder: F,
    frames: FrameSlot<D::Frame>,
    running: Arc<AtomicBool>,
) -> JoinHandle<()>
where
    D: FrameDecoder + 'static,
    F: FnOnce() -> anyhow::Result<D> + Send + 'static,
{
    thread::spawn(move || {
        let result = make_decoder().and_then(|decoder| {
            let receiver = VideoReceiver::new(socket, max_datagram, decoder)?;
            info!("video receiver listening on {}", receiver.local_addr()?);
            receiver.run(frames, running)?;
            Ok(())
        });
        if let Err(e) = result {
            warn!("video receiver stopped: {e:#}");
        }
    })
}
