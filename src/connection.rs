//! TCP control channel lifecycle.
//!
//! Connecting happens on a short-lived dial thread and a reader thread
//! watches the socket for the robot closing it. Both only post
//! `ConnectionEvent`s back to the control loop; every state change happens
//! on the control loop's thread. Each attempt gets a fresh session id so
//! late events from an abandoned socket are recognised and dropped.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::ConnectionError;
use crate::link::LinkEvent;

pub type SessionId = u64;

/// Write half of an established control channel.
pub trait ControlChannel: Write + Send {
    /// Tears the channel down. Must also unblock any reader of the same socket.
    fn close(&mut self) {}
}

impl ControlChannel for TcpStream {
    fn close(&mut self) {
        let _ = self.shutdown(Shutdown::Both);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed(ConnectionError),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => f.write_str("Disconnected"),
            ConnectionState::Connecting => f.write_str("Connecting"),
            ConnectionState::Connected => f.write_str("Connected"),
            ConnectionState::Failed(err) => write!(f, "Error: {err}"),
        }
    }
}

/// Reported by the dial and reader threads.
pub enum ConnectionEvent {
    Established {
        session: SessionId,
        channel: Box<dyn ControlChannel>,
    },
    Failed {
        session: SessionId,
        error: ConnectionError,
    },
    Closed {
        session: SessionId,
    },
}

impl fmt::Debug for ConnectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionEvent::Established { session, .. } => {
                f.debug_struct("Established").field("session", session).finish()
            }
            ConnectionEvent::Failed { session, error } => f
                .debug_struct("Failed")
                .field("session", session)
                .field("error", error)
                .finish(),
            ConnectionEvent::Closed { session } => {
                f.debug_struct("Closed").field("session", session).finish()
            }
        }
    }
}

pub struct ConnectionManager {
    state: ConnectionState,
    session: SessionId,
    channel: Option<Box<dyn ControlChannel>>,
    events: Sender<LinkEvent>,
    write_timeout: Duration,
}

impl ConnectionManager {
    /// `write_timeout` bounds every command write; a robot that stops
    /// reading fails the channel instead of blocking the caller.
    pub fn new(events: Sender<LinkEvent>, write_timeout: Duration) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            session: 0,
            channel: None,
            events,
            write_timeout,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Id of the current (or most recent) attempt.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// The single connect button: connects when not connected, otherwise
    /// disconnects. An attempt still in flight counts as connected.
    pub fn toggle(&mut self, host: &str, port: u16) {
        match self.state {
            ConnectionState::Disconnected | ConnectionState::Failed(_) => self.connect(host, port),
            ConnectionState::Connecting | ConnectionState::Connected => self.disconnect(),
        }
    }

    /// Starts a new attempt, abandoning any current session.
    pub fn connect(&mut self, host: &str, port: u16) {
        self.teardown();
        self.state = ConnectionState::Connecting;
        let session = self.session;
        let events = self.events.clone();
        let host = host.to_owned();
        let write_timeout = self.write_timeout;
        info!(session, "connecting to {}:{}", host, port);
        thread::spawn(move || dial(session, &host, port, write_timeout, events));
    }

    /// Closes the session. Calling it while already disconnected is a no-op.
    pub fn disconnect(&mut self) {
        if self.state == ConnectionState::Disconnected {
            return;
        }
        self.teardown();
        self.state = ConnectionState::Disconnected;
        info!("disconnected");
    }

    pub fn on_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Established {
                session,
                mut channel,
            } => {
                if session != self.session || self.state != ConnectionState::Connecting {
                    debug!(session, "closing channel from abandoned attempt");
                    channel.close();
                    return;
                }
                self.channel = Some(channel);
                self.state = ConnectionState::Connected;
                info!(session, "control channel established");
            }
            ConnectionEvent::Failed { session, error } => {
                if session == self.session && self.is_live() {
                    self.fail(error);
                }
            }
            ConnectionEvent::Closed { session } => {
                if session == self.session && self.is_live() {
                    info!(session, "robot closed the control channel");
                    self.teardown();
                    self.state = ConnectionState::Disconnected;
                }
            }
        }
    }

    /// Writes one encoded command and flushes it.
    ///
    /// Returns `false` when nothing was written: either the channel is not
    /// connected (the command is dropped, never queued) or the write failed,
    /// in which case the state has moved to `Failed`.
    pub fn send(&mut self, line: &str) -> bool {
        if !self.state.is_connected() {
            return false;
        }
        let Some(channel) = self.channel.as_mut() else {
            return false;
        };
        let written = channel
            .write_all(line.as_bytes())
            .and_then(|()| channel.flush());
        match written {
            Ok(()) => true,
            Err(err) => {
                self.fail(err.into());
                false
            }
        }
    }

    fn is_live(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected
        )
    }

    fn fail(&mut self, error: ConnectionError) {
        warn!(session = self.session, %error, "control channel failed");
        self.teardown();
        self.state = ConnectionState::Failed(error);
    }

    /// Drops the channel and retires the current session id.
    fn teardown(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
        self.session += 1;
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
    }
}

fn dial(
    session: SessionId,
    host: &str,
    port: u16,
    write_timeout: Duration,
    events: Sender<LinkEvent>,
) {
    let event = match open(host, port, write_timeout) {
        Ok(stream) => match stream.try_clone() {
            Ok(reader) => {
                let posted = events.send(LinkEvent::Connection(ConnectionEvent::Established {
                    session,
                    channel: Box::new(stream),
                }));
                if posted.is_ok() {
                    thread::spawn(move || watch(session, reader, events));
                }
                return;
            }
            Err(err) => ConnectionEvent::Failed {
                session,
                error: err.into(),
            },
        },
        Err(err) => ConnectionEvent::Failed {
            session,
            error: err.into(),
        },
    };
    let _ = events.send(LinkEvent::Connection(event));
}

fn open(host: &str, port: u16, write_timeout: Duration) -> io::Result<TcpStream> {
    let stream = TcpStream::connect((host, port))?;
    // Commands are tiny and latency bound; never let Nagle hold one back.
    stream.set_nodelay(true)?;
    // Shared with the reader clone, whose reads stay blocking.
    stream.set_write_timeout(Some(write_timeout))?;
    Ok(stream)
}

/// Blocks on the read half until the robot closes the socket or it errors.
/// A local `close` shuts the socket down, which ends this loop too.
fn watch(session: SessionId, mut stream: TcpStream, events: Sender<LinkEvent>) {
    let mut buf = [0u8; 256];
    let event = loop {
        match stream.read(&mut buf) {
            Ok(0) => break ConnectionEvent::Closed { session },
            Ok(n) => {
                debug!(session, bytes = %hex::encode(&buf[..n.min(16)]), "unexpected data on control channel");
            }
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => {
                break ConnectionEvent::Failed {
                    session,
                    error: err.into(),
                };
            }
        }
    };
    let _ = events.send(LinkEvent::Connection(event));
}
