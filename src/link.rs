//! The control loop: one thread that owns all command state.
//!
//! UI input, connection events and heartbeat ticks are handled strictly one
//! at a time, so the intent model needs no locking. Motion and camera
//! changes go out immediately; the heartbeat re-sends the current motion
//! command every period while connected. Camera and mode commands are sent
//! once per change only.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::camera::{CameraController, CameraEvent};
use crate::command::{CameraIntent, MotionIntent};
use crate::config::Config;
use crate::connection::{ConnectionEvent, ConnectionManager, ConnectionState};
use crate::heartbeat::Heartbeat;
use crate::motion::{MotionController, MotionEvent};
use crate::protocol::Command;

/// Longest the loop sleeps while no heartbeat is pending, so the run flag
/// is still noticed.
const IDLE_WAIT: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub enum LinkEvent {
    /// The connect button: connect when disconnected, otherwise disconnect.
    ToggleConnect { host: String, port: u16 },
    Disconnect,
    Connection(ConnectionEvent),
    Motion(MotionEvent),
    Camera(CameraEvent),
    AutoMode(bool),
    /// The console lost keyboard focus; key-up events will not arrive.
    FocusLost,
    Shutdown,
}

/// Updates for the operator display. Decoded frames travel separately,
/// straight from the video receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleUpdate {
    Status(String),
    /// Replace the video with the "no signal" placeholder.
    NoSignal,
}

pub struct Link {
    connection: ConnectionManager,
    motion: MotionController,
    camera: CameraController,
    heartbeat: Heartbeat,
    auto_mode: bool,
    updates: Sender<ConsoleUpdate>,
}

impl Link {
    /// `events` is the sending side of the loop's own queue; helper threads
    /// post connection events through it.
    pub fn new(config: &Config, events: Sender<LinkEvent>, updates: Sender<ConsoleUpdate>) -> Self {
        Self {
            connection: ConnectionManager::new(events, config.write_timeout()),
            motion: MotionController::new(config.forward_speed, config.turn_speed),
            camera: CameraController::new(config.camera_step, config.camera_home()),
            heartbeat: Heartbeat::new(config.heartbeat_period()),
            auto_mode: false,
            updates,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        self.connection.state()
    }

    pub fn session(&self) -> u64 {
        self.connection.session()
    }

    pub fn motion_intent(&self) -> MotionIntent {
        self.motion.intent()
    }

    pub fn camera_intent(&self) -> CameraIntent {
        self.camera.intent()
    }

    pub fn heartbeat_running(&self) -> bool {
        self.heartbeat.is_running()
    }

    /// Handles one event. Returns `false` once the loop should exit.
    pub fn handle(&mut self, event: LinkEvent, now: Instant) -> bool {
        let before = self.connection.state().clone();
        match event {
            LinkEvent::ToggleConnect { host, port } => {
                self.connection.toggle(&host, port);
                if self.connection.state() == &ConnectionState::Connecting {
                    self.status(format!("Connecting to {host}:{port}"));
                }
            }
            LinkEvent::Disconnect => self.connection.disconnect(),
            LinkEvent::Connection(event) => self.connection.on_event(event),
            LinkEvent::Motion(event) => {
                if let Some(intent) = self.motion.handle(event) {
                    self.transmit(Command::from_motion(&intent));
                }
            }
            LinkEvent::FocusLost => {
                if let Some(intent) = self.motion.release_all() {
                    self.transmit(Command::from_motion(&intent));
                }
            }
            LinkEvent::Camera(event) => {
                if let Some(intent) = self.camera.handle(event) {
                    self.transmit(Command::from_camera(&intent));
                }
            }
            LinkEvent::AutoMode(auto) => {
                if auto != self.auto_mode {
                    self.auto_mode = auto;
                    info!(auto, "automatic mode toggled");
                    self.transmit(Command::Mode { auto });
                }
            }
            LinkEvent::Shutdown => {
                self.connection.disconnect();
                self.settle(&before, now);
                return false;
            }
        }
        self.settle(&before, now);
        true
    }

    /// Fires the heartbeat if it is due.
    pub fn poll(&mut self, now: Instant) {
        if self.heartbeat.poll(now) {
            let before = self.connection.state().clone();
            self.transmit(Command::from_motion(&self.motion.intent()));
            self.settle(&before, now);
        }
    }

    /// How long the loop may block before the next heartbeat.
    pub fn timeout(&self, now: Instant) -> Option<Duration> {
        self.heartbeat.timeout(now)
    }

    fn transmit(&mut self, command: Command) {
        let line = command.to_line();
        if self.connection.send(&line) {
            debug!(command = %command, "sent");
        }
    }

    /// Applies the side effects of a connection state change: the heartbeat
    /// runs exactly while connected, and the video is blanked on the way out.
    fn settle(&mut self, before: &ConnectionState, now: Instant) {
        let after = self.connection.state().clone();
        if &after == before {
            return;
        }
        match (before.is_connected(), after.is_connected()) {
            (false, true) => self.heartbeat.start(now),
            (true, false) => {
                self.heartbeat.stop();
                let _ = self.updates.send(ConsoleUpdate::NoSignal);
            }
            _ => {}
        }
        if after != ConnectionState::Connecting {
            self.status(after.to_string());
        }
    }

    fn status(&self, text: String) {
        info!(status = %text);
        let _ = self.updates.send(ConsoleUpdate::Status(text));
    }
}

/// Runs the control loop until `Shutdown` arrives or `running` is cleared.
pub fn run_control_loop(mut link: Link, events: Receiver<LinkEvent>, running: Arc<AtomicBool>) {
    info!("control loop started");
    while running.load(Ordering::SeqCst) {
        let wait = link
            .timeout(Instant::now())
            .map_or(IDLE_WAIT, |t| t.min(IDLE_WAIT));
        match events.recv_timeout(wait) {
            Ok(event) => {
                if !link.handle(event, Instant::now()) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        // Polled after every wake-up so a busy event queue cannot starve it.
        link.poll(Instant::now());
    }
    link.handle(LinkEvent::Shutdown, Instant::now());
    info!("control loop stopped");
}
