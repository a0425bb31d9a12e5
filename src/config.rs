//! Console configuration, loaded from an optional TOML file.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::Deserialize;

use crate::command::CameraIntent;
use crate::video::MAX_DATAGRAM;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Robot address for the control channel.
    pub host: String,
    pub control_port: u16,
    /// Local UDP port the robot streams video frames to.
    pub video_port: u16,
    /// Heartbeat period. Keep it well under the robot's watchdog timeout
    /// (about 300ms on the reference firmware).
    pub heartbeat_ms: u64,
    /// How long one command write may block before the channel is failed.
    /// A few heartbeat periods: a robot that stops reading is treated as gone.
    pub write_timeout_ms: u64,
    pub forward_speed: f32,
    pub turn_speed: f32,
    /// Degrees per camera step key.
    pub camera_step: i32,
    pub camera_home: [i32; 2],
    /// Receive buffer per datagram; bounds the largest frame we can decode.
    pub max_datagram: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "192.168.4.1".to_owned(),
            control_port: 5005,
            video_port: 8000,
            heartbeat_ms: 100,
            write_timeout_ms: 300,
            forward_speed: 0.5,
            turn_speed: 0.3,
            camera_step: 5,
            camera_home: [90, 90],
            max_datagram: MAX_DATAGRAM,
        }
    }
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.host.trim().is_empty() {
            bail!("host must not be empty");
        }
        if self.heartbeat_ms == 0 {
            bail!("heartbeat_ms must be greater than zero");
        }
        if self.write_timeout_ms == 0 {
            bail!("write_timeout_ms must be greater than zero");
        }
        for (name, speed) in [
            ("forward_speed", self.forward_speed),
            ("turn_speed", self.turn_speed),
        ] {
            if !(speed > 0.0 && speed <= 1.0) {
                bail!("{name} must be in (0, 1], got {speed}");
            }
        }
        if self.camera_step <= 0 {
            bail!("camera_step must be positive, got {}", self.camera_step);
        }
        if self.max_datagram == 0 || self.max_datagram > MAX_DATAGRAM {
            bail!(
                "max_datagram must be in 1..={MAX_DATAGRAM}, got {}",
                self.max_datagram
            );
        }
        Ok(())
    }

    pub fn heartbeat_period(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn camera_home(&self) -> CameraIntent {
        CameraIntent::new(self.camera_home[0], self.camera_home[1])
    }
}
