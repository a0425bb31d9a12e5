//! Text line protocol spoken on the TCP control channel.
//!
//! One command per `\n`-terminated line, no framing, no acknowledgement:
//!
//! ```text
//! STOP
//! WHEELS <left:%.2f> <right:%.2f>
//! CAM <pan:int> <tilt:int>
//! MODE AUTO | MODE MANUAL
//! ```

use std::fmt;

use crate::command::{CameraIntent, MotionIntent};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Stop,
    Wheels { left: f32, right: f32 },
    Camera { pan: i32, tilt: i32 },
    Mode { auto: bool },
}

impl Command {
    pub fn from_motion(intent: &MotionIntent) -> Self {
        if intent.is_stopped() {
            Command::Stop
        } else {
            Command::Wheels {
                left: intent.left,
                right: intent.right,
            }
        }
    }

    pub fn from_camera(intent: &CameraIntent) -> Self {
        Command::Camera {
            pan: intent.pan(),
            tilt: intent.tilt(),
        }
    }

    /// The full wire line, terminator included.
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Stop => f.write_str("STOP"),
            Command::Wheels { left, right } => write!(f, "WHEELS {left:.2} {right:.2}"),
            Command::Camera { pan, tilt } => write!(f, "CAM {pan} {tilt}"),
            Command::Mode { auto: true } => f.write_str("MODE AUTO"),
            Command::Mode { auto: false } => f.write_str("MODE MANUAL"),
        }
    }
}
