//! Remote-control link between an operator console and a differential-drive
//! robot: motion and camera commands over a TCP text protocol with a
//! watchdog heartbeat, plus best-effort UDP video.

pub mod camera;
pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod heartbeat;
pub mod link;
pub mod motion;
pub mod protocol;
pub mod video;

pub use command::{CameraAxis, CameraIntent, Direction, MotionIntent};
pub use config::Config;
pub use connection::ConnectionState;
pub use error::ConnectionError;
pub use link::{ConsoleUpdate, Link, LinkEvent, run_control_loop};

/// Installs the global `tracing` subscriber. `RUST_LOG` overrides the
/// default `info` filter.
pub fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}
