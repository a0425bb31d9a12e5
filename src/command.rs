//! Command model: the operator's current motion and camera intent.
//!
//! Plain data with no I/O. Only the motion and camera controllers mutate it.

/// Hardware travel limits of the pan/tilt servos, in degrees.
pub const CAMERA_MIN: i32 = 15;
pub const CAMERA_MAX: i32 = 165;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Backward,
    Left,
    Right,
}

/// Left/right wheel speeds of the differential drive.
///
/// Always replaced as a whole so both wheels come from the same event.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionIntent {
    pub left: f32,
    pub right: f32,
}

impl MotionIntent {
    pub const STOPPED: MotionIntent = MotionIntent {
        left: 0.0,
        right: 0.0,
    };

    pub const fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    /// Maps a direction onto a wheel pair. Left and right rotate in place.
    pub fn for_direction(dir: Direction, forward_speed: f32, turn_speed: f32) -> Self {
        match dir {
            Direction::Forward => Self::new(forward_speed, forward_speed),
            Direction::Backward => Self::new(-forward_speed, -forward_speed),
            Direction::Left => Self::new(-turn_speed, turn_speed),
            Direction::Right => Self::new(turn_speed, -turn_speed),
        }
    }

    /// Exact comparison. Release paths write literal zeros, so no tolerance.
    pub fn is_stopped(&self) -> bool {
        self.left == 0.0 && self.right == 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraAxis {
    Pan,
    Tilt,
}

/// Pan/tilt angles in degrees, always within `[CAMERA_MIN, CAMERA_MAX]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraIntent {
    pan: i32,
    tilt: i32,
}

impl CameraIntent {
    pub fn new(pan: i32, tilt: i32) -> Self {
        Self {
            pan: clamp_angle(pan),
            tilt: clamp_angle(tilt),
        }
    }

    pub fn pan(&self) -> i32 {
        self.pan
    }

    pub fn tilt(&self) -> i32 {
        self.tilt
    }

    pub fn get(&self, axis: CameraAxis) -> i32 {
        match axis {
            CameraAxis::Pan => self.pan,
            CameraAxis::Tilt => self.tilt,
        }
    }

    /// Returns a copy with `axis` set to `angle`, clamped.
    pub fn with(self, axis: CameraAxis, angle: i32) -> Self {
        match axis {
            CameraAxis::Pan => Self::new(angle, self.tilt),
            CameraAxis::Tilt => Self::new(self.pan, angle),
        }
    }
}

impl Default for CameraIntent {
    fn default() -> Self {
        Self::new(90, 90)
    }
}

pub fn clamp_angle(angle: i32) -> i32 {
    angle.clamp(CAMERA_MIN, CAMERA_MAX)
}
