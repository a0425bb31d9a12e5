//! Camera controller: slider positions and arrow-key nudges for pan/tilt.

use crate::command::{CameraAxis, CameraIntent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDirection {
    PanLeft,
    PanRight,
    TiltUp,
    TiltDown,
}

impl StepDirection {
    fn axis_and_sign(self) -> (CameraAxis, i32) {
        match self {
            StepDirection::PanLeft => (CameraAxis::Pan, -1),
            StepDirection::PanRight => (CameraAxis::Pan, 1),
            StepDirection::TiltUp => (CameraAxis::Tilt, 1),
            StepDirection::TiltDown => (CameraAxis::Tilt, -1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraEvent {
    SliderChanged(CameraAxis, i32),
    StepKey(StepDirection),
}

#[derive(Debug)]
pub struct CameraController {
    step: i32,
    intent: CameraIntent,
}

impl CameraController {
    pub fn new(step: i32, home: CameraIntent) -> Self {
        Self { step, intent: home }
    }

    pub fn intent(&self) -> CameraIntent {
        self.intent
    }

    /// Applies one camera input. Returns the new intent if it moved, which
    /// the caller transmits once. Inputs that land on the current angle
    /// (including nudges against a travel limit) return `None`.
    pub fn handle(&mut self, event: CameraEvent) -> Option<CameraIntent> {
        let next = match event {
            CameraEvent::SliderChanged(axis, value) => self.intent.with(axis, value),
            CameraEvent::StepKey(dir) => {
                let (axis, sign) = dir.axis_and_sign();
                let current = self.intent.get(axis);
                self.intent.with(axis, current.saturating_add(sign * self.step))
            }
        };
        if next == self.intent {
            return None;
        }
        self.intent = next;
        Some(next)
    }
}
