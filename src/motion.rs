//! Motion controller: turns button and key transitions into a `MotionIntent`.
//!
//! Last writer wins. Holding two directions never blends them; the most
//! recent held input drives the wheels and releasing everything stops them.

use tracing::trace;

use crate::command::{Direction, MotionIntent};

/// Where a directional input came from. A button and a key for the same
/// direction are tracked separately so releasing one does not release the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputSource {
    Button,
    Key,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionEvent {
    DirectionPressed(Direction),
    DirectionReleased(Direction),
    KeyDown(Direction),
    KeyUp(Direction),
}

impl MotionEvent {
    fn split(self) -> (InputSource, Direction, bool) {
        match self {
            MotionEvent::DirectionPressed(d) => (InputSource::Button, d, true),
            MotionEvent::DirectionReleased(d) => (InputSource::Button, d, false),
            MotionEvent::KeyDown(d) => (InputSource::Key, d, true),
            MotionEvent::KeyUp(d) => (InputSource::Key, d, false),
        }
    }
}

#[derive(Debug)]
pub struct MotionController {
    forward_speed: f32,
    turn_speed: f32,
    /// Inputs currently held, oldest first.
    held: Vec<(InputSource, Direction)>,
    intent: MotionIntent,
}

impl MotionController {
    pub fn new(forward_speed: f32, turn_speed: f32) -> Self {
        Self {
            forward_speed,
            turn_speed,
            held: Vec::with_capacity(4),
            intent: MotionIntent::STOPPED,
        }
    }

    pub fn intent(&self) -> MotionIntent {
        self.intent
    }

    /// Applies one input transition.
    ///
    /// Returns the new intent when the event was a real transition that must
    /// be transmitted right away. Auto-repeat presses of an input that is
    /// already held, and releases of inputs that were never pressed, return
    /// `None`.
    pub fn handle(&mut self, event: MotionEvent) -> Option<MotionIntent> {
        let (source, dir, pressed) = event.split();
        let entry = (source, dir);
        let position = self.held.iter().position(|held| *held == entry);

        if pressed {
            if position.is_some() {
                trace!(?event, "ignoring auto-repeat");
                return None;
            }
            self.held.push(entry);
        } else {
            self.held.remove(position?);
        }

        self.intent = match self.held.last() {
            Some(&(_, dir)) => MotionIntent::for_direction(dir, self.forward_speed, self.turn_speed),
            None => MotionIntent::STOPPED,
        };
        Some(self.intent)
    }

    /// Forgets every held input, e.g. when the console loses focus.
    pub fn release_all(&mut self) -> Option<MotionIntent> {
        if self.held.is_empty() {
            return None;
        }
        self.held.clear();
        self.intent = MotionIntent::STOPPED;
        Some(self.intent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use MotionEvent::*;

    fn controller() -> MotionController {
        MotionController::new(0.5, 0.3)
    }

    #[test]
    fn press_then_release() {
        let mut motion = controller();
        assert_eq!(
            motion.handle(DirectionPressed(Direction::Forward)),
            Some(MotionIntent::new(0.5, 0.5))
        );
        assert_eq!(
            motion.handle(DirectionReleased(Direction::Forward)),
            Some(MotionIntent::STOPPED)
        );
        assert!(motion.intent().is_stopped());
    }

    #[test]
    fn key_auto_repeat_is_filtered() {
        let mut motion = controller();
        assert!(motion.handle(KeyDown(Direction::Forward)).is_some());
        assert_eq!(motion.handle(KeyDown(Direction::Forward)), None);
        assert_eq!(motion.handle(KeyDown(Direction::Forward)), None);
        assert_eq!(motion.handle(KeyUp(Direction::Forward)), Some(MotionIntent::STOPPED));
        // A fresh press after release counts again.
        assert!(motion.handle(KeyDown(Direction::Forward)).is_some());
    }

    #[test]
    fn latest_press_wins() {
        let mut motion = controller();
        motion.handle(KeyDown(Direction::Forward));
        assert_eq!(
            motion.handle(KeyDown(Direction::Right)),
            Some(MotionIntent::new(0.3, -0.3))
        );
        // Releasing the newer key falls back to the one still held.
        assert_eq!(
            motion.handle(KeyUp(Direction::Right)),
            Some(MotionIntent::new(0.5, 0.5))
        );
        assert_eq!(motion.handle(KeyUp(Direction::Forward)), Some(MotionIntent::STOPPED));
    }

    #[test]
    fn releasing_older_input_keeps_newer_intent() {
        let mut motion = controller();
        motion.handle(KeyDown(Direction::Forward));
        motion.handle(KeyDown(Direction::Left));
        assert_eq!(
            motion.handle(KeyUp(Direction::Forward)),
            Some(MotionIntent::new(-0.3, 0.3))
        );
    }

    #[test]
    fn button_and_key_are_independent() {
        let mut motion = controller();
        motion.handle(KeyDown(Direction::Backward));
        motion.handle(DirectionPressed(Direction::Backward));
        assert_eq!(
            motion.handle(DirectionReleased(Direction::Backward)),
            Some(MotionIntent::new(-0.5, -0.5))
        );
        assert_eq!(motion.handle(KeyUp(Direction::Backward)), Some(MotionIntent::STOPPED));
    }

    #[test]
    fn stray_release_is_ignored() {
        let mut motion = controller();
        assert_eq!(motion.handle(KeyUp(Direction::Left)), None);
        assert!(motion.intent().is_stopped());
    }

    #[test]
    fn arbitrary_sequences_follow_latest_held_input() {
        let events = [
            KeyDown(Direction::Forward),
            DirectionPressed(Direction::Left),
            KeyDown(Direction::Forward),
            KeyDown(Direction::Backward),
            DirectionReleased(Direction::Left),
            KeyUp(Direction::Backward),
            KeyDown(Direction::Right),
            KeyUp(Direction::Forward),
        ];
        let mut motion = controller();
        let mut held: Vec<(InputSource, Direction)> = Vec::new();
        for event in events {
            motion.handle(event);
            let (source, dir, pressed) = event.split();
            if pressed {
                if !held.contains(&(source, dir)) {
                    held.push((source, dir));
                }
            } else {
                held.retain(|h| *h != (source, dir));
            }
            let expected = held
                .last()
                .map(|&(_, d)| MotionIntent::for_direction(d, 0.5, 0.3))
                .unwrap_or(MotionIntent::STOPPED);
            assert_eq!(motion.intent(), expected, "after {event:?}");
        }
        assert_eq!(motion.intent(), MotionIntent::new(0.3, -0.3));
    }

    #[test]
    fn release_all_stops() {
        let mut motion = controller();
        assert_eq!(motion.release_all(), None);
        motion.handle(KeyDown(Direction::Forward));
        assert_eq!(motion.release_all(), Some(MotionIntent::STOPPED));
    }
}
