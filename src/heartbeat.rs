//! Fixed-period heartbeat that keeps the robot's watchdog fed.
//!
//! The scheduler holds no thread of its own. The control loop asks it how
//! long it may sleep (`timeout`) and whether a tick is due (`poll`), so
//! stopping it is synchronous: once `stop` returns no tick can fire.

use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct Heartbeat {
    period: Duration,
    next_tick: Option<Instant>,
}

impl Heartbeat {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next_tick: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.next_tick.is_some()
    }

    /// Starts ticking; the first tick is one period after `now`.
    pub fn start(&mut self, now: Instant) {
        self.next_tick = Some(now + self.period);
    }

    pub fn stop(&mut self) {
        self.next_tick = None;
    }

    /// Returns `true` when a tick is due at `now` and schedules the next one.
    ///
    /// A late poll fires once and re-anchors on `now` rather than bursting
    /// through every missed tick.
    pub fn poll(&mut self, now: Instant) -> bool {
        let Some(due) = self.next_tick else {
            return false;
        };
        if now < due {
            return false;
        }
        let mut next = due + self.period;
        if next <= now {
            next = now + self.period;
        }
        self.next_tick = Some(next);
        true
    }

    /// How long the caller may block before the next tick, if running.
    pub fn timeout(&self, now: Instant) -> Option<Duration> {
        self.next_tick.map(|due| due.saturating_duration_since(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Duration = Duration::from_millis(100);

    #[test]
    fn stopped_never_ticks() {
        let mut hb = Heartbeat::new(T);
        let now = Instant::now();
        assert!(!hb.is_running());
        assert!(!hb.poll(now + T * 10));
        assert_eq!(hb.timeout(now), None);
    }

    #[test]
    fn ticks_every_period() {
        let mut hb = Heartbeat::new(T);
        let start = Instant::now();
        hb.start(start);
        assert!(!hb.poll(start + T / 2));
        assert_eq!(hb.timeout(start + T / 2), Some(T / 2));
        assert!(hb.poll(start + T));
        assert!(!hb.poll(start + T));
        assert!(hb.poll(start + T * 2));
    }

    #[test]
    fn late_poll_fires_once_and_reanchors() {
        let mut hb = Heartbeat::new(T);
        let start = Instant::now();
        hb.start(start);
        let late = start + T * 5 + Duration::from_millis(7);
        assert!(hb.poll(late));
        assert!(!hb.poll(late));
        assert_eq!(hb.timeout(late), Some(T));
    }

    #[test]
    fn jitter_does_not_accumulate() {
        let mut hb = Heartbeat::new(T);
        let start = Instant::now();
        hb.start(start);
        // Polled 10ms late: the next deadline stays on the start-anchored grid.
        assert!(hb.poll(start + T + Duration::from_millis(10)));
        assert_eq!(
            hb.timeout(start + T + Duration::from_millis(10)),
            Some(T - Duration::from_millis(10))
        );
    }

    #[test]
    fn stop_cancels_pending_tick() {
        let mut hb = Heartbeat::new(T);
        let start = Instant::now();
        hb.start(start);
        hb.stop();
        assert!(!hb.poll(start + T));
    }
}
