// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Frame timing.

[FrameTiming] turns a [Clock] into per-frame deltas.  The delta handed to a draw callback is the
time since the previous rendered frame, or since construction for the first one.  Resizes don't
reset it, and renders that were skipped (no framebuffer) don't count as frames.

[FrameStats] keeps a short history of those deltas for frame pacing.
*/
use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;
#[cfg(target_arch = "wasm32")]
use web_time::Instant;

/// A monotonic time source.
pub trait Clock {
    /// Time elapsed since some fixed origin.  Never decreases.
    fn now(&self) -> Duration;
}

/// Wall-clock time since the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        MonotonicClock {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

/**
A clock that only moves when told to.

Clones share the same time, so a test can keep one clone and hand another to a renderer.
*/
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
    pub fn set(&self, now: Duration) {
        self.now.set(now);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Produces the delta between successive rendered frames.
#[derive(Debug)]
pub struct FrameTiming<C: Clock> {
    clock: C,
    last_frame: Duration,
}

impl<C: Clock> FrameTiming<C> {
    pub fn new(clock: C) -> Self {
        let last_frame = clock.now();
        FrameTiming { clock, last_frame }
    }

    /// Marks a frame and returns the time since the previous one.
    pub fn next_delta(&mut self) -> Duration {
        let now = self.clock.now();
        // a clock that misbehaves still yields a non-negative delta
        let delta = now.saturating_sub(self.last_frame);
        self.last_frame = now;
        delta
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

const MAX_HISTORY: usize = 60;

/**
Statistics over recently rendered frames.
*/
#[derive(Debug, Clone, Default)]
pub struct FrameStats {
    frames_rendered: u64,
    last_delta: Option<Duration>,
    history: VecDeque<Duration>,
}

impl FrameStats {
    pub(crate) fn record(&mut self, delta: Duration) {
        self.frames_rendered += 1;
        self.last_delta = Some(delta);
        self.history.push_back(delta);
        while self.history.len() > MAX_HISTORY {
            self.history.pop_front();
        }
    }

    /// Frames rendered since the renderer was created.
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }
    pub fn last_delta(&self) -> Option<Duration> {
        self.last_delta
    }
    /// Mean delta over the last 60 frames.
    pub fn average_delta(&self) -> Option<Duration> {
        if self.history.is_empty() {
            return None;
        }
        let total: Duration = self.history.iter().sum();
        Some(total / self.history.len() as u32)
    }
    /// Shortest delta over the last 60 frames.
    pub fn min_delta(&self) -> Option<Duration> {
        self.history.iter().min().copied()
    }
    /// Frames per second implied by [Self::average_delta].
    pub fn fps(&self) -> Option<f64> {
        self.average_delta()
            .filter(|d| !d.is_zero())
            .map(|d| 1.0 / d.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS_16: Duration = Duration::from_millis(16);

    #[test]
    fn first_delta_is_since_construction() {
        let clock = ManualClock::new();
        clock.set(Duration::from_secs(5));
        let mut timing = FrameTiming::new(clock.clone());
        clock.advance(Duration::from_millis(40));
        assert_eq!(timing.next_delta(), Duration::from_millis(40));
        clock.advance(MS_16);
        assert_eq!(timing.next_delta(), MS_16);
        assert_eq!(timing.next_delta(), Duration::ZERO);
    }

    #[test]
    fn backwards_clock_saturates() {
        let clock = ManualClock::new();
        clock.set(Duration::from_secs(1));
        let mut timing = FrameTiming::new(clock.clone());
        clock.set(Duration::from_millis(500));
        assert_eq!(timing.next_delta(), Duration::ZERO);
    }

    #[test]
    fn monotonic_clock_moves_forward() {
        let clock = MonotonicClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn stats_window() {
        let mut stats = FrameStats::default();
        assert_eq!(stats.average_delta(), None);
        assert_eq!(stats.fps(), None);
        stats.record(Duration::from_millis(10));
        stats.record(Duration::from_millis(30));
        assert_eq!(stats.frames_rendered(), 2);
        assert_eq!(stats.last_delta(), Some(Duration::from_millis(30)));
        assert_eq!(stats.average_delta(), Some(Duration::from_millis(20)));
        assert_eq!(stats.min_delta(), Some(Duration::from_millis(10)));
        assert_eq!(stats.fps().map(|f| f.round()), Some(50.0));

        for _ in 0..MAX_HISTORY {
            stats.record(MS_16);
        }
        assert_eq!(stats.frames_rendered(), 2 + MAX_HISTORY as u64);
        assert_eq!(stats.min_delta(), Some(MS_16));
        assert_eq!(stats.average_delta(), Some(MS_16));
    }
}
