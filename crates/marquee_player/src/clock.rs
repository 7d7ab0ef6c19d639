// SPDX-License-Identifier: MIT OR Apache-2.0
//! Wall-clock sources for the navigator.

use chrono::Timelike;
use marquee_playlist::frame::{duration_to_frames, frames_to_duration};
use marquee_playlist::{Frame, FRAMES_PER_DAY};
use parking_lot::Mutex;
use std::time::{Duration, Instant};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Source of real time
pub trait Clock: Send + Sync {
    /// Monotonic instant, used for timer deadlines
    fn now(&self) -> Instant;

    /// Local time elapsed since midnight
    fn time_of_day(&self) -> Duration;

    /// [`Clock::time_of_day`] in frames, always below [`FRAMES_PER_DAY`]
    fn frame_of_day(&self) -> Frame {
        duration_to_frames(self.time_of_day()).rem_euclid(FRAMES_PER_DAY)
    }
}

/// The machine's local clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn time_of_day(&self) -> Duration {
        let time = chrono::Local::now().time();
        // Leap seconds report up to 1_999_999_999 ns.
        let nanos = time.nanosecond().min(999_999_999);
        Duration::new(u64::from(time.num_seconds_from_midnight()), nanos)
    }
}

#[derive(Debug)]
struct ManualTime {
    elapsed: Duration,
    time_of_day: Duration,
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    state: Mutex<ManualTime>,
}

impl ManualClock {
    /// Start at `time_of_day`
    pub fn new(time_of_day: Duration) -> Self {
        Self {
            origin: Instant::now(),
            state: Mutex::new(ManualTime {
                elapsed: Duration::ZERO,
                time_of_day: wrap_day(time_of_day),
            }),
        }
    }

    /// Start at a frame of day
    pub fn at_frame(frame: Frame) -> Self {
        Self::new(frames_to_duration(frame))
    }

    /// Move both the monotonic and the wall clock forward
    pub fn advance(&self, by: Duration) {
        let mut state = self.state.lock();
        state.elapsed += by;
        state.time_of_day = wrap_day(state.time_of_day + by);
    }

    /// Move forward by a number of frames
    pub fn advance_frames(&self, frames: Frame) {
        self.advance(frames_to_duration(frames));
    }

    /// Jump the wall clock without moving the monotonic clock
    pub fn set_time_of_day(&self, time_of_day: Duration) {
        self.state.lock().time_of_day = wrap_day(time_of_day);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.state.lock().elapsed
    }

    fn time_of_day(&self) -> Duration {
        self.state.lock().time_of_day
    }
}

fn wrap_day(time: Duration) -> Duration {
    Duration::from_nanos((time.as_nanos() % DAY.as_nanos()) as u64)
}
