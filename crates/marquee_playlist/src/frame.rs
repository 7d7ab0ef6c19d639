// SPDX-License-Identifier: MIT OR Apache-2.0
//! Frame arithmetic shared by every Marquee crate.

use std::time::Duration;

/// A discrete tick on the 25 fps timeline. Signed so that edits may
/// temporarily reach before the origin.
pub type Frame = i64;

/// Fixed timeline rate
pub const FRAMES_PER_SECOND: Frame = 25;

/// Number of frames in one 24-hour day
pub const FRAMES_PER_DAY: Frame = FRAMES_PER_SECOND * 60 * 60 * 24;

/// Duration given to an item whose content reports no duration of its own
pub const DEFAULT_ITEM_DURATION: Frame = 100;

/// Upper bound used when content does not limit how long it may be shown
pub const DEFAULT_MAX_DURATION: Frame = FRAMES_PER_DAY;

/// Last frame covered by a span starting at `start` and lasting `duration` frames.
pub fn end_frame(start: Frame, duration: Frame) -> Frame {
    start + duration - 1
}

/// Convert a wall-clock duration to whole frames (floored).
pub fn duration_to_frames(duration: Duration) -> Frame {
    (duration.as_millis() as i64 * FRAMES_PER_SECOND) / 1000
}

/// Convert a frame count to a wall-clock duration.
pub fn frames_to_duration(frames: Frame) -> Duration {
    Duration::from_millis((frames.max(0) as u64 * 1000) / FRAMES_PER_SECOND as u64)
}

/// Whether a frame-of-day value lies inside one day.
pub fn is_within_day(frame: Frame) -> bool {
    (0..=FRAMES_PER_DAY).contains(&frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_frame_is_inclusive() {
        assert_eq!(end_frame(0, 100), 99);
        assert_eq!(end_frame(10, 1), 10);
    }

    #[test]
    fn test_duration_conversion() {
        assert_eq!(duration_to_frames(Duration::from_secs(2)), 50);
        assert_eq!(duration_to_frames(Duration::from_millis(39)), 0);
        assert_eq!(frames_to_duration(25), Duration::from_secs(1));
        assert_eq!(FRAMES_PER_DAY, 2_160_000);
    }

    #[test]
    fn test_day_bounds() {
        assert!(is_within_day(0));
        assert!(is_within_day(FRAMES_PER_DAY));
        assert!(!is_within_day(FRAMES_PER_DAY + 1));
        assert!(!is_within_day(-1));
    }
}
