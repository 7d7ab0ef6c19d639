// SPDX-License-Identifier: MIT OR Apache-2.0
//! 24-hour schedules for Marquee players.
//!
//! This crate binds playlists to slots of the day:
//! - Schedule items with fixed or flexible start and duration
//! - Sequential sanitization of slot timing
//! - Frame-of-day lookup of the current slot
//!
//! ## Architecture
//!
//! Slots reference playlists by library ID and resolve them lazily. Each
//! resolved slot watches its playlist's duration through a lightweight
//! observer that only raises a flag; the schedule re-times itself when
//! [`Schedule::sync_durations`] is called, never from inside a playlist
//! notification.

pub mod schedule;
pub mod schedule_item;

pub use schedule::{Schedule, ScheduleError, SharedSchedule};
pub use schedule_item::{ScheduleItem, ScheduleItemId};
