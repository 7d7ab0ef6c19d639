// SPDX-License-Identifier: MIT OR Apache-2.0
//! Playback core of the Marquee signage player.
//!
//! This crate keeps a display playing around the clock:
//! - [`PlayerPlaybackNavigator`] splices scheduled content into a live master playlist
//! - Navigation overrides preempt the schedule until a timeout elapses
//! - Clocks and timer services are injected so hosts and tests control time
//!
//! ## Architecture
//!
//! The host drives [`PlayerPlaybackNavigator::set_current_frame`] once per
//! render tick and samples [`PlayerPlaybackNavigator::master_playlist`] under
//! its read lock. The schedule time of day always comes from the [`Clock`],
//! never from the tick's frame counter.

pub mod clock;
pub mod config;
pub mod navigator;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, NavigatorConfig};
pub use navigator::{NavigatorError, PlayerPlaybackNavigator, TickStatus, DUMMY_TRACK};
pub use timer::{ManualTimerService, TimerCallback, TimerHandle, TimerService, TokioTimerService};
