// SPDX-License-Identifier: MIT OR Apache-2.0
//! Schedule-driven splicing into a live master playlist.
//!
//! The navigator owns one master playlist for its whole lifetime. Track 0
//! holds a permanent item spanning the day, so the master never goes empty.
//! Every render tick splices scheduled content onto the schedule track or,
//! while a navigation override is pending, override content onto the
//! navigation track, which is then soloed. A renderer only ever samples the
//! master playlist at a frame.
//!
//! Lock order is navigator state, then the master playlist, then the
//! schedule, then any content playlist. The navigation timeout callback only
//! ever takes the navigator state lock.

use crate::clock::Clock;
use crate::config::NavigatorConfig;
use crate::timer::{TimerHandle, TimerService};
use marquee_playlist::{
    Clip, ClipId, Frame, ItemId, Library, NavigationInfo, Playlist, PlaylistError, PlaylistItem,
    SharedPlaylist, TrackIndex, FRAMES_PER_DAY,
};
use marquee_schedule::SharedSchedule;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Track holding the permanent whole-day item
pub const DUMMY_TRACK: TrackIndex = 0;

/// Errors from navigator setup and navigation requests
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigatorError {
    /// The target is not in the library
    #[error("Navigation target not found: {0}")]
    NotFound(ClipId),

    /// The target exists but is not a playlist
    #[error("Navigation target {0} is not a playlist")]
    NotAPlaylist(ClipId),

    /// The target playlist has nothing to show
    #[error("Navigation target {0} is empty")]
    EmptyPlaylist(ClipId),

    /// Building the master playlist failed
    #[error(transparent)]
    Playlist(#[from] PlaylistError),
}

/// Playback state before and after one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickStatus {
    /// Whether content was playing before the tick
    pub was_playing: bool,
    /// Whether content is playing now
    pub is_playing: bool,
}

/// Schedule position last spliced, compared tick to tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SlotKey {
    day: u64,
    index: Option<usize>,
    change_token: u64,
    content_duration: Frame,
}

#[derive(Debug, Default)]
struct NavigatorState {
    schedule: Option<SharedSchedule>,
    current_frame: f64,
    last_slot: Option<SlotKey>,
    last_now: Option<Frame>,
    day: u64,
    pending: Option<SharedPlaylist>,
    active: Option<SharedPlaylist>,
    generation: u64,
    timer: Option<TimerHandle>,
    is_playing: bool,
}

/// Keeps the master playlist populated from the schedule and navigation requests
pub struct PlayerPlaybackNavigator {
    config: NavigatorConfig,
    clock: Arc<dyn Clock>,
    timers: Arc<dyn TimerService>,
    library: Arc<dyn Library>,
    master: SharedPlaylist,
    state: Arc<Mutex<NavigatorState>>,
}

impl PlayerPlaybackNavigator {
    /// Create a navigator with a fresh master playlist
    pub fn new(
        config: NavigatorConfig,
        clock: Arc<dyn Clock>,
        timers: Arc<dyn TimerService>,
        library: Arc<dyn Library>,
    ) -> Result<Self, NavigatorError> {
        let mut master = Playlist::new("Master");
        master.add_item(PlaylistItem::new(0, FRAMES_PER_DAY, DUMMY_TRACK))?;

        Ok(Self {
            config,
            clock,
            timers,
            library,
            master: SharedPlaylist::new(master),
            state: Arc::new(Mutex::new(NavigatorState::default())),
        })
    }

    /// The live master playlist; the same handle for the navigator's lifetime
    pub fn master_playlist(&self) -> &SharedPlaylist {
        &self.master
    }

    /// Raw frame passed to the last tick
    pub fn current_frame(&self) -> f64 {
        self.state.lock().current_frame
    }

    /// Active settings
    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    /// The schedule being followed
    pub fn schedule(&self) -> Option<SharedSchedule> {
        self.state.lock().schedule.clone()
    }

    /// Follow a different schedule (or none); the next tick re-splices
    pub fn set_schedule(&self, schedule: Option<SharedSchedule>) {
        let mut state = self.state.lock();
        state.schedule = schedule;
        state.last_slot = None;
    }

    /// Whether a navigation override is pending
    pub fn is_navigating(&self) -> bool {
        self.state.lock().pending.is_some()
    }

    /// Request a navigation override.
    ///
    /// The override stays pending until the configured timeout elapses with
    /// no further request; each request re-arms the timeout.
    pub fn navigate(&self, info: &NavigationInfo) -> Result<(), NavigatorError> {
        let id = &info.target_id;
        let playlist = match self.library.find_object(id) {
            Some(Clip::Playlist(playlist)) => playlist,
            Some(Clip::Media(_)) => return Err(NavigatorError::NotAPlaylist(id.clone())),
            None => {
                tracing::warn!("Navigation target {id} not found");
                return Err(NavigatorError::NotFound(id.clone()));
            }
        };
        if playlist.read().duration() <= 0 {
            tracing::warn!("Navigation target {id} has no content");
            return Err(NavigatorError::EmptyPlaylist(id.clone()));
        }

        let mut state = self.state.lock();
        state.pending = Some(playlist);
        state.generation += 1;

        let generation = state.generation;
        let weak = Arc::downgrade(&self.state);
        let deadline = self.clock.now() + self.config.navigation_timeout;
        let previous = state.timer.take();
        state.timer = Some(self.timers.reschedule(
            previous,
            deadline,
            Box::new(move || navigation_timed_out(&weak, generation)),
        ));

        tracing::info!("Navigation to {id} requested");
        Ok(())
    }

    /// Advance to `raw_frame` and splice whatever is due.
    ///
    /// Never fails: a splice that cannot be made is logged and skipped, and
    /// what is already in the master playlist keeps playing.
    pub fn set_current_frame(&self, raw_frame: f64) -> TickStatus {
        let mut state = self.state.lock();
        let was_playing = state.is_playing;
        state.current_frame = raw_frame;

        let frame = raw_frame.max(0.0).floor() as Frame;
        let now = self.clock.frame_of_day();
        if state.last_now.is_some_and(|last| now < last) {
            state.day += 1;
        }
        state.last_now = Some(now);

        let mut master = self.master.write();
        let is_playing = {
            let mut block = master.notification_block();

            if let Some(target) = state.pending.clone() {
                self.navigation_tick(&mut state, &mut block, &target, frame);
            } else {
                if state.active.take().is_some() {
                    tracing::info!("Navigation ended, resuming schedule");
                    block.set_solo_track(None);
                    cleanup_track(&mut block, self.config.navigation_track, frame);
                }
                self.schedule_tick(&mut state, &mut block, frame, now);
            }

            self.prune_history(&mut block, frame);
            block.set_current_frame(frame);
            let playing = block.visible_items_at(frame).any(|item| item.track() != DUMMY_TRACK);
            playing
        };

        state.is_playing = is_playing;
        TickStatus {
            was_playing,
            is_playing,
        }
    }

    fn navigation_tick(
        &self,
        state: &mut NavigatorState,
        master: &mut Playlist,
        target: &SharedPlaylist,
        frame: Frame,
    ) {
        let track = self.config.navigation_track;
        let switched = !state.active.as_ref().is_some_and(|active| active.ptr_eq(target));
        if switched {
            tracing::info!("Navigating to {} at frame {frame}", target.id());
            master.set_solo_track(Some(track));
            cleanup_track(master, track, frame);
            state.active = Some(target.clone());
        }

        if master.items_on_track(track).any(|item| item.contains(frame)) {
            return;
        }
        let duration = target.read().duration();
        if duration <= 0 {
            tracing::warn!("Navigation target {} became empty", target.id());
            return;
        }
        if let Err(err) = splice(master, target, track, frame, duration, 0) {
            tracing::warn!("Failed to splice navigation target {}: {err}", target.id());
        }
    }

    fn schedule_tick(
        &self,
        state: &mut NavigatorState,
        master: &mut Playlist,
        frame: Frame,
        now: Frame,
    ) {
        let track = self.config.schedule_track;
        let Some(schedule) = state.schedule.clone() else {
            return;
        };
        let mut schedule = schedule.write();
        schedule.sync_durations();

        let index = schedule.index_at_frame(now);
        let content_duration = index
            .and_then(|index| schedule.items()[index].playlist())
            .map_or(0, |playlist| playlist.read().duration());
        let key = SlotKey {
            day: state.day,
            index,
            change_token: schedule.change_token(),
            content_duration,
        };
        if state.last_slot == Some(key) {
            return;
        }
        state.last_slot = Some(key);

        let Some(index) = key.index else {
            tracing::debug!("No schedule slot at frame of day {now}");
            cleanup_track(master, track, frame);
            return;
        };
        let slot = &schedule.items()[index];
        if let Err(err) = slot.validate() {
            tracing::warn!("Ignoring schedule slot {index}: {err}");
            return;
        }

        // How far into the slot "now" already is, mapped onto the master timeline
        let insertion = frame - (now - slot.start_frame());
        let slot_duration = slot.duration();
        cleanup_track(master, track, insertion.max(0));

        let Some(playlist) = slot.playlist().cloned() else {
            tracing::warn!("Schedule slot {index} has no resolved playlist");
            return;
        };
        drop(schedule);

        let playlist_duration = playlist.read().duration();
        if playlist_duration <= 0 {
            tracing::warn!("Schedule slot {index}: playlist {} is empty", playlist.id());
            return;
        }

        let end = insertion + slot_duration;
        let mut start = insertion;
        let mut first_pass = true;
        while start < end {
            let length = playlist_duration.min(end - start);
            if !first_pass && length < self.config.min_loop_fragment {
                tracing::debug!("Dropping {length}-frame loop fragment of {}", playlist.id());
                break;
            }
            if start + length > 0 {
                // A copy straddling frame 0 starts part way into the playlist.
                let (item_start, clip_offset) = if start < 0 { (0, -start) } else { (start, 0) };
                let result = splice(
                    master,
                    &playlist,
                    track,
                    item_start,
                    length - clip_offset,
                    clip_offset,
                );
                if let Err(err) = result {
                    tracing::warn!("Failed to splice {} for slot {index}: {err}", playlist.id());
                    break;
                }
            }
            start += length;
            first_pass = false;
        }
    }

    fn prune_history(&self, master: &mut Playlist, frame: Frame) {
        let horizon = frame - self.config.history_frames;
        if horizon <= 0 {
            return;
        }
        let tracks = [self.config.schedule_track, self.config.navigation_track];
        let expired: Vec<ItemId> = master
            .items()
            .iter()
            .filter(|item| tracks.contains(&item.track()) && item.end_frame() < horizon)
            .map(PlaylistItem::id)
            .collect();
        for id in expired {
            master.remove_item(id);
        }
    }
}

impl std::fmt::Debug for PlayerPlaybackNavigator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerPlaybackNavigator")
            .field("config", &self.config)
            .field("master", &self.master)
            .field("state", &*self.state.lock())
            .finish()
    }
}

fn navigation_timed_out(state: &Weak<Mutex<NavigatorState>>, generation: u64) {
    let Some(state) = state.upgrade() else {
        return;
    };
    let mut state = state.lock();
    if state.generation != generation {
        return;
    }
    if let Some(target) = state.pending.take() {
        tracing::info!("Navigation to {} timed out", target.id());
    }
    state.timer = None;
}

/// Append an item showing `playlist` to the master playlist
fn splice(
    master: &mut Playlist,
    playlist: &SharedPlaylist,
    track: TrackIndex,
    start_frame: Frame,
    duration: Frame,
    clip_offset: Frame,
) -> Result<ItemId, PlaylistError> {
    let mut item =
        PlaylistItem::with_clip(Clip::Playlist(playlist.clone()), start_frame, duration, track);
    item.set_clip_offset(clip_offset);
    let id = master.add_item(item)?;
    tracing::debug!(
        "Spliced {} on track {track} at {start_frame} for {duration} frames",
        playlist.id()
    );
    Ok(id)
}

/// Remove or shorten items on `track` from `cutoff` onwards.
///
/// Scans back to front and stops at the first item that ends before the
/// cutoff; items on a track are appended in increasing start order.
fn cleanup_track(master: &mut Playlist, track: TrackIndex, cutoff: Frame) {
    let mut index = master.item_count();
    while index > 0 {
        index -= 1;
        let Some(item) = master.item_at(index) else {
            continue;
        };
        if item.track() != track {
            continue;
        }
        if item.start_frame() >= cutoff {
            master.remove_item_at(index);
        } else if item.end_frame() >= cutoff {
            let id = item.id();
            let duration = cutoff - item.start_frame();
            if let Err(err) = master.modify_item(id, |item| item.set_duration(duration)) {
                tracing::warn!("Failed to shorten item on track {track}: {err}");
            }
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::timer::{ManualTimerService, TimerCallback};
    use marquee_playlist::{MediaClip, ObjectLibrary};
    use marquee_schedule::{Schedule, ScheduleItem};
    use std::time::{Duration, Instant};

    struct Harness {
        clock: Arc<ManualClock>,
        timers: Arc<ManualTimerService>,
        library: Arc<ObjectLibrary>,
        navigator: PlayerPlaybackNavigator,
    }

    impl Harness {
        fn new(frame_of_day: Frame) -> Self {
            Self::with_config(frame_of_day, NavigatorConfig::default())
        }

        fn with_config(frame_of_day: Frame, config: NavigatorConfig) -> Self {
            let _ = tracing_subscriber::fmt().with_test_writer().try_init();
            let clock = Arc::new(ManualClock::at_frame(frame_of_day));
            let timers = Arc::new(ManualTimerService::new());
            let library = Arc::new(ObjectLibrary::new());
            let navigator = PlayerPlaybackNavigator::new(
                config,
                clock.clone(),
                timers.clone(),
                library.clone(),
            )
            .unwrap();
            Self {
                clock,
                timers,
                library,
                navigator,
            }
        }

        fn add_playlist(&self, id: &str, duration: Frame) -> SharedPlaylist {
            let mut playlist = Playlist::with_id(id, id);
            let media = Clip::media(MediaClip::image(id, 100.0, 100.0));
            playlist.add_item(PlaylistItem::with_clip(media, 0, duration, 0)).unwrap();
            let shared = SharedPlaylist::new(playlist);
            self.library.add(Clip::Playlist(shared.clone()));
            shared
        }

        fn expire_navigation(&self) {
            self.clock.advance(self.navigator.config().navigation_timeout);
            self.timers.fire_due(self.clock.now());
        }

        /// (start, duration, clip_offset, content id) of items on `track`
        fn track(&self, track: TrackIndex) -> Vec<(Frame, Frame, Frame, String)> {
            let master = self.navigator.master_playlist().read();
            let items = master
                .items_on_track(track)
                .map(|item| {
                    let id = item.clip_id().map(ToString::to_string).unwrap_or_default();
                    (item.start_frame(), item.duration(), item.clip_offset(), id)
                })
                .collect();
            items
        }
    }

    fn day_schedule(harness: &Harness) -> SharedSchedule {
        let x = harness.add_playlist("x", 1_000);
        let y = harness.add_playlist("y", 500);
        let mut schedule = Schedule::new("Day");
        schedule.add_item(ScheduleItem::with_playlist(x, 0, 1_000));
        schedule.add_item(ScheduleItem::with_playlist(y, 1_000, 1_000).flexible_duration(true));
        schedule.into_shared()
    }

    #[test]
    fn test_no_schedule_keeps_dummy_only() {
        let harness = Harness::new(0);
        let status = harness.navigator.set_current_frame(10.0);

        assert_eq!(status, TickStatus::default());
        let master = harness.navigator.master_playlist().read();
        assert_eq!(master.duration(), FRAMES_PER_DAY);
        assert_eq!(master.item_count(), 1);
        assert_eq!(master.item_at(0).unwrap().track(), DUMMY_TRACK);
        drop(master);
        assert_eq!(harness.navigator.current_frame(), 10.0);
    }

    #[test]
    fn test_schedule_slot_is_looped_to_fill() {
        let harness = Harness::new(1_500);
        harness.navigator.set_schedule(Some(day_schedule(&harness)));

        let status = harness.navigator.set_current_frame(1_500.0);
        assert!(status.is_playing);
        assert!(!status.was_playing);
        assert_eq!(
            harness.track(1),
            vec![
                (1_000, 500, 0, "y".to_string()),
                (1_500, 500, 0, "y".to_string()),
            ]
        );
    }

    #[test]
    fn test_unchanged_slot_is_left_alone() {
        let harness = Harness::new(1_500);
        harness.navigator.set_schedule(Some(day_schedule(&harness)));
        harness.navigator.set_current_frame(1_500.0);
        let token = harness.navigator.master_playlist().read().change_token();

        harness.clock.advance_frames(1);
        let status = harness.navigator.set_current_frame(1_501.0);
        assert!(status.was_playing && status.is_playing);
        assert_eq!(harness.navigator.master_playlist().read().change_token(), token);
    }

    #[test]
    fn test_resume_mid_slot_before_frame_zero() {
        // Playback started late: raw frame 100 while the clock is 500 frames into slot y.
        let harness = Harness::new(1_500);
        harness.navigator.set_schedule(Some(day_schedule(&harness)));
        harness.navigator.set_current_frame(100.0);

        assert_eq!(
            harness.track(1),
            vec![(0, 100, 400, "y".to_string()), (100, 500, 0, "y".to_string())]
        );
        let master = harness.navigator.master_playlist().read();
        let layer = master.resolve_at(50);
        assert_eq!(layer.len(), 1);
        assert_eq!(layer[0].local_frame, 450);
    }

    #[test]
    fn test_slot_change_truncates_previous_content() {
        let harness = Harness::new(900);
        harness.navigator.set_schedule(Some(day_schedule(&harness)));
        harness.navigator.set_current_frame(900.0);
        assert_eq!(harness.track(1), vec![(0, 1_000, 0, "x".to_string())]);

        harness.clock.advance_frames(100);
        harness.navigator.set_current_frame(1_000.0);
        assert_eq!(
            harness.track(1),
            vec![
                (0, 1_000, 0, "x".to_string()),
                (1_000, 500, 0, "y".to_string()),
                (1_500, 500, 0, "y".to_string()),
            ]
        );
    }

    #[test]
    fn test_short_trailing_fragment_is_dropped() {
        let harness = Harness::new(0);
        let a = harness.add_playlist("a", 500);
        let b = harness.add_playlist("b", 500);
        let mut schedule = Schedule::new("Day");
        schedule.add_item(ScheduleItem::with_playlist(a, 0, 1_003).flexible_duration(true));
        schedule.add_item(
            ScheduleItem::with_playlist(b, 0, 3)
                .flexible_start(true)
                .flexible_duration(true),
        );
        harness.navigator.set_schedule(Some(schedule.into_shared()));

        harness.navigator.set_current_frame(0.0);
        assert_eq!(
            harness.track(1),
            vec![(0, 500, 0, "a".to_string()), (500, 500, 0, "a".to_string())]
        );

        // On the first pass a short slot is still spliced.
        harness.clock.advance_frames(1_003);
        harness.navigator.set_current_frame(1_003.0);
        assert_eq!(harness.track(1).last(), Some(&(1_003, 3, 0, "b".to_string())));
    }

    #[test]
    fn test_whole_day_slot_continues_past_midnight() {
        let harness = Harness::new(FRAMES_PER_DAY - 10);
        let a = harness.add_playlist("a", 1_000);
        let mut schedule = Schedule::new("Day");
        schedule.add_item(
            ScheduleItem::with_playlist(a, 0, FRAMES_PER_DAY).flexible_duration(true),
        );
        harness.navigator.set_schedule(Some(schedule.into_shared()));

        assert!(harness.navigator.set_current_frame(0.0).is_playing);
        assert_eq!(harness.track(1), vec![(0, 10, 990, "a".to_string())]);

        harness.clock.advance_frames(20);
        let status = harness.navigator.set_current_frame(20.0);
        assert!(status.was_playing && status.is_playing);
        assert_eq!(
            harness.track(1)[..2],
            [(0, 10, 990, "a".to_string()), (10, 1_000, 0, "a".to_string())]
        );
        assert_eq!(harness.navigator.master_playlist().read().resolve_at(20).len(), 1);
    }

    #[test]
    fn test_shrunk_content_is_respliced() {
        let harness = Harness::new(0);
        let a = harness.add_playlist("a", 500);
        let mut schedule = Schedule::new("Day");
        schedule.add_item(ScheduleItem::with_playlist(a.clone(), 0, 2_000).flexible_duration(true));
        harness.navigator.set_schedule(Some(schedule.into_shared()));
        harness.navigator.set_current_frame(0.0);
        assert_eq!(harness.track(1).len(), 4);

        {
            let mut content = a.write();
            let id = content.item_at(0).unwrap().id();
            content.modify_item(id, |item| item.set_duration(200)).unwrap();
        }
        harness.clock.advance_frames(300);
        let status = harness.navigator.set_current_frame(300.0);

        assert!(status.is_playing);
        let track = harness.track(1);
        assert_eq!(track.len(), 10);
        assert_eq!(track[1], (200, 200, 0, "a".to_string()));
        let master = harness.navigator.master_playlist().read();
        let layers = master.resolve_at(300);
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].local_frame, 100);
    }

    #[test]
    fn test_slot_beyond_one_day_is_ignored() {
        let harness = Harness::new(100);
        let mut schedule = Schedule::new("Day");
        schedule.add_item(ScheduleItem::new(0, 3 * FRAMES_PER_DAY).flexible_duration(true));
        let schedule = schedule.into_shared();
        assert_eq!(schedule.read().index_at_frame(100), Some(0));
        harness.navigator.set_schedule(Some(schedule));

        let status = harness.navigator.set_current_frame(100.0);
        assert!(!status.is_playing);
        assert!(harness.track(1).is_empty());
        assert_eq!(harness.navigator.master_playlist().read().item_count(), 1);
    }

    #[test]
    fn test_unresolved_slot_is_empty() {
        let harness = Harness::new(10);
        let mut schedule = Schedule::new("Day");
        schedule.add_item(ScheduleItem::with_playlist_id("missing", 0, 1_000));
        harness.navigator.set_schedule(Some(schedule.into_shared()));

        let status = harness.navigator.set_current_frame(10.0);
        assert!(!status.is_playing);
        assert!(harness.track(1).is_empty());
    }

    #[test]
    fn test_navigation_preempts_and_times_out() {
        let harness = Harness::new(1_500);
        harness.navigator.set_schedule(Some(day_schedule(&harness)));
        harness.add_playlist("n", 300);
        harness.navigator.set_current_frame(1_500.0);

        harness.navigator.navigate(&NavigationInfo::new("n")).unwrap();
        assert!(harness.navigator.is_navigating());
        harness.clock.advance_frames(10);
        let status = harness.navigator.set_current_frame(1_510.0);
        assert!(status.is_playing);
        {
            let master = harness.navigator.master_playlist().read();
            assert_eq!(master.solo_track(), Some(2));
            assert!(!master.is_track_enabled(1));
        }
        assert_eq!(harness.track(2), vec![(1_510, 300, 0, "n".to_string())]);

        harness.expire_navigation();
        assert!(!harness.navigator.is_navigating());
        harness.navigator.set_current_frame(1_600.0);

        let master = harness.navigator.master_playlist().read();
        assert_eq!(master.solo_track(), None);
        assert!(master.is_track_enabled(1));
        drop(master);
        assert_eq!(harness.track(2), vec![(1_510, 90, 0, "n".to_string())]);
        assert_eq!(harness.track(1).len(), 2);
    }

    #[test]
    fn test_navigation_loops_while_pending() {
        let harness = Harness::new(0);
        harness.add_playlist("n", 300);
        harness.navigator.navigate(&NavigationInfo::new("n")).unwrap();

        harness.navigator.set_current_frame(0.0);
        harness.navigator.set_current_frame(299.0);
        assert_eq!(harness.track(2).len(), 1);

        harness.navigator.set_current_frame(300.0);
        assert_eq!(
            harness.track(2),
            vec![(0, 300, 0, "n".to_string()), (300, 300, 0, "n".to_string())]
        );
    }

    #[test]
    fn test_switching_target_truncates_previous() {
        let harness = Harness::new(0);
        harness.add_playlist("n", 300);
        harness.add_playlist("m", 200);

        harness.navigator.navigate(&NavigationInfo::new("n")).unwrap();
        harness.navigator.set_current_frame(0.0);
        harness.navigator.navigate(&NavigationInfo::new("m")).unwrap();
        harness.navigator.set_current_frame(50.0);

        assert_eq!(
            harness.track(2),
            vec![(0, 50, 0, "n".to_string()), (50, 200, 0, "m".to_string())]
        );
    }

    #[test]
    fn test_renavigate_rearms_timeout() {
        let harness = Harness::new(0);
        harness.add_playlist("n", 300);
        harness.navigator.navigate(&NavigationInfo::new("n")).unwrap();

        harness.clock.advance(Duration::from_secs(20));
        harness.navigator.navigate(&NavigationInfo::new("n")).unwrap();
        assert_eq!(harness.timers.pending_count(), 1);

        harness.clock.advance(Duration::from_secs(15));
        harness.timers.fire_due(harness.clock.now());
        assert!(harness.navigator.is_navigating());

        harness.clock.advance(Duration::from_secs(15));
        harness.timers.fire_due(harness.clock.now());
        assert!(!harness.navigator.is_navigating());
    }

    /// Timers that can no longer be cancelled, as when one is already firing
    #[derive(Default)]
    struct StubbornTimers {
        inner: ManualTimerService,
    }

    impl TimerService for StubbornTimers {
        fn schedule(&self, deadline: Instant, callback: TimerCallback) -> TimerHandle {
            self.inner.schedule(deadline, callback)
        }

        fn cancel(&self, _handle: TimerHandle) -> bool {
            false
        }
    }

    #[test]
    fn test_stale_timeout_does_not_clear_new_navigation() {
        let clock = Arc::new(ManualClock::default());
        let timers = Arc::new(StubbornTimers::default());
        let library = Arc::new(ObjectLibrary::new());
        let mut playlist = Playlist::with_id("n", "n");
        playlist.add_item(PlaylistItem::new(0, 300, 0)).unwrap();
        library.add(Clip::playlist(playlist));

        let navigator = PlayerPlaybackNavigator::new(
            NavigatorConfig::default(),
            clock.clone(),
            timers.clone(),
            library,
        )
        .unwrap();
        let timeout = navigator.config().navigation_timeout;

        navigator.navigate(&NavigationInfo::new("n")).unwrap();
        clock.advance(Duration::from_secs(1));
        navigator.navigate(&NavigationInfo::new("n")).unwrap();
        assert_eq!(timers.inner.pending_count(), 2);

        // The first request's timer still fires; the second request stands.
        clock.advance(timeout - Duration::from_secs(1));
        assert_eq!(timers.inner.fire_due(clock.now()), 1);
        assert!(navigator.is_navigating());

        clock.advance(Duration::from_secs(1));
        assert_eq!(timers.inner.fire_due(clock.now()), 1);
        assert!(!navigator.is_navigating());
    }

    #[test]
    fn test_navigate_errors() {
        let harness = Harness::new(0);
        harness
            .library
            .add(Clip::media(MediaClip::image("Logo", 1.0, 1.0).with_id("logo")));
        harness.library.add(Clip::playlist(Playlist::with_id("empty", "Empty")));

        assert_eq!(
            harness.navigator.navigate(&NavigationInfo::new("nope")),
            Err(NavigatorError::NotFound(ClipId::from("nope")))
        );
        assert_eq!(
            harness.navigator.navigate(&NavigationInfo::new("logo")),
            Err(NavigatorError::NotAPlaylist(ClipId::from("logo")))
        );
        assert_eq!(
            harness.navigator.navigate(&NavigationInfo::new("empty")),
            Err(NavigatorError::EmptyPlaylist(ClipId::from("empty")))
        );
        assert!(!harness.navigator.is_navigating());
        assert_eq!(harness.timers.pending_count(), 0);
    }

    #[test]
    fn test_history_is_pruned() {
        let config = NavigatorConfig {
            history_frames: 100,
            ..NavigatorConfig::default()
        };
        let harness = Harness::with_config(0, config);
        harness.add_playlist("n", 50);
        harness.navigator.navigate(&NavigationInfo::new("n")).unwrap();

        for frame in (0..=250).step_by(10) {
            harness.navigator.set_current_frame(frame as f64);
        }
        let starts: Vec<Frame> = harness.track(2).iter().map(|item| item.0).collect();
        // At frame 250 anything that ended before frame 150 is gone.
        assert_eq!(starts, vec![150, 200, 250]);
    }

    #[test]
    fn test_set_schedule_resplices() {
        let harness = Harness::new(1_500);
        harness.navigator.set_schedule(Some(day_schedule(&harness)));
        harness.navigator.set_current_frame(1_500.0);

        let other = harness.add_playlist("z", 2_000);
        let mut schedule = Schedule::new("Other");
        schedule.add_item(ScheduleItem::with_playlist(other, 0, 2_000));
        harness.navigator.set_schedule(Some(schedule.into_shared()));
        harness.navigator.set_current_frame(1_500.0);

        // Slot z started at frame of day 0, so the old y copies are all replaced.
        assert_eq!(harness.track(1), vec![(0, 2_000, 0, "z".to_string())]);
    }
}
