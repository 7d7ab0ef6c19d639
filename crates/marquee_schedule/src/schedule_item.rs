// SPDX-License-Identifier: MIT OR Apache-2.0
//! A playlist bound to a slot of the day.

use crate::schedule::ScheduleError;
use marquee_playlist::{
    Clip, ClipId, Frame, Library, ObserverId, Playlist, PlaylistEvent, PlaylistObserver,
    SharedPlaylist, FRAMES_PER_DAY,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use uuid::Uuid;

/// Unique identifier for a schedule item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduleItemId(pub Uuid);

impl ScheduleItemId {
    /// Create a new random schedule item ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ScheduleItemId {
    fn default() -> Self {
        Self::new()
    }
}

/// Marks the owning item dirty whenever the watched playlist changes length
struct DurationWatch {
    dirty: Weak<AtomicBool>,
}

impl PlaylistObserver for DurationWatch {
    fn playlist_changed(&self, _playlist: &Playlist, event: &PlaylistEvent) {
        if let PlaylistEvent::DurationChanged { .. } = event {
            if let Some(dirty) = self.dirty.upgrade() {
                dirty.store(true, Ordering::Release);
            }
        }
    }

    fn is_alive(&self) -> bool {
        self.dirty.strong_count() > 0
    }
}

/// One slot of a schedule.
///
/// A fixed start pins the slot to its recorded frame of day; a flexible start
/// follows the previous slot. A fixed duration follows the playlist
/// ([`ScheduleItem::preferred_duration`]); a flexible duration absorbs slack.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScheduleItem {
    id: ScheduleItemId,
    playlist_id: Option<ClipId>,
    start_frame: Frame,
    duration: Frame,
    #[serde(default)]
    explicit_repeats: u32,
    #[serde(default)]
    flexible_start_frame: bool,
    #[serde(default)]
    flexible_duration: bool,
    #[serde(skip)]
    playlist: Option<SharedPlaylist>,
    #[serde(skip)]
    watch: Option<ObserverId>,
    #[serde(skip)]
    duration_dirty: Arc<AtomicBool>,
}

impl ScheduleItem {
    /// Create an empty slot with fixed start and duration
    pub fn new(start_frame: Frame, duration: Frame) -> Self {
        Self {
            id: ScheduleItemId::new(),
            playlist_id: None,
            start_frame,
            duration,
            explicit_repeats: 0,
            flexible_start_frame: false,
            flexible_duration: false,
            playlist: None,
            watch: None,
            duration_dirty: Arc::default(),
        }
    }

    /// Create a slot showing `playlist`
    pub fn with_playlist(playlist: SharedPlaylist, start_frame: Frame, duration: Frame) -> Self {
        let mut item = Self::new(start_frame, duration);
        item.set_playlist(Some(playlist));
        item
    }

    /// Create a slot referring to a playlist not yet resolved
    pub fn with_playlist_id(
        playlist_id: impl Into<ClipId>,
        start_frame: Frame,
        duration: Frame,
    ) -> Self {
        let mut item = Self::new(start_frame, duration);
        item.playlist_id = Some(playlist_id.into());
        item
    }

    /// Let the start follow the previous slot
    pub fn flexible_start(mut self, flexible: bool) -> Self {
        self.flexible_start_frame = flexible;
        self
    }

    /// Let the duration absorb slack instead of following the playlist
    pub fn flexible_duration(mut self, flexible: bool) -> Self {
        self.flexible_duration = flexible;
        self
    }

    /// Play the playlist `repeats` extra times
    pub fn with_repeats(mut self, repeats: u32) -> Self {
        self.explicit_repeats = repeats;
        self
    }

    /// Item ID
    pub fn id(&self) -> ScheduleItemId {
        self.id
    }

    /// Stored playlist ID
    pub fn playlist_id(&self) -> Option<&ClipId> {
        self.playlist_id.as_ref()
    }

    /// The live playlist, once resolved
    pub fn playlist(&self) -> Option<&SharedPlaylist> {
        self.playlist.as_ref()
    }

    /// Start as a frame of day
    pub fn start_frame(&self) -> Frame {
        self.start_frame
    }

    /// Length in frames
    pub fn duration(&self) -> Frame {
        self.duration
    }

    /// First frame after the slot
    pub fn next_frame(&self) -> Frame {
        self.start_frame + self.duration
    }

    /// Extra repetitions of the playlist
    pub fn explicit_repeats(&self) -> u32 {
        self.explicit_repeats
    }

    /// Whether the start follows the previous slot
    pub fn is_flexible_start(&self) -> bool {
        self.flexible_start_frame
    }

    /// Whether the duration absorbs slack
    pub fn is_flexible_duration(&self) -> bool {
        self.flexible_duration
    }

    /// Whether `frame` lies in `[start, start + duration)`
    pub fn contains_frame(&self, frame: Frame) -> bool {
        self.duration > 0 && frame >= self.start_frame && frame < self.next_frame()
    }

    /// Playlist duration times `repeats + 1` when resolved, else the stored duration
    pub fn preferred_duration(&self) -> Frame {
        match &self.playlist {
            Some(playlist) => {
                let repeats = Frame::from(self.explicit_repeats) + 1;
                playlist.read().duration().saturating_mul(repeats)
            }
            None => self.duration,
        }
    }

    /// `candidate` for a flexible start, the recorded start otherwise
    pub fn filter_start_frame(&self, candidate: Frame) -> Frame {
        if self.flexible_start_frame {
            candidate
        } else {
            self.start_frame
        }
    }

    /// `candidate` for a flexible duration, [`ScheduleItem::preferred_duration`] otherwise
    pub fn filter_duration(&self, candidate: Frame) -> Frame {
        if self.flexible_duration {
            candidate
        } else {
            self.preferred_duration()
        }
    }

    /// Check that the slot fits into one day
    pub fn validate(&self) -> Result<(), ScheduleError> {
        let in_day = |frame: Frame| (0..=FRAMES_PER_DAY).contains(&frame);
        if in_day(self.start_frame) && in_day(self.duration) {
            Ok(())
        } else {
            Err(ScheduleError::InvalidRange {
                start_frame: self.start_frame,
                duration: self.duration,
            })
        }
    }

    /// Move the slot
    pub fn set_start_frame(&mut self, start_frame: Frame) {
        self.start_frame = start_frame;
    }

    /// Change the stored duration
    pub fn set_duration(&mut self, duration: Frame) {
        self.duration = duration.max(0);
    }

    /// Change the repeat count
    pub fn set_repeats(&mut self, repeats: u32) {
        self.explicit_repeats = repeats;
    }

    /// Pin or release the start
    pub fn set_flexible_start(&mut self, flexible: bool) {
        self.flexible_start_frame = flexible;
    }

    /// Pin or release the duration
    pub fn set_flexible_duration(&mut self, flexible: bool) {
        self.flexible_duration = flexible;
    }

    /// Swap the playlist and start watching its duration.
    ///
    /// Briefly takes the write lock of both the old and new playlist, so it
    /// must not be called while either is locked.
    pub fn set_playlist(&mut self, playlist: Option<SharedPlaylist>) {
        if let (Some(old), Some(watch)) = (self.playlist.take(), self.watch.take()) {
            old.write().unsubscribe(watch);
        }
        // A fresh flag also retires any watch that could not be unsubscribed.
        self.duration_dirty = Arc::default();

        if let Some(playlist) = &playlist {
            let watch = DurationWatch {
                dirty: Arc::downgrade(&self.duration_dirty),
            };
            self.watch = Some(playlist.write().subscribe(watch));
            self.playlist_id = Some(playlist.id().clone());
        }
        self.playlist = playlist;
    }

    /// Look the stored playlist ID up in `library`.
    ///
    /// Anything other than a playlist under that ID leaves the slot empty.
    pub fn resolve_dependencies(&mut self, library: &dyn Library) -> Result<(), ScheduleError> {
        let Some(id) = self.playlist_id.clone() else {
            return Ok(());
        };
        match library.find_object(&id) {
            Some(Clip::Playlist(playlist)) => {
                if !self.playlist.as_ref().is_some_and(|p| p.ptr_eq(&playlist)) {
                    self.set_playlist(Some(playlist));
                }
                Ok(())
            }
            found => {
                if found.is_some() {
                    tracing::warn!("Schedule slot refers to {id}, which is not a playlist");
                }
                self.set_playlist(None);
                Err(ScheduleError::NotFound(id))
            }
        }
    }

    /// Whether the playlist changed length since the last call
    pub(crate) fn take_duration_dirty(&self) -> bool {
        self.duration_dirty.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn apply(&mut self, start_frame: Frame, duration: Frame) -> bool {
        let changed = self.start_frame != start_frame || self.duration != duration;
        self.start_frame = start_frame;
        self.duration = duration;
        changed
    }
}
