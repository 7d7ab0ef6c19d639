// SPDX-License-Identifier: MIT OR Apache-2.0
//! Playlist: a clip composed of timed items across tracks.
//!
//! The playlist is the single source of truth for what is visible when and
//! for how long the whole composition lasts. Its duration and highest track
//! are derived from the items and recomputed synchronously inside every
//! mutating call, before any listener is notified.

use crate::clip::{Clip, ClipId, ClipMeta, SyncStatus, DEFAULT_BOUNDS};
use crate::frame::Frame;
use crate::library::{Library, ResolveError};
use crate::notify::{NotificationBlock, ObserverId, ObserverList, PlaylistEvent, PlaylistObserver};
use crate::playlist_item::{ItemId, PlaylistItem};
use crate::track::{TrackIndex, TrackProperties};
use kurbo::{Affine, Rect};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Nested playlists deeper than this are not descended into when sampling
pub const MAX_NESTING_DEPTH: usize = 16;

/// Errors from playlist mutations and lookups
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaylistError {
    /// A referenced library object does not exist
    #[error("Object not found: {0}")]
    NotFound(ClipId),

    /// Memory for a new item could not be reserved
    #[error("Out of memory while inserting an item")]
    ResourceExhausted,

    /// The clip contains (directly or transitively) the receiving playlist
    #[error("Clip {0} would make the playlist contain itself")]
    Cycle(ClipId),

    /// No item with this ID in the playlist
    #[error("Item not found: {0:?}")]
    ItemNotFound(ItemId),
}

/// Result type for playlist operations
pub type Result<T> = std::result::Result<T, PlaylistError>;

/// One piece of leaf media visible at a sampled frame
#[derive(Debug, Clone)]
pub struct ResolvedLayer {
    /// Item (in the innermost playlist) that shows the media
    pub item: ItemId,
    /// Track of that item in the sampled (outermost) playlist
    pub track: TrackIndex,
    /// The media clip
    pub clip: Clip,
    /// Frame within the media
    pub local_frame: Frame,
    /// Accumulated placement
    pub transform: Affine,
    /// Accumulated opacity in 0..=1
    pub opacity: f32,
}

#[derive(Debug, Clone, Copy)]
struct DerivedChange {
    duration: Option<(Frame, Frame)>,
    max_track: Option<(TrackIndex, TrackIndex)>,
}

#[derive(Deserialize)]
struct PlaylistRecord {
    meta: ClipMeta,
    #[serde(default = "default_bounds")]
    bounds: Rect,
    #[serde(default)]
    items: Vec<PlaylistItem>,
    #[serde(default)]
    tracks: BTreeMap<TrackIndex, TrackProperties>,
    #[serde(default)]
    solo_track: Option<TrackIndex>,
}

fn default_bounds() -> Rect {
    DEFAULT_BOUNDS
}

/// A composition of playlist items, itself usable as a clip
#[derive(Debug, Serialize, Deserialize)]
#[serde(from = "PlaylistRecord")]
pub struct Playlist {
    meta: ClipMeta,
    bounds: Rect,
    items: Vec<PlaylistItem>,
    tracks: BTreeMap<TrackIndex, TrackProperties>,
    solo_track: Option<TrackIndex>,
    #[serde(skip)]
    duration: Frame,
    #[serde(skip)]
    max_track: TrackIndex,
    #[serde(skip)]
    change_token: u64,
    #[serde(skip)]
    current_frame: Option<Frame>,
    #[serde(skip)]
    observers: ObserverList,
}

impl From<PlaylistRecord> for Playlist {
    fn from(record: PlaylistRecord) -> Self {
        let mut playlist = Self {
            meta: record.meta,
            bounds: record.bounds,
            items: record.items,
            tracks: record.tracks,
            solo_track: record.solo_track,
            duration: 0,
            max_track: 0,
            change_token: 0,
            current_frame: None,
            observers: ObserverList::default(),
        };
        let parent = playlist.meta.id.clone();
        for item in &mut playlist.items {
            item.set_parent(Some(parent.clone()));
        }
        playlist.meta.dependencies_resolved = playlist.items.iter().all(|i| i.clip_id().is_none());
        playlist.update_derived();
        playlist
    }
}

impl Playlist {
    /// Create an empty playlist with a fresh ID
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_meta(ClipMeta::new(name))
    }

    /// Create an empty playlist with a known ID
    pub fn with_id(id: impl Into<ClipId>, name: impl Into<String>) -> Self {
        Self::from_meta(ClipMeta::with_id(id, name))
    }

    fn from_meta(meta: ClipMeta) -> Self {
        Self {
            meta,
            bounds: DEFAULT_BOUNDS,
            items: Vec::new(),
            tracks: BTreeMap::new(),
            solo_track: None,
            duration: 0,
            max_track: 0,
            change_token: 0,
            current_frame: None,
            observers: ObserverList::default(),
        }
    }

    // ========== Clip attributes ==========

    /// Library ID
    pub fn id(&self) -> &ClipId {
        &self.meta.id
    }

    /// Library attributes
    pub fn meta(&self) -> &ClipMeta {
        &self.meta
    }

    /// Rename the playlist
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.meta.name = name.into();
    }

    /// Record a new revision and mark it as locally modified
    pub fn bump_version(&mut self) {
        self.meta.version += 1;
        if self.meta.sync_status == SyncStatus::Synced {
            self.meta.sync_status = SyncStatus::Modified;
        }
    }

    /// Set the sync state
    pub fn set_sync_status(&mut self, status: SyncStatus) {
        self.meta.sync_status = status;
    }

    /// Canvas bounds of the composition
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Change the canvas bounds
    pub fn set_bounds(&mut self, bounds: Rect) {
        self.bounds = bounds;
    }

    // ========== Derived state ==========

    /// `max(end) - min(start) + 1` over all items, 0 when empty
    pub fn duration(&self) -> Frame {
        self.duration
    }

    /// Highest track used by any item, 0 when empty
    pub fn max_track(&self) -> TrackIndex {
        self.max_track
    }

    /// Counter bumped on every structural change
    pub fn change_token(&self) -> u64 {
        self.change_token
    }

    /// Frame last pushed with [`Playlist::set_current_frame`]
    pub fn current_frame(&self) -> Option<Frame> {
        self.current_frame
    }

    fn update_derived(&mut self) -> DerivedChange {
        let (duration, max_track) = if self.items.is_empty() {
            (0, 0)
        } else {
            let start = self.items.iter().map(PlaylistItem::start_frame).min().unwrap_or(0);
            let end = self.items.iter().map(PlaylistItem::end_frame).max().unwrap_or(0);
            let max_track = self.items.iter().map(PlaylistItem::track).max().unwrap_or(0);
            ((end - start + 1).max(0), max_track)
        };

        let change = DerivedChange {
            duration: (duration != self.duration).then_some((self.duration, duration)),
            max_track: (max_track != self.max_track).then_some((self.max_track, max_track)),
        };
        self.duration = duration;
        self.max_track = max_track;
        self.change_token += 1;
        change
    }

    // ========== Notifications ==========

    /// Register a listener
    pub fn subscribe<O: PlaylistObserver + 'static>(&mut self, observer: O) -> ObserverId {
        self.observers.add(Arc::new(observer))
    }

    /// Register an already shared listener
    pub fn subscribe_shared(&mut self, observer: Arc<dyn PlaylistObserver>) -> ObserverId {
        self.observers.add(observer)
    }

    /// Remove a listener; false if it was not registered
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }

    /// Number of registered listeners
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Open a notification block; it closes when the guard drops
    pub fn notification_block(&mut self) -> NotificationBlock<'_> {
        NotificationBlock::new(self)
    }

    /// Whether a notification block is currently open
    pub fn is_notification_suspended(&self) -> bool {
        self.observers.depth() > 0
    }

    pub(crate) fn begin_notification_block(&mut self) {
        if self.observers.enter() {
            self.emit(PlaylistEvent::BlockStarted);
        }
    }

    pub(crate) fn end_notification_block(&mut self) {
        if self.observers.leave() {
            self.emit(PlaylistEvent::BlockFinished);
        }
    }

    fn emit(&mut self, event: PlaylistEvent) {
        let observers = self.observers.snapshot();
        for observer in &observers {
            observer.playlist_changed(self, &event);
        }
    }

    fn emit_derived(&mut self, change: DerivedChange) {
        if let Some((old, new)) = change.duration {
            self.emit(PlaylistEvent::DurationChanged { old, new });
        }
        if let Some((old, new)) = change.max_track {
            self.emit(PlaylistEvent::MaxTrackChanged { old, new });
        }
    }

    // ========== Items ==========

    /// All items, in insertion order
    pub fn items(&self) -> &[PlaylistItem] {
        &self.items
    }

    /// Number of items
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Whether the playlist has no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Item by ID
    pub fn item(&self, id: ItemId) -> Option<&PlaylistItem> {
        self.items.iter().find(|i| i.id() == id)
    }

    /// Item by insertion index
    pub fn item_at(&self, index: usize) -> Option<&PlaylistItem> {
        self.items.get(index)
    }

    /// Insertion index of an item
    pub fn index_of(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|i| i.id() == id)
    }

    /// Items on one track, in insertion order
    pub fn items_on_track(&self, track: TrackIndex) -> impl Iterator<Item = &PlaylistItem> {
        self.items.iter().filter(move |i| i.track() == track)
    }

    /// Items covering `frame`, on any track
    pub fn items_at(&self, frame: Frame) -> impl Iterator<Item = &PlaylistItem> {
        self.items.iter().filter(move |i| i.contains(frame))
    }

    /// Items covering `frame` on an enabled track
    pub fn visible_items_at(&self, frame: Frame) -> impl Iterator<Item = &PlaylistItem> {
        self.items_at(frame)
            .filter(move |i| self.is_track_enabled(i.track()))
    }

    /// Append an item
    pub fn add_item(&mut self, item: PlaylistItem) -> Result<ItemId> {
        let index = self.items.len();
        self.insert_item(index, item)
    }

    /// Insert an item at `index` (clamped to the item count).
    ///
    /// On failure nothing changes and no notification is sent.
    pub fn insert_item(&mut self, index: usize, mut item: PlaylistItem) -> Result<ItemId> {
        if let Some(clip) = item.clip() {
            if self.would_create_cycle(clip) {
                tracing::warn!("Refusing to add {} to playlist {}: cycle", clip.id(), self.meta.id);
                return Err(PlaylistError::Cycle(clip.id()));
            }
        }
        if self.items.try_reserve(1).is_err() {
            tracing::warn!("Out of memory adding an item to playlist {}", self.meta.id);
            return Err(PlaylistError::ResourceExhausted);
        }

        let id = item.id();
        item.set_parent(Some(self.meta.id.clone()));
        item.set_cursor(None);

        let mut block = self.notification_block();
        let index = index.min(block.items.len());
        block.items.insert(index, item);
        let change = block.update_derived();
        block.emit(PlaylistEvent::ItemAdded { item: id, index });
        block.emit_derived(change);
        Ok(id)
    }

    /// Remove an item by ID
    pub fn remove_item(&mut self, id: ItemId) -> Option<PlaylistItem> {
        let index = self.index_of(id)?;
        self.remove_item_at(index)
    }

    /// Remove the item at `index`
    pub fn remove_item_at(&mut self, index: usize) -> Option<PlaylistItem> {
        if index >= self.items.len() {
            return None;
        }
        let mut block = self.notification_block();
        let mut item = block.items.remove(index);
        item.set_parent(None);
        item.set_cursor(None);
        let change = block.update_derived();
        block.emit(PlaylistEvent::ItemRemoved { item: item.id() });
        block.emit_derived(change);
        Some(item)
    }

    /// Remove every item
    pub fn clear(&mut self) {
        let mut block = self.notification_block();
        while let Some(index) = block.items.len().checked_sub(1) {
            block.remove_item_at(index);
        }
    }

    /// Mutate one item and re-derive the playlist.
    ///
    /// Content must not be changed to a playlist from inside `f`; use
    /// [`Playlist::set_item_clip`] for that so the cycle guard runs first.
    pub fn modify_item<F>(&mut self, id: ItemId, f: F) -> Result<()>
    where
        F: FnOnce(&mut PlaylistItem),
    {
        let index = self.index_of(id).ok_or(PlaylistError::ItemNotFound(id))?;
        let backup = self.items[index].clone();

        let mut block = self.notification_block();
        f(&mut block.items[index]);

        let cyclic = match block.items[index].clip() {
            Some(clip) if !backup.clip().is_some_and(|old| old.is_same(clip)) => {
                block.would_create_cycle(clip).then(|| clip.id())
            }
            _ => None,
        };
        if let Some(clip_id) = cyclic {
            block.items[index] = backup;
            return Err(PlaylistError::Cycle(clip_id));
        }

        let change = block.update_derived();
        block.emit(PlaylistEvent::ItemChanged { item: id });
        block.emit_derived(change);
        Ok(())
    }

    /// Swap the content of an item (see [`PlaylistItem::set_clip`])
    pub fn set_item_clip(&mut self, id: ItemId, clip: Clip) -> Result<()> {
        if self.index_of(id).is_none() {
            return Err(PlaylistError::ItemNotFound(id));
        }
        if self.would_create_cycle(&clip) {
            tracing::warn!("Refusing to set {} on playlist {}: cycle", clip.id(), self.meta.id);
            return Err(PlaylistError::Cycle(clip.id()));
        }
        self.modify_item(id, |item| item.set_clip(clip))
    }

    /// Push a time cursor into every item covering `frame`; others are cleared
    pub fn set_current_frame(&mut self, frame: Frame) {
        self.current_frame = Some(frame);
        for item in &mut self.items {
            let cursor = item.contains(frame).then(|| item.local_frame(frame));
            item.set_cursor(cursor);
        }
    }

    /// Shift items on `track` so that `[from_frame, to_frame]` becomes free.
    ///
    /// Pass one finds the earliest start among items overlapping the range;
    /// if that lies before `from_frame` the range is widened back to it. Pass
    /// two moves every item starting at or after the (widened) start forward
    /// by the smallest amount that clears the range. Items before the widened
    /// start never move. `ignore_item` is skipped by both passes. Returns
    /// whether anything moved.
    pub fn make_room(
        &mut self,
        from_frame: Frame,
        to_frame: Frame,
        track: TrackIndex,
        ignore_item: Option<ItemId>,
    ) -> bool {
        if to_frame < from_frame {
            return false;
        }
        let candidates =
            |item: &&PlaylistItem| item.track() == track && Some(item.id()) != ignore_item;

        let Some(earliest) = self
            .items
            .iter()
            .filter(candidates)
            .filter(|i| i.overlaps(from_frame, to_frame))
            .map(PlaylistItem::start_frame)
            .min()
        else {
            return false;
        };
        let from_frame = from_frame.min(earliest);
        let shift = to_frame + 1 - earliest;

        let moved: Vec<ItemId> = self
            .items
            .iter()
            .filter(candidates)
            .filter(|i| i.start_frame() >= from_frame)
            .map(PlaylistItem::id)
            .collect();

        let mut block = self.notification_block();
        for item in block.items.iter_mut().filter(|i| moved.contains(&i.id())) {
            item.shift(shift);
        }
        let change = block.update_derived();
        for id in &moved {
            block.emit(PlaylistEvent::ItemChanged { item: *id });
        }
        block.emit_derived(change);
        true
    }

    // ========== Tracks ==========

    /// Properties of a track (defaults when never set)
    pub fn track_properties(&self, track: TrackIndex) -> TrackProperties {
        self.tracks.get(&track).cloned().unwrap_or_default()
    }

    /// Replace the properties of a track
    pub fn set_track_properties(&mut self, track: TrackIndex, properties: TrackProperties) {
        let mut block = self.notification_block();
        if properties.is_default() {
            block.tracks.remove(&track);
        } else {
            block.tracks.insert(track, properties);
        }
        block.change_token += 1;
        block.emit(PlaylistEvent::TrackPropertiesChanged { track });
    }

    /// Enable or disable a track
    pub fn set_track_enabled(&mut self, track: TrackIndex, enabled: bool) {
        let mut properties = self.track_properties(track);
        if properties.enabled != enabled {
            properties.enabled = enabled;
            self.set_track_properties(track, properties);
        }
    }

    /// The solo track, if one is set
    pub fn solo_track(&self) -> Option<TrackIndex> {
        self.solo_track
    }

    /// Make one track the only enabled track, or clear the override
    pub fn set_solo_track(&mut self, solo_track: Option<TrackIndex>) {
        if self.solo_track == solo_track {
            return;
        }
        let previous = self.solo_track;
        let mut block = self.notification_block();
        block.solo_track = solo_track;
        block.change_token += 1;
        if let Some(track) = solo_track.or(previous) {
            block.emit(PlaylistEvent::TrackPropertiesChanged { track });
        }
    }

    /// Only the solo track when one is set, else the track's own flag
    pub fn is_track_enabled(&self, track: TrackIndex) -> bool {
        match self.solo_track {
            Some(solo) => solo == track,
            None => self.tracks.get(&track).map_or(true, |p| p.enabled),
        }
    }

    // ========== Sampling ==========

    /// Leaf media visible at `frame`, lowest track first, descending into
    /// nested playlists
    pub fn resolve_at(&self, frame: Frame) -> Vec<ResolvedLayer> {
        let mut layers = Vec::new();
        self.collect_layers(frame, None, Affine::IDENTITY, 1.0, 0, &mut layers);
        layers
    }

    fn collect_layers(
        &self,
        frame: Frame,
        outer_track: Option<TrackIndex>,
        transform: Affine,
        opacity: f32,
        depth: usize,
        out: &mut Vec<ResolvedLayer>,
    ) {
        if depth > MAX_NESTING_DEPTH {
            tracing::warn!("Playlist {} nested deeper than {MAX_NESTING_DEPTH}", self.meta.id);
            return;
        }

        let mut visible: Vec<&PlaylistItem> = self.visible_items_at(frame).collect();
        visible.sort_by_key(|i| i.track());

        for item in visible {
            let Some(clip) = item.clip() else {
                continue;
            };
            let track = outer_track.unwrap_or(item.track());
            let transform = transform * item.transform().to_affine();
            let opacity = opacity * item.opacity_at(frame);
            let local_frame = item.local_frame(frame);

            match clip {
                Clip::Media(_) => out.push(ResolvedLayer {
                    item: item.id(),
                    track,
                    clip: clip.clone(),
                    local_frame,
                    transform,
                    opacity,
                }),
                Clip::Playlist(nested) => {
                    nested.read().collect_layers(
                        local_frame,
                        Some(track),
                        transform,
                        opacity,
                        depth + 1,
                        out,
                    );
                }
            }
        }
    }

    // ========== Dependencies ==========

    /// Whether storing `clip` in this playlist would make it contain itself
    pub fn would_create_cycle(&self, clip: &Clip) -> bool {
        let Some(candidate) = clip.as_playlist() else {
            return false;
        };
        if candidate.id() == self.id() {
            return true;
        }
        let mut visited = HashSet::new();
        visited.insert(candidate.id().clone());
        references_playlist(&candidate.read(), self.id(), &mut visited)
    }

    /// Resolve every item's clip ID against `library`.
    ///
    /// Takes no lock of its own: the caller already holds this playlist
    /// exclusively. Missing IDs leave their items empty and are reported
    /// together; references that would create a cycle count as missing.
    pub fn resolve_dependencies(
        &mut self,
        library: &dyn Library,
    ) -> std::result::Result<(), ResolveError> {
        let mut missing = Vec::new();
        for index in 0..self.items.len() {
            if let Err(PlaylistError::NotFound(id)) =
                self.items[index].resolve_dependencies(library)
            {
                tracing::debug!("Playlist {}: {id} not found", self.meta.id);
                missing.push(id);
                continue;
            }
            let cyclic = self.items[index]
                .clip()
                .filter(|clip| self.would_create_cycle(clip))
                .map(Clip::id);
            if let Some(id) = cyclic {
                tracing::warn!("Playlist {}: {id} would contain itself", self.meta.id);
                self.items[index].release_clip();
                missing.push(id);
            }
        }

        self.meta.dependencies_resolved = missing.is_empty();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ResolveError { missing })
        }
    }
}

fn references_playlist(
    playlist: &Playlist,
    target: &ClipId,
    visited: &mut HashSet<ClipId>,
) -> bool {
    for item in &playlist.items {
        let Some(nested) = item.clip().and_then(Clip::as_playlist) else {
            continue;
        };
        if nested.id() == target {
            return true;
        }
        if visited.insert(nested.id().clone())
            && references_playlist(&nested.read(), target, visited)
        {
            return true;
        }
    }
    false
}
