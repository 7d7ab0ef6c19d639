// SPDX-License-Identifier: MIT OR Apache-2.0
//! Observer fan-out for playlist changes.
//!
//! Listeners are notified synchronously, after the playlist has already
//! re-established its derived state. Mutations are bracketed by
//! [`PlaylistEvent::BlockStarted`] / [`PlaylistEvent::BlockFinished`]; nested
//! blocks coalesce so that listeners see one pair per outermost block and can
//! defer expensive reactions until `BlockFinished`.

use crate::frame::Frame;
use crate::playlist::Playlist;
use crate::playlist_item::ItemId;
use crate::track::TrackIndex;
use std::fmt;
use std::sync::Arc;

/// Change notification emitted by a playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaylistEvent {
    /// The outermost notification block opened
    BlockStarted,
    /// The outermost notification block closed
    BlockFinished,
    /// An item was inserted at `index`
    ItemAdded {
        /// Inserted item
        item: ItemId,
        /// Position in insertion order
        index: usize,
    },
    /// An item was removed
    ItemRemoved {
        /// Removed item
        item: ItemId,
    },
    /// A field of an item changed
    ItemChanged {
        /// Changed item
        item: ItemId,
    },
    /// The derived duration changed
    DurationChanged {
        /// Previous duration
        old: Frame,
        /// New duration
        new: Frame,
    },
    /// The highest used track changed
    MaxTrackChanged {
        /// Previous maximum
        old: TrackIndex,
        /// New maximum
        new: TrackIndex,
    },
    /// Track properties or the solo track changed
    TrackPropertiesChanged {
        /// Affected track
        track: TrackIndex,
    },
}

/// Receiver of playlist notifications
pub trait PlaylistObserver: Send + Sync {
    /// Called for every event; the playlist is in a consistent state
    fn playlist_changed(&self, playlist: &Playlist, event: &PlaylistEvent);

    /// Observers that report `false` are dropped on the next notification
    fn is_alive(&self) -> bool {
        true
    }
}

impl<F> PlaylistObserver for F
where
    F: Fn(&Playlist, &PlaylistEvent) + Send + Sync,
{
    fn playlist_changed(&self, playlist: &Playlist, event: &PlaylistEvent) {
        self(playlist, event);
    }
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Subscriber list plus block nesting counter
#[derive(Default)]
pub(crate) struct ObserverList {
    entries: Vec<(ObserverId, Arc<dyn PlaylistObserver>)>,
    next_id: u64,
    depth: u32,
}

impl ObserverList {
    pub(crate) fn add(&mut self, observer: Arc<dyn PlaylistObserver>) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, observer));
        id
    }

    pub(crate) fn remove(&mut self, id: ObserverId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Live observers at this moment; dead ones are pruned
    pub(crate) fn snapshot(&mut self) -> Vec<Arc<dyn PlaylistObserver>> {
        self.entries.retain(|(_, observer)| observer.is_alive());
        self.entries.iter().map(|(_, o)| Arc::clone(o)).collect()
    }

    /// Enter a block; true when this is the outermost one
    pub(crate) fn enter(&mut self) -> bool {
        self.depth += 1;
        self.depth == 1
    }

    /// Leave a block; true when the outermost one just closed
    pub(crate) fn leave(&mut self) -> bool {
        debug_assert!(self.depth > 0, "unbalanced notification block");
        self.depth = self.depth.saturating_sub(1);
        self.depth == 0
    }

    pub(crate) fn depth(&self) -> u32 {
        self.depth
    }
}

impl fmt::Debug for ObserverList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverList")
            .field("observers", &self.entries.len())
            .field("depth", &self.depth)
            .finish()
    }
}

/// Scope guard for a notification block.
///
/// Dereferences to the playlist so that several mutations can be batched:
///
/// ```ignore
/// let mut block = playlist.notification_block();
/// block.add_item(a)?;
/// block.remove_item(b);
/// // BlockFinished fires here
/// ```
pub struct NotificationBlock<'a> {
    playlist: &'a mut Playlist,
}

impl<'a> NotificationBlock<'a> {
    pub(crate) fn new(playlist: &'a mut Playlist) -> Self {
        playlist.begin_notification_block();
        Self { playlist }
    }
}

impl std::ops::Deref for NotificationBlock<'_> {
    type Target = Playlist;

    fn deref(&self) -> &Playlist {
        self.playlist
    }
}

impl std::ops::DerefMut for NotificationBlock<'_> {
    fn deref_mut(&mut self) -> &mut Playlist {
        self.playlist
    }
}

impl Drop for NotificationBlock<'_> {
    fn drop(&mut self) {
        self.playlist.end_notification_block();
    }
}
