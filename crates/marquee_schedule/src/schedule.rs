// SPDX-License-Identifier: MIT OR Apache-2.0
//! Ordered slots covering a day.

use crate::schedule_item::ScheduleItem;
use marquee_playlist::{ClipId, Frame, Library, ResolveError, FRAMES_PER_DAY};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Schedule shared between its editor and the navigator
pub type SharedSchedule = Arc<RwLock<Schedule>>;

/// Errors from schedule edits and slot checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    /// Index past the end of the schedule
    #[error("Schedule index {index} out of bounds ({len} items)")]
    IndexOutOfBounds {
        /// Requested index
        index: usize,
        /// Number of items
        len: usize,
    },

    /// The slot's playlist is not in the library
    #[error("Playlist not found: {0}")]
    NotFound(ClipId),

    /// Start or duration outside a single day
    #[error("Slot start {start_frame} / duration {duration} outside one day")]
    InvalidRange {
        /// Recorded start
        start_frame: Frame,
        /// Recorded duration
        duration: Frame,
    },
}

/// Result type for schedule operations
pub type Result<T> = std::result::Result<T, ScheduleError>;

/// An ordered set of schedule items
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Schedule {
    /// Schedule name
    pub name: String,
    items: Vec<ScheduleItem>,
    #[serde(skip)]
    change_token: u64,
}

impl Schedule {
    /// Create an empty schedule
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
            change_token: 0,
        }
    }

    /// Wrap the schedule for sharing
    pub fn into_shared(self) -> SharedSchedule {
        Arc::new(RwLock::new(self))
    }

    /// All items in schedule order.
    ///
    /// Timing reflects playlist length changes only once
    /// [`Schedule::sync_durations`] has run.
    pub fn items(&self) -> &[ScheduleItem] {
        &self.items
    }

    /// Item by index
    pub fn item(&self, index: usize) -> Option<&ScheduleItem> {
        self.items.get(index)
    }

    /// Number of items
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Whether the schedule is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Counter bumped whenever items or their timing change
    pub fn change_token(&self) -> u64 {
        self.change_token
    }

    /// Append an item and re-sanitize
    pub fn add_item(&mut self, item: ScheduleItem) -> usize {
        self.items.push(item);
        self.structure_changed();
        self.items.len() - 1
    }

    /// Insert an item at `index` and re-sanitize
    pub fn insert_item(&mut self, index: usize, item: ScheduleItem) -> Result<()> {
        self.check_index(index, self.items.len() + 1)?;
        self.items.insert(index, item);
        self.structure_changed();
        Ok(())
    }

    /// Remove the item at `index` and re-sanitize
    pub fn remove_item(&mut self, index: usize) -> Result<ScheduleItem> {
        self.check_index(index, self.items.len())?;
        let item = self.items.remove(index);
        self.structure_changed();
        Ok(item)
    }

    /// Move an item to another position and re-sanitize
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<()> {
        self.check_index(from, self.items.len())?;
        self.check_index(to, self.items.len())?;
        if from != to {
            let item = self.items.remove(from);
            self.items.insert(to, item);
            self.structure_changed();
        }
        Ok(())
    }

    /// Edit one item and re-sanitize
    pub fn modify_item<F>(&mut self, index: usize, f: F) -> Result<()>
    where
        F: FnOnce(&mut ScheduleItem),
    {
        self.check_index(index, self.items.len())?;
        f(&mut self.items[index]);
        self.structure_changed();
        Ok(())
    }

    fn check_index(&self, index: usize, limit: usize) -> Result<()> {
        if index < limit {
            Ok(())
        } else {
            Err(ScheduleError::IndexOutOfBounds {
                index,
                len: self.items.len(),
            })
        }
    }

    fn structure_changed(&mut self) {
        self.change_token += 1;
        self.sanitize_start_frames();
    }

    /// First item whose `[start, start + duration)` contains `frame`.
    ///
    /// Uses the timing as of the last edit or [`Schedule::sync_durations`];
    /// call that first to see playlist length changes.
    pub fn index_at_frame(&self, frame: Frame) -> Option<usize> {
        self.items.iter().position(|item| item.contains_frame(frame))
    }

    /// Item current at `frame`
    pub fn item_at_frame(&self, frame: Frame) -> Option<&ScheduleItem> {
        self.index_at_frame(frame).and_then(|index| self.items.get(index))
    }

    /// Re-derive every item's start and duration in one pass.
    ///
    /// A flexible start follows the previous item's end; a fixed one keeps
    /// its recorded frame. A flexible duration stretches to the next fixed
    /// start (or keeps its own length when none follows); a fixed one follows
    /// the playlist. Idempotent. Returns whether anything moved.
    pub fn sanitize_start_frames(&mut self) -> bool {
        let mut changed = false;
        let mut cursor: Frame = 0;

        for index in 0..self.items.len() {
            let next_fixed_start = self
                .items
                .get(index + 1)
                .filter(|next| !next.is_flexible_start())
                .map(ScheduleItem::start_frame);

            let item = &self.items[index];
            let start_frame = item.filter_start_frame(cursor).max(0);
            let candidate = next_fixed_start.map_or(item.duration(), |next| next - start_frame);
            let duration = item.filter_duration(candidate).max(0);

            if duration == 0 {
                tracing::warn!("Schedule '{}': slot {index} has zero duration", self.name);
            } else if start_frame + duration > FRAMES_PER_DAY {
                tracing::warn!(
                    "Schedule '{}': slot {index} ends past the end of the day ({})",
                    self.name,
                    start_frame + duration
                );
            }

            changed |= self.items[index].apply(start_frame, duration);
            cursor = start_frame + duration;
        }

        if changed {
            self.change_token += 1;
        }
        changed
    }

    /// Pick up playlist duration changes seen since the last call.
    ///
    /// Items whose playlist changed length are re-timed by a sanitize pass;
    /// items with a flexible duration keep theirs. Returns whether anything
    /// moved.
    pub fn sync_durations(&mut self) -> bool {
        let mut dirty = false;
        for item in &self.items {
            dirty |= item.take_duration_dirty();
        }
        dirty && self.sanitize_start_frames()
    }

    /// Resolve every item's playlist against `library`, then re-sanitize.
    ///
    /// Takes no lock beyond what the caller holds. Missing playlists leave
    /// their slots empty.
    pub fn resolve_dependencies(
        &mut self,
        library: &dyn Library,
    ) -> std::result::Result<(), ResolveError> {
        let mut missing = Vec::new();
        for item in &mut self.items {
            if let Err(ScheduleError::NotFound(id)) = item.resolve_dependencies(library) {
                tracing::warn!("Schedule '{}': playlist {id} not found", self.name);
                missing.push(id);
            }
        }
        for item in &self.items {
            item.take_duration_dirty();
        }
        self.sanitize_start_frames();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ResolveError { missing })
        }
    }
}
