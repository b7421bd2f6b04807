//! Bounded, linear undo/redo log of committed rasters.
//!
//! Each entry owns the [`ResourceHandle`] backing its raster, so dropping an
//! entry (eviction, truncation, clear) is what releases the resource.

use std::fmt;
use std::rc::Rc;
use std::time::SystemTime;

use image::RgbaImage;

use crate::compositor::Transform;
use crate::config::DEFAULT_MAX_HISTORY_LENGTH;
use crate::editor::tools::TextOverlay;
use crate::geometry::ImageBounds;
use crate::resource::{ResourceHandle, ResourceId, ResourceManager};

/// Immutable decoded bitmap plus the identity of the resource backing it.
#[derive(Clone)]
pub struct RasterImage {
    pixels: Rc<RgbaImage>,
    resource_id: ResourceId,
    uri: String,
}

impl RasterImage {
    /// Publishes `encoded` and pairs the resulting handle with `pixels`.
    pub fn publish(
        resources: &ResourceManager,
        pixels: RgbaImage,
        encoded: Vec<u8>,
    ) -> (Self, ResourceHandle) {
        let handle = resources.create(encoded);
        let raster = Self {
            pixels: Rc::new(pixels),
            resource_id: handle.id(),
            uri: handle.uri().to_string(),
        };
        (raster, handle)
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn bounds(&self) -> ImageBounds {
        ImageBounds::new(self.width(), self.height())
    }

    pub fn resource_id(&self) -> ResourceId {
        self.resource_id
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }
}

impl fmt::Debug for RasterImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("resource_id", &self.resource_id)
            .finish()
    }
}

/// Session state expressed in a raster's own coordinate space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditState {
    pub transform: Transform,
    pub overlays: Vec<TextOverlay>,
}

#[derive(Debug)]
pub struct HistoryEntry {
    raster: RasterImage,
    _handle: ResourceHandle,
    label: String,
    created_at: SystemTime,
    edit_state: EditState,
}

impl HistoryEntry {
    pub fn raster(&self) -> &RasterImage {
        &self.raster
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// State last stashed while this entry was current.
    pub fn edit_state(&self) -> &EditState {
        &self.edit_state
    }
}

#[derive(Debug)]
pub struct HistoryManager {
    entries: Vec<HistoryEntry>,
    cursor: Option<usize>,
    max_len: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY_LENGTH)
    }
}

impl HistoryManager {
    pub fn new(max_len: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: None,
            max_len: max_len.max(1),
        }
    }

    /// Appends a new current entry, discarding any redo tail first and
    /// evicting the oldest entries past the bound.
    pub fn commit(
        &mut self,
        raster: RasterImage,
        handle: ResourceHandle,
        label: impl Into<String>,
    ) -> &RasterImage {
        let truncate_to = self.cursor.map_or(0, |cursor| cursor + 1);
        let discarded = self.entries.len().saturating_sub(truncate_to);
        self.entries.truncate(truncate_to);

        self.entries.push(HistoryEntry {
            raster,
            _handle: handle,
            label: label.into(),
            created_at: SystemTime::now(),
            edit_state: EditState::default(),
        });

        let evicted = self.entries.len().saturating_sub(self.max_len);
        if evicted > 0 {
            self.entries.drain(..evicted);
        }
        let cursor = self.entries.len() - 1;
        self.cursor = Some(cursor);

        let entry = &self.entries[cursor];
        tracing::info!(
            label = entry.label.as_str(),
            discarded,
            evicted,
            len = self.entries.len(),
            "history commit"
        );
        &entry.raster
    }

    pub fn undo(&mut self) -> Option<RasterImage> {
        let cursor = self.cursor.filter(|cursor| *cursor > 0)? - 1;
        self.cursor = Some(cursor);
        tracing::debug!(cursor, label = self.entries[cursor].label.as_str(), "undo applied");
        Some(self.entries[cursor].raster.clone())
    }

    pub fn redo(&mut self) -> Option<RasterImage> {
        let cursor = self.cursor? + 1;
        let entry = self.entries.get(cursor)?;
        tracing::debug!(cursor, label = entry.label.as_str(), "redo applied");
        let raster = entry.raster.clone();
        self.cursor = Some(cursor);
        Some(raster)
    }

    /// Records `state` on the current entry so undo/redo can bring it back.
    pub fn stash(&mut self, state: EditState) -> bool {
        match self.cursor.and_then(|cursor| self.entries.get_mut(cursor)) {
            Some(entry) => {
                entry.edit_state = state;
                true
            }
            None => false,
        }
    }

    pub fn current(&self) -> Option<&RasterImage> {
        self.current_entry().map(HistoryEntry::raster)
    }

    pub fn current_entry(&self) -> Option<&HistoryEntry> {
        self.cursor.and_then(|cursor| self.entries.get(cursor))
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn can_undo(&self) -> bool {
        self.cursor.is_some_and(|cursor| cursor > 0)
    }

    pub fn can_redo(&self) -> bool {
        self.cursor
            .is_some_and(|cursor| cursor + 1 < self.entries.len())
    }

    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(HistoryEntry::label).collect()
    }

    /// Drops every entry, releasing their resources. Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        self.cursor = None;
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::testing::CountingBackend;

    fn commit_blank(history: &mut HistoryManager, resources: &ResourceManager, label: &str) {
        let (raster, handle) =
            RasterImage::publish(resources, RgbaImage::new(2, 2), label.as_bytes().to_vec());
        history.commit(raster, handle, label);
    }

    #[test]
    fn empty_history_has_no_cursor() {
        let mut history = HistoryManager::default();
        assert_eq!(history.cursor(), None);
        assert!(history.undo().is_none());
        assert!(history.redo().is_none());
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert!(history.current().is_none());
    }

    #[test]
    fn bound_keeps_most_recent_entries_in_order() {
        let resources = ResourceManager::new();
        let mut history = HistoryManager::new(20);
        for index in 0..25 {
            commit_blank(&mut history, &resources, &format!("edit {index}"));
        }

        assert_eq!(history.len(), 20);
        let expected: Vec<String> = (5..25).map(|index| format!("edit {index}")).collect();
        assert_eq!(history.labels(), expected);
        assert_eq!(history.cursor(), Some(19));
        assert_eq!(resources.stats().live, 20);
    }

    #[test]
    fn commit_after_undo_truncates_redo_tail() {
        let resources = ResourceManager::new();
        let mut history = HistoryManager::default();
        for label in ["a", "b", "c", "d"] {
            commit_blank(&mut history, &resources, label);
        }

        let undone = history.undo().unwrap();
        assert_eq!(undone.resource_id(), history.entries()[2].raster().resource_id());
        history.undo();
        commit_blank(&mut history, &resources, "e");

        assert_eq!(history.labels(), vec!["a", "b", "e"]);
        assert!(history.redo().is_none());
        assert!(!history.can_redo());
        assert_eq!(resources.stats().live, 3);
    }

    #[test]
    fn undo_redo_walk_the_cursor() {
        let resources = ResourceManager::new();
        let mut history = HistoryManager::default();
        commit_blank(&mut history, &resources, "first");
        commit_blank(&mut history, &resources, "second");

        assert!(history.can_undo());
        history.undo();
        assert_eq!(history.current_entry().map(HistoryEntry::label), Some("first"));
        assert!(history.undo().is_none());
        assert!(history.can_redo());
        history.redo();
        assert_eq!(history.current_entry().map(HistoryEntry::label), Some("second"));
    }

    #[test]
    fn every_created_handle_is_released_exactly_once() {
        let backend = CountingBackend::default();
        let published = backend.published.clone();
        let revoked = backend.revoked.clone();
        let resources = ResourceManager::with_backend(backend);
        let mut history = HistoryManager::new(3);

        for index in 0..6 {
            commit_blank(&mut history, &resources, &format!("edit {index}"));
        }
        history.undo();
        history.undo();
        commit_blank(&mut history, &resources, "branch");
        assert_eq!(history.clear(), 2);
        resources.release_all();

        assert_eq!(published.get(), 7);
        assert_eq!(revoked.get(), 7);
    }

    #[test]
    fn stashed_state_stays_with_its_entry() {
        let resources = ResourceManager::new();
        let mut history = HistoryManager::default();
        assert!(!history.stash(EditState::default()));

        commit_blank(&mut history, &resources, "first");
        let mut rotated = EditState::default();
        rotated.transform.rotate_right();
        assert!(history.stash(rotated.clone()));
        commit_blank(&mut history, &resources, "second");
        assert_eq!(history.current_entry().unwrap().edit_state(), &EditState::default());

        history.undo();
        assert_eq!(history.current_entry().unwrap().edit_state(), &rotated);
    }

    #[test]
    fn views_outlive_their_entry() {
        let resources = ResourceManager::new();
        let mut history = HistoryManager::new(1);
        commit_blank(&mut history, &resources, "old");
        let view = history.current().cloned().unwrap();
        commit_blank(&mut history, &resources, "new");

        assert!(!resources.is_live(view.resource_id()));
        assert_eq!(view.pixels().dimensions(), (2, 2));
    }
}
