//! [`SliceCache`]: the lazily-populated array of [`TexPage`]s for one axis
//! (spec §4.6). `VolumeManager` owns three of these, one per [`Axis`].

use rustc_hash::FxHashMap;

use crate::render2d::texpage::TexPage;
use crate::volume::source::{Axis, VolumeId};

/// Sparse `slice_index -> TexPage` map for one axis. A volume's slices are
/// never all resident at once; only the ones a caller has actually
/// requested get an entry.
pub struct SliceCache {
    pub axis: Axis,
    tile_size: (u32, u32),
    source_id: VolumeId,
    pages: FxHashMap<i32, TexPage>,
}

impl SliceCache {
    #[must_use]
    pub fn new(axis: Axis, tile_size: (u32, u32), source_id: VolumeId) -> Self {
        Self { axis, tile_size, source_id, pages: FxHashMap::default() }
    }

    /// Re-keys this cache for a page-size change along `self.axis`'s
    /// `(tu, tv)` plane (spec §4.6: axes sharing a tile dimension with the
    /// changed one must invalidate; axes that don't may keep their pages).
    pub fn set_tile_size(&mut self, tile_size: (u32, u32)) {
        if tile_size != self.tile_size {
            self.tile_size = tile_size;
            self.pages.clear();
        }
    }

    #[must_use]
    pub fn tile_size(&self) -> (u32, u32) {
        self.tile_size
    }

    /// Drops every page, e.g. when the bound volume changes identity.
    pub fn invalidate_volume(&mut self, source_id: VolumeId) {
        if self.source_id != source_id {
            self.pages.clear();
            self.source_id = source_id;
        }
    }

    /// Gets (creating on a miss, with no tiles built yet) the page for
    /// `slice_idx`.
    pub fn page_mut(&mut self, slice_idx: i32) -> &mut TexPage {
        self.pages
            .entry(slice_idx)
            .or_insert_with(|| TexPage::new(self.axis, slice_idx, self.tile_size))
    }

    #[must_use]
    pub fn resident_slice_count(&self) -> usize {
        self.pages.len()
    }

    /// Iterates every resident `(slice_idx, page)` pair, for the manager's
    /// global LRU sweep.
    pub fn pages_iter_mut(&mut self) -> impl Iterator<Item = (&i32, &mut TexPage)> {
        self.pages.iter_mut()
    }

    /// Read-only counterpart of [`pages_iter_mut`](Self::pages_iter_mut),
    /// for the manager's full-rescan byte accounting.
    pub fn pages_iter(&self) -> impl Iterator<Item = (&i32, &TexPage)> {
        self.pages.iter()
    }

    /// Evicts the least-recently-used `SubPage` from the page at
    /// `slice_idx`, pruning the page entirely if it's left empty.
    pub fn evict_from(&mut self, slice_idx: i32) -> Option<(usize, usize)> {
        let page = self.pages.get_mut(&slice_idx)?;
        let freed = page.evict_lru();
        if page.subpage_count() == 0 {
            self.pages.remove(&slice_idx);
        }
        freed
    }
}
