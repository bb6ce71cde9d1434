//! Project-level source list.
//!
//! Owns every open [`MediaSource`]. Clips refer to sources by id, caches
//! receive them by reference, so a source outlives everything using it.

use splice_core::{Result, SourceId};
use splice_media::{MediaOpener, MediaSource};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

#[derive(Default)]
pub struct SourceRegistry {
    sources: BTreeMap<SourceId, Arc<MediaSource>>,
    next_id: u32,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a source and register it under a fresh id.
    pub fn open(&mut self, opener: &dyn MediaOpener) -> Result<SourceId> {
        let id = SourceId(self.next_id);
        let source = MediaSource::open(id, opener)?;
        self.next_id += 1;
        self.sources.insert(id, Arc::new(source));
        Ok(id)
    }

    pub fn get(&self, id: SourceId) -> Option<&Arc<MediaSource>> {
        self.sources.get(&id)
    }

    pub fn contains(&self, id: SourceId) -> bool {
        self.sources.contains_key(&id)
    }

    /// Unregister a source. Callers should also drop its cache entries.
    pub fn remove(&mut self, id: SourceId) -> Option<Arc<MediaSource>> {
        let removed = self.sources.remove(&id);
        if removed.is_some() {
            info!(source = %id, "Source removed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SourceId, &Arc<MediaSource>)> {
        self.sources.iter()
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.sources.values()).finish()
    }
}
