//! Shared media sources.
//!
//! A `MediaSource` is created once per file by the project-level source
//! list and shared (`Arc`) by every clip and cache that refers to it. It
//! owns two handles onto the same file: the primary one serves playback and
//! compositing, the secondary one serves thumbnail generation so that
//! thumbnail seeks never disturb the playback cursor.

use crate::gate::DecodeGuard;
use crate::handle::{MediaHandle, MediaOpener};
use crate::info::{AudioStreamInfo, MediaInfo, VideoStreamInfo};
use parking_lot::{Mutex, MutexGuard};
use splice_core::{Result, SourceId};
use tracing::info;

pub struct MediaSource {
    id: SourceId,
    info: MediaInfo,
    primary: Mutex<Box<dyn MediaHandle>>,
    secondary: Mutex<Box<dyn MediaHandle>>,
}

impl MediaSource {
    /// Open both handles of a source.
    pub fn open(id: SourceId, opener: &dyn MediaOpener) -> Result<Self> {
        let info = opener.info().clone();
        let primary = opener.open()?;
        let secondary = opener.open()?;
        info!(source = %id, name = %info.name, video = info.has_video(), audio = info.has_audio(), "Opened media source");
        Ok(Self {
            id,
            info,
            primary: Mutex::new(primary),
            secondary: Mutex::new(secondary),
        })
    }

    #[inline]
    pub fn id(&self) -> SourceId {
        self.id
    }

    #[inline]
    pub fn info(&self) -> &MediaInfo {
        &self.info
    }

    #[inline]
    pub fn video(&self) -> Option<&VideoStreamInfo> {
        self.info.video.as_ref()
    }

    #[inline]
    pub fn audio(&self) -> Option<&AudioStreamInfo> {
        self.info.audio.as_ref()
    }

    /// The playback handle. Requires the decode lock to be held.
    pub fn primary<'a>(&'a self, _gate: &'a DecodeGuard<'_>) -> MutexGuard<'a, Box<dyn MediaHandle>> {
        self.primary.lock()
    }

    /// The thumbnail handle. Requires the decode lock to be held.
    pub fn secondary<'a>(
        &'a self,
        _gate: &'a DecodeGuard<'_>,
    ) -> MutexGuard<'a, Box<dyn MediaHandle>> {
        self.secondary.lock()
    }
}

impl std::fmt::Debug for MediaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaSource")
            .field("id", &self.id)
            .field("name", &self.info.name)
            .finish()
    }
}
