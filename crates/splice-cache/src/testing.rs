//! Media whose first decode pauses until the test lets it continue.

use crossbeam_channel::{unbounded, Receiver, Sender};
use splice_core::{FrameBuffer, Result};
use splice_media::{MediaHandle, MediaInfo, MediaOpener, SeekMode, SyntheticMedia};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub(crate) struct PausingMedia {
    inner: SyntheticMedia,
    paused: Arc<AtomicBool>,
    started: Sender<()>,
    resume: Receiver<()>,
}

impl PausingMedia {
    /// The media, a receiver signalled when the first read begins and a
    /// sender that lets that read continue.
    pub(crate) fn new(inner: SyntheticMedia) -> (Self, Receiver<()>, Sender<()>) {
        let (started, started_rx) = unbounded();
        let (resume_tx, resume) = unbounded();
        let media = Self {
            inner,
            paused: Arc::new(AtomicBool::new(false)),
            started,
            resume,
        };
        (media, started_rx, resume_tx)
    }
}

impl MediaOpener for PausingMedia {
    fn info(&self) -> &MediaInfo {
        MediaOpener::info(&self.inner)
    }

    fn open(&self) -> Result<Box<dyn MediaHandle>> {
        Ok(Box::new(PausingHandle {
            inner: self.inner.open()?,
            paused: Arc::clone(&self.paused),
            started: self.started.clone(),
            resume: self.resume.clone(),
        }))
    }
}

struct PausingHandle {
    inner: Box<dyn MediaHandle>,
    paused: Arc<AtomicBool>,
    started: Sender<()>,
    resume: Receiver<()>,
}

impl PausingHandle {
    fn pause_once(&self) {
        if !self.paused.swap(true, Ordering::SeqCst) {
            let _ = self.started.send(());
            let _ = self.resume.recv();
        }
    }
}

impl MediaHandle for PausingHandle {
    fn seek_video(&mut self, frame: u64, mode: SeekMode) -> Result<u64> {
        self.inner.seek_video(frame, mode)
    }

    fn read_video(&mut self, out: &mut FrameBuffer) -> Result<()> {
        self.pause_once();
        self.inner.read_video(out)
    }

    fn video_position(&self) -> u64 {
        self.inner.video_position()
    }

    fn seek_audio(&mut self, sample: u64, mode: SeekMode) -> Result<u64> {
        self.inner.seek_audio(sample, mode)
    }

    fn read_audio(&mut self, out: &mut [u8], wanted: usize) -> Result<usize> {
        self.pause_once();
        self.inner.read_audio(out, wanted)
    }

    fn audio_position(&self) -> u64 {
        self.inner.audio_position()
    }
}
