//! Thumbnail cache and its background generator.
//!
//! Lookups never block on decoding: a miss queues a generation request and
//! returns `None`. Worker threads pop requests, decode on the source's
//! secondary handle (so playback's cursor is left alone), shrink the frame to
//! thumbnail size and publish it, optionally sending a [`ThumbnailReady`]
//! event. Requests for a key that is already queued or being generated are
//! coalesced.

use crate::lru::{CacheStats, LruList};
use crate::video::{read_forward_to, FrameKey};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use splice_core::{CacheConfig, Result, SharedFrame, SourceId, SpliceError};
use splice_media::{DecodeGate, MediaSource};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Sent when a requested thumbnail has been generated.
#[derive(Debug, Clone)]
pub struct ThumbnailReady {
    pub source: SourceId,
    pub index: u64,
    pub thumbnail: SharedFrame,
}

struct Request {
    source: Arc<MediaSource>,
    notify: bool,
}

#[derive(Default)]
struct Queue {
    order: VecDeque<FrameKey>,
    pending: HashMap<FrameKey, Request>,
    in_flight: HashSet<FrameKey>,
    shutdown: bool,
}

struct Shared {
    thumbs: Mutex<LruList<FrameKey, SharedFrame>>,
    queue: Mutex<Queue>,
    wake: Condvar,
    gate: DecodeGate,
    config: CacheConfig,
    ready_tx: Sender<ThumbnailReady>,
}

pub struct ThumbnailCache {
    shared: Arc<Shared>,
    ready_rx: Receiver<ThumbnailReady>,
    workers: Vec<JoinHandle<()>>,
}

impl ThumbnailCache {
    /// Create the cache and start `config.thumbnail_workers` generator threads.
    pub fn new(budget_bytes: usize, gate: DecodeGate, config: CacheConfig) -> Result<Self> {
        let (ready_tx, ready_rx) = unbounded();
        let worker_count = config.thumbnail_workers.max(1);
        info!(
            budget_mb = budget_bytes / (1024 * 1024),
            workers = worker_count,
            width = config.thumbnail_width,
            height = config.thumbnail_height,
            "Thumbnail cache created"
        );
        let shared = Arc::new(Shared {
            thumbs: Mutex::new(LruList::new(budget_bytes, config.promotion_threshold)),
            queue: Mutex::new(Queue::default()),
            wake: Condvar::new(),
            gate,
            config,
            ready_tx,
        });

        let mut cache = Self {
            shared,
            ready_rx,
            workers: Vec::with_capacity(worker_count),
        };
        for n in 0..worker_count {
            let shared = Arc::clone(&cache.shared);
            let handle = std::thread::Builder::new()
                .name(format!("splice-thumb-{n}"))
                .spawn(move || worker_loop(shared))
                .map_err(|e| {
                    SpliceError::Internal(format!("Failed to spawn thumbnail worker: {e}"))
                })?;
            cache.workers.push(handle);
        }
        Ok(cache)
    }

    /// The cached thumbnail, or `None` after queueing its generation.
    ///
    /// With `notify` set, a [`ThumbnailReady`] is sent on
    /// [`ready_events`](Self::ready_events) once it exists.
    pub fn get_or_generate_thumbnail_async(
        &self,
        source: &Arc<MediaSource>,
        index: i64,
        notify: bool,
    ) -> Option<SharedFrame> {
        let video = source.video()?;
        if video.frame_count == 0 {
            return None;
        }
        let key = FrameKey::new(source.id(), index.clamp(0, video.frame_count as i64 - 1) as u64);

        if let Some(thumb) = self.shared.thumbs.lock().get(&key) {
            return Some(Arc::clone(thumb));
        }

        let mut queue = self.shared.queue.lock();
        if queue.in_flight.contains(&key) && !notify {
            return None;
        }
        if let Some(pending) = queue.pending.get_mut(&key) {
            pending.notify |= notify;
            trace!(source = %key.source, frame = key.index, "thumbnail request coalesced");
            return None;
        }
        let capacity = self.shared.config.max_pending_thumbnails.max(1);
        // Full queue: the newest request wins over the oldest queued one.
        while queue.pending.len() >= capacity {
            let Some(oldest) = queue.order.pop_front() else {
                break;
            };
            let Some(dropped) = queue.pending.remove(&oldest) else {
                continue;
            };
            if dropped.notify {
                warn!(
                    source = %oldest.source,
                    frame = oldest.index,
                    "thumbnail queue full, dropped a request awaiting notification"
                );
            } else {
                debug!(source = %oldest.source, frame = oldest.index, "thumbnail queue full, oldest request dropped");
            }
        }
        queue.order.push_back(key);
        queue.pending.insert(
            key,
            Request {
                source: Arc::clone(source),
                notify,
            },
        );
        drop(queue);
        self.shared.wake.notify_one();
        None
    }

    /// Receiver for ready notifications. Events accumulate until received.
    pub fn ready_events(&self) -> Receiver<ThumbnailReady> {
        self.ready_rx.clone()
    }

    /// Drop every queued request that has not started. Returns how many were dropped.
    pub fn clear_pending(&self) -> usize {
        let mut queue = self.shared.queue.lock();
        let dropped = queue.pending.len();
        queue.pending.clear();
        queue.order.clear();
        if dropped > 0 {
            debug!(dropped, "Cleared pending thumbnail requests");
        }
        dropped
    }

    /// Requests queued and not yet started.
    pub fn pending_count(&self) -> usize {
        self.shared.queue.lock().pending.len()
    }

    /// Requests queued or being generated right now.
    pub fn outstanding(&self) -> usize {
        let queue = self.shared.queue.lock();
        queue.pending.len() + queue.in_flight.len()
    }

    pub fn cached(&self, source: SourceId, index: u64) -> Option<SharedFrame> {
        self.shared.thumbs.lock().peek(&FrameKey::new(source, index)).cloned()
    }

    /// Drop cached thumbnails and queued requests of `source`.
    pub fn remove_source(&self, source: SourceId) -> usize {
        {
            let mut queue = self.shared.queue.lock();
            queue.pending.retain(|k, _| k.source != source);
            queue.order.retain(|k| k.source != source);
        }
        self.shared.thumbs.lock().retain(|k| k.source != source)
    }

    pub fn stats(&self) -> CacheStats {
        self.shared.thumbs.lock().stats()
    }
}

impl Drop for ThumbnailCache {
    fn drop(&mut self) {
        {
            let mut queue = self.shared.queue.lock();
            queue.shutdown = true;
            queue.pending.clear();
            queue.order.clear();
        }
        self.shared.wake.notify_all();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("Thumbnail worker panicked");
            }
        }
    }
}

fn worker_loop(shared: Arc<Shared>) {
    loop {
        let (key, request) = {
            let mut queue = shared.queue.lock();
            loop {
                if queue.shutdown {
                    return;
                }
                if let Some(key) = queue.order.pop_front() {
                    if let Some(request) = queue.pending.remove(&key) {
                        queue.in_flight.insert(key);
                        break (key, request);
                    }
                    continue;
                }
                shared.wake.wait(&mut queue);
            }
        };

        let result = shared.generate(key, &request.source);
        shared.queue.lock().in_flight.remove(&key);

        match result {
            Ok(thumbnail) => {
                if request.notify {
                    let _ = shared.ready_tx.send(ThumbnailReady {
                        source: key.source,
                        index: key.index,
                        thumbnail,
                    });
                }
            }
            Err(e) => {
                warn!(source = %key.source, frame = key.index, error = %e, "Thumbnail generation failed");
            }
        }
    }
}

impl Shared {
    fn generate(&self, key: FrameKey, source: &MediaSource) -> Result<SharedFrame> {
        if let Some(thumb) = self.thumbs.lock().peek(&key) {
            return Ok(Arc::clone(thumb));
        }

        let frame = {
            let guard = self.gate.lock();
            let mut handle = source.secondary(&guard);
            read_forward_to(
                &mut **handle,
                key.index,
                self.config.sequential_read_window,
                self.config.decode_attempts,
                |_, _| {},
            )?
        };

        let thumb: SharedFrame = Arc::new(
            frame.resized(self.config.thumbnail_width, self.config.thumbnail_height),
        );
        let size = thumb.byte_size();
        self.thumbs.lock().insert(key, Arc::clone(&thumb), size);
        trace!(source = %key.source, frame = key.index, "thumbnail generated");
        Ok(thumb)
    }
}
