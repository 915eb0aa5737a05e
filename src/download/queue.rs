//! Single-flight download queue.
//!
//! FIFO channel plus a set of ids that are queued or in flight. The
//! check-and-insert on that set happens under one lock, so concurrent
//! enqueues of the same id produce exactly one queue item. An id leaves the
//! set only after the worker finished its attempt.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::domain::VideoInfo;

/// Result of enqueueing an item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueResult {
    /// Successfully queued (new item)
    Queued(String),

    /// Same id already queued or downloading
    AlreadyQueued(String),

    /// No video id, nothing to cache under
    Unresolvable,

    /// Worker has stopped
    Closed(String),
}

impl EnqueueResult {
    /// Check if this was a new enqueue
    pub fn is_new(&self) -> bool {
        matches!(self, Self::Queued(_))
    }
}

type PendingIds = Arc<Mutex<HashSet<String>>>;

/// Producer side, cloned into every request handler
#[derive(Debug, Clone)]
pub struct DownloadQueue {
    tx: mpsc::UnboundedSender<VideoInfo>,
    pending: PendingIds,
}

/// Consumer side, owned by the single worker
#[derive(Debug)]
pub struct QueueReceiver {
    rx: mpsc::UnboundedReceiver<VideoInfo>,
    pending: PendingIds,
}

/// Create a connected queue pair
pub fn channel() -> (DownloadQueue, QueueReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let pending = PendingIds::default();

    (
        DownloadQueue {
            tx,
            pending: pending.clone(),
        },
        QueueReceiver { rx, pending },
    )
}

impl DownloadQueue {
    /// Queue a download unless the same id is already queued or in flight
    pub fn enqueue(&self, info: VideoInfo) -> EnqueueResult {
        if !info.has_id() {
            return EnqueueResult::Unresolvable;
        }
        let id = info.video_id.clone();

        let mut pending = self.pending.lock();
        if !pending.insert(id.clone()) {
            tracing::info!("{} is already in the download queue", id);
            return EnqueueResult::AlreadyQueued(id);
        }

        if self.tx.send(info).is_err() {
            pending.remove(&id);
            tracing::warn!("Download worker is not running, dropping {}", id);
            return EnqueueResult::Closed(id);
        }

        tracing::debug!("Queued {} ({} pending)", id, pending.len());
        EnqueueResult::Queued(id)
    }

    /// Whether an id is queued or being downloaded
    pub fn is_pending(&self, video_id: &str) -> bool {
        self.pending.lock().contains(video_id)
    }

    /// Number of queued or in-flight items
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl QueueReceiver {
    /// Wait for the next item; `None` once every producer is gone
    pub async fn recv(&mut self) -> Option<VideoInfo> {
        self.rx.recv().await
    }

    /// Take the next item without waiting
    pub fn try_recv(&mut self) -> Option<VideoInfo> {
        self.rx.try_recv().ok()
    }

    /// Release an id after its download attempt finished
    pub fn complete(&self, video_id: &str) {
        self.pending.lock().remove(video_id);
    }
}
