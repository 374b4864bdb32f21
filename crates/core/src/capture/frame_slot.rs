use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::shared::frame::Frame;

/// Single-slot, latest-wins hand-off between a frame producer and the
/// analysis worker.
///
/// Publishing over an unclaimed frame releases the older one immediately;
/// nothing is ever queued. Neither side waits on the other: `publish` never
/// blocks and `claim` returns `None` straight away when the slot is empty.
/// Superseded frames are released outside the lock.
pub struct FrameSlot {
    pending: Mutex<Option<Frame>>,
    available: Condvar,
    closed: AtomicBool,
    published: AtomicUsize,
    dropped: AtomicUsize,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(None),
            available: Condvar::new(),
            closed: AtomicBool::new(false),
            published: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
        }
    }

    /// Installs `frame` as the pending frame.
    ///
    /// Any unclaimed predecessor is released. Once the slot is closed the
    /// frame itself is released instead of being stored.
    pub fn publish(&self, frame: Frame) {
        self.published.fetch_add(1, Ordering::Relaxed);
        if self.closed.load(Ordering::Acquire) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            log::trace!("Slot closed; releasing frame {}", frame.index());
            return;
        }

        let superseded = self.lock().replace(frame);
        self.available.notify_one();

        if let Some(old) = superseded {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            log::trace!("Frame {} superseded before analysis", old.index());
            old.release();
        }
    }

    /// Takes the pending frame, if any, transferring ownership to the caller.
    pub fn claim(&self) -> Option<Frame> {
        self.lock().take()
    }

    /// Takes the pending frame, parking up to `timeout` for one to arrive.
    ///
    /// Returns early with `None` when the slot is closed and empty.
    pub fn wait_for_frame(&self, timeout: Duration) -> Option<Frame> {
        let mut pending = self.lock();
        if let Some(frame) = pending.take() {
            return Some(frame);
        }
        if self.is_closed() {
            return None;
        }
        let (mut pending, _) = self
            .available
            .wait_timeout_while(pending, timeout, |p| p.is_none() && !self.is_closed())
            .unwrap_or_else(PoisonError::into_inner);
        pending.take()
    }

    /// Stops accepting frames and wakes any waiting worker. A frame already
    /// pending can still be claimed.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        // Take the lock so a waiter between its check and its wait sees the flag.
        drop(self.lock());
        self.available.notify_all();
    }

    /// Releases the pending frame without handing it to anyone.
    pub fn clear(&self) {
        let discarded = self.lock().take();
        if let Some(frame) = discarded {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            frame.release();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_none()
    }

    /// Frames handed to `publish` so far.
    pub fn published_frames(&self) -> usize {
        self.published.load(Ordering::Relaxed)
    }

    /// Frames released without being claimed (superseded, rejected after
    /// close, or cleared).
    pub fn dropped_frames(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Frame>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for FrameSlot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    fn counted_frame(index: usize, releases: &Arc<AtomicUsize>) -> Frame {
        let releases = releases.clone();
        Frame::new(vec![0u8; 12], 2, 2, 3, index).with_release(move || {
            releases.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_claim_empty_returns_none_immediately() {
        let slot = FrameSlot::new();
        let start = Instant::now();
        assert!(slot.claim().is_none());
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_publish_then_claim_transfers_frame() {
        let slot = FrameSlot::new();
        let releases = Arc::new(AtomicUsize::new(0));
        slot.publish(counted_frame(7, &releases));

        let frame = slot.claim().unwrap();
        assert_eq!(frame.index(), 7);
        assert!(slot.claim().is_none());
        assert_eq!(releases.load(Ordering::SeqCst), 0);

        drop(frame);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_publish_over_pending_releases_older_exactly_once() {
        let slot = FrameSlot::new();
        let releases_a = Arc::new(AtomicUsize::new(0));
        let releases_b = Arc::new(AtomicUsize::new(0));

        slot.publish(counted_frame(1, &releases_a));
        slot.publish(counted_frame(2, &releases_b));

        assert_eq!(releases_a.load(Ordering::SeqCst), 1);
        assert_eq!(releases_b.load(Ordering::SeqCst), 0);

        let claimed = slot.claim().unwrap();
        assert_eq!(claimed.index(), 2);
        assert!(slot.claim().is_none());
        assert_eq!(releases_a.load(Ordering::SeqCst), 1);
        assert_eq!(slot.dropped_frames(), 1);
        assert_eq!(slot.published_frames(), 2);
    }

    #[test]
    fn test_wait_for_frame_times_out_when_empty() {
        let slot = FrameSlot::new();
        let start = Instant::now();
        assert!(slot.wait_for_frame(Duration::from_millis(20)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_wait_for_frame_wakes_on_publish_from_other_thread() {
        let slot = Arc::new(FrameSlot::new());
        let releases = Arc::new(AtomicUsize::new(0));

        let producer_slot = slot.clone();
        let producer_releases = releases.clone();
        let producer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            producer_slot.publish(counted_frame(3, &producer_releases));
        });

        let frame = slot.wait_for_frame(Duration::from_secs(5)).unwrap();
        assert_eq!(frame.index(), 3);
        producer.join().unwrap();
    }

    #[test]
    fn test_close_wakes_waiter() {
        let slot = Arc::new(FrameSlot::new());
        let closer = slot.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            closer.close();
        });

        let start = Instant::now();
        assert!(slot.wait_for_frame(Duration::from_secs(5)).is_none());
        assert!(start.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }

    #[test]
    fn test_pending_frame_still_claimable_after_close() {
        let slot = FrameSlot::new();
        let releases = Arc::new(AtomicUsize::new(0));
        slot.publish(counted_frame(1, &releases));
        slot.close();

        let frame = slot.wait_for_frame(Duration::from_millis(10)).unwrap();
        assert_eq!(frame.index(), 1);
        assert!(slot.wait_for_frame(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn test_publish_after_close_releases_immediately() {
        let slot = FrameSlot::new();
        let releases = Arc::new(AtomicUsize::new(0));
        slot.close();
        slot.publish(counted_frame(1, &releases));

        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert!(slot.is_empty());
        assert_eq!(slot.dropped_frames(), 1);
    }

    #[test]
    fn test_clear_releases_pending() {
        let slot = FrameSlot::new();
        let releases = Arc::new(AtomicUsize::new(0));
        slot.publish(counted_frame(1, &releases));
        slot.clear();

        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert!(slot.claim().is_none());
    }

    #[test]
    fn test_dropping_slot_releases_pending() {
        let releases = Arc::new(AtomicUsize::new(0));
        {
            let slot = FrameSlot::new();
            slot.publish(counted_frame(1, &releases));
        }
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_publish_and_claim_release_every_frame_once() {
        let slot = Arc::new(FrameSlot::new());
        let releases = Arc::new(AtomicUsize::new(0));
        let total = 500;

        let producer_slot = slot.clone();
        let producer_releases = releases.clone();
        let producer = std::thread::spawn(move || {
            for i in 0..total {
                producer_slot.publish(counted_frame(i, &producer_releases));
            }
            producer_slot.close();
        });

        let mut claimed = 0;
        let mut last_index = None;
        while let Some(frame) = slot.wait_for_frame(Duration::from_secs(5)) {
            if let Some(prev) = last_index {
                assert!(frame.index() > prev, "frames must arrive in order");
            }
            last_index = Some(frame.index());
            claimed += 1;
        }
        producer.join().unwrap();

        assert_eq!(claimed + slot.dropped_frames(), total);
        assert_eq!(releases.load(Ordering::SeqCst), total);
    }
}
