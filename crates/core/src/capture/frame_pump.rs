use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::capture::domain::frame_source::FrameSource;
use crate::capture::frame_slot::FrameSlot;

/// Moves frames from a [`FrameSource`] into a [`FrameSlot`] on its own
/// thread, at the source's cadence.
///
/// Each frame is tagged with a release handle that bumps a shared counter,
/// so callers can check that every produced frame was let go exactly once.
/// When the source is exhausted (or the pump is cancelled) the slot is
/// closed, which lets the analysis worker drain and exit.
pub struct FramePump {
    handle: Option<JoinHandle<(usize, usize)>>,
    cancelled: Arc<AtomicBool>,
    released: Arc<AtomicUsize>,
}

/// Totals reported by a finished pump.
#[derive(Debug, Clone)]
pub struct PumpStats {
    pub produced: usize,
    pub source_errors: usize,
    released: Arc<AtomicUsize>,
}

impl PumpStats {
    /// Frames released so far. Frames still held downstream are released
    /// later, so read this after the pipeline has stopped.
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl FramePump {
    /// Starts pumping from an already opened `source`.
    ///
    /// With `pace` set, frames are published no faster than one per interval,
    /// emulating a live camera when reading from a file.
    pub fn start(
        mut source: Box<dyn FrameSource>,
        slot: Arc<FrameSlot>,
        pace: Option<Duration>,
    ) -> std::io::Result<Self> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let released = Arc::new(AtomicUsize::new(0));

        let thread_cancelled = cancelled.clone();
        let thread_released = released.clone();
        let handle = std::thread::Builder::new()
            .name("frame-pump".into())
            .spawn(move || {
                let mut produced = 0;
                let mut errors = 0;
                let started = Instant::now();

                for frame_result in source.frames() {
                    if thread_cancelled.load(Ordering::Relaxed) {
                        break;
                    }
                    let frame = match frame_result {
                        Ok(frame) => frame,
                        Err(e) => {
                            log::warn!("Frame source error: {e}");
                            errors += 1;
                            continue;
                        }
                    };

                    if let Some(interval) = pace {
                        let due = started + interval.mul_f64(produced as f64);
                        let now = Instant::now();
                        if due > now {
                            std::thread::sleep(due - now);
                        }
                    }

                    let counter = thread_released.clone();
                    slot.publish(frame.with_release(move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }));
                    produced += 1;
                }

                source.close();
                slot.close();
                log::debug!("Frame pump stopped after {produced} frames ({errors} errors)");
                (produced, errors)
            })?;

        Ok(Self {
            handle: Some(handle),
            cancelled,
            released,
        })
    }

    /// Asks the pump to stop before its next frame.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    pub fn released_frames(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Waits for the pump thread and returns its totals.
    pub fn join(mut self) -> PumpStats {
        let (produced, source_errors) = match self.handle.take().map(JoinHandle::join) {
            Some(Ok(totals)) => totals,
            Some(Err(_)) => {
                log::error!("Frame pump thread panicked");
                (0, 0)
            }
            None => (0, 0),
        };
        PumpStats {
            produced,
            source_errors,
            released: self.released.clone(),
        }
    }
}

impl Drop for FramePump {
    fn drop(&mut self) {
        self.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::frame::Frame;
    use crate::shared::video_metadata::VideoMetadata;

    struct StubSource {
        count: usize,
        fail_at: Option<usize>,
        closed: Arc<AtomicBool>,
    }

    impl StubSource {
        fn new(count: usize) -> Self {
            Self {
                count,
                fail_at: None,
                closed: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl FrameSource for StubSource {
        fn open(&mut self) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
            Ok(VideoMetadata {
                width: 4,
                height: 4,
                fps: 30.0,
                rotation: Default::default(),
                codec: "stub".into(),
                source_path: None,
            })
        }

        fn frames(
            &mut self,
        ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
            let fail_at = self.fail_at;
            Box::new((0..self.count).map(move |i| {
                if Some(i) == fail_at {
                    Err("decode failed".into())
                } else {
                    Ok(Frame::new(vec![0u8; 48], 4, 4, 3, i))
                }
            }))
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_every_produced_frame_is_released_once() {
        let slot = Arc::new(FrameSlot::new());
        let pump = FramePump::start(Box::new(StubSource::new(50)), slot.clone(), None).unwrap();
        let stats = pump.join();

        assert_eq!(stats.produced, 50);
        assert!(slot.is_closed());
        // Only the last frame can still be pending.
        assert_eq!(stats.released(), 49);
        slot.clear();
        assert_eq!(stats.released(), 50);
    }

    #[test]
    fn test_source_closed_and_slot_closed_at_end() {
        let slot = Arc::new(FrameSlot::new());
        let source = StubSource::new(3);
        let closed = source.closed.clone();

        FramePump::start(Box::new(source), slot.clone(), None)
            .unwrap()
            .join();

        assert!(closed.load(Ordering::SeqCst));
        assert!(slot.is_closed());
        assert_eq!(slot.claim().unwrap().index(), 2);
    }

    #[test]
    fn test_source_errors_are_counted_and_skipped() {
        let slot = Arc::new(FrameSlot::new());
        let mut source = StubSource::new(5);
        source.fail_at = Some(2);

        let stats = FramePump::start(Box::new(source), slot, None)
            .unwrap()
            .join();
        assert_eq!(stats.produced, 4);
        assert_eq!(stats.source_errors, 1);
    }

    #[test]
    fn test_paced_pump_respects_interval() {
        let slot = Arc::new(FrameSlot::new());
        let start = Instant::now();
        let stats = FramePump::start(
            Box::new(StubSource::new(5)),
            slot,
            Some(Duration::from_millis(10)),
        )
        .unwrap()
        .join();

        assert_eq!(stats.produced, 5);
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_cancel_stops_early() {
        let slot = Arc::new(FrameSlot::new());
        let pump = FramePump::start(
            Box::new(StubSource::new(10_000)),
            slot.clone(),
            Some(Duration::from_millis(5)),
        )
        .unwrap();
        std::thread::sleep(Duration::from_millis(30));
        pump.cancel();
        let stats = pump.join();

        assert!(stats.produced < 10_000);
        assert!(slot.is_closed());
    }
}
