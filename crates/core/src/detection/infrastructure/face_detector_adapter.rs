use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::detection::domain::face_detector::{DetectionError, FaceDetector};
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Runs a [`FaceDetector`] on a dedicated executor thread.
///
/// `detect` hands the frame over and returns immediately with a
/// [`PendingDetection`]. Requests are served one at a time in submission
/// order, and each produces exactly one [`DetectionOutcome`] that carries the
/// frame back to the caller.
pub struct FaceDetectorAdapter {
    requests: Option<Sender<DetectionRequest>>,
    handle: Option<JoinHandle<()>>,
}

struct DetectionRequest {
    frame: Frame,
    reply: Sender<DetectionOutcome>,
}

/// Result of one detection request, with the frame it was run on.
#[derive(Debug)]
pub struct DetectionOutcome {
    pub frame: Frame,
    pub result: Result<Vec<BoundingBox>, DetectionError>,
}

/// Promise for a single [`DetectionOutcome`].
///
/// If the executor vanishes without replying, the frame has already been
/// released on its side and the promise resolves to an error.
pub struct PendingDetection {
    reply: Receiver<DetectionOutcome>,
}

impl PendingDetection {
    fn resolved(outcome: DetectionOutcome) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(1);
        // Capacity 1 and a live receiver: cannot fail.
        let _ = tx.send(outcome);
        Self { reply: rx }
    }

    /// Parks until the outcome arrives.
    pub fn wait(self) -> Result<DetectionOutcome, DetectionError> {
        self.reply.recv().map_err(|_| executor_lost())
    }

    /// Parks up to `timeout`; `None` if the outcome is not ready yet.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<DetectionOutcome, DetectionError>> {
        match self.reply.recv_timeout(timeout) {
            Ok(outcome) => Some(Ok(outcome)),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(executor_lost())),
        }
    }

    /// Non-blocking poll; `None` if the outcome is not ready yet.
    pub fn try_outcome(&self) -> Option<Result<DetectionOutcome, DetectionError>> {
        match self.reply.try_recv() {
            Ok(outcome) => Some(Ok(outcome)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(executor_lost())),
        }
    }
}

fn executor_lost() -> DetectionError {
    DetectionError::new("detector executor stopped before replying")
}

impl FaceDetectorAdapter {
    /// Moves `detector` onto a new executor thread.
    pub fn spawn(mut detector: Box<dyn FaceDetector>) -> std::io::Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded::<DetectionRequest>();

        let handle = std::thread::Builder::new()
            .name("face-detector".into())
            .spawn(move || {
                for DetectionRequest { frame, reply } in rx {
                    let result = run_guarded(detector.as_mut(), &frame);
                    if let Err(returned) = reply.send(DetectionOutcome { frame, result }) {
                        log::debug!(
                            "Detection for frame {} abandoned; releasing here",
                            returned.0.frame.index()
                        );
                    }
                }
                log::debug!("Detector executor stopped");
            })?;

        Ok(Self {
            requests: Some(tx),
            handle: Some(handle),
        })
    }

    /// Submits `frame` for detection without blocking.
    ///
    /// After [`shutdown`](Self::shutdown) the promise resolves at once with a
    /// [`DetectionError`] and the frame handed back.
    pub fn detect(&self, frame: Frame) -> PendingDetection {
        let Some(requests) = self.requests.as_ref() else {
            return PendingDetection::resolved(shut_down_outcome(frame));
        };

        let (reply, rx) = crossbeam_channel::bounded(1);
        match requests.send(DetectionRequest { frame, reply }) {
            Ok(()) => PendingDetection { reply: rx },
            Err(returned) => PendingDetection::resolved(shut_down_outcome(returned.0.frame)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.requests.is_some()
    }

    /// Stops accepting requests, lets queued ones finish, and joins the
    /// executor. Idempotent.
    pub fn shutdown(&mut self) {
        self.requests = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Detector executor thread panicked");
            }
        }
    }
}

impl Drop for FaceDetectorAdapter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn shut_down_outcome(frame: Frame) -> DetectionOutcome {
    DetectionOutcome {
        frame,
        result: Err(DetectionError::new("detector has been shut down")),
    }
}

/// Runs the detector, turning a panic into a [`DetectionError`] so the
/// executor keeps serving.
fn run_guarded(
    detector: &mut dyn FaceDetector,
    frame: &Frame,
) -> Result<Vec<BoundingBox>, DetectionError> {
    catch_unwind(AssertUnwindSafe(|| detector.detect(frame))).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(DetectionError::new(format!("detector panicked: {message}")))
    })
}
