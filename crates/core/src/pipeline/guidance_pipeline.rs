use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::capture::frame_slot::FrameSlot;
use crate::detection::infrastructure::face_detector_adapter::FaceDetectorAdapter;
use crate::guidance::domain::center_target::CenterTarget;
use crate::guidance::domain::centering_classifier::CenteringClassifier;
use crate::guidance::domain::guidance_decision::GuidanceDecision;
use crate::guidance::domain::guidance_sink::GuidanceSink;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::constants::DEFAULT_IDLE_POLL_MS;
use crate::shared::frame::Frame;

#[derive(Clone, Copy, Debug)]
pub struct PipelineConfig {
    /// Offsets and tolerance; re-targeted onto each frame's upright size.
    pub target: CenterTarget,
    /// How long the worker parks on an empty slot before rechecking for
    /// shutdown.
    pub idle_poll: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target: CenterTarget::default(),
            idle_poll: Duration::from_millis(DEFAULT_IDLE_POLL_MS),
        }
    }
}

/// Totals for one pipeline run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Frames claimed and analysed; each yielded exactly one decision.
    pub cycles: usize,
    pub centered: usize,
    pub directional: usize,
    pub no_face: usize,
    /// Cycles whose detection failed and were reported as no face.
    pub detection_failures: usize,
    /// Cycles whose frame size could not be targeted.
    pub invalid_frames: usize,
    /// Frames the slot released without analysis.
    pub dropped_frames: usize,
}

impl PipelineStats {
    fn record(&mut self, decision: &GuidanceDecision) {
        self.cycles += 1;
        match decision {
            GuidanceDecision::Centered => self.centered += 1,
            GuidanceDecision::Directional { .. } => self.directional += 1,
            GuidanceDecision::NoFaceDetected => self.no_face += 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CycleState {
    Idle,
    FrameClaimed,
    Detecting,
    Classifying,
    Published,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CycleState::Idle => "idle",
            CycleState::FrameClaimed => "frame-claimed",
            CycleState::Detecting => "detecting",
            CycleState::Classifying => "classifying",
            CycleState::Published => "published",
        })
    }
}

/// The analysis worker: claims the latest frame, detects faces, classifies
/// the first one and publishes a decision, one frame at a time.
///
/// Every claimed frame yields exactly one [`GuidanceDecision`] and is
/// released before the next claim. Decisions reach the sink in claim order.
pub struct GuidancePipeline {
    slot: Arc<FrameSlot>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<PipelineStats>>,
}

impl GuidancePipeline {
    /// Spawns the worker. The pipeline takes ownership of the adapter, sink
    /// and logger and shuts them down when it stops.
    pub fn start(
        slot: Arc<FrameSlot>,
        adapter: FaceDetectorAdapter,
        sink: Box<dyn GuidanceSink>,
        logger: Box<dyn PipelineLogger>,
        config: PipelineConfig,
    ) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let worker = Worker {
            slot: slot.clone(),
            stop: stop.clone(),
            adapter,
            sink,
            logger,
            classifier: CenteringClassifier::new(),
            config,
            stats: PipelineStats::default(),
        };

        let handle = std::thread::Builder::new()
            .name("guidance-pipeline".into())
            .spawn(move || worker.run())?;

        Ok(Self {
            slot,
            stop,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Closes the slot, lets the worker analyse whatever frame is still
    /// pending, and waits for it to exit.
    pub fn finish(mut self) -> PipelineStats {
        self.slot.close();
        self.join()
    }

    /// Stops after the in-flight cycle; a pending frame is released without
    /// analysis.
    pub fn shutdown(mut self) -> PipelineStats {
        self.stop_worker();
        let mut stats = self.join();
        self.slot.clear();
        stats.dropped_frames = self.slot.dropped_frames();
        stats
    }

    fn stop_worker(&self) {
        self.stop.store(true, Ordering::Release);
        self.slot.close();
    }

    fn join(&mut self) -> PipelineStats {
        match self.handle.take().map(JoinHandle::join) {
            Some(Ok(stats)) => stats,
            Some(Err(_)) => {
                log::error!("Guidance pipeline worker panicked");
                PipelineStats {
                    dropped_frames: self.slot.dropped_frames(),
                    ..PipelineStats::default()
                }
            }
            None => PipelineStats::default(),
        }
    }
}

impl Drop for GuidancePipeline {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop_worker();
            self.join();
            self.slot.clear();
        }
    }
}

struct Worker {
    slot: Arc<FrameSlot>,
    stop: Arc<AtomicBool>,
    adapter: FaceDetectorAdapter,
    sink: Box<dyn GuidanceSink>,
    logger: Box<dyn PipelineLogger>,
    classifier: CenteringClassifier,
    config: PipelineConfig,
    stats: PipelineStats,
}

impl Worker {
    fn run(mut self) -> PipelineStats {
        log::debug!("Guidance pipeline started");
        while !self.stop.load(Ordering::Acquire) {
            match self.slot.wait_for_frame(self.config.idle_poll) {
                Some(frame) => self.run_cycle(frame),
                None if self.slot.is_closed() && self.slot.is_empty() => break,
                None => {}
            }
        }

        self.adapter.shutdown();
        self.logger.summary();
        self.stats.dropped_frames = self.slot.dropped_frames();
        log::debug!("Guidance pipeline stopped: {:?}", self.stats);
        self.stats
    }

    fn run_cycle(&mut self, frame: Frame) {
        let index = frame.index();
        let (width, height) = frame.upright_dimensions();
        transition(index, CycleState::FrameClaimed);

        transition(index, CycleState::Detecting);
        let started = Instant::now();
        let (frame, detection) = match self.adapter.detect(frame).wait() {
            Ok(outcome) => (Some(outcome.frame), outcome.result),
            Err(e) => (None, Err(e)),
        };
        self.logger
            .timing("detect", started.elapsed().as_secs_f64() * 1000.0);

        transition(index, CycleState::Classifying);
        let started = Instant::now();
        let decision = match detection {
            Ok(faces) => {
                self.logger.metric("faces", faces.len() as f64);
                match self.config.target.for_frame(width, height) {
                    Ok(target) => self.classifier.classify(&faces, &target),
                    Err(e) => {
                        log::error!("Frame {index} cannot be targeted: {e}");
                        self.stats.invalid_frames += 1;
                        GuidanceDecision::NoFaceDetected
                    }
                }
            }
            Err(e) => {
                log::warn!("Frame {index}: {e}");
                self.stats.detection_failures += 1;
                GuidanceDecision::NoFaceDetected
            }
        };
        self.logger
            .timing("classify", started.elapsed().as_secs_f64() * 1000.0);

        self.sink.update(decision);
        self.logger.decision(index, &decision);
        self.stats.record(&decision);
        transition(index, CycleState::Published);
        log::debug!("Frame {index}: {decision:?}");

        if let Some(frame) = frame {
            frame.release();
        }
        transition(index, CycleState::Idle);
    }
}

fn transition(frame_index: usize, state: CycleState) {
    log::trace!("Frame {frame_index}: {state}");
}
