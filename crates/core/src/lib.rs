//! Face centering guidance for live video.
//!
//! Frames flow `source → FrameSlot → GuidancePipeline → FaceDetectorAdapter
//! → CenteringClassifier → GuidanceSink`, with at most one frame in flight.

pub mod capture {
    pub mod domain {
        pub mod frame_source;
    }
    pub mod frame_pump;
    pub mod frame_slot;
    pub mod infrastructure;
}

pub mod detection {
    pub mod domain {
        pub mod face_detector;
    }
    pub mod infrastructure;
}

pub mod guidance {
    pub mod domain {
        pub mod center_target;
        pub mod centering_classifier;
        pub mod guidance_decision;
        pub mod guidance_error;
        pub mod guidance_sink;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod guidance_pipeline;
    pub mod pipeline_logger;
}

pub mod shared {
    pub mod bounding_box;
    pub mod constants;
    pub mod frame;
    pub mod rotation;
    pub mod video_metadata;
}
