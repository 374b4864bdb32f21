pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

/// Directory name used under the platform config and cache roots.
pub const APP_DIR_NAME: &str = "FaceGuide";

/// Analysis stream resolution, independent of any preview resolution.
pub const DEFAULT_TARGET_WIDTH: u32 = 1280;
pub const DEFAULT_TARGET_HEIGHT: u32 = 720;

/// Target center shift relative to the frame center, in pixels.
pub const DEFAULT_OFFSET_X: i32 = -120;
pub const DEFAULT_OFFSET_Y: i32 = 30;

/// Fraction of each frame dimension accepted as "centered".
pub const DEFAULT_TOLERANCE: f64 = 0.1;

/// How long the analysis worker parks on an empty slot before rechecking
/// for shutdown.
pub const DEFAULT_IDLE_POLL_MS: u64 = 50;
