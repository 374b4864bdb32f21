pub mod execution_provider;
pub mod face_detector_adapter;
pub mod model_resolver;
pub mod onnx_yolo_detector;
