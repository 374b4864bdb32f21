use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Produces frames for analysis: a camera, a capture device, a video file.
///
/// Implementations own device and codec details; the pipeline only sees
/// [`Frame`]s and [`VideoMetadata`].
pub trait FrameSource: Send {
    /// Opens the source and returns the properties of the analysis stream.
    fn open(&mut self) -> Result<VideoMetadata, Box<dyn std::error::Error>>;

    /// Returns an iterator over frames in capture order.
    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_>;

    /// Releases any device or decoder resources.
    fn close(&mut self);
}
