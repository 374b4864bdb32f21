use std::fmt;

use ndarray::ArrayView3;

use crate::shared::rotation::Rotation;

/// Callback run once when a frame's owner lets go of it.
pub type ReleaseFn = Box<dyn FnOnce() + Send>;

/// A single captured frame: contiguous RGB bytes in row-major order plus the
/// rotation needed to display it upright.
///
/// A frame has exactly one owner at a time and is deliberately not `Clone`.
/// Its release handle runs exactly once, when the frame is dropped or passed
/// to [`Frame::release`], whichever path the owner takes.
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
    rotation: Rotation,
    release: Option<ReleaseFn>,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
            rotation: Rotation::Deg0,
            release: None,
        }
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Attaches the release handle. Replacing an existing handle runs the old
    /// one first so no handle is ever lost.
    pub fn with_release(mut self, release: impl FnOnce() + Send + 'static) -> Self {
        if let Some(previous) = self.release.replace(Box::new(release)) {
            previous();
        }
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Width and height as the frame appears once rotated upright.
    pub fn upright_dimensions(&self) -> (u32, u32) {
        self.rotation.upright_dimensions(self.width, self.height)
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(
            (
                self.height as usize,
                self.width as usize,
                self.channels as usize,
            ),
            &self.data,
        )
        .expect("Frame data length must match dimensions")
    }

    /// Gives the frame up explicitly. Equivalent to dropping it.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("channels", &self.channels)
            .field("index", &self.index)
            .field("rotation", &self.rotation)
            .field("has_release", &self.release.is_some())
            .finish()
    }
}
