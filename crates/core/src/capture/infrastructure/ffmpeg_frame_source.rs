use std::path::PathBuf;

use crate::capture::domain::frame_source::FrameSource;
use crate::shared::frame::Frame;
use crate::shared::rotation::Rotation;
use crate::shared::video_metadata::VideoMetadata;

/// Reads frames from a video file or capture device through ffmpeg-next.
///
/// Every decoded frame is converted to RGB24 and scaled to the analysis
/// resolution, which is independent of whatever the device delivers for
/// preview. The stream's rotation is stamped on each frame.
pub struct FfmpegFrameSource {
    input: PathBuf,
    target_size: Option<(u32, u32)>,
    input_ctx: Option<ffmpeg_next::format::context::Input>,
    video_stream_index: usize,
    metadata: Option<VideoMetadata>,
}

// Safety: FfmpegFrameSource is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegFrameSource {}

impl FfmpegFrameSource {
    /// `input` is a file path or a device node such as `/dev/video0`.
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            target_size: None,
            input_ctx: None,
            video_stream_index: 0,
            metadata: None,
        }
    }

    /// Scales frames to `width` × `height` instead of the native size.
    pub fn with_target_size(mut self, width: u32, height: u32) -> Self {
        self.target_size = Some((width, height));
        self
    }

    fn build_decoder(
        &self,
        ictx: &ffmpeg_next::format::context::Input,
    ) -> Result<
        (
            ffmpeg_next::decoder::Video,
            ffmpeg_next::software::scaling::Context,
            u32,
            u32,
        ),
        Box<dyn std::error::Error>,
    > {
        let stream = ictx
            .stream(self.video_stream_index)
            .ok_or("Video stream disappeared")?;
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let (width, height) = self
            .target_size
            .unwrap_or((decoder.width(), decoder.height()));

        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        Ok((decoder, scaler, width, height))
    }
}

impl FrameSource for FfmpegFrameSource {
    fn open(&mut self) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        ffmpeg_next::device::register_all();

        let ictx = ffmpeg_next::format::input(&self.input)?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;

        let video_stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let (width, height) = self
            .target_size
            .unwrap_or((decoder.width(), decoder.height()));

        let metadata = VideoMetadata {
            width,
            height,
            fps,
            rotation: extract_rotation(&stream),
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source_path: Some(self.input.clone()),
        };

        log::info!(
            "Opened {} ({}x{} native, analysing at {width}x{height}, {fps:.1} fps, rotation {})",
            self.input.display(),
            decoder.width(),
            decoder.height(),
            metadata.rotation
        );

        self.video_stream_index = video_stream_index;
        self.metadata = Some(metadata.clone());
        self.input_ctx = Some(ictx);

        Ok(metadata)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        let Some(ictx) = self.input_ctx.take() else {
            return Box::new(std::iter::once(Err("FfmpegFrameSource: not opened".into())));
        };
        let rotation = self
            .metadata
            .as_ref()
            .map(|m| m.rotation)
            .unwrap_or_default();

        let (decoder, scaler, width, height) = match self.build_decoder(&ictx) {
            Ok(parts) => parts,
            Err(e) => {
                self.input_ctx = Some(ictx);
                return Box::new(std::iter::once(Err(e)));
            }
        };

        let ictx = self.input_ctx.insert(ictx);

        Box::new(FfmpegFrameIter {
            ictx,
            decoder,
            scaler,
            width,
            height,
            rotation,
            video_stream_index: self.video_stream_index,
            frame_index: 0,
            flushing: false,
            done: false,
        })
    }

    fn close(&mut self) {
        self.input_ctx = None;
        self.metadata = None;
    }
}

/// Decodes lazily, one frame per `next`, so a live device is never buffered.
struct FfmpegFrameIter<'a> {
    ictx: &'a mut ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    rotation: Rotation,
    video_stream_index: usize,
    frame_index: usize,
    flushing: bool,
    done: bool,
}

impl FfmpegFrameIter<'_> {
    fn try_receive(&mut self) -> Option<Result<Frame, Box<dyn std::error::Error>>> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return None;
        }

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        if let Err(e) = self.scaler.run(&decoded, &mut rgb_frame) {
            return Some(Err(Box::new(e)));
        }

        let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
        let frame = Frame::new(pixels, self.width, self.height, 3, self.frame_index)
            .with_rotation(self.rotation);
        self.frame_index += 1;
        Some(Ok(frame))
    }
}

impl Iterator for FfmpegFrameIter<'_> {
    type Item = Result<Frame, Box<dyn std::error::Error>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if let Some(result) = self.try_receive() {
            return Some(result);
        }

        if self.flushing {
            self.done = true;
            return None;
        }

        loop {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                let _ = self.decoder.send_eof();
                self.flushing = true;
                if let Some(result) = self.try_receive() {
                    return Some(result);
                }
                self.done = true;
                return None;
            };

            if stream.index() != self.video_stream_index {
                continue;
            }

            if self.decoder.send_packet(&packet).is_err() {
                continue;
            }

            if let Some(result) = self.try_receive() {
                return Some(result);
            }
        }
    }
}

/// Reads the stream's display rotation from DisplayMatrix side data, falling
/// back to the `rotate` metadata tag.
fn extract_rotation(stream: &ffmpeg_next::format::stream::Stream) -> Rotation {
    for side_data in stream.side_data() {
        if side_data.kind() == ffmpeg_next::codec::packet::side_data::Type::DisplayMatrix {
            if let Some(angle) = parse_display_matrix(side_data.data()) {
                return Rotation::from_degrees(angle);
            }
        }
    }

    stream
        .metadata()
        .get("rotate")
        .and_then(|s| s.parse::<i32>().ok())
        .map(Rotation::from_degrees)
        .unwrap_or_default()
}

/// Rotation angle in degrees from a 3x3 display matrix of 16.16 fixed-point
/// little-endian i32 values.
///
/// The matrix describes the transform needed to display the frame, so the
/// angle of its first row is negated.
fn parse_display_matrix(data: &[u8]) -> Option<i32> {
    if data.len() < 36 {
        return None;
    }

    let m00 = i32::from_le_bytes(data[0..4].try_into().ok()?) as f64 / 65536.0;
    let m10 = i32::from_le_bytes(data[4..8].try_into().ok()?) as f64 / 65536.0;

    Some(-m10.atan2(m00).to_degrees().round() as i32)
}

/// Copies an ffmpeg RGB24 frame into a tightly packed buffer, dropping any
/// per-row stride padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_bytes = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + row_bytes]);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn create_test_video(path: &Path, num_frames: usize, width: u32, height: u32, fps: i32) {
        ffmpeg_next::init().unwrap();

        let mut octx = ffmpeg_next::format::output(path).unwrap();
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4).unwrap();
        let mut ost = octx.add_stream(Some(codec)).unwrap();

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .unwrap();
        encoder_ctx.set_width(width);
        encoder_ctx.set_height(height);
        encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
        encoder_ctx.set_time_base(ffmpeg_next::Rational(1, fps));
        encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(fps, 1)));
        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let mut encoder = encoder_ctx
            .open_with(ffmpeg_next::Dictionary::new())
            .unwrap();
        ost.set_parameters(&encoder);
        octx.write_header().unwrap();
        let ost_time_base = octx.stream(0).unwrap().time_base();

        let mut scaler = ffmpeg_next::software::scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::format::Pixel::YUV420P,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .unwrap();

        let mut write_packets =
            |encoder: &mut ffmpeg_next::encoder::Video, octx: &mut ffmpeg_next::format::context::Output| {
                let mut encoded = ffmpeg_next::Packet::empty();
                while encoder.receive_packet(&mut encoded).is_ok() {
                    encoded.set_stream(0);
                    encoded.rescale_ts(ffmpeg_next::Rational(1, fps), ost_time_base);
                    encoded.write_interleaved(octx).unwrap();
                }
            };

        for i in 0..num_frames {
            let mut rgb_frame = ffmpeg_next::util::frame::video::Video::new(
                ffmpeg_next::format::Pixel::RGB24,
                width,
                height,
            );
            let value = ((i * 40) % 256) as u8;
            rgb_frame.data_mut(0).fill(value);

            let mut yuv_frame = ffmpeg_next::util::frame::video::Video::empty();
            scaler.run(&rgb_frame, &mut yuv_frame).unwrap();
            yuv_frame.set_pts(Some(i as i64));

            encoder.send_frame(&yuv_frame).unwrap();
            write_packets(&mut encoder, &mut octx);
        }

        encoder.send_eof().unwrap();
        write_packets(&mut encoder, &mut octx);
        octx.write_trailer().unwrap();
    }

    fn test_video(dir: &Path, frames: usize) -> PathBuf {
        let path = dir.join("test.mp4");
        create_test_video(&path, frames, 160, 120, 30);
        path
    }

    #[test]
    fn test_open_returns_native_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video(dir.path(), 3);

        let mut source = FfmpegFrameSource::new(&path);
        let meta = source.open().unwrap();
        assert_eq!((meta.width, meta.height), (160, 120));
        assert!(meta.fps > 0.0);
        assert_eq!(meta.rotation, Rotation::Deg0);
        assert_eq!(meta.source_path, Some(path));
    }

    #[test]
    fn test_open_reports_target_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video(dir.path(), 3);

        let mut source = FfmpegFrameSource::new(&path).with_target_size(80, 64);
        let meta = source.open().unwrap();
        assert_eq!((meta.width, meta.height), (80, 64));
    }

    #[test]
    fn test_frames_are_scaled_to_target_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video(dir.path(), 4);

        let mut source = FfmpegFrameSource::new(&path).with_target_size(80, 64);
        source.open().unwrap();

        let frames: Vec<Frame> = source.frames().map(|f| f.unwrap()).collect();
        assert_eq!(frames.len(), 4);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.index(), i);
            assert_eq!((frame.width(), frame.height()), (80, 64));
            assert_eq!(frame.channels(), 3);
            assert_eq!(frame.data().len(), 80 * 64 * 3);
        }
    }

    #[test]
    fn test_open_nonexistent_errors() {
        let mut source = FfmpegFrameSource::new("/nonexistent/test.mp4");
        assert!(source.open().is_err());
    }

    #[test]
    fn test_frames_without_open_errors() {
        let mut source = FfmpegFrameSource::new("/nonexistent/test.mp4");
        let result = source.frames().next().unwrap();
        assert!(result.is_err());
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video(dir.path(), 1);

        let mut source = FfmpegFrameSource::new(&path);
        source.open().unwrap();
        source.close();
        source.close();
        assert!(source.frames().next().unwrap().is_err());
    }

    #[test]
    fn test_parse_display_matrix_identity() {
        let mut data = vec![0u8; 36];
        data[0..4].copy_from_slice(&65536i32.to_le_bytes());
        let angle = parse_display_matrix(&data).unwrap();
        assert_eq!(Rotation::from_degrees(angle), Rotation::Deg0);
    }

    #[test]
    fn test_parse_display_matrix_quarter_turn() {
        let mut data = vec![0u8; 36];
        data[4..8].copy_from_slice(&65536i32.to_le_bytes());
        let angle = parse_display_matrix(&data).unwrap();
        assert_eq!(Rotation::from_degrees(angle), Rotation::Deg270);
    }

    #[test]
    fn test_parse_display_matrix_too_short() {
        assert!(parse_display_matrix(&[0u8; 20]).is_none());
    }
}
