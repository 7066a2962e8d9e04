use std::path::{Path, PathBuf};

use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling::{Context as Scaler, Flags as ScalerFlags};
use ffmpeg_next::util::frame::video::Video as VideoFrame;

use crate::frames::domain::frame_source::FrameSource;
use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::encode_error::EncodeError;
use crate::shared::encode_settings::Resolution;
use crate::shared::frame::{Frame, RGB_CHANNELS};

/// Decodes still images on demand and scales each to a fixed resolution.
///
/// Uses ffmpeg for decoding, which is significantly faster than the pure-Rust
/// `image` crate for large photos. Every frame comes out as packed RGB24 at
/// the target size regardless of the source dimensions or pixel format.
pub struct ImageFileFrameSource {
    paths: Vec<PathBuf>,
    resolution: Resolution,
}

impl ImageFileFrameSource {
    /// Fails when any path lacks a recognised image extension.
    pub fn new(paths: Vec<PathBuf>, resolution: Resolution) -> Result<Self, EncodeError> {
        if let Some(bad) = paths.iter().find(|p| !is_image_file(p)) {
            return Err(EncodeError::configuration(format!(
                "{} is not a supported image, expected one of {}",
                bad.display(),
                IMAGE_EXTENSIONS.join(", ")
            )));
        }
        Ok(Self { paths, resolution })
    }
}

impl FrameSource for ImageFileFrameSource {
    fn frame_count(&self) -> usize {
        self.paths.len()
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.resolution.width, self.resolution.height)
    }

    fn frame(&mut self, index: usize) -> Result<Frame, EncodeError> {
        let path = self.paths.get(index).ok_or_else(|| {
            EncodeError::resource(format!(
                "frame {index} out of range for {} images",
                self.paths.len()
            ))
        })?;
        let pixels = decode_image(path, self.resolution).map_err(|e| {
            EncodeError::resource(format!("cannot decode {}: {e}", path.display()))
        })?;
        Ok(Frame::new(
            pixels,
            self.resolution.width,
            self.resolution.height,
            index,
        ))
    }
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn decode_image(path: &Path, target: Resolution) -> Result<Vec<u8>, ffmpeg_next::Error> {
    ffmpeg_next::init()?;

    let mut ictx = ffmpeg_next::format::input(path)?;
    let stream = ictx
        .streams()
        .best(ffmpeg_next::media::Type::Video)
        .ok_or(ffmpeg_next::Error::StreamNotFound)?;
    let stream_index = stream.index();

    let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
    let mut decoder = codec_ctx.decoder().video()?;

    let mut scaler = Scaler::get(
        decoder.format(),
        decoder.width(),
        decoder.height(),
        Pixel::RGB24,
        target.width,
        target.height,
        ScalerFlags::BILINEAR,
    )?;

    for (stream, packet) in ictx.packets() {
        if stream.index() != stream_index {
            continue;
        }
        decoder.send_packet(&packet)?;
        if let Some(pixels) = try_receive_pixels(&mut decoder, &mut scaler, target)? {
            return Ok(pixels);
        }
    }

    // Flush decoder for formats that buffer the single frame
    let _ = decoder.send_eof();
    try_receive_pixels(&mut decoder, &mut scaler, target)?
        .ok_or(ffmpeg_next::Error::InvalidData)
}

fn try_receive_pixels(
    decoder: &mut ffmpeg_next::decoder::Video,
    scaler: &mut Scaler,
    target: Resolution,
) -> Result<Option<Vec<u8>>, ffmpeg_next::Error> {
    let mut decoded = VideoFrame::empty();
    if decoder.receive_frame(&mut decoded).is_err() {
        return Ok(None);
    }
    let mut rgb_frame = VideoFrame::empty();
    scaler.run(&decoded, &mut rgb_frame)?;
    Ok(Some(extract_rgb_pixels(&rgb_frame, target)))
}

fn extract_rgb_pixels(rgb_frame: &VideoFrame, target: Resolution) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_len = target.width as usize * RGB_CHANNELS;
    let h = target.height as usize;

    let mut pixels = Vec::with_capacity(row_len * h);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + row_len]);
    }
    pixels
}
