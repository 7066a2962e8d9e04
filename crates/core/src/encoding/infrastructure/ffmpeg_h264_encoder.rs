use std::collections::VecDeque;

use ffmpeg_next::codec;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::util::frame::video::Video as VideoFrame;
use ffmpeg_next::{Dictionary, Rational};

use crate::conversion::color_space::YuvBuffer;
use crate::encoding::domain::video_encoder::{EncoderOutput, EncoderState, VideoEncoder};
use crate::shared::access_unit::AccessUnit;
use crate::shared::constants::MICROS_PER_SECOND;
use crate::shared::encode_error::EncodeError;
use crate::shared::track_descriptor::{TrackDescriptor, VideoCodec};

const DEFAULT_QUEUE_CAPACITY: usize = 8;
const PREFERRED_ENCODER: &str = "libx264";
const DEFAULT_PRESET: &str = "veryfast";

/// H.264 encoder session backed by libavcodec.
///
/// Frames are stamped in microseconds (time base `1/1_000_000`) so packet
/// timestamps come back in the same unit the pipeline uses. B-frames are
/// disabled, which keeps decode order equal to presentation order and lets
/// every access unit be described by a single timestamp. SPS/PPS are emitted
/// out-of-band and surface as `codec_config` on the negotiated descriptor.
pub struct FfmpegH264Encoder {
    state: EncoderState,
    requested: Option<TrackDescriptor>,
    encoder: Option<ffmpeg_next::codec::encoder::video::Encoder>,
    output_queue: VecDeque<AccessUnit>,
    queue_capacity: usize,
    format_emitted: bool,
    /// libavcodec reported end of stream after `send_eof`.
    flushed: bool,
    end_of_stream_emitted: bool,
    last_pts_us: i64,
}

// Safety: FfmpegH264Encoder is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegH264Encoder {}

impl FfmpegH264Encoder {
    pub fn new() -> Self {
        Self {
            state: EncoderState::Unconfigured,
            requested: None,
            encoder: None,
            output_queue: VecDeque::new(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            format_emitted: false,
            flushed: false,
            end_of_stream_emitted: false,
            last_pts_us: 0,
        }
    }

    fn open_encoder(
        descriptor: &TrackDescriptor,
    ) -> Result<ffmpeg_next::codec::encoder::video::Encoder, EncodeError> {
        ffmpeg_next::init().map_err(|e| EncodeError::resource(format!("ffmpeg init: {e}")))?;

        let codec = ffmpeg_next::encoder::find_by_name(PREFERRED_ENCODER)
            .or_else(|| ffmpeg_next::encoder::find(codec::Id::H264))
            .ok_or_else(|| EncodeError::resource("no H.264 encoder available"))?;
        log::debug!("Using encoder {}", codec.name());

        let mut ctx = codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(|e| EncodeError::resource(format!("cannot allocate encoder: {e}")))?;

        ctx.set_width(descriptor.width);
        ctx.set_height(descriptor.height);
        ctx.set_format(Pixel::YUV420P);
        ctx.set_time_base(Rational(1, MICROS_PER_SECOND as i32));
        ctx.set_frame_rate(Some(Rational(descriptor.frame_rate as i32, 1)));
        ctx.set_bit_rate(descriptor.bit_rate as usize);
        ctx.set_gop(descriptor.keyframe_interval_frames());
        ctx.set_max_b_frames(0);
        ctx.set_flags(codec::Flags::GLOBAL_HEADER);

        let mut opts = Dictionary::new();
        opts.set("preset", DEFAULT_PRESET);

        ctx.open_with(opts).map_err(|e| {
            EncodeError::configuration(format!(
                "encoder rejected {}x{} at {} bps, {} fps: {e}",
                descriptor.width, descriptor.height, descriptor.bit_rate, descriptor.frame_rate
            ))
        })
    }

    /// Reads back what libavcodec actually configured.
    fn negotiated_descriptor(&self) -> Result<TrackDescriptor, EncodeError> {
        let encoder = self
            .encoder
            .as_ref()
            .ok_or_else(|| EncodeError::codec("encoder released before format negotiation"))?;
        let mut descriptor = self
            .requested
            .clone()
            .ok_or_else(|| EncodeError::codec("encoder was never configured"))?;

        unsafe {
            let ctx = encoder.as_ptr();
            descriptor.width = (*ctx).width as u32;
            descriptor.height = (*ctx).height as u32;
            if (*ctx).bit_rate > 0 {
                descriptor.bit_rate = (*ctx).bit_rate as u64;
            }
            if !(*ctx).extradata.is_null() && (*ctx).extradata_size > 0 {
                descriptor.codec_config =
                    std::slice::from_raw_parts((*ctx).extradata, (*ctx).extradata_size as usize)
                        .to_vec();
            }
        }
        Ok(descriptor)
    }

    /// Moves ready packets into the output queue until it is full or the
    /// encoder wants more input.
    fn pull_packets(&mut self) -> Result<(), EncodeError> {
        let Some(encoder) = self.encoder.as_mut() else {
            return Err(EncodeError::codec("encoder not allocated"));
        };
        let mut packet = ffmpeg_next::Packet::empty();
        while self.output_queue.len() < self.queue_capacity {
            match encoder.receive_packet(&mut packet) {
                Ok(()) => {
                    let unit = to_access_unit(&packet, self.last_pts_us);
                    self.last_pts_us = unit.pts_us;
                    self.output_queue.push_back(unit);
                }
                Err(ffmpeg_next::Error::Other { errno }) if errno == ffmpeg_next::ffi::EAGAIN => {
                    break;
                }
                Err(ffmpeg_next::Error::Eof) => {
                    self.flushed = true;
                    break;
                }
                Err(e) => return Err(EncodeError::codec(format!("receive_packet: {e}"))),
            }
        }
        Ok(())
    }

    /// Hands `send` to libavcodec, freeing input room by pulling output when
    /// the encoder reports it is full.
    fn send_with_backpressure<F>(&mut self, mut send: F) -> Result<(), EncodeError>
    where
        F: FnMut(&mut ffmpeg_next::codec::encoder::video::Encoder) -> Result<(), ffmpeg_next::Error>,
    {
        loop {
            let encoder = self
                .encoder
                .as_mut()
                .ok_or_else(|| EncodeError::codec("encoder not allocated"))?;
            match send(encoder) {
                Ok(()) => return Ok(()),
                Err(ffmpeg_next::Error::Other { errno }) if errno == ffmpeg_next::ffi::EAGAIN => {
                    if self.output_queue.len() >= self.queue_capacity {
                        return Err(EncodeError::codec(
                            "output queue full, drain before submitting more input",
                        ));
                    }
                    self.pull_packets()?;
                }
                Err(e) => return Err(EncodeError::codec(format!("send to encoder: {e}"))),
            }
        }
    }
}

impl Default for FfmpegH264Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoEncoder for FfmpegH264Encoder {
    fn configure(&mut self, descriptor: &TrackDescriptor) -> Result<(), EncodeError> {
        if self.state != EncoderState::Unconfigured {
            return Err(EncodeError::codec(format!(
                "configure called while encoder is {:?}",
                self.state
            )));
        }
        validate_descriptor(descriptor)?;

        let encoder = Self::open_encoder(descriptor)?;
        self.encoder = Some(encoder);
        self.requested = Some(descriptor.clone());
        self.state = EncoderState::Configured;
        Ok(())
    }

    fn start(&mut self) -> Result<(), EncodeError> {
        if self.state != EncoderState::Configured {
            return Err(EncodeError::codec(format!(
                "start called while encoder is {:?}",
                self.state
            )));
        }
        self.output_queue = VecDeque::with_capacity(self.queue_capacity);
        self.state = EncoderState::Started;
        Ok(())
    }

    fn submit(
        &mut self,
        buffer: &[u8],
        presentation_time_us: i64,
        end_of_stream: bool,
    ) -> Result<(), EncodeError> {
        if self.state != EncoderState::Started {
            return Err(EncodeError::codec(format!(
                "submit called while encoder is {:?}",
                self.state
            )));
        }

        if end_of_stream {
            self.send_with_backpressure(|encoder| encoder.send_eof())?;
            self.state = EncoderState::Draining;
            return Ok(());
        }

        let (width, height) = self
            .requested
            .as_ref()
            .map(|d| (d.width, d.height))
            .ok_or_else(|| EncodeError::codec("encoder was never configured"))?;
        let expected = YuvBuffer::byte_len(width, height);
        if buffer.len() != expected {
            return Err(EncodeError::codec(format!(
                "input buffer is {} bytes, {width}x{height} 4:2:0 needs {expected}",
                buffer.len()
            )));
        }

        let mut frame = yuv420p_frame(buffer, width, height);
        frame.set_pts(Some(presentation_time_us));
        self.send_with_backpressure(|encoder| encoder.send_frame(&frame))
    }

    // libavcodec software encoders finish their work inside receive_packet,
    // so there is never anything to wait for.
    fn drain_once(&mut self, _timeout_us: u64) -> Result<EncoderOutput, EncodeError> {
        if !matches!(self.state, EncoderState::Started | EncoderState::Draining) {
            return Err(EncodeError::codec(format!(
                "drain called while encoder is {:?}",
                self.state
            )));
        }

        if self.output_queue.is_empty() && !self.flushed {
            self.pull_packets()?;
        }

        if !self.format_emitted {
            if self.output_queue.is_empty() && !self.flushed {
                return Ok(EncoderOutput::Pending);
            }
            self.format_emitted = true;
            return Ok(EncoderOutput::FormatChanged(self.negotiated_descriptor()?));
        }

        if let Some(unit) = self.output_queue.pop_front() {
            return Ok(EncoderOutput::AccessUnit(unit));
        }

        if self.flushed && !self.end_of_stream_emitted {
            self.end_of_stream_emitted = true;
            return Ok(EncoderOutput::AccessUnit(AccessUnit::end_of_stream(
                self.last_pts_us,
            )));
        }

        Ok(EncoderOutput::Pending)
    }

    fn stop(&mut self) {
        if matches!(self.state, EncoderState::Stopped | EncoderState::Released) {
            return;
        }
        if !self.output_queue.is_empty() {
            log::debug!(
                "Discarding {} undrained access units on stop",
                self.output_queue.len()
            );
        }
        self.output_queue.clear();
        self.state = EncoderState::Stopped;
    }

    fn release(&mut self) {
        if self.state == EncoderState::Released {
            return;
        }
        self.output_queue.clear();
        self.encoder = None;
        self.state = EncoderState::Released;
    }

    fn state(&self) -> EncoderState {
        self.state
    }
}

fn validate_descriptor(descriptor: &TrackDescriptor) -> Result<(), EncodeError> {
    if descriptor.codec != VideoCodec::H264 {
        return Err(EncodeError::configuration(format!(
            "unsupported codec {:?}",
            descriptor.codec
        )));
    }
    let (w, h) = (descriptor.width, descriptor.height);
    if w == 0 || h == 0 || w % 2 != 0 || h % 2 != 0 {
        return Err(EncodeError::configuration(format!(
            "H.264 4:2:0 needs even, non-zero dimensions, got {w}x{h}"
        )));
    }
    if descriptor.bit_rate == 0 || descriptor.bit_rate > i64::MAX as u64 {
        return Err(EncodeError::configuration(format!(
            "unsupported bit rate {}",
            descriptor.bit_rate
        )));
    }
    if descriptor.frame_rate == 0 || descriptor.frame_rate > i32::MAX as u32 {
        return Err(EncodeError::configuration(format!(
            "unsupported frame rate {}",
            descriptor.frame_rate
        )));
    }
    Ok(())
}

/// Builds a planar YUV420P frame from the semi-planar converter output.
fn yuv420p_frame(buffer: &[u8], width: u32, height: u32) -> VideoFrame {
    let w = width as usize;
    let h = height as usize;
    let (luma, chroma) = buffer.split_at(w * h);
    let mut frame = VideoFrame::new(Pixel::YUV420P, width, height);

    let stride = frame.stride(0);
    let plane = frame.data_mut(0);
    for row in 0..h {
        plane[row * stride..row * stride + w].copy_from_slice(&luma[row * w..(row + 1) * w]);
    }

    // Each chroma row holds w/2 interleaved (U,V) pairs, i.e. w bytes.
    for (plane_index, offset) in [(1usize, 0usize), (2, 1)] {
        let stride = frame.stride(plane_index);
        let plane = frame.data_mut(plane_index);
        for row in 0..h / 2 {
            let pairs = &chroma[row * w..(row + 1) * w];
            for (col, pair) in pairs.chunks_exact(2).enumerate() {
                plane[row * stride + col] = pair[offset];
            }
        }
    }
    frame
}

fn to_access_unit(packet: &ffmpeg_next::Packet, fallback_pts_us: i64) -> AccessUnit {
    let data = packet.data().map(|d| d.to_vec()).unwrap_or_default();
    let pts_us = packet.pts().or(packet.dts()).unwrap_or(fallback_pts_us);
    let mut unit = AccessUnit::new(data, pts_us, packet.is_key());
    unit.duration_us = packet.duration().max(0);
    unit
}
