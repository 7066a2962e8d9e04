use std::path::{Path, PathBuf};

use ffmpeg_next::{ffi, format::context::Output as OutputContext, Rational};

use crate::muxing::domain::muxer::{Muxer, MuxerState, SampleClock, TrackHandle};
use crate::shared::access_unit::AccessUnit;
use crate::shared::constants::MICROS_PER_SECOND;
use crate::shared::encode_error::EncodeError;
use crate::shared::track_descriptor::{TrackDescriptor, VideoCodec};

const CONTAINER_FORMAT: &str = "mp4";

/// Writes one H.264 track into an MP4 file via libavformat.
///
/// Samples arrive in microseconds and are rescaled to whatever time base the
/// container picks when the header is written. If the session is released
/// without `stop`, the partially written file stays on disk.
pub struct FfmpegMp4Muxer {
    path: PathBuf,
    output: Option<OutputContext>,
    state: MuxerState,
    stream_index: Option<usize>,
    stream_time_base: Rational,
    clock: SampleClock,
    samples_written: usize,
}

// Safety: FfmpegMp4Muxer is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegMp4Muxer {}

impl FfmpegMp4Muxer {
    /// Opens `path` for writing. The file is created immediately.
    pub fn create(path: &Path) -> Result<Self, EncodeError> {
        ffmpeg_next::init().map_err(|e| EncodeError::resource(format!("ffmpeg init: {e}")))?;

        let output = ffmpeg_next::format::output_as(path, CONTAINER_FORMAT).map_err(|e| {
            EncodeError::resource(format!("cannot create {}: {e}", path.display()))
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            output: Some(output),
            state: MuxerState::Created,
            stream_index: None,
            stream_time_base: Rational(1, MICROS_PER_SECOND as i32),
            clock: SampleClock::new(),
            samples_written: 0,
        })
    }

    fn output_mut(&mut self) -> Result<&mut OutputContext, EncodeError> {
        self.output
            .as_mut()
            .ok_or_else(|| EncodeError::codec("muxer output already released"))
    }
}

impl Muxer for FfmpegMp4Muxer {
    fn add_track(&mut self, descriptor: &TrackDescriptor) -> Result<TrackHandle, EncodeError> {
        if self.state != MuxerState::Created {
            return Err(EncodeError::configuration(format!(
                "add_track called while muxer is {:?}, only one track is supported",
                self.state
            )));
        }
        if descriptor.codec != VideoCodec::H264 {
            return Err(EncodeError::configuration(format!(
                "unsupported codec {:?}",
                descriptor.codec
            )));
        }

        let output = self.output_mut()?;
        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::H264);
        let mut stream = output
            .add_stream(codec)
            .map_err(|e| EncodeError::resource(format!("cannot add video stream: {e}")))?;
        stream.set_time_base(Rational(1, MICROS_PER_SECOND as i32));

        unsafe {
            let raw = stream.as_mut_ptr();
            let params = (*raw).codecpar;
            (*params).codec_type = ffi::AVMediaType::AVMEDIA_TYPE_VIDEO;
            (*params).codec_id = ffi::AVCodecID::AV_CODEC_ID_H264;
            (*params).codec_tag = 0;
            (*params).width = descriptor.width as i32;
            (*params).height = descriptor.height as i32;
            (*params).format = ffi::AVPixelFormat::AV_PIX_FMT_YUV420P as i32;
            (*params).bit_rate = descriptor.bit_rate as i64;

            // SPS/PPS must live in padded, av_malloc'd memory owned by codecpar.
            if !descriptor.codec_config.is_empty() {
                let config = &descriptor.codec_config;
                let alloc_size = config.len() + ffi::AV_INPUT_BUFFER_PADDING_SIZE as usize;
                let buf = ffi::av_mallocz(alloc_size) as *mut u8;
                if buf.is_null() {
                    return Err(EncodeError::resource("cannot allocate codec config"));
                }
                std::ptr::copy_nonoverlapping(config.as_ptr(), buf, config.len());
                (*params).extradata = buf;
                (*params).extradata_size = config.len() as i32;
            }

            (*raw).avg_frame_rate = ffi::AVRational {
                num: descriptor.frame_rate as i32,
                den: 1,
            };
        }

        let index = stream.index();
        self.stream_index = Some(index);
        self.state = MuxerState::TrackAdded;
        log::debug!(
            "Added {}x{} {} track to {}",
            descriptor.width,
            descriptor.height,
            descriptor.codec.mime_type(),
            self.path.display()
        );
        Ok(TrackHandle(index))
    }

    fn start(&mut self) -> Result<(), EncodeError> {
        if self.state != MuxerState::TrackAdded {
            return Err(EncodeError::configuration(format!(
                "start called while muxer is {:?}, a track must be added first",
                self.state
            )));
        }
        let index = self
            .stream_index
            .ok_or_else(|| EncodeError::codec("no track registered"))?;

        let output = self.output_mut()?;
        output
            .write_header()
            .map_err(|e| EncodeError::io(format!("cannot write container header: {e}")))?;

        // The mp4 writer may replace the requested time base.
        let time_base = output
            .stream(index)
            .map(|s| s.time_base())
            .ok_or_else(|| EncodeError::codec("video stream vanished after header"))?;
        self.stream_time_base = time_base;
        self.state = MuxerState::Started;
        Ok(())
    }

    fn write_sample(&mut self, track: TrackHandle, unit: &AccessUnit) -> Result<(), EncodeError> {
        if self.state != MuxerState::Started {
            return Err(EncodeError::codec(format!(
                "write_sample called while muxer is {:?}",
                self.state
            )));
        }
        if Some(track.0) != self.stream_index {
            return Err(EncodeError::codec(format!("unknown track {:?}", track)));
        }
        self.clock.advance(unit.pts_us)?;

        let mut packet = ffmpeg_next::Packet::copy(&unit.data);
        packet.set_stream(track.0);
        // No B-frames, so decode order equals presentation order.
        packet.set_pts(Some(unit.pts_us));
        packet.set_dts(Some(unit.pts_us));
        packet.set_duration(unit.duration_us);
        if unit.flags.keyframe {
            packet.set_flags(ffmpeg_next::packet::Flags::KEY);
        }
        packet.rescale_ts(Rational(1, MICROS_PER_SECOND as i32), self.stream_time_base);

        let output = self.output_mut()?;
        packet
            .write_interleaved(output)
            .map_err(|e| EncodeError::io(format!("cannot write sample: {e}")))?;
        self.samples_written += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EncodeError> {
        match self.state {
            MuxerState::Stopped | MuxerState::Released => Ok(()),
            MuxerState::Started => {
                // Stopped either way; a failed trailer is not retried.
                self.state = MuxerState::Stopped;
                let samples = self.samples_written;
                let output = self.output_mut()?;
                output
                    .write_trailer()
                    .map_err(|e| EncodeError::io(format!("cannot finalize container: {e}")))?;
                log::info!("Wrote {} samples to {}", samples, self.path.display());
                Ok(())
            }
            MuxerState::Created | MuxerState::TrackAdded => {
                self.state = MuxerState::Stopped;
                Ok(())
            }
        }
    }

    fn release(&mut self) {
        if self.state == MuxerState::Released {
            return;
        }
        self.output = None;
        self.state = MuxerState::Released;
    }

    fn state(&self) -> MuxerState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::color_space::rgb_to_yuv420;
    use crate::encoding::domain::video_encoder::{EncoderOutput, VideoEncoder};
    use crate::encoding::infrastructure::ffmpeg_h264_encoder::FfmpegH264Encoder;
    use crate::shared::encode_error::ErrorKind;
    use crate::shared::frame::Frame;

    fn h264_available() -> bool {
        ffmpeg_next::init().is_ok()
            && ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::H264).is_some()
    }

    fn track() -> TrackDescriptor {
        TrackDescriptor::h264(64, 48, 400_000, 10, 1)
    }

    /// Encodes `count` grey frames 100ms apart and collects the output.
    fn encode_frames(count: i64) -> (TrackDescriptor, Vec<AccessUnit>) {
        let mut encoder = FfmpegH264Encoder::new();
        encoder.configure(&track()).unwrap();
        encoder.start().unwrap();
        let frame = Frame::filled(64, 48, [128, 128, 128], 0);
        let yuv = rgb_to_yuv420(frame.data(), 64, 48).unwrap();
        for i in 0..count {
            encoder.submit(yuv.data(), i * 100_000, false).unwrap();
        }
        encoder.submit(&[], count * 100_000, true).unwrap();

        let mut format = None;
        let mut units = Vec::new();
        for _ in 0..1_000 {
            match encoder.drain_once(0).unwrap() {
                EncoderOutput::FormatChanged(d) => format = Some(d),
                EncoderOutput::AccessUnit(u) if u.flags.end_of_stream => break,
                EncoderOutput::AccessUnit(u) => units.push(u),
                EncoderOutput::Pending => {}
            }
        }
        encoder.release();
        (format.unwrap(), units)
    }

    #[test]
    fn test_create_in_missing_directory_is_resource_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.mp4");
        let err = FfmpegMp4Muxer::create(&path).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Resource);
    }

    #[test]
    fn test_second_track_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut muxer = FfmpegMp4Muxer::create(&dir.path().join("out.mp4")).unwrap();
        assert_eq!(muxer.state(), MuxerState::Created);
        muxer.add_track(&track()).unwrap();
        assert_eq!(muxer.state(), MuxerState::TrackAdded);
        let err = muxer.add_track(&track()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_start_without_track_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut muxer = FfmpegMp4Muxer::create(&dir.path().join("out.mp4")).unwrap();
        assert_eq!(muxer.start().unwrap_err().kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_write_before_start_is_codec_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut muxer = FfmpegMp4Muxer::create(&dir.path().join("out.mp4")).unwrap();
        let handle = muxer.add_track(&track()).unwrap();
        let err = muxer
            .write_sample(handle, &AccessUnit::new(vec![0, 0, 0, 1], 0, true))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Codec);
    }

    #[test]
    fn test_stop_and_release_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut muxer = FfmpegMp4Muxer::create(&dir.path().join("out.mp4")).unwrap();
        muxer.stop().unwrap();
        muxer.stop().unwrap();
        assert_eq!(muxer.state(), MuxerState::Stopped);
        muxer.release();
        muxer.release();
        assert_eq!(muxer.state(), MuxerState::Released);
        muxer.stop().unwrap();
    }

    #[test]
    fn test_writes_playable_file() {
        if !h264_available() {
            eprintln!("skipping: no H.264 encoder in this ffmpeg build");
            return;
        }
        let (format, units) = encode_frames(10);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");

        let mut muxer = FfmpegMp4Muxer::create(&path).unwrap();
        let handle = muxer.add_track(&format).unwrap();
        muxer.start().unwrap();
        for unit in &units {
            muxer.write_sample(handle, unit).unwrap();
        }
        muxer.stop().unwrap();
        muxer.release();

        let input = ffmpeg_next::format::input(&path).unwrap();
        let videos = input
            .streams()
            .filter(|s| s.parameters().medium() == ffmpeg_next::media::Type::Video)
            .count();
        assert_eq!(videos, 1);
        assert_eq!(input.streams().count(), 1);
        let stream = input.streams().best(ffmpeg_next::media::Type::Video).unwrap();
        assert_eq!(stream.parameters().id(), ffmpeg_next::codec::Id::H264);
    }

    #[test]
    fn test_unknown_track_and_backwards_timestamp_are_codec_errors() {
        if !h264_available() {
            eprintln!("skipping: no H.264 encoder in this ffmpeg build");
            return;
        }
        let (format, units) = encode_frames(2);
        let dir = tempfile::tempdir().unwrap();
        let mut muxer = FfmpegMp4Muxer::create(&dir.path().join("out.mp4")).unwrap();
        let handle = muxer.add_track(&format).unwrap();
        muxer.start().unwrap();

        let err = muxer.write_sample(TrackHandle(7), &units[0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Codec);

        muxer.write_sample(handle, &units[1]).unwrap();
        let err = muxer.write_sample(handle, &units[0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Codec);
        assert_eq!(muxer.samples_written, 1);
    }
}
