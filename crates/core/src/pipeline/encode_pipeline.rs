use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::conversion::color_space::rgb_to_yuv420;
use crate::encoding::domain::video_encoder::{EncoderOutput, VideoEncoder};
use crate::frames::domain::frame_source::FrameSource;
use crate::muxing::domain::muxer::Muxer;
use crate::shared::constants::{DRAIN_TIMEOUT_US, MAX_IDLE_DRAIN_POLLS};
use crate::shared::encode_error::EncodeError;
use crate::shared::encode_settings::{EncodeSettings, FrameTiming};

use super::encode_listener::EncodeListener;
use super::encode_session::EncodeSession;
use super::pipeline_failure::{PipelineFailure, PipelineStage};
use super::pipeline_logger::{NullPipelineLogger, PipelineLogger};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    /// Validating, configuring, and feeding frames before any output exists.
    Converting,
    /// Frames submitted; the encoder has not reported its format yet.
    AwaitingFormat,
    Encoding,
    Finalizing,
    Completed,
    Failed,
}

fn at(stage: PipelineStage) -> impl FnOnce(EncodeError) -> PipelineFailure {
    move |e| PipelineFailure::new(stage, e)
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Turns an ordered frame source into one encoded video file.
///
/// Frames are read, converted to YUV 4:2:0, and submitted one at a time.
/// After every submit the encoder is drained until it has nothing ready, so
/// at most one raw frame is alive at once. The muxer track is created from
/// the encoder's first format event, never from the requested settings.
///
/// Single-use: `execute` takes the owned components, so a second call fails
/// with a configuration error.
pub struct EncodePipeline {
    settings: EncodeSettings,
    source: Option<Box<dyn FrameSource>>,
    encoder: Option<Box<dyn VideoEncoder>>,
    muxer: Option<Box<dyn Muxer>>,
    listener: Box<dyn EncodeListener>,
    logger: Box<dyn PipelineLogger>,
    cancelled: Arc<AtomicBool>,
    state: PipelineState,
}

impl EncodePipeline {
    pub fn new(
        settings: EncodeSettings,
        source: Box<dyn FrameSource>,
        encoder: Box<dyn VideoEncoder>,
        muxer: Box<dyn Muxer>,
        listener: Box<dyn EncodeListener>,
    ) -> Self {
        Self {
            settings,
            source: Some(source),
            encoder: Some(encoder),
            muxer: Some(muxer),
            listener,
            logger: Box::new(NullPipelineLogger),
            cancelled: Arc::new(AtomicBool::new(false)),
            state: PipelineState::Idle,
        }
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Shares a flag that aborts the run before the next frame is submitted.
    pub fn with_cancellation(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Runs the whole encode. The listener hears exactly one of
    /// `on_completed` or `on_failed`; the same failure is returned.
    ///
    /// A pipeline runs once. Later calls fail without notifying the listener.
    pub fn execute(&mut self) -> Result<(), PipelineFailure> {
        if self.state != PipelineState::Idle {
            log::warn!("Encode pipeline executed twice");
            return Err(PipelineFailure::new(
                PipelineStage::Validate,
                EncodeError::configuration("pipeline already executed"),
            ));
        }
        let mut session: Option<EncodeSession> = None;

        let outcome = match self.run(&mut session) {
            Ok(()) => {
                self.state = PipelineState::Finalizing;
                match session.take() {
                    Some(session) => session.finish().map_err(at(PipelineStage::Finalize)),
                    None => Err(PipelineFailure::new(
                        PipelineStage::Finalize,
                        EncodeError::codec("encode session missing at finalize"),
                    )),
                }
            }
            Err(failure) => Err(failure),
        };

        match outcome {
            Ok(()) => {
                self.state = PipelineState::Completed;
                self.logger.summary();
                self.listener.on_completed();
                Ok(())
            }
            Err(failure) => {
                self.state = PipelineState::Failed;
                if failure.is_cancelled() {
                    log::info!("Encode cancelled");
                } else {
                    log::warn!("Encode failed: {failure}");
                }
                self.listener.on_failed(&failure);
                if let Some(mut session) = session.take() {
                    session.release();
                }
                Err(failure)
            }
        }
    }

    fn run(&mut self, slot: &mut Option<EncodeSession>) -> Result<(), PipelineFailure> {
        let already_run = || {
            PipelineFailure::new(
                PipelineStage::Validate,
                EncodeError::configuration("pipeline already executed"),
            )
        };
        let mut source = self.source.take().ok_or_else(already_run)?;
        let encoder = self.encoder.take().ok_or_else(already_run)?;
        let muxer = self.muxer.take().ok_or_else(already_run)?;
        // Created before validation so every exit path tears both down.
        let session = slot.insert(EncodeSession::new(encoder, muxer));
        self.state = PipelineState::Converting;

        let frame_count = source.frame_count();
        let timing = self.validate(source.as_ref())?;
        let (width, height) = (self.settings.resolution.width, self.settings.resolution.height);

        let requested = self.settings.requested_track(&timing);
        session
            .encoder_mut()
            .configure(&requested)
            .map_err(at(PipelineStage::Configure))?;
        session
            .encoder_mut()
            .start()
            .map_err(at(PipelineStage::Configure))?;
        self.logger.info(&format!(
            "Encoding {frame_count} frames at {width}x{height}, {}us per frame",
            timing.frame_duration_us
        ));

        for index in 0..frame_count {
            if self.cancelled.load(Ordering::Relaxed) {
                return Err(PipelineFailure::new(
                    PipelineStage::Submit,
                    EncodeError::Cancelled,
                ));
            }

            let t0 = Instant::now();
            let frame = source.frame(index).map_err(at(PipelineStage::Read))?;
            if (frame.width(), frame.height()) != (width, height) {
                return Err(PipelineFailure::new(
                    PipelineStage::Convert,
                    EncodeError::configuration(format!(
                        "frame {index} is {}x{}, expected {width}x{height}",
                        frame.width(),
                        frame.height()
                    )),
                ));
            }
            let yuv =
                rgb_to_yuv420(frame.data(), width, height).map_err(at(PipelineStage::Convert))?;
            drop(frame);
            self.logger.timing("convert", elapsed_ms(t0));

            let t0 = Instant::now();
            session
                .encoder_mut()
                .submit(yuv.data(), timing.presentation_time_us(index), false)
                .map_err(at(PipelineStage::Submit))?;
            drop(yuv);
            self.logger.timing("submit", elapsed_ms(t0));
            if session.track().is_none() {
                self.state = PipelineState::AwaitingFormat;
            }

            let t0 = Instant::now();
            self.drain(session, &timing, false)?;
            self.logger.timing("drain", elapsed_ms(t0));

            self.listener
                .on_progress((index + 1) as f32 / frame_count as f32);
            self.logger.progress(index + 1, frame_count);
        }

        session
            .encoder_mut()
            .submit(&[], timing.presentation_time_us(frame_count), true)
            .map_err(at(PipelineStage::Submit))?;
        let t0 = Instant::now();
        self.drain(session, &timing, true)?;
        self.logger.timing("flush", elapsed_ms(t0));

        if session.track().is_none() {
            return Err(PipelineFailure::new(
                PipelineStage::Drain,
                EncodeError::codec("encoder finished without reporting an output format"),
            ));
        }
        Ok(())
    }

    fn validate(&self, source: &dyn FrameSource) -> Result<FrameTiming, PipelineFailure> {
        self.settings
            .validate()
            .map_err(at(PipelineStage::Validate))?;
        let timing = self
            .settings
            .frame_timing(source.frame_count())
            .map_err(at(PipelineStage::Validate))?;

        let expected = (self.settings.resolution.width, self.settings.resolution.height);
        let actual = source.dimensions();
        if actual != expected {
            return Err(PipelineFailure::new(
                PipelineStage::Validate,
                EncodeError::configuration(format!(
                    "frames are {}x{}, output is {}x{}",
                    actual.0, actual.1, expected.0, expected.1
                )),
            ));
        }
        Ok(timing)
    }

    /// Moves encoder output into the muxer. Without `until_end_of_stream` it
    /// returns on the first empty poll; otherwise it returns once the
    /// end-of-stream marker has been seen.
    fn drain(
        &mut self,
        session: &mut EncodeSession,
        timing: &FrameTiming,
        until_end_of_stream: bool,
    ) -> Result<(), PipelineFailure> {
        let mut idle_polls = 0;
        loop {
            let output = session
                .encoder_mut()
                .drain_once(DRAIN_TIMEOUT_US)
                .map_err(at(PipelineStage::Drain))?;

            match output {
                EncoderOutput::Pending => {
                    if !until_end_of_stream {
                        return Ok(());
                    }
                    idle_polls += 1;
                    if idle_polls >= MAX_IDLE_DRAIN_POLLS {
                        return Err(PipelineFailure::new(
                            PipelineStage::Drain,
                            EncodeError::codec(format!(
                                "no end of stream after {idle_polls} empty polls"
                            )),
                        ));
                    }
                }
                EncoderOutput::FormatChanged(descriptor) => {
                    idle_polls = 0;
                    if session.track().is_some() {
                        return Err(PipelineFailure::new(
                            PipelineStage::Drain,
                            EncodeError::codec("output format changed mid-stream"),
                        ));
                    }
                    session
                        .open_track(&descriptor)
                        .map_err(at(PipelineStage::Mux))?;
                    self.state = PipelineState::Encoding;
                    log::debug!(
                        "Encoder settled on {}x{} at {} bps",
                        descriptor.width,
                        descriptor.height,
                        descriptor.bit_rate
                    );
                }
                EncoderOutput::AccessUnit(mut unit) => {
                    idle_polls = 0;
                    if unit.has_sample() {
                        if unit.duration_us <= 0 {
                            unit.duration_us = timing.frame_duration_us;
                        }
                        session.write(&unit).map_err(at(PipelineStage::Mux))?;
                        self.logger.sample_written(unit.data.len());
                    }
                    if unit.flags.end_of_stream {
                        return Ok(());
                    }
                }
            }
        }
    }
}
