//! Scriptable encoder, muxer, and listener stubs that record every call.

use std::sync::{Arc, Mutex};

use crate::encoding::domain::video_encoder::{EncoderOutput, EncoderState, VideoEncoder};
use crate::muxing::domain::muxer::{Muxer, MuxerState, SampleClock, TrackHandle};
use crate::shared::access_unit::{AccessUnit, AccessUnitFlags};
use crate::shared::encode_error::{EncodeError, ErrorKind};
use crate::shared::track_descriptor::TrackDescriptor;

use super::encode_listener::EncodeListener;
use super::pipeline_failure::{PipelineFailure, PipelineStage};

#[derive(Default)]
pub struct Calls {
    /// Every lifecycle call in order, e.g. `"encoder.release"`.
    pub order: Vec<&'static str>,
    pub submitted: Vec<(i64, bool)>,
    pub tracks: Vec<TrackDescriptor>,
    pub written: Vec<AccessUnit>,
}

impl Calls {
    pub fn count(&self, call: &str) -> usize {
        self.order.iter().filter(|c| **c == call).count()
    }

    pub fn written_pts(&self) -> Vec<i64> {
        self.written.iter().map(|u| u.pts_us).collect()
    }
}

pub type SharedCalls = Arc<Mutex<Calls>>;

pub fn shared_calls() -> SharedCalls {
    Arc::new(Mutex::new(Calls::default()))
}

/// Emits one picture per submitted frame after the format event.
pub struct StubEncoder {
    calls: SharedCalls,
    state: EncoderState,
    requested: Option<TrackDescriptor>,
    pending: Vec<AccessUnit>,
    format_emitted: bool,
    eos_pts: Option<i64>,
    /// Precede the first picture with an SPS/PPS-only unit.
    pub emit_codec_config: bool,
    /// Never report end of stream.
    pub stall: bool,
    pub fail_configure: bool,
}

impl StubEncoder {
    pub fn new(calls: SharedCalls) -> Self {
        Self {
            calls,
            state: EncoderState::Unconfigured,
            requested: None,
            pending: Vec::new(),
            format_emitted: false,
            eos_pts: None,
            emit_codec_config: false,
            stall: false,
            fail_configure: false,
        }
    }
}

impl VideoEncoder for StubEncoder {
    fn configure(&mut self, descriptor: &TrackDescriptor) -> Result<(), EncodeError> {
        self.calls.lock().unwrap().order.push("encoder.configure");
        if self.fail_configure {
            return Err(EncodeError::resource("no encoder"));
        }
        self.requested = Some(descriptor.clone());
        self.state = EncoderState::Configured;
        Ok(())
    }

    fn start(&mut self) -> Result<(), EncodeError> {
        self.calls.lock().unwrap().order.push("encoder.start");
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
            return Err(EncodeError::codec("not started"));
        }
        self.calls
            .lock()
            .unwrap()
            .submitted
            .push((presentation_time_us, end_of_stream));
        if end_of_stream {
            self.eos_pts = Some(presentation_time_us);
            self.state = EncoderState::Draining;
            return Ok(());
        }
        if self.emit_codec_config && self.pending.is_empty() && !self.format_emitted {
            self.pending.push(AccessUnit {
                data: vec![0, 0, 0, 1, 0x67],
                pts_us: presentation_time_us,
                duration_us: 0,
                flags: AccessUnitFlags {
                    codec_config: true,
                    ..AccessUnitFlags::default()
                },
            });
        }
        let sample = buffer.iter().take(4).copied().collect();
        self.pending
            .push(AccessUnit::new(sample, presentation_time_us, true));
        Ok(())
    }

    fn drain_once(&mut self, _timeout_us: u64) -> Result<EncoderOutput, EncodeError> {
        if self.pending.is_empty() {
            return match self.eos_pts.take() {
                Some(pts) if !self.stall => {
                    Ok(EncoderOutput::AccessUnit(AccessUnit::end_of_stream(pts)))
                }
                _ => Ok(EncoderOutput::Pending),
            };
        }
        if !self.format_emitted {
            self.format_emitted = true;
            let mut negotiated = self.requested.clone().unwrap();
            negotiated.codec_config = vec![1, 2, 3];
            return Ok(EncoderOutput::FormatChanged(negotiated));
        }
        Ok(EncoderOutput::AccessUnit(self.pending.remove(0)))
    }

    fn stop(&mut self) {
        self.calls.lock().unwrap().order.push("encoder.stop");
        self.state = EncoderState::Stopped;
    }

    fn release(&mut self) {
        self.calls.lock().unwrap().order.push("encoder.release");
        self.state = EncoderState::Released;
    }

    fn state(&self) -> EncoderState {
        self.state
    }
}

pub struct StubMuxer {
    calls: SharedCalls,
    state: MuxerState,
    clock: SampleClock,
    /// Zero-based sample index whose write fails with an I/O error.
    pub fail_on_write: Option<usize>,
    /// Fail writing the trailer.
    pub fail_on_stop: bool,
}

impl StubMuxer {
    pub fn new(calls: SharedCalls) -> Self {
        Self {
            calls,
            state: MuxerState::Created,
            clock: SampleClock::new(),
            fail_on_write: None,
            fail_on_stop: false,
        }
    }
}

impl Muxer for StubMuxer {
    fn add_track(&mut self, descriptor: &TrackDescriptor) -> Result<TrackHandle, EncodeError> {
        let mut calls = self.calls.lock().unwrap();
        calls.order.push("muxer.add_track");
        if self.state != MuxerState::Created {
            return Err(EncodeError::configuration("track already added"));
        }
        calls.tracks.push(descriptor.clone());
        self.state = MuxerState::TrackAdded;
        Ok(TrackHandle(0))
    }

    fn start(&mut self) -> Result<(), EncodeError> {
        self.calls.lock().unwrap().order.push("muxer.start");
        self.state = MuxerState::Started;
        Ok(())
    }

    fn write_sample(&mut self, track: TrackHandle, unit: &AccessUnit) -> Result<(), EncodeError> {
        if self.state != MuxerState::Started || track != TrackHandle(0) {
            return Err(EncodeError::codec("bad write"));
        }
        let mut calls = self.calls.lock().unwrap();
        if self.fail_on_write == Some(calls.written.len()) {
            return Err(EncodeError::io("disk full"));
        }
        self.clock.advance(unit.pts_us)?;
        calls.written.push(unit.clone());
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EncodeError> {
        self.calls.lock().unwrap().order.push("muxer.stop");
        let was_started = self.state == MuxerState::Started;
        self.state = MuxerState::Stopped;
        if self.fail_on_stop && was_started {
            return Err(EncodeError::io("trailer write failed"));
        }
        Ok(())
    }

    fn release(&mut self) {
        self.calls.lock().unwrap().order.push("muxer.release");
        self.state = MuxerState::Released;
    }

    fn state(&self) -> MuxerState {
        self.state
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ListenerEvent {
    Progress(f32),
    Completed,
    Failed(ErrorKind, PipelineStage),
}

pub struct RecordingListener {
    pub events: Arc<Mutex<Vec<ListenerEvent>>>,
}

impl RecordingListener {
    pub fn new() -> (Self, Arc<Mutex<Vec<ListenerEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                events: events.clone(),
            },
            events,
        )
    }
}

impl EncodeListener for RecordingListener {
    fn on_progress(&mut self, fraction: f32) {
        self.events
            .lock()
            .unwrap()
            .push(ListenerEvent::Progress(fraction));
    }

    fn on_completed(&mut self) {
        self.events.lock().unwrap().push(ListenerEvent::Completed);
    }

    fn on_failed(&mut self, failure: &PipelineFailure) {
        self.events
            .lock()
            .unwrap()
            .push(ListenerEvent::Failed(failure.kind(), failure.stage()));
    }
}
