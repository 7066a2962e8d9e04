use crate::shared::access_unit::AccessUnit;
use crate::shared::encode_error::EncodeError;
use crate::shared::track_descriptor::TrackDescriptor;

/// Opaque reference to a track returned by [`Muxer::add_track`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TrackHandle(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MuxerState {
    Created,
    TrackAdded,
    Started,
    Stopped,
    Released,
}

/// One container-writer session holding a single video track.
///
/// Lifecycle: `add_track → start → write_sample* → stop → release`.
/// `stop` is idempotent; `release` is idempotent and never fails.
pub trait Muxer: Send {
    fn add_track(&mut self, descriptor: &TrackDescriptor) -> Result<TrackHandle, EncodeError>;

    /// Writes the container header.
    fn start(&mut self) -> Result<(), EncodeError>;

    fn write_sample(&mut self, track: TrackHandle, unit: &AccessUnit) -> Result<(), EncodeError>;

    /// Finalizes index and metadata.
    fn stop(&mut self) -> Result<(), EncodeError>;

    fn release(&mut self);

    fn state(&self) -> MuxerState;
}

/// Rejects samples whose timestamp goes backwards on a track.
#[derive(Clone, Debug, Default)]
pub struct SampleClock {
    last_pts_us: Option<i64>,
}

impl SampleClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, pts_us: i64) -> Result<(), EncodeError> {
        if let Some(last) = self.last_pts_us {
            if pts_us < last {
                return Err(EncodeError::codec(format!(
                    "sample at {pts_us}us is earlier than previous sample at {last}us"
                )));
            }
        }
        self.last_pts_us = Some(pts_us);
        Ok(())
    }

    pub fn last_pts_us(&self) -> Option<i64> {
        self.last_pts_us
    }
}
