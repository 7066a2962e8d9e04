use crate::encoding::domain::video_encoder::VideoEncoder;
use crate::muxing::domain::muxer::{Muxer, TrackHandle};
use crate::shared::access_unit::AccessUnit;
use crate::shared::encode_error::EncodeError;
use crate::shared::track_descriptor::TrackDescriptor;

/// Owns the encoder and muxer for one run and tears both down exactly once.
///
/// Teardown order is muxer stop, muxer release, encoder stop, encoder
/// release. It runs from [`finish`](Self::finish) on success, or from
/// [`release`](Self::release) / `Drop` on failure and unwinding.
pub struct EncodeSession {
    encoder: Box<dyn VideoEncoder>,
    muxer: Box<dyn Muxer>,
    track: Option<TrackHandle>,
    released: bool,
}

impl EncodeSession {
    pub fn new(encoder: Box<dyn VideoEncoder>, muxer: Box<dyn Muxer>) -> Self {
        Self {
            encoder,
            muxer,
            track: None,
            released: false,
        }
    }

    pub fn encoder_mut(&mut self) -> &mut dyn VideoEncoder {
        self.encoder.as_mut()
    }

    pub fn track(&self) -> Option<TrackHandle> {
        self.track
    }

    /// Registers the negotiated format with the muxer and writes the header.
    pub fn open_track(&mut self, descriptor: &TrackDescriptor) -> Result<TrackHandle, EncodeError> {
        if self.track.is_some() {
            return Err(EncodeError::codec("track already opened for this session"));
        }
        let handle = self.muxer.add_track(descriptor)?;
        self.muxer.start()?;
        self.track = Some(handle);
        Ok(handle)
    }

    pub fn write(&mut self, unit: &AccessUnit) -> Result<(), EncodeError> {
        let track = self
            .track
            .ok_or_else(|| EncodeError::codec("access unit arrived before the output format"))?;
        self.muxer.write_sample(track, unit)
    }

    /// Finalizes the container and releases everything. Returns the result of
    /// writing the trailer.
    pub fn finish(mut self) -> Result<(), EncodeError> {
        self.released = true;
        let stopped = self.muxer.stop();
        self.muxer.release();
        self.encoder.stop();
        self.encoder.release();
        stopped
    }

    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.muxer.stop() {
            log::warn!("Muxer stop during teardown failed: {e}");
        }
        self.muxer.release();
        self.encoder.stop();
        self.encoder.release();
    }
}

impl Drop for EncodeSession {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::domain::video_encoder::EncoderOutput;
    use crate::pipeline::test_support::{shared_calls, StubEncoder, StubMuxer};
    use crate::shared::encode_error::ErrorKind;

    fn session() -> (EncodeSession, crate::pipeline::test_support::SharedCalls) {
        let calls = shared_calls();
        let session = EncodeSession::new(
            Box::new(StubEncoder::new(calls.clone())),
            Box::new(StubMuxer::new(calls.clone())),
        );
        (session, calls)
    }

    const TEARDOWN: [&str; 4] = ["muxer.stop", "muxer.release", "encoder.stop", "encoder.release"];

    #[test]
    fn test_drop_releases_once_in_order() {
        let (mut session, calls) = session();
        session.release();
        session.release();
        drop(session);
        assert_eq!(calls.lock().unwrap().order, TEARDOWN);
    }

    #[test]
    fn test_finish_tears_down_once() {
        let (session, calls) = session();
        session.finish().unwrap();
        assert_eq!(calls.lock().unwrap().order, TEARDOWN);
    }

    #[test]
    fn test_write_before_track_is_codec_error() {
        let (mut session, _calls) = session();
        let err = session
            .write(&AccessUnit::new(vec![1], 0, true))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Codec);
    }

    #[test]
    fn test_open_track_once() {
        let (mut session, calls) = session();
        let descriptor = TrackDescriptor::h264(4, 4, 1_000, 30, 1);
        session.encoder_mut().configure(&descriptor).unwrap();
        assert_eq!(
            session.encoder_mut().drain_once(0).unwrap(),
            EncoderOutput::Pending
        );
        let handle = session.open_track(&descriptor).unwrap();
        assert_eq!(session.track(), Some(handle));
        assert_eq!(
            session.open_track(&descriptor).unwrap_err().kind(),
            ErrorKind::Codec
        );
        session.write(&AccessUnit::new(vec![9], 0, true)).unwrap();
        assert_eq!(calls.lock().unwrap().tracks.len(), 1);
        assert_eq!(calls.lock().unwrap().written.len(), 1);
    }
}
