use crate::shared::access_unit::AccessUnit;
use crate::shared::encode_error::EncodeError;
use crate::shared::track_descriptor::TrackDescriptor;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncoderState {
    Unconfigured,
    Configured,
    Started,
    /// End of stream submitted; output is still being drained.
    Draining,
    Stopped,
    Released,
}

/// Result of a single `drain_once` poll.
#[derive(Clone, Debug, PartialEq)]
pub enum EncoderOutput {
    /// Emitted exactly once, before the first access unit, with the format
    /// the encoder actually settled on.
    FormatChanged(TrackDescriptor),
    AccessUnit(AccessUnit),
    /// Nothing ready yet; feed more input or poll again.
    Pending,
}

/// One stateful video encoder session.
///
/// Lifecycle: `configure → start → submit/drain_once* → submit(eos) →
/// drain_once* → stop → release`. `stop` and `release` are idempotent and
/// never fail so they can run on any teardown path.
pub trait VideoEncoder: Send {
    fn configure(&mut self, descriptor: &TrackDescriptor) -> Result<(), EncodeError>;

    fn start(&mut self) -> Result<(), EncodeError>;

    /// Queues one raw YUV 4:2:0 picture. With `end_of_stream` the buffer is
    /// ignored and no further input is accepted.
    fn submit(
        &mut self,
        buffer: &[u8],
        presentation_time_us: i64,
        end_of_stream: bool,
    ) -> Result<(), EncodeError>;

    fn drain_once(&mut self, timeout_us: u64) -> Result<EncoderOutput, EncodeError>;

    fn stop(&mut self);

    fn release(&mut self);

    fn state(&self) -> EncoderState;
}
