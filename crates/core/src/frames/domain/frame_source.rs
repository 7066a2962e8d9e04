use crate::shared::encode_error::EncodeError;
use crate::shared::frame::Frame;

/// Finite, ordered sequence of RGB frames with stable dimensions.
///
/// The pipeline requests every index exactly once, in ascending order.
/// Implementations may load frames lazily.
pub trait FrameSource: Send {
    fn frame_count(&self) -> usize;

    /// Width and height every frame is expected to have.
    fn dimensions(&self) -> (u32, u32);

    fn frame(&mut self, index: usize) -> Result<Frame, EncodeError>;
}
