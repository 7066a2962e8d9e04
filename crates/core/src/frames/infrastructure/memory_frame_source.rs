use crate::frames::domain::frame_source::FrameSource;
use crate::shared::encode_error::EncodeError;
use crate::shared::frame::Frame;

/// Frames already decoded into memory.
///
/// Each frame is handed out by value and dropped from the source, so a
/// frame can be read once.
pub struct MemoryFrameSource {
    frames: Vec<Option<Frame>>,
    width: u32,
    height: u32,
}

impl MemoryFrameSource {
    /// Dimensions come from the first frame; an empty source reports `(0, 0)`.
    pub fn new(frames: Vec<Frame>) -> Self {
        let (width, height) = frames
            .first()
            .map(|f| (f.width(), f.height()))
            .unwrap_or((0, 0));
        Self::with_dimensions(frames, width, height)
    }

    pub fn with_dimensions(frames: Vec<Frame>, width: u32, height: u32) -> Self {
        Self {
            frames: frames.into_iter().map(Some).collect(),
            width,
            height,
        }
    }

    /// One solid-colour frame per entry of `colors`.
    pub fn solid_colors(width: u32, height: u32, colors: &[[u8; 3]]) -> Self {
        let frames = colors
            .iter()
            .enumerate()
            .map(|(i, &rgb)| Frame::filled(width, height, rgb, i))
            .collect();
        Self::with_dimensions(frames, width, height)
    }
}

impl FrameSource for MemoryFrameSource {
    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn frame(&mut self, index: usize) -> Result<Frame, EncodeError> {
        let count = self.frames.len();
        let slot = self.frames.get_mut(index).ok_or_else(|| {
            EncodeError::resource(format!("frame {index} out of range for {count} frames"))
        })?;
        slot.take()
            .ok_or_else(|| EncodeError::resource(format!("frame {index} was already consumed")))
    }
}
