pub const DEFAULT_FRAME_RATE: u32 = 30;

/// Ten seconds, split evenly across all input frames.
pub const DEFAULT_TOTAL_DURATION_US: u64 = 10_000_000;

pub const DEFAULT_BIT_RATE: u64 = 2_000_000;
pub const DEFAULT_KEYFRAME_INTERVAL_SECS: u32 = 1;

/// Timestamps travel through the pipeline in microseconds.
pub const MICROS_PER_SECOND: i64 = 1_000_000;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

pub const OUTPUT_FILE_PREFIX: &str = "output_";
pub const OUTPUT_FILE_EXTENSION: &str = "mp4";

/// Upper bound a single `drain_once` call may wait for encoder output.
pub const DRAIN_TIMEOUT_US: u64 = 10_000;

/// Consecutive empty polls tolerated while waiting for end-of-stream.
pub const MAX_IDLE_DRAIN_POLLS: usize = 1_000;
