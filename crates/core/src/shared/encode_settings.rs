use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::shared::constants::{
    DEFAULT_BIT_RATE, DEFAULT_FRAME_RATE, DEFAULT_KEYFRAME_INTERVAL_SECS,
    DEFAULT_TOTAL_DURATION_US, MICROS_PER_SECOND,
};
use crate::shared::encode_error::EncodeError;
use crate::shared::track_descriptor::TrackDescriptor;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const SQUARE_720: Resolution = Resolution {
        width: 720,
        height: 720,
    };
    pub const VGA: Resolution = Resolution {
        width: 640,
        height: 480,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::SQUARE_720
    }
}

/// Which parameter drives presentation timestamps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timing {
    /// Total video length, divided evenly across all frames.
    TotalDurationUs(u64),
    /// Fixed rate; each frame lasts `1s / fps`.
    FrameRate(u32),
}

impl Timing {
    /// Rate-driven timing at the default 30 fps.
    pub fn default_frame_rate() -> Self {
        Timing::FrameRate(DEFAULT_FRAME_RATE)
    }
}

impl Default for Timing {
    fn default() -> Self {
        Timing::TotalDurationUs(DEFAULT_TOTAL_DURATION_US)
    }
}

/// Per-run timing derived from the settings and the number of frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameTiming {
    pub frame_duration_us: i64,
    /// Nominal rate signalled to the encoder and container.
    pub frame_rate: u32,
}

impl FrameTiming {
    pub fn presentation_time_us(&self, index: usize) -> i64 {
        index as i64 * self.frame_duration_us
    }
}

/// Caller-facing options for one encode run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeSettings {
    pub resolution: Resolution,
    pub timing: Timing,
    pub bit_rate: u64,
    pub keyframe_interval_secs: u32,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            timing: Timing::default(),
            bit_rate: DEFAULT_BIT_RATE,
            keyframe_interval_secs: DEFAULT_KEYFRAME_INTERVAL_SECS,
        }
    }
}

impl EncodeSettings {
    /// Reads settings from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, EncodeError> {
        let json = fs::read_to_string(path).map_err(|e| {
            EncodeError::resource(format!("cannot read settings {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, EncodeError> {
        serde_json::from_str(json)
            .map_err(|e| EncodeError::configuration(format!("malformed settings: {e}")))
    }

    pub fn validate(&self) -> Result<(), EncodeError> {
        let Resolution { width, height } = self.resolution;
        if width == 0 || height == 0 {
            return Err(EncodeError::configuration(format!(
                "resolution must be non-zero, got {width}x{height}"
            )));
        }
        if width % 2 != 0 || height % 2 != 0 {
            return Err(EncodeError::configuration(format!(
                "4:2:0 output needs even dimensions, got {width}x{height}"
            )));
        }
        if self.bit_rate == 0 {
            return Err(EncodeError::configuration("bit rate must be positive"));
        }
        match self.timing {
            Timing::TotalDurationUs(0) => {
                Err(EncodeError::configuration("total duration must be positive"))
            }
            Timing::TotalDurationUs(total) if total > i64::MAX as u64 => Err(
                EncodeError::configuration(format!("total duration of {total}us is too long")),
            ),
            Timing::FrameRate(0) => Err(EncodeError::configuration("frame rate must be positive")),
            _ => Ok(()),
        }
    }

    pub fn frame_timing(&self, frame_count: usize) -> Result<FrameTiming, EncodeError> {
        if frame_count == 0 {
            return Err(EncodeError::configuration("no frames to encode"));
        }
        let micros = MICROS_PER_SECOND as u64;
        match self.timing {
            Timing::TotalDurationUs(total) => {
                let count = frame_count as u64;
                let frame_duration = total / count;
                if frame_duration == 0 {
                    return Err(EncodeError::configuration(format!(
                        "duration of {total}us is too short for {frame_count} frames"
                    )));
                }
                let frame_duration_us = i64::try_from(total)
                    .map(|_| frame_duration as i64)
                    .map_err(|_| {
                        EncodeError::configuration(format!(
                            "total duration of {total}us is too long"
                        ))
                    })?;
                let rate = (count.saturating_mul(micros) + total / 2) / total;
                Ok(FrameTiming {
                    frame_duration_us,
                    frame_rate: rate.clamp(1, u32::MAX as u64) as u32,
                })
            }
            Timing::FrameRate(fps) => {
                let frame_duration = micros / fps.max(1) as u64;
                if fps == 0 || frame_duration == 0 {
                    return Err(EncodeError::configuration(format!(
                        "unsupported frame rate {fps}"
                    )));
                }
                Ok(FrameTiming {
                    frame_duration_us: frame_duration as i64,
                    frame_rate: fps,
                })
            }
        }
    }

    /// The descriptor the encoder is asked to honour.
    pub fn requested_track(&self, timing: &FrameTiming) -> TrackDescriptor {
        TrackDescriptor::h264(
            self.resolution.width,
            self.resolution.height,
            self.bit_rate,
            timing.frame_rate,
            self.keyframe_interval_secs,
        )
    }
}
