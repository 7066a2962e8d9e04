#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VideoCodec {
    H264,
}

impl VideoCodec {
    pub fn mime_type(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "video/avc",
        }
    }
}

/// Format of the single video track written to the container.
///
/// The pipeline builds a requested descriptor to configure the encoder; the
/// encoder answers with the negotiated one, which is what the muxer sees.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackDescriptor {
    pub codec: VideoCodec,
    pub width: u32,
    pub height: u32,
    pub bit_rate: u64,
    pub frame_rate: u32,
    pub keyframe_interval_secs: u32,
    /// Out-of-band codec configuration (H.264 SPS/PPS). Empty until negotiated.
    pub codec_config: Vec<u8>,
}

impl TrackDescriptor {
    pub fn h264(
        width: u32,
        height: u32,
        bit_rate: u64,
        frame_rate: u32,
        keyframe_interval_secs: u32,
    ) -> Self {
        Self {
            codec: VideoCodec::H264,
            width,
            height,
            bit_rate,
            frame_rate,
            keyframe_interval_secs,
            codec_config: Vec::new(),
        }
    }

    /// Keyframe distance in frames. An interval of zero makes every frame a keyframe.
    pub fn keyframe_interval_frames(&self) -> u32 {
        self.frame_rate
            .saturating_mul(self.keyframe_interval_secs)
            .max(1)
    }
}
