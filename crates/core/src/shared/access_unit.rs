#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AccessUnitFlags {
    pub keyframe: bool,
    /// Payload carries only decoder configuration (SPS/PPS), not picture data.
    pub codec_config: bool,
    pub end_of_stream: bool,
}

/// One compressed chunk emitted by the encoder.
#[derive(Clone, Debug, PartialEq)]
pub struct AccessUnit {
    pub data: Vec<u8>,
    pub pts_us: i64,
    /// Presentation duration; zero when the encoder did not report one.
    pub duration_us: i64,
    pub flags: AccessUnitFlags,
}

impl AccessUnit {
    pub fn new(data: Vec<u8>, pts_us: i64, keyframe: bool) -> Self {
        Self {
            data,
            pts_us,
            duration_us: 0,
            flags: AccessUnitFlags {
                keyframe,
                ..AccessUnitFlags::default()
            },
        }
    }

    /// Empty marker signalling that the encoder has been fully flushed.
    pub fn end_of_stream(pts_us: i64) -> Self {
        Self {
            data: Vec::new(),
            pts_us,
            duration_us: 0,
            flags: AccessUnitFlags {
                end_of_stream: true,
                ..AccessUnitFlags::default()
            },
        }
    }

    /// Whether this unit carries picture data the muxer should store.
    pub fn has_sample(&self) -> bool {
        !self.data.is_empty() && !self.flags.codec_config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sets_keyframe_only() {
        let unit = AccessUnit::new(vec![1, 2], 40, true);
        assert!(unit.flags.keyframe);
        assert!(!unit.flags.codec_config);
        assert!(!unit.flags.end_of_stream);
        assert!(unit.has_sample());
    }

    #[test]
    fn test_end_of_stream_has_no_sample() {
        let unit = AccessUnit::end_of_stream(1_000);
        assert!(unit.flags.end_of_stream);
        assert!(!unit.has_sample());
        assert_eq!(unit.pts_us, 1_000);
    }

    #[test]
    fn test_codec_config_is_not_a_sample() {
        let mut unit = AccessUnit::new(vec![0, 0, 0, 1, 0x67], 0, false);
        unit.flags.codec_config = true;
        assert!(!unit.has_sample());
    }

    #[test]
    fn test_zero_length_is_not_a_sample() {
        assert!(!AccessUnit::new(Vec::new(), 0, true).has_sample());
    }
}
