use std::fmt;

use thiserror::Error;

use crate::shared::encode_error::{EncodeError, ErrorKind};

/// Step of an encode run that raised a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Validate,
    Read,
    Convert,
    Configure,
    Submit,
    Drain,
    Mux,
    Finalize,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Validate => "validate",
            PipelineStage::Read => "read",
            PipelineStage::Convert => "convert",
            PipelineStage::Configure => "configure",
            PipelineStage::Submit => "submit",
            PipelineStage::Drain => "drain",
            PipelineStage::Mux => "mux",
            PipelineStage::Finalize => "finalize",
        };
        f.write_str(name)
    }
}

/// An [`EncodeError`] tagged with the stage that raised it.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineFailure {
    stage: PipelineStage,
    #[source]
    source: EncodeError,
}

impl PipelineFailure {
    pub fn new(stage: PipelineStage, source: EncodeError) -> Self {
        Self { stage, source }
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }

    pub fn error(&self) -> &EncodeError {
        &self.source
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }
}
