use super::pipeline_failure::PipelineFailure;

/// Caller-facing outcome of an encode run.
///
/// `on_progress` values never decrease. Exactly one of `on_completed` or
/// `on_failed` is called, after the last progress report.
pub trait EncodeListener: Send {
    /// Fraction of frames submitted, in `(0, 1]`.
    fn on_progress(&mut self, fraction: f32);

    fn on_completed(&mut self);

    fn on_failed(&mut self, failure: &PipelineFailure);
}
