use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};

use crate::encoding::infrastructure::ffmpeg_h264_encoder::FfmpegH264Encoder;
use crate::frames::infrastructure::image_file_source::ImageFileFrameSource;
use crate::muxing::infrastructure::ffmpeg_mp4_muxer::FfmpegMp4Muxer;
use crate::muxing::infrastructure::output_location::prepare_output_path;
use crate::pipeline::encode_listener::EncodeListener;
use crate::pipeline::encode_pipeline::EncodePipeline;
use crate::pipeline::pipeline_failure::{PipelineFailure, PipelineStage};
use crate::pipeline::pipeline_logger::LogPipelineLogger;
use crate::shared::encode_error::ErrorKind;
use crate::shared::encode_settings::EncodeSettings;

/// Messages sent from the worker thread to whoever started the encode.
#[derive(Clone, Debug, PartialEq)]
pub enum EncodeEvent {
    Progress(f32),
    Completed,
    Failed {
        kind: ErrorKind,
        stage: PipelineStage,
        message: String,
    },
    Cancelled,
}

/// Forwards listener callbacks into a channel. Sends are dropped silently
/// once the receiver is gone.
pub struct ChannelListener {
    tx: Sender<EncodeEvent>,
}

impl ChannelListener {
    pub fn new(tx: Sender<EncodeEvent>) -> Self {
        Self { tx }
    }
}

impl EncodeListener for ChannelListener {
    fn on_progress(&mut self, fraction: f32) {
        let _ = self.tx.send(EncodeEvent::Progress(fraction));
    }

    fn on_completed(&mut self) {
        let _ = self.tx.send(EncodeEvent::Completed);
    }

    fn on_failed(&mut self, failure: &PipelineFailure) {
        let _ = self.tx.send(failure_event(failure));
    }
}

fn failure_event(failure: &PipelineFailure) -> EncodeEvent {
    if failure.is_cancelled() {
        EncodeEvent::Cancelled
    } else {
        EncodeEvent::Failed {
            kind: failure.kind(),
            stage: failure.stage(),
            message: failure.error().to_string(),
        }
    }
}

/// A pipeline running on its own thread.
pub struct EncodeHandle {
    pub events: Receiver<EncodeEvent>,
    cancelled: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl EncodeHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Blocks until the worker exits. Returns `false` if it panicked.
    pub fn join(self) -> bool {
        self.thread.join().is_ok()
    }
}

/// Builds and runs a pipeline on a worker thread.
///
/// `build` receives the channel-backed listener and the shared cancel flag
/// and must wire both into the pipeline it returns. A build error is reported
/// as a single failure event.
pub fn spawn<F>(build: F) -> EncodeHandle
where
    F: FnOnce(Box<dyn EncodeListener>, Arc<AtomicBool>) -> Result<EncodePipeline, PipelineFailure>
        + Send
        + 'static,
{
    let (tx, rx) = crossbeam_channel::unbounded();
    let cancelled = Arc::new(AtomicBool::new(false));
    let worker_cancel = cancelled.clone();

    let thread = std::thread::spawn(move || {
        let listener = Box::new(ChannelListener::new(tx.clone()));
        match build(listener, worker_cancel) {
            Ok(mut pipeline) => {
                // Outcome already delivered through the listener.
                let _ = pipeline.execute();
            }
            Err(failure) => {
                log::warn!("Encode setup failed: {failure}");
                let _ = tx.send(failure_event(&failure));
            }
        }
    });

    EncodeHandle {
        events: rx,
        cancelled,
        thread,
    }
}

/// Encodes image files into an MP4 at `output_path` in the background,
/// creating the output directory when it is missing.
pub fn spawn_file_encode(
    settings: EncodeSettings,
    paths: Vec<PathBuf>,
    output_path: PathBuf,
) -> EncodeHandle {
    spawn(move |listener, cancelled| {
        let validate = |e| PipelineFailure::new(PipelineStage::Validate, e);
        settings.validate().map_err(validate)?;
        let source = ImageFileFrameSource::new(paths, settings.resolution).map_err(validate)?;
        prepare_output_path(&output_path).map_err(validate)?;
        let muxer = FfmpegMp4Muxer::create(&output_path)
            .map_err(|e| PipelineFailure::new(PipelineStage::Configure, e))?;

        log::info!("Writing {}", output_path.display());
        Ok(EncodePipeline::new(
            settings,
            Box::new(source),
            Box::new(FfmpegH264Encoder::new()),
            Box::new(muxer),
            listener,
        )
        .with_logger(Box::new(LogPipelineLogger::default()))
        .with_cancellation(cancelled))
    })
}
