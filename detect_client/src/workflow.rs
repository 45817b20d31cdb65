//! Orchestration of the detection workflow.
//!
//! [`DetectionWorkflow`] owns the current image, the status machine and the last detection
//! result. Only one request may be outstanding at a time. Submitting is split in two phases so
//! that the caller can keep interacting with the workflow (e.g. reset it) while a request is in
//! flight:
//!
//! 1. [`DetectionWorkflow::begin_submit`] moves to `Analyzing` and hands out a
//!    [`PendingDetection`],
//! 2. [`PendingDetection::run`] performs the request and drives the progress estimate,
//! 3. [`DetectionWorkflow::finish_submit`] applies the outcome, unless the workflow has moved on
//!    in the meantime, in which case the response is dropped.
//!
//! [`DetectionWorkflow::submit`] runs all three phases in one go.
use std::{path::Path, sync::Arc, time::Duration};

use common::protocol::DetectionResult;
use image::RgbImage;
use tokio::sync::watch;

use crate::{
    client::DetectionClient,
    error::{DetectError, ExportError, WorkflowError},
    export::{self, ExportArtifact},
    progress::{Progress, ProgressTracker},
    render,
    sensors::CameraDevice,
    source::ImageSource,
    status::{RequestTicket, SystemStatus, WorkflowState},
};

/// A submitted request which has not been applied to the workflow yet.
pub struct PendingDetection {
    ticket: RequestTicket,
    source: ImageSource,
    progress: Arc<ProgressTracker>,
    progress_interval: Duration,
}

impl PendingDetection {
    pub fn ticket(&self) -> RequestTicket {
        self.ticket
    }

    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    /// Send the image to `client` and advance the progress estimate until the response arrives.
    pub async fn run<D>(&self, client: &D) -> Result<DetectionResult, DetectError>
    where
        D: DetectionClient + ?Sized,
    {
        let outcome = {
            let mut request = client.detect(&self.source);
            let mut ticker = tokio::time::interval(self.progress_interval);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    outcome = &mut request => break outcome,
                    _ = ticker.tick() => {
                        self.progress.advance(self.ticket);
                        log::debug!("Request {} at {:.0}%", self.ticket, self.progress.value());
                    }
                }
            }
        };

        // No effect once the workflow has moved on
        match &outcome {
            Ok(_) => self.progress.complete(self.ticket),
            Err(_) => self.progress.fail(self.ticket),
        };

        outcome
    }
}

pub struct DetectionWorkflow<C> {
    client: C,
    state: WorkflowState,
    error: Option<String>,
    camera: Option<Box<dyn CameraDevice>>,
    progress: Arc<ProgressTracker>,
    progress_interval: Duration,
    next_ticket: u64,
}

impl<C: DetectionClient> DetectionWorkflow<C> {
    pub fn new(client: C, progress_interval: Duration) -> Self {
        Self {
            client,
            state: WorkflowState::Idle,
            error: None,
            camera: None,
            progress: Arc::new(ProgressTracker::new()),
            progress_interval: progress_interval.max(Duration::from_millis(1)),
            next_ticket: 1,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn status(&self) -> SystemStatus {
        self.state.status()
    }

    pub fn source(&self) -> Option<&ImageSource> {
        self.state.source()
    }

    pub fn result(&self) -> Option<&DetectionResult> {
        self.state.result()
    }

    /// Message to show inline, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Watch the progress estimate. The receiver stays valid across submissions and resets.
    pub fn progress(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    pub fn progress_value(&self) -> f32 {
        self.progress.value()
    }

    /// Use `source` as the current image. Clears any previous result and error.
    pub fn load_source(&mut self, source: ImageSource) -> Result<(), WorkflowError> {
        if self.state.status() == SystemStatus::Analyzing {
            return Err(WorkflowError::AlreadyAnalyzing);
        }

        log::info!(
            "Loaded {} ({}, {} bytes)",
            source.origin_filename(),
            source.mime_type(),
            source.payload().len()
        );
        self.state
            .load(source)
            .map_err(|_| WorkflowError::AlreadyAnalyzing)?;
        self.error = None;

        Ok(())
    }

    /// Load an image file from disk.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<(), WorkflowError> {
        match ImageSource::from_file(path) {
            Ok(source) => self.load_source(source),
            Err(err) => Err(self.surface(err.into())),
        }
    }

    /// Open the camera panel. The device is held until a snapshot was taken, the panel is closed
    /// or the workflow is reset.
    pub fn open_camera(&mut self, camera: Box<dyn CameraDevice>) {
        log::debug!("Camera opened");
        self.camera = Some(camera);
    }

    pub fn close_camera(&mut self) {
        if self.camera.take().is_some() {
            log::debug!("Camera released");
        }
    }

    pub fn camera_open(&self) -> bool {
        self.camera.is_some()
    }

    /// Take a snapshot with the open camera and use it as the current image.
    pub fn capture(&mut self) -> Result<(), WorkflowError> {
        let snapshot = match self.camera.as_mut() {
            Some(camera) => camera.snapshot(),
            None => return Err(WorkflowError::CameraClosed),
        };

        let source = match snapshot {
            Ok(uri) => ImageSource::from_data_uri(&uri).map_err(WorkflowError::from),
            Err(err) => Err(err.into()),
        };

        match source {
            Ok(source) => {
                self.load_source(source)?;
                self.close_camera();
                Ok(())
            }
            Err(err) => Err(self.surface(err)),
        }
    }

    /// Move to `Analyzing` and hand out the request to run.
    pub fn begin_submit(&mut self) -> Result<PendingDetection, WorkflowError> {
        match self.state.status() {
            SystemStatus::Idle => return Err(self.surface(WorkflowError::NoImageSelected)),
            SystemStatus::Analyzing => return Err(WorkflowError::AlreadyAnalyzing),
            _ => (),
        }

        let ticket = RequestTicket(self.next_ticket);
        let source = self
            .state
            .begin(ticket)
            .map_err(|_| WorkflowError::AlreadyAnalyzing)?;
        self.next_ticket += 1;
        self.error = None;
        self.progress.start(ticket);

        log::info!(
            "Submitting {} for detection (request {})",
            source.origin_filename(),
            ticket
        );

        Ok(PendingDetection {
            ticket,
            source,
            progress: Arc::clone(&self.progress),
            progress_interval: self.progress_interval,
        })
    }

    /// Apply the outcome of the request with `ticket`.
    ///
    /// Returns `Ok(None)` if the workflow has moved on since the request was submitted. The
    /// outcome is discarded then.
    pub fn finish_submit(
        &mut self,
        ticket: RequestTicket,
        outcome: Result<DetectionResult, DetectError>,
    ) -> Result<Option<&DetectionResult>, WorkflowError> {
        match outcome {
            Ok(result) => {
                let num_detections = result.detections.len();
                if let Err(err) = self.state.complete(ticket, result) {
                    log::warn!("Discarding detection result: {}", err);
                    return Ok(None);
                }
                log::info!(
                    "Request {} complete with {} detections",
                    ticket,
                    num_detections
                );
                Ok(self.state.result())
            }
            Err(err) => {
                if let Err(stale) = self.state.fail(ticket) {
                    log::warn!("Discarding detection error ({}): {}", err, stale);
                    return Ok(None);
                }
                log::error!("Request {} failed: {}", ticket, err);
                Err(self.surface(err.into()))
            }
        }
    }

    /// Submit the current image and wait for the result.
    pub async fn submit(&mut self) -> Result<&DetectionResult, WorkflowError> {
        let pending = self.begin_submit()?;
        let outcome = pending.run(&self.client).await;
        self.finish_submit(pending.ticket(), outcome)?;

        self.state.result().ok_or(WorkflowError::NotReady)
    }

    /// Render the current detections onto the current image.
    pub fn render(&self) -> Result<RgbImage, WorkflowError> {
        match (self.state.source(), self.state.result()) {
            (Some(source), Some(result)) => Ok(render::render(source, &result.detections)?),
            _ => Err(WorkflowError::NotReady),
        }
    }

    /// Export the current result. Does nothing if there is none.
    pub fn export(&self) -> Result<Option<ExportArtifact>, WorkflowError> {
        match export::export(self.state.result()) {
            Ok(artifact) => Ok(Some(artifact)),
            Err(ExportError::NoResult) => {
                log::debug!("Nothing to export");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Drop image, result, error and camera. An outstanding request is not aborted, its
    /// response will be discarded.
    pub fn reset(&mut self) {
        if let Some(ticket) = self.state.ticket() {
            log::info!("Reset while request {} is outstanding", ticket);
        }
        self.state.reset();
        self.error = None;
        self.close_camera();
        self.progress.clear();
    }

    /// Show `err` as inline message and pass it on.
    fn surface(&mut self, err: WorkflowError) -> WorkflowError {
        self.error = Some(err.to_string());
        err
    }
}
