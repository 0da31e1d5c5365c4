//! Audio upload and recording form
//!
//! The form holds at most one of: nothing, a selected file, or a recording
//! in progress. Choosing a file while recording is refused; starting a
//! recording discards the selected file.

use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::error::AnalysisError;
use crate::recorder::{CaptureDevice, RecordingSession};
use crate::sequencing::{Analyzer, SubmitGate, SubmitOutcome};
use crate::timer::UploadProgress;
use crate::transport::AudioUpload;

const NO_FILE: &str = "Please upload or record an audio file first.";
const RECORDING_ACTIVE: &str = "Stop the current recording first.";
const NOT_RECORDING: &str = "No recording in progress.";

/// What the form currently holds
#[derive(Default)]
pub enum AudioSelection {
    #[default]
    Empty,
    File(AudioUpload),
    Recording(RecordingSession),
}

#[derive(Default)]
pub struct AudioUploadForm {
    selection: AudioSelection,
    gate: SubmitGate,
    progress: Arc<AtomicU8>,
}

impl AudioUploadForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick a file from disk
    pub fn select_file(&mut self, path: &Path) -> Result<&AudioUpload, AnalysisError> {
        self.ensure_not_recording()?;
        let upload = AudioUpload::from_path(path)?;
        self.replace_file(upload)
    }

    /// Accept bytes already in memory (drag and drop)
    pub fn drop_file(&mut self, file_name: &str, bytes: Vec<u8>) -> Result<&AudioUpload, AnalysisError> {
        self.ensure_not_recording()?;
        let upload = AudioUpload::new(file_name, bytes)?;
        self.replace_file(upload)
    }

    /// Begin recording, discarding any selected file
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_recording(
        &mut self,
        device: Box<dyn CaptureDevice>,
        limit_secs: u64,
    ) -> Result<&RecordingSession, AnalysisError> {
        self.ensure_not_recording()?;
        let session = RecordingSession::start(device, limit_secs)?;
        self.selection = AudioSelection::Recording(session);

        match &self.selection {
            AudioSelection::Recording(session) => Ok(session),
            _ => Err(AnalysisError::Validation(NOT_RECORDING.to_string())),
        }
    }

    /// Stop recording and keep the result as the active file
    pub fn finish_recording(&mut self) -> Result<&AudioUpload, AnalysisError> {
        match std::mem::take(&mut self.selection) {
            AudioSelection::Recording(session) => {
                let upload = session.finish()?;
                self.replace_file(upload)
            }
            other => {
                self.selection = other;
                Err(AnalysisError::Validation(NOT_RECORDING.to_string()))
            }
        }
    }

    /// Stop recording and keep nothing
    pub fn cancel_recording(&mut self) {
        if let AudioSelection::Recording(session) = std::mem::take(&mut self.selection) {
            session.cancel();
        }
    }

    /// Drop whatever the form holds; an active recording is cancelled
    pub fn clear(&mut self) {
        self.cancel_recording();
        self.selection = AudioSelection::Empty;
    }

    pub fn selection(&self) -> &AudioSelection {
        &self.selection
    }

    pub fn active_file(&self) -> Option<&AudioUpload> {
        match &self.selection {
            AudioSelection::File(upload) => Some(upload),
            _ => None,
        }
    }

    pub fn recording(&self) -> Option<&RecordingSession> {
        match &self.selection {
            AudioSelection::Recording(session) => Some(session),
            _ => None,
        }
    }

    pub fn is_submitting(&self) -> bool {
        self.gate.is_busy()
    }

    /// Simulated upload progress of the current or last submission
    pub fn upload_progress(&self) -> u8 {
        self.progress.load(Ordering::Acquire)
    }

    /// Replace a recording stopped by its ceiling with the finished file
    ///
    /// Returns the active file, if any. A recording still capturing is left
    /// alone.
    pub fn settle_recording(&mut self) -> Result<Option<&AudioUpload>, AnalysisError> {
        let auto_stopped = self.recording().is_some_and(RecordingSession::is_auto_stopped);
        if auto_stopped {
            self.finish_recording()?;
        }
        Ok(self.active_file())
    }

    /// Send the active file, or a recording already stopped by its ceiling
    pub async fn submit(&self, analyzer: &Analyzer) -> Result<SubmitOutcome, AnalysisError> {
        let recorded;
        let upload = match &self.selection {
            AudioSelection::File(upload) => upload,
            AudioSelection::Recording(session) => match session.auto_stopped_upload() {
                Some(finished) => {
                    recorded = finished?;
                    &recorded
                }
                None => return Err(AnalysisError::Validation(RECORDING_ACTIVE.to_string())),
            },
            AudioSelection::Empty => return Err(AnalysisError::Validation(NO_FILE.to_string())),
        };

        // Claimed before progress starts so a refused submit leaves it alone
        let in_flight = self.gate.try_acquire()?;

        info!(file = %upload.file_name, bytes = upload.len(), "Submitting audio");
        let progress = UploadProgress::start(Arc::clone(&self.progress));
        let outcome = analyzer
            .run_claimed(in_flight, analyzer.transport().analyze_audio(upload))
            .await;
        progress.finish();

        outcome
    }

    fn ensure_not_recording(&self) -> Result<(), AnalysisError> {
        if matches!(self.selection, AudioSelection::Recording(_)) {
            return Err(AnalysisError::Validation(RECORDING_ACTIVE.to_string()));
        }
        Ok(())
    }

    fn replace_file(&mut self, upload: AudioUpload) -> Result<&AudioUpload, AnalysisError> {
        info!(file = %upload.file_name, bytes = upload.len(), "Audio file selected");
        self.selection = AudioSelection::File(upload);
        self.active_file()
            .ok_or_else(|| AnalysisError::Validation(NO_FILE.to_string()))
    }
}
