//! Voice recording
//!
//! A [`RecordingSession`] owns a capture device and a 1 s ticker. The ticker
//! publishes elapsed seconds and stops the device at the ceiling. The samples
//! become a WAV upload through [`RecordingSession::finish`], or through
//! [`RecordingSession::auto_stopped_upload`] once the ceiling was hit.

use std::io::Cursor;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::RecordingError;
use crate::timer::{ScopedTicker, TickControl};
use crate::transport::AudioUpload;

/// Shortest allowed recording ceiling, also the default
pub const MIN_RECORDING_SECS: u64 = 10;
/// Longest allowed recording ceiling
pub const MAX_RECORDING_SECS: u64 = 30;
/// File name given to finished recordings
pub const RECORDING_FILE_NAME: &str = "recording.wav";

/// Source of mono 16-bit PCM samples
pub trait CaptureDevice: Send {
    fn sample_rate(&self) -> u32;

    fn start(&mut self) -> Result<(), RecordingError>;

    /// Stop capturing and hand over everything captured so far
    fn stop(&mut self) -> Result<Vec<i16>, RecordingError>;
}

/// In-process device fed through [`SampleFeeder`] handles
#[derive(Debug)]
pub struct BufferedCapture {
    sample_rate: u32,
    buffer: Arc<Mutex<Vec<i16>>>,
    capturing: Arc<Mutex<bool>>,
}

/// Writer side of a [`BufferedCapture`]
#[derive(Debug, Clone)]
pub struct SampleFeeder {
    buffer: Arc<Mutex<Vec<i16>>>,
    capturing: Arc<Mutex<bool>>,
}

impl BufferedCapture {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            buffer: Arc::new(Mutex::new(Vec::new())),
            capturing: Arc::new(Mutex::new(false)),
        }
    }

    pub fn feeder(&self) -> SampleFeeder {
        SampleFeeder {
            buffer: Arc::clone(&self.buffer),
            capturing: Arc::clone(&self.capturing),
        }
    }
}

impl SampleFeeder {
    pub fn is_capturing(&self) -> bool {
        *self.capturing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append samples; ignored unless the device is capturing
    pub fn push(&self, samples: &[i16]) {
        let capturing = *self.capturing.lock().unwrap_or_else(PoisonError::into_inner);
        if capturing {
            self.buffer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend_from_slice(samples);
        }
    }
}

impl CaptureDevice for BufferedCapture {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start(&mut self) -> Result<(), RecordingError> {
        if self.sample_rate == 0 {
            return Err(RecordingError::Device("sample rate must be positive".to_string()));
        }
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner).clear();
        *self.capturing.lock().unwrap_or_else(PoisonError::into_inner) = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<Vec<i16>, RecordingError> {
        *self.capturing.lock().unwrap_or_else(PoisonError::into_inner) = false;
        Ok(std::mem::take(
            &mut *self.buffer.lock().unwrap_or_else(PoisonError::into_inner),
        ))
    }
}

/// Clamp a configured ceiling into the allowed range
pub fn clamp_limit(secs: u64) -> u64 {
    secs.clamp(MIN_RECORDING_SECS, MAX_RECORDING_SECS)
}

/// Device plus whatever it handed over when the ceiling stopped it
struct CaptureState {
    device: Box<dyn CaptureDevice>,
    stopped: Option<Result<Vec<i16>, RecordingError>>,
}

impl CaptureState {
    /// Stop the device once; later calls return the same samples
    fn stop_device(&mut self) -> Result<Vec<i16>, RecordingError> {
        if let Some(captured) = &self.stopped {
            return captured.clone();
        }
        let captured = self.device.stop();
        self.stopped = Some(captured.clone());
        captured
    }
}

fn lock_state(state: &Mutex<CaptureState>) -> MutexGuard<'_, CaptureState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One in-progress recording
pub struct RecordingSession {
    state: Arc<Mutex<CaptureState>>,
    sample_rate: u32,
    ticker: ScopedTicker,
    elapsed: watch::Receiver<u64>,
    limit_secs: u64,
}

impl RecordingSession {
    /// Start capturing; must be called from within a tokio runtime
    ///
    /// The device is stopped on the tick that reaches the ceiling.
    pub fn start(mut device: Box<dyn CaptureDevice>, limit_secs: u64) -> Result<Self, RecordingError> {
        let limit_secs = clamp_limit(limit_secs);
        device.start()?;
        let sample_rate = device.sample_rate();

        let state = Arc::new(Mutex::new(CaptureState {
            device,
            stopped: None,
        }));
        let tick_state = Arc::clone(&state);

        let (tx, elapsed) = watch::channel(0u64);
        let ticker = ScopedTicker::spawn(Duration::from_secs(1), move |tick| {
            if tick < limit_secs {
                tx.send_replace(tick);
                return TickControl::Continue;
            }

            if let Err(e) = lock_state(&tick_state).stop_device() {
                warn!("Capture device failed to stop at ceiling: {}", e);
            }
            info!("Recording reached {} s ceiling", limit_secs);
            tx.send_replace(tick);
            TickControl::Stop
        });

        info!(limit_secs, "Recording started");
        Ok(Self {
            state,
            sample_rate,
            ticker,
            elapsed,
            limit_secs,
        })
    }

    pub fn elapsed_secs(&self) -> u64 {
        *self.elapsed.borrow()
    }

    /// Receiver for elapsed-second updates
    pub fn watch_elapsed(&self) -> watch::Receiver<u64> {
        self.elapsed.clone()
    }

    pub fn limit_secs(&self) -> u64 {
        self.limit_secs
    }

    /// True once the ceiling has stopped the device
    pub fn is_auto_stopped(&self) -> bool {
        lock_state(&self.state).stopped.is_some()
    }

    /// Resolves when the ceiling is reached
    pub async fn wait_for_auto_stop(&self) {
        self.ticker.finished().await
    }

    /// The finished recording, once the ceiling has stopped the device
    ///
    /// Returns `None` while still capturing.
    pub fn auto_stopped_upload(&self) -> Option<Result<AudioUpload, RecordingError>> {
        let captured = lock_state(&self.state).stopped.clone()?;
        Some(captured.and_then(|samples| self.encode(samples)))
    }

    /// Stop capturing and encode the samples as a WAV upload
    ///
    /// Samples past the ceiling are dropped.
    pub fn finish(mut self) -> Result<AudioUpload, RecordingError> {
        self.ticker.stop();
        let samples = lock_state(&self.state).stop_device()?;
        self.encode(samples)
    }

    /// Stop capturing and throw the samples away
    pub fn cancel(mut self) {
        self.ticker.stop();
        if let Err(e) = lock_state(&self.state).stop_device() {
            debug!("Ignoring device error on cancel: {}", e);
        }
        info!("Recording cancelled");
    }

    fn encode(&self, mut samples: Vec<i16>) -> Result<AudioUpload, RecordingError> {
        let max_samples = (self.limit_secs as usize).saturating_mul(self.sample_rate as usize);
        samples.truncate(max_samples);

        let bytes = encode_wav(&samples, self.sample_rate)?;
        info!(samples = samples.len(), bytes = bytes.len(), "Recording finished");

        AudioUpload::new(RECORDING_FILE_NAME, bytes)
            .map_err(|e| RecordingError::Encoding(e.to_string()))
    }
}

/// Mono 16-bit PCM WAV in memory
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>, RecordingError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| RecordingError::Encoding(e.to_string()))?;
        for sample in samples {
            writer
                .write_sample(*sample)
                .map_err(|e| RecordingError::Encoding(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| RecordingError::Encoding(e.to_string()))?;
    }
    Ok(cursor.into_inner())
}
