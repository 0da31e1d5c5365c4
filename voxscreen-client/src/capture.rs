//! Concrete capture devices
//!
//! [`StreamCapture`] reads raw signed 16-bit little-endian mono PCM from any
//! reader (for example `arecord -f S16_LE -c 1 -r 16000 | voxscreen record`).
//! With the `microphone` feature, [`MicrophoneCapture`] records from the
//! default input device through cpal.

use std::io::{ErrorKind, Read};
use std::thread;
use tracing::{debug, warn};

use crate::error::RecordingError;
use crate::recorder::{BufferedCapture, CaptureDevice, SampleFeeder};

const READ_CHUNK: usize = 4096;

/// PCM from a byte stream, pumped on its own thread
pub struct StreamCapture {
    inner: BufferedCapture,
    source: Option<Box<dyn Read + Send>>,
}

impl StreamCapture {
    pub fn new<R: Read + Send + 'static>(source: R, sample_rate: u32) -> Self {
        Self {
            inner: BufferedCapture::new(sample_rate),
            source: Some(Box::new(source)),
        }
    }
}

impl CaptureDevice for StreamCapture {
    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn start(&mut self) -> Result<(), RecordingError> {
        let mut source = self
            .source
            .take()
            .ok_or_else(|| RecordingError::Device("stream already consumed".to_string()))?;
        self.inner.start()?;

        let feeder = self.inner.feeder();
        thread::Builder::new()
            .name("pcm-capture".to_string())
            .spawn(move || {
                if let Err(e) = pump_pcm(&mut source, &feeder) {
                    warn!("PCM capture stopped: {}", e);
                }
            })
            .map_err(|e| RecordingError::Device(e.to_string()))?;
        Ok(())
    }

    fn stop(&mut self) -> Result<Vec<i16>, RecordingError> {
        self.inner.stop()
    }
}

/// Copy little-endian samples into `feeder` until EOF or the device stops
///
/// An odd trailing byte is carried over to the next read.
pub fn pump_pcm<R: Read + ?Sized>(source: &mut R, feeder: &SampleFeeder) -> std::io::Result<()> {
    let mut buf = [0u8; READ_CHUNK];
    let mut carry: Option<u8> = None;
    let mut samples = Vec::with_capacity(READ_CHUNK / 2);

    while feeder.is_capturing() {
        let read = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        samples.clear();
        let mut bytes = buf[..read].iter().copied();
        if let Some(low) = carry.take() {
            if let Some(high) = bytes.next() {
                samples.push(i16::from_le_bytes([low, high]));
            }
        }
        let rest: Vec<u8> = bytes.collect();
        let mut pairs = rest.chunks_exact(2);
        samples.extend(pairs.by_ref().map(|pair| i16::from_le_bytes([pair[0], pair[1]])));
        carry = pairs.remainder().first().copied();

        feeder.push(&samples);
    }

    debug!("PCM stream ended");
    Ok(())
}

#[cfg(feature = "microphone")]
pub use microphone::MicrophoneCapture;

#[cfg(feature = "microphone")]
mod microphone {
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::{SampleFormat, StreamConfig};
    use std::sync::mpsc;
    use std::thread::{self, JoinHandle};
    use tracing::{error, info};

    use crate::error::RecordingError;
    use crate::recorder::{BufferedCapture, CaptureDevice, SampleFeeder};

    /// Default input device, downmixed to mono
    ///
    /// The cpal stream lives on a dedicated thread; the sample rate is known
    /// once `start` has opened the device. The inner buffer's own rate is a
    /// placeholder.
    pub struct MicrophoneCapture {
        inner: BufferedCapture,
        sample_rate: u32,
        stop_tx: Option<mpsc::Sender<()>>,
        worker: Option<JoinHandle<()>>,
    }

    impl MicrophoneCapture {
        pub fn new() -> Self {
            Self {
                inner: BufferedCapture::new(1),
                sample_rate: 0,
                stop_tx: None,
                worker: None,
            }
        }
    }

    impl Default for MicrophoneCapture {
        fn default() -> Self {
            Self::new()
        }
    }

    fn downmix<T: Copy>(data: &[T], channels: usize, to_i16: impl Fn(T) -> i16) -> Vec<i16> {
        data.chunks(channels.max(1))
            .map(|frame| {
                let sum: i32 = frame.iter().map(|s| i32::from(to_i16(*s))).sum();
                (sum / frame.len() as i32) as i16
            })
            .collect()
    }

    fn open_stream(feeder: SampleFeeder) -> Result<(cpal::Stream, u32), RecordingError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| RecordingError::Device("No input device available".to_string()))?;
        let supported = device
            .default_input_config()
            .map_err(|e| RecordingError::Device(format!("Failed to get input config: {}", e)))?;

        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels() as usize;
        let format = supported.sample_format();
        let config: StreamConfig = supported.into();
        let err_fn = |err: cpal::StreamError| error!("Input stream error: {}", err);

        let stream = match format {
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    feeder.push(&downmix(data, channels, |s| {
                        (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
                    }));
                },
                err_fn,
                None,
            ),
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    feeder.push(&downmix(data, channels, |s| s));
                },
                err_fn,
                None,
            ),
            SampleFormat::U16 => device.build_input_stream(
                &config,
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    feeder.push(&downmix(data, channels, |s| (i32::from(s) - 32768) as i16));
                },
                err_fn,
                None,
            ),
            other => {
                return Err(RecordingError::Device(format!(
                    "Unsupported sample format: {:?}",
                    other
                )))
            }
        }
        .map_err(|e| RecordingError::Device(format!("Failed to build stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| RecordingError::Device(format!("Failed to start stream: {}", e)))?;
        info!(sample_rate, channels, "Microphone opened");
        Ok((stream, sample_rate))
    }

    impl CaptureDevice for MicrophoneCapture {
        fn sample_rate(&self) -> u32 {
            self.sample_rate
        }

        fn start(&mut self) -> Result<(), RecordingError> {
            let feeder = self.inner.feeder();
            let (ready_tx, ready_rx) = mpsc::channel();
            let (stop_tx, stop_rx) = mpsc::channel::<()>();

            // cpal streams are not Send; the worker owns it until told to stop
            let worker = thread::Builder::new()
                .name("microphone".to_string())
                .spawn(move || match open_stream(feeder) {
                    Ok((stream, rate)) => {
                        let _ = ready_tx.send(Ok(rate));
                        let _ = stop_rx.recv();
                        drop(stream);
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                })
                .map_err(|e| RecordingError::Device(e.to_string()))?;

            let rate = ready_rx
                .recv()
                .map_err(|_| RecordingError::Device("Microphone thread exited".to_string()))??;

            self.sample_rate = rate;
            self.inner.start()?;
            self.stop_tx = Some(stop_tx);
            self.worker = Some(worker);
            Ok(())
        }

        fn stop(&mut self) -> Result<Vec<i16>, RecordingError> {
            if let Some(stop_tx) = self.stop_tx.take() {
                let _ = stop_tx.send(());
            }
            if let Some(worker) = self.worker.take() {
                let _ = worker.join();
            }
            self.inner.stop()
        }
    }
}
