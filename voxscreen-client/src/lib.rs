//! voxscreen-client library
//!
//! Everything the voxscreen front end does besides drawing: building
//! analysis requests from the manual and audio forms, sequencing them
//! against the gateway, recording voice samples, and the mock session and
//! patient registry.

pub mod capture;
pub mod display;
pub mod error;
pub mod forms;
pub mod recorder;
pub mod registry;
pub mod sequencing;
pub mod session;
pub mod timer;
pub mod transport;

pub use error::{AnalysisError, RecordingError, RegistryError, SessionError, TransportError};
pub use forms::{AudioUploadForm, ManualEntryForm};
pub use sequencing::{Analyzer, ResultBoard, SubmitOutcome};
pub use session::AppSession;
pub use transport::{AudioUpload, GatewayClient, PredictionTransport};
