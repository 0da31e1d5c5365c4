//! Request builders
//!
//! Each form validates its own input, holds its own [`SubmitGate`] and hands
//! the request to the shared [`Analyzer`](crate::sequencing::Analyzer).
//!
//! [`SubmitGate`]: crate::sequencing::SubmitGate

pub mod audio;
pub mod manual;

pub use audio::{AudioSelection, AudioUploadForm};
pub use manual::ManualEntryForm;
