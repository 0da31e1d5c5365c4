//! Audio upload rules shared by the client and the gateway

use std::path::Path;

use crate::{Error, Result};

/// Largest accepted upload (10 MiB)
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Recognized audio containers: (extension, MIME type)
pub const SUPPORTED_FORMATS: [(&str, &str); 3] = [
    ("wav", "audio/wav"),
    ("mp3", "audio/mpeg"),
    ("m4a", "audio/mp4"),
];

/// MIME type for a file name with a recognized audio extension
pub fn content_type_for(file_name: &str) -> Option<&'static str> {
    let ext = Path::new(file_name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    SUPPORTED_FORMATS
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
}

/// Reject files that are not recognized audio or exceed the size cap
pub fn validate_upload(file_name: &str, len: usize) -> Result<&'static str> {
    let mime = content_type_for(file_name).ok_or_else(|| {
        Error::InvalidInput(format!(
            "'{}' is not a supported audio file (WAV, MP3, M4A)",
            file_name
        ))
    })?;
    if len == 0 {
        return Err(Error::InvalidInput(format!("'{}' is empty", file_name)));
    }
    if len > MAX_UPLOAD_BYTES {
        return Err(Error::InvalidInput(format!(
            "'{}' is {} bytes; the limit is {} bytes",
            file_name, len, MAX_UPLOAD_BYTES
        )));
    }
    Ok(mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_lookup() {
        assert_eq!(content_type_for("voice.wav"), Some("audio/wav"));
        assert_eq!(content_type_for("VOICE.MP3"), Some("audio/mpeg"));
        assert_eq!(content_type_for("clip.m4a"), Some("audio/mp4"));
        assert_eq!(content_type_for("notes.txt"), None);
        assert_eq!(content_type_for("wav"), None);
    }

    #[test]
    fn test_validate_upload_limits() {
        assert!(validate_upload("a.wav", 1024).is_ok());
        assert!(validate_upload("a.wav", 0).is_err());
        assert!(validate_upload("a.wav", MAX_UPLOAD_BYTES + 1).is_err());
        assert!(validate_upload("a.pdf", 10).is_err());
    }
}
