//! Recording destination value object

use std::fmt;
use std::path::{Path, PathBuf};

use crate::domain::error::DestinationError;

/// Container/codec the destination file is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContainerFormat {
    /// AAC in an ADTS stream (the default when the extension says nothing)
    #[default]
    AacAdts,
    /// AAC in an MPEG-4 container
    M4a,
    /// MPEG-1 Layer III
    Mp3,
    /// Opus in Ogg
    Opus,
    /// Lossless FLAC
    Flac,
    /// Uncompressed 16-bit PCM WAV
    Wav,
}

impl ContainerFormat {
    /// Resolve a format from a file extension (case-insensitive)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "aac" | "adts" => Some(Self::AacAdts),
            "m4a" | "mp4" => Some(Self::M4a),
            "mp3" => Some(Self::Mp3),
            "ogg" | "opus" => Some(Self::Opus),
            "flac" => Some(Self::Flac),
            "wav" | "wave" => Some(Self::Wav),
            _ => None,
        }
    }

    /// Whether the bitrate setting applies to this format
    pub const fn is_lossy(&self) -> bool {
        matches!(self, Self::AacAdts | Self::M4a | Self::Mp3 | Self::Opus)
    }

    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AacAdts => "aac",
            Self::M4a => "m4a",
            Self::Mp3 => "mp3",
            Self::Opus => "opus",
            Self::Flac => "flac",
            Self::Wav => "wav",
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Validated output file path for one recording session.
///
/// A destination is never empty; the container format is derived from the
/// extension once, at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    path: PathBuf,
    format: ContainerFormat,
}

impl Destination {
    /// Validate a caller-supplied path.
    ///
    /// `None` models a missing argument on the command surface.
    pub fn parse(input: Option<&str>) -> Result<Self, DestinationError> {
        let raw = input.ok_or(DestinationError::Missing)?;
        if raw.trim().is_empty() {
            return Err(DestinationError::Blank);
        }
        Self::from_path(raw)
    }

    /// Build a destination from a path, resolving the container format
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, DestinationError> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(DestinationError::Blank);
        }
        if path.is_dir() {
            return Err(DestinationError::IsDirectory(path.display().to_string()));
        }
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(ContainerFormat::from_extension)
            .unwrap_or_default();
        Ok(Self { path, format })
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the container format
    pub fn format(&self) -> ContainerFormat {
        self.format
    }

    /// Path rendered for the command surface
    pub fn to_local_path(&self) -> String {
        self.path.to_string_lossy().to_string()
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_is_rejected() {
        assert_eq!(Destination::parse(None), Err(DestinationError::Missing));
    }

    #[test]
    fn blank_path_is_rejected() {
        assert_eq!(Destination::parse(Some("")), Err(DestinationError::Blank));
        assert_eq!(Destination::parse(Some("   ")), Err(DestinationError::Blank));
    }

    #[test]
    fn directory_is_rejected() {
        let dir = std::env::temp_dir();
        let result = Destination::from_path(&dir);
        assert!(matches!(result, Err(DestinationError::IsDirectory(_))));
    }

    #[test]
    fn format_follows_extension() {
        let cases = [
            ("/tmp/a.m4a", ContainerFormat::M4a),
            ("/tmp/a.AAC", ContainerFormat::AacAdts),
            ("/tmp/a.flac", ContainerFormat::Flac),
            ("/tmp/a.wav", ContainerFormat::Wav),
            ("/tmp/a.mp3", ContainerFormat::Mp3),
            ("/tmp/a.opus", ContainerFormat::Opus),
        ];
        for (path, expected) in cases {
            let dest = Destination::parse(Some(path)).unwrap();
            assert_eq!(dest.format(), expected, "{}", path);
        }
    }

    #[test]
    fn unknown_extension_defaults_to_adts() {
        let dest = Destination::parse(Some("/tmp/voice-note")).unwrap();
        assert_eq!(dest.format(), ContainerFormat::AacAdts);
        let dest = Destination::parse(Some("/tmp/voice.xyz")).unwrap();
        assert_eq!(dest.format(), ContainerFormat::AacAdts);
    }

    #[test]
    fn local_path_is_unchanged() {
        let dest = Destination::parse(Some("/tmp/a.m4a")).unwrap();
        assert_eq!(dest.to_local_path(), "/tmp/a.m4a");
    }

    #[test]
    fn lossy_formats() {
        assert!(ContainerFormat::M4a.is_lossy());
        assert!(!ContainerFormat::Flac.is_lossy());
        assert!(!ContainerFormat::Wav.is_lossy());
    }
}
