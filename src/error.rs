use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("required file not found: {file}")]
    MissingDependency { file: String },

    #[error("failed to load native library {}: {reason}", .path.display())]
    LoadFailed { path: PathBuf, reason: String },

    #[error("native library is not configured: call configure_library first")]
    NotConfigured,

    #[error("native call {call} failed with status {code}")]
    NativeCallFailed { call: &'static str, code: i64 },

    #[error("recognition failed with status {code}")]
    RecognitionFailed { code: i64 },

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("OCR engine has been closed")]
    EngineClosed,

    #[error("Unsupported output format: '{0}' (expected text or structured)")]
    UnsupportedFormat(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Image decode error: {0}")]
    ImageError(#[from] image::ImageError),
}

/// Generates factory methods for [`OcrError`] variants that wrap a `String`.
macro_rules! error_constructors {
    ($(
        $(#[doc = $doc:expr])*
        $method:ident => $variant:ident
    ),* $(,)?) => {
        impl OcrError {
            $(
                $(#[doc = $doc])*
                pub fn $method(msg: impl Into<String>) -> Self {
                    Self::$variant(msg.into())
                }
            )*
        }
    };
}

error_constructors! {
    /// Create an invalid image error.
    invalid_image => InvalidImage,
    /// Create an unsupported output format error.
    unsupported_format => UnsupportedFormat,
    /// Create a configuration error.
    config => ConfigError,
}

impl OcrError {
    /// Maps a native status word to `Ok(())` or [`OcrError::NativeCallFailed`].
    pub(crate) fn check(call: &'static str, code: i64) -> Result<()> {
        if code == 0 {
            Ok(())
        } else {
            Err(Self::NativeCallFailed { call, code })
        }
    }
}

pub type Result<T> = std::result::Result<T, OcrError>;
