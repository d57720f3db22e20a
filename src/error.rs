//! Error types for the annotation session and its backend plumbing.

use thiserror::Error;

/// Coarse classification of an [`AnnotateError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A backend call or local I/O failed; retrying the action may succeed.
    Transport,
    /// The user action was not valid in the current state.
    Validation,
    /// An internal guarantee could not be upheld.
    Invariant,
}

/// Errors produced by the annotation core, the backend client and the worker.
#[derive(Error, Debug)]
pub enum AnnotateError {
    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered but reported failure
    #[error("Backend rejected the request: {message}")]
    Rejected {
        /// Message returned by the backend, or the HTTP status
        message: String,
    },

    /// I/O error while reading an image file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image could not be decoded
    #[error("Image decode error: {0}")]
    Image(#[from] image::ImageError),

    /// JSON parsing or serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Background worker is gone
    #[error("Background worker stopped")]
    WorkerStopped,

    /// No image has been loaded into the session
    #[error("No image loaded")]
    NoImage,

    /// Image is loaded but not yet decoded
    #[error("Dimensions of image '{filename}' are not known yet")]
    DimensionsUnknown {
        /// Server-side filename of the image
        filename: String,
    },

    /// Class name is empty after trimming
    #[error("Class name is empty")]
    EmptyClassName,

    /// Confirm attempted with nothing selected
    #[error("No class selected")]
    NoClassSelected,

    /// Confirm attempted with a class that is not in the class list
    #[error("Unknown class '{name}'")]
    UnknownClass {
        /// The rejected class name
        name: String,
    },

    /// Confirm or cancel with no rectangle waiting for a class
    #[error("No rectangle is waiting for a class")]
    NoPendingBox,

    /// A new rectangle arrived while another one still waits for a class
    #[error("A rectangle is already waiting for a class")]
    AssignmentInProgress,

    /// A result arrived for an image that is no longer current
    #[error("Image '{got}' is not the current image '{expected}'")]
    StaleImage {
        /// Filename of the current image
        expected: String,
        /// Filename the result belongs to
        got: String,
    },

    /// A configuration value is out of range
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Which setting is wrong and why
        message: String,
    },

    /// Every RGB value is already assigned to a class
    #[error("No unused color left for {classes} classes")]
    ColorSpaceExhausted {
        /// Number of classes holding a color
        classes: usize,
    },
}

impl AnnotateError {
    /// Create a backend rejection error with a message.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Http(_)
            | Self::Rejected { .. }
            | Self::Io(_)
            | Self::Image(_)
            | Self::Json(_)
            | Self::WorkerStopped => ErrorKind::Transport,
            Self::NoImage
            | Self::DimensionsUnknown { .. }
            | Self::EmptyClassName
            | Self::NoClassSelected
            | Self::UnknownClass { .. }
            | Self::NoPendingBox
            | Self::AssignmentInProgress
            | Self::StaleImage { .. }
            | Self::InvalidConfig { .. } => ErrorKind::Validation,
            Self::ColorSpaceExhausted { .. } => ErrorKind::Invariant,
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, AnnotateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(AnnotateError::rejected("nope").kind(), ErrorKind::Transport);
        assert_eq!(AnnotateError::WorkerStopped.kind(), ErrorKind::Transport);
        assert_eq!(
            AnnotateError::DimensionsUnknown {
                filename: "a.png".into()
            }
            .kind(),
            ErrorKind::Validation
        );
        assert_eq!(AnnotateError::NoPendingBox.kind(), ErrorKind::Validation);
        assert_eq!(
            AnnotateError::ColorSpaceExhausted { classes: 3 }.kind(),
            ErrorKind::Invariant
        );
    }

    #[test]
    fn test_display_includes_context() {
        let err = AnnotateError::UnknownClass {
            name: "zebra".into(),
        };
        assert_eq!(err.to_string(), "Unknown class 'zebra'");
        let err = AnnotateError::rejected("Class already exists");
        assert!(err.to_string().contains("Class already exists"));
    }
}
