//! Error types for the `loadvid` crate.
//!
//! This module defines [`LoadvidError`], the single error type returned by
//! every fallible operation. Input-validation variants are raised before any
//! decoding happens; the remaining variants carry the frame index or stream
//! timestamp that triggered them so callers can log or retry with different
//! parameters.

use ffmpeg_next::Error as FfmpegError;
use thiserror::Error;

/// The unified error type for all `loadvid` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadvidError {
    /// The requested output width or height is zero.
    #[error("Invalid output dimensions {width}x{height}: both must be greater than zero")]
    InvalidDimensions {
        /// Requested output width.
        width: u32,
        /// Requested output height.
        height: u32,
    },

    /// The encoded video buffer is empty.
    #[error("Encoded video buffer is empty")]
    EmptyInput,

    /// A uniform extraction asked for zero frames.
    #[error("Number of requested frames must be greater than zero")]
    InvalidFrameCount,

    /// A frame-rate cap of zero was supplied.
    #[error("FPS cap must be greater than zero")]
    InvalidFpsCap,

    /// The explicit frame index list is malformed.
    #[error("Invalid frame indices (at position {position}): {reason}")]
    InvalidIndices {
        /// Position in the caller's list where the problem was found.
        position: usize,
        /// What is wrong with the list.
        reason: String,
    },

    /// The buffer is not a container FFmpeg can parse.
    #[error("Failed to open container: {0}")]
    Container(String),

    /// The container holds no decodable video stream.
    #[error("No decodable video stream found")]
    NoVideoStream,

    /// A packet could not be decoded.
    ///
    /// Individual packet failures are recovered from internally; this only
    /// reaches callers when the decoder itself cannot be set up.
    #[error("Failed to decode video (timestamp {timestamp:?}): {reason}")]
    Decode {
        /// Stream timestamp of the offending packet, when known.
        timestamp: Option<i64>,
        /// Underlying reason.
        reason: String,
    },

    /// A decoded frame could not be converted to RGB.
    #[error("Failed to convert frame {frame_index} from {pixel_format}: {reason}")]
    Conversion {
        /// Presentation index of the frame.
        frame_index: u64,
        /// Native pixel format of the frame.
        pixel_format: String,
        /// Underlying reason.
        reason: String,
    },

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),

    /// A blocking extraction task panicked or was cancelled.
    #[cfg(feature = "async")]
    #[error("Extraction task failed: {0}")]
    TaskFailed(String),
}

impl LoadvidError {
    /// Whether this error reports bad caller arguments.
    ///
    /// These are always raised before any decoding is attempted.
    pub fn is_input_validation(&self) -> bool {
        matches!(
            self,
            LoadvidError::InvalidDimensions { .. }
                | LoadvidError::EmptyInput
                | LoadvidError::InvalidFrameCount
                | LoadvidError::InvalidFpsCap
                | LoadvidError::InvalidIndices { .. }
        )
    }
}

impl From<FfmpegError> for LoadvidError {
    fn from(error: FfmpegError) -> Self {
        LoadvidError::Ffmpeg(error.to_string())
    }
}
