use std::path::PathBuf;

use anyhow::Error;
use serde::Serialize;
use thiserror::Error as ThisError;

/// Failures of the frame-to-cell conversion path.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum ConvertError {
    #[error("RGBA buffer length mismatch: expected {expected} bytes, got {actual} bytes")]
    BufferSize { expected: usize, actual: usize },
    #[error("pixel buffer is {width}x{height} but the converter grid is {cols}x{rows}")]
    GridMismatch {
        width: u32,
        height: u32,
        cols: u32,
        rows: u32,
    },
    #[error("invalid frame dimensions {width}x{height}")]
    DimensionsInvalid { width: u32, height: u32 },
    #[error("converter worker is no longer running")]
    WorkerUnavailable,
}

impl ConvertError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::BufferSize { .. } => "PIXEL_BUFFER_SIZE_MISMATCH",
            Self::GridMismatch { .. } => "GRID_MISMATCH",
            Self::DimensionsInvalid { .. } => "DIMENSIONS_INVALID",
            Self::WorkerUnavailable => "CONVERTER_UNAVAILABLE",
        }
    }
}

/// Failures while serializing a display surface to an image file.
#[derive(Debug, ThisError)]
pub enum ExportError {
    #[error("failed to encode PNG: {0}")]
    Encode(#[from] image::ImageError),
    #[error("failed to write export {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("surface has no pixels to export")]
    EmptySurface,
}

impl ExportError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Encode(_) => "EXPORT_ENCODE_FAILED",
            Self::Write { .. } => "EXPORT_WRITE_FAILED",
            Self::EmptySurface => "EXPORT_EMPTY_SURFACE",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub ok: bool,
    pub error: ErrorEnvelopeBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelopeBody {
    pub code: String,
    pub message: String,
}

/// First stable error code found along the cause chain.
pub fn find_error_code(error: &Error) -> &'static str {
    error
        .chain()
        .find_map(|cause| {
            if let Some(convert) = cause.downcast_ref::<ConvertError>() {
                return Some(convert.code());
            }
            cause
                .downcast_ref::<ExportError>()
                .map(ExportError::code)
        })
        .unwrap_or("INTERNAL")
}

pub fn envelope(error: &Error) -> ErrorEnvelope {
    ErrorEnvelope {
        ok: false,
        error: ErrorEnvelopeBody {
            code: find_error_code(error).to_owned(),
            message: format!("{error:#}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::{envelope, find_error_code, ConvertError, ExportError};

    #[test]
    fn code_is_found_through_context_layers() {
        let result: anyhow::Result<()> = Err(ConvertError::BufferSize {
            expected: 16,
            actual: 12,
        })
        .context("frame 3")
        .context("render loop");
        let error = result.expect_err("should fail");
        assert_eq!(find_error_code(&error), "PIXEL_BUFFER_SIZE_MISMATCH");
    }

    #[test]
    fn uncoded_errors_fall_back_to_internal() {
        let error = anyhow::anyhow!("something else");
        let value = serde_json::to_value(envelope(&error)).expect("envelope should serialize");
        assert_eq!(value["ok"], false);
        assert_eq!(value["error"]["code"], "INTERNAL");
        assert_eq!(value["error"]["message"], "something else");
    }

    #[test]
    fn export_errors_carry_their_own_codes() {
        let error = anyhow::Error::new(ExportError::EmptySurface);
        assert_eq!(find_error_code(&error), "EXPORT_EMPTY_SURFACE");
    }
}
