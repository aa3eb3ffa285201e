//! Error types for box tree decoding.

use crate::boxes::FourCC;
use std::io;
use thiserror::Error;

/// Result type for bmffmeta operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structural decode failure.
///
/// Metadata problems never show up here; they are reported as
/// [`Diagnostic`](crate::metadata::Diagnostic)s next to the parse result.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] io::Error),

    /// A read asked for bytes past the end of the available data.
    #[error("out of bounds: need {needed} bytes at offset {offset}, {available} available")]
    OutOfBounds {
        offset: u64,
        needed: u64,
        available: u64,
    },

    /// Declared size or layout is inconsistent with the surrounding structure.
    #[error("malformed '{box_type}' box at offset {offset}: {reason}")]
    MalformedBox {
        offset: u64,
        box_type: FourCC,
        reason: String,
    },

    /// The payload does not have the shape its type promises.
    #[error("unsupported '{box_type}' payload at offset {offset}: {reason}")]
    UnsupportedFormat {
        offset: u64,
        box_type: FourCC,
        reason: String,
    },

    #[error("box nesting deeper than {depth} levels at offset {offset}")]
    TooDeep { offset: u64, depth: usize },
}

impl Error {
    pub fn malformed(offset: u64, box_type: FourCC, reason: impl Into<String>) -> Self {
        Self::MalformedBox {
            offset,
            box_type,
            reason: reason.into(),
        }
    }

    pub fn unsupported(offset: u64, box_type: FourCC, reason: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            offset,
            box_type,
            reason: reason.into(),
        }
    }

    /// True if more input could make this error go away.
    pub fn is_out_of_bounds(&self) -> bool {
        matches!(self, Self::OutOfBounds { .. })
    }
}
