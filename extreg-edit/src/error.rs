//! Error types for extreg-edit.

use thiserror::Error;

/// Failures raised by the patch-rule transforms.
///
/// I/O failures are not represented here; the applicator reports those as
/// `anyhow` errors with path context.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    /// The literal a rule inserts after was not found in the file.
    #[error("anchor `{anchor}` not found")]
    AnchorNotFound {
        /// Human-readable form of the missing anchor.
        anchor: &'static str,
    },
}

/// Result type alias for the transform layer.
pub type EditResult<T> = Result<T, EditError>;
