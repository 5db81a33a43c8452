//
// Error types for the reconstruction core
//
// The core never prints or logs; everything bubbles up as a typed
// error for the CLI layer to present.
//

use thiserror::Error;

/// Result type for all core operations.
pub type Result<T> = std::result::Result<T, CtError>;

#[derive(Error, Debug)]
pub enum CtError {
    /// Bad caller-supplied configuration: non-positive resolution,
    /// empty angle set, unknown filter name, non-square image, etc.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Metrics requested on images of differing shape.
    #[error("image shapes do not match: {ref_width}x{ref_height} vs {img_width}x{img_height}")]
    ShapeMismatch {
        ref_width: usize,
        ref_height: usize,
        img_width: usize,
        img_height: usize,
    },
}
