//! Parallel-beam CT simulation and reconstruction.
//!
//! The pipeline: generate a Shepp-Logan phantom, forward project it
//! into a sinogram, optionally add acquisition noise, reconstruct by
//! filtered back-projection, and score the result against the
//! phantom. The library is pure compute; all I/O and logging belongs
//! to the caller.

pub mod error;
pub mod fbp_solver;
pub mod metrics;
pub mod phantom;
pub mod tomo_image;
pub mod tomo_scan;

pub use error::{CtError, Result};
pub use fbp_solver::{reconstruct, FilterKernel};
pub use metrics::{compute_metrics, compute_metrics_with_range, MetricsRecord};
pub use phantom::phantom;
pub use tomo_image::Image;
pub use tomo_scan::{
    detector_bins, uniform_angles, Projector, RayProjector, RotationProjector, Sinogram,
};
