//
// Sinogram generation
//
// Given a square image, integrate along parallel rays at a set of
// angles to produce a sinogram (the Radon transform). Two strategies
// implement the same contract: a ray-driven projector that marches
// each ray directly, and a rotate-then-sum projector that mirrors the
// textbook derivation. Both share one geometry convention with the
// back-projector in fbp_solver.
//
// Geometry: an N x N image has its centre at ((N-1)/2, (N-1)/2). The
// detector has D = ceil(N * sqrt(2)) bins, so the full diagonal fits
// at any angle, with the detector centre at (D-1)/2. A pixel (x, y)
// projects onto detector coordinate
//     t = (x - c) * cos(theta) + (y - c) * sin(theta) + (D-1)/2.
//

use rand::Rng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;

use crate::error::{CtError, Result};
use crate::tomo_image::Image;

/// Projection data: one column of `bins` detector readings per angle.
/// Storage is angle-major, so a column is a contiguous slice.
#[derive(Clone, Debug)]
pub struct Sinogram {
    pub bins: usize,
    /// Projection angles in degrees, in acquisition order.
    pub angles: Vec<f64>,
    pub data: Vec<f64>,
}

impl Sinogram {
    pub fn column(&self, angle_idx: usize) -> &[f64] {
        &self.data[angle_idx * self.bins..(angle_idx + 1) * self.bins]
    }

    pub fn max_value(&self) -> f64 {
        self.data.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Add zero-mean Gaussian noise with sigma = level * max(self),
    /// emulating a low-dose acquisition. Returns a new sinogram; the
    /// input is left untouched. A level of zero (or below) is the
    /// identity, as is a sinogram with no positive signal.
    pub fn add_noise<R: Rng + ?Sized>(&self, rng: &mut R, level: f64) -> Sinogram {
        let sigma = level * self.max_value();
        if !(sigma > 0.0) {
            return self.clone();
        }

        let normal = Normal::new(0.0, sigma).unwrap();
        Sinogram {
            bins: self.bins,
            angles: self.angles.clone(),
            data: self.data.iter().map(|p| p + normal.sample(rng)).collect(),
        }
    }

    /// View as an image for display, one angle per column, normalised
    /// to the sinogram maximum.
    pub fn to_image(&self) -> Image {
        let max = self.max_value().max(f64::MIN_POSITIVE);
        let width = self.angles.len();
        let mut img = Image::zeros(width, self.bins);
        for a in 0..width {
            let column = self.column(a);
            for (bin, &p) in column.iter().enumerate() {
                img[(a, bin)] = p / max;
            }
        }
        img
    }
}

/// Number of detector bins needed to cover an n x n image at any
/// angle. Chosen so `fbp_solver` can recover n as floor(bins / sqrt(2)).
pub fn detector_bins(n: usize) -> usize {
    (n as f64 * std::f64::consts::SQRT_2).ceil() as usize
}

/// Uniformly spaced angles in degrees over [0, 180), 180 excluded
/// (a 180 degree projection repeats the 0 degree one mirrored).
pub fn uniform_angles(count: usize) -> Vec<f64> {
    (0..count).map(|i| i as f64 * 180.0 / count as f64).collect()
}

fn check_projection_args(image: &Image, angles: &[f64]) -> Result<()> {
    if !image.is_square() || image.width == 0 {
        return Err(CtError::InvalidConfig(format!(
            "projection requires a non-empty square image, got {}x{}",
            image.width, image.height
        )));
    }
    if angles.is_empty() {
        return Err(CtError::InvalidConfig(
            "projection requires at least one angle".to_string(),
        ));
    }
    Ok(())
}

// Columns are independent, so compute them in parallel and stitch the
// results back together in angle order.
fn project_columns<F>(image: &Image, angles: &[f64], column_fn: F) -> Result<Sinogram>
where
    F: Fn(&Image, f64, usize) -> Vec<f64> + Sync,
{
    check_projection_args(image, angles)?;
    let bins = detector_bins(image.width);

    let columns: Vec<Vec<f64>> = angles
        .par_iter()
        .map(|&theta_deg| column_fn(image, theta_deg, bins))
        .collect();

    Ok(Sinogram {
        bins,
        angles: angles.to_vec(),
        data: columns.concat(),
    })
}

/// A forward-projection strategy. Implementations must agree on the
/// detector convention above so reconstructions line up.
pub trait Projector {
    fn project(&self, image: &Image, angles: &[f64]) -> Result<Sinogram>;
}

/// Ray-driven projection: march along each ray at unit steps, sampling
/// the image bilinearly and summing. This is the default strategy.
pub struct RayProjector;

impl Projector for RayProjector {
    fn project(&self, image: &Image, angles: &[f64]) -> Result<Sinogram> {
        project_columns(image, angles, |img, theta_deg, bins| {
            let theta = theta_deg.to_radians();
            let (sin_t, cos_t) = theta.sin_cos();
            let c = (img.width as f64 - 1.0) / 2.0;
            let ct = (bins as f64 - 1.0) / 2.0;

            let mut column = Vec::with_capacity(bins);
            for bin in 0..bins {
                let t = bin as f64 - ct;
                let mut sum = 0.0;
                for step in 0..bins {
                    let s = step as f64 - ct;
                    let x = c + t * cos_t - s * sin_t;
                    let y = c + t * sin_t + s * cos_t;
                    sum += img.bilinear_sample(x, y);
                }
                column.push(sum);
            }
            column
        })
    }
}

/// Rotate-then-sum projection, the way the transform is usually first
/// explained: resample the image into a detector-sized frame rotated
/// by -theta, then collapse it along the vertical axis.
pub struct RotationProjector;

impl RotationProjector {
    // Resample `image` into a bins x bins canvas whose x axis is the
    // detector axis at `theta`.
    fn rotate_to_detector_frame(image: &Image, theta: f64, bins: usize) -> Image {
        let (sin_t, cos_t) = theta.sin_cos();
        let c = (image.width as f64 - 1.0) / 2.0;
        let ct = (bins as f64 - 1.0) / 2.0;

        let mut canvas = Image::zeros(bins, bins);
        for y in 0..bins {
            let s = y as f64 - ct;
            for x in 0..bins {
                let t = x as f64 - ct;
                let src_x = c + t * cos_t - s * sin_t;
                let src_y = c + t * sin_t + s * cos_t;
                canvas[(x, y)] = image.bilinear_sample(src_x, src_y);
            }
        }
        canvas
    }
}

impl Projector for RotationProjector {
    fn project(&self, image: &Image, angles: &[f64]) -> Result<Sinogram> {
        project_columns(image, angles, |img, theta_deg, bins| {
            let rotated = Self::rotate_to_detector_frame(img, theta_deg.to_radians(), bins);
            (0..bins)
                .map(|x| (0..bins).map(|y| rotated[(x, y)]).sum())
                .collect()
        })
    }
}
