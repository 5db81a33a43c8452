//
// Reconstruction fidelity metrics
//
// MSE plus the structural similarity index (SSIM). SSIM follows the
// standard recipe: 7x7 uniform windows, sample-covariance
// normalisation, K1 = 0.01 / K2 = 0.03, averaged over all fully
// interior window positions.
//

use itertools::iproduct;

use crate::error::{CtError, Result};
use crate::tomo_image::Image;

const WIN: usize = 7;
const K1: f64 = 0.01;
const K2: f64 = 0.03;

/// Similarity between a reference image and a reconstruction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MetricsRecord {
    pub mse: f64,
    pub ssim: f64,
}

fn check_shapes(reference: &Image, reconstructed: &Image) -> Result<()> {
    if reference.width != reconstructed.width || reference.height != reconstructed.height {
        return Err(CtError::ShapeMismatch {
            ref_width: reference.width,
            ref_height: reference.height,
            img_width: reconstructed.width,
            img_height: reconstructed.height,
        });
    }
    Ok(())
}

fn mse(a: &Image, b: &Image) -> f64 {
    a.data
        .iter()
        .zip(b.data.iter())
        .map(|(p, q)| (p - q).powi(2))
        .sum::<f64>()
        / a.data.len() as f64
}

// Mean SSIM over all window positions fully inside the image.
fn ssim(a: &Image, b: &Image, data_range: f64) -> Result<f64> {
    if a.width < WIN || a.height < WIN {
        return Err(CtError::InvalidConfig(format!(
            "SSIM needs images of at least {}x{}, got {}x{}",
            WIN, WIN, a.width, a.height
        )));
    }
    if !(data_range > 0.0) {
        return Err(CtError::InvalidConfig(format!(
            "SSIM data range must be positive, got {}",
            data_range
        )));
    }

    let c1 = (K1 * data_range).powi(2);
    let c2 = (K2 * data_range).powi(2);

    let np = (WIN * WIN) as f64;
    // Sample (unbiased) covariance normalisation.
    let cov_norm = np / (np - 1.0);

    let mut total = 0.0;
    let mut windows = 0usize;
    for (wy, wx) in iproduct!(0..=a.height - WIN, 0..=a.width - WIN) {
        let mut sum_a = 0.0;
        let mut sum_b = 0.0;
        let mut sum_aa = 0.0;
        let mut sum_bb = 0.0;
        let mut sum_ab = 0.0;
        for (dy, dx) in iproduct!(0..WIN, 0..WIN) {
            let pa = a[(wx + dx, wy + dy)];
            let pb = b[(wx + dx, wy + dy)];
            sum_a += pa;
            sum_b += pb;
            sum_aa += pa * pa;
            sum_bb += pb * pb;
            sum_ab += pa * pb;
        }

        let ua = sum_a / np;
        let ub = sum_b / np;
        let va = cov_norm * (sum_aa / np - ua * ua);
        let vb = cov_norm * (sum_bb / np - ub * ub);
        let vab = cov_norm * (sum_ab / np - ua * ub);

        let numerator = (2.0 * ua * ub + c1) * (2.0 * vab + c2);
        let denominator = (ua * ua + ub * ub + c1) * (va + vb + c2);
        total += numerator / denominator;
        windows += 1;
    }

    Ok(total / windows as f64)
}

/// Compare a reconstruction against its reference, with an explicit
/// SSIM data range.
pub fn compute_metrics_with_range(
    reference: &Image,
    reconstructed: &Image,
    data_range: f64,
) -> Result<MetricsRecord> {
    check_shapes(reference, reconstructed)?;
    Ok(MetricsRecord {
        mse: mse(reference, reconstructed),
        ssim: ssim(reference, reconstructed, data_range)?,
    })
}

/// Compare a reconstruction against its reference. The SSIM data
/// range is taken as max - min of the reconstructed image; pass a
/// fixed range via `compute_metrics_with_range` when comparing across
/// runs, since a derived range moves with reconstruction outliers.
pub fn compute_metrics(reference: &Image, reconstructed: &Image) -> Result<MetricsRecord> {
    check_shapes(reference, reconstructed)?;
    let data_range = reconstructed.max_value() - reconstructed.min_value();
    compute_metrics_with_range(reference, reconstructed, data_range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    fn random_image(n: usize, seed: u64) -> Image {
        let mut rng = Pcg64::seed_from_u64(seed);
        Image {
            width: n,
            height: n,
            data: (0..n * n).map(|_| rng.gen::<f64>()).collect(),
        }
    }

    #[test]
    fn test_identical_images_are_perfect() {
        let img = random_image(100, 1);
        let metrics = compute_metrics(&img, &img).unwrap();
        assert!(metrics.mse.abs() < 1e-12);
        assert!((metrics.ssim - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_mse_of_constant_offset() {
        let img = random_image(32, 2);
        let shifted = Image {
            width: img.width,
            height: img.height,
            data: img.data.iter().map(|p| p + 0.5).collect(),
        };
        let metrics = compute_metrics_with_range(&img, &shifted, 1.0).unwrap();
        assert!((metrics.mse - 0.25).abs() < 1e-12);
        // Same structure, different luminance: SSIM drops but stays
        // well above zero.
        assert!(metrics.ssim < 1.0);
        assert!(metrics.ssim > 0.3);
    }

    #[test]
    fn test_noise_degrades_ssim() {
        let img = random_image(64, 3);
        let mut rng = Pcg64::seed_from_u64(4);
        let noisy = Image {
            width: img.width,
            height: img.height,
            data: img
                .data
                .iter()
                .map(|p| p + rng.gen_range(-0.25..0.25))
                .collect(),
        };
        let clean = compute_metrics_with_range(&img, &img, 1.0).unwrap();
        let degraded = compute_metrics_with_range(&img, &noisy, 1.0).unwrap();
        assert!(degraded.ssim < clean.ssim);
        assert!(degraded.mse > clean.mse);
    }

    #[test]
    fn test_unrelated_images_score_low() {
        let a = random_image(64, 5);
        let b = random_image(64, 6);
        let metrics = compute_metrics_with_range(&a, &b, 1.0).unwrap();
        assert!(metrics.ssim < 0.1);
        assert!(metrics.ssim >= -1.0);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let a = random_image(32, 7);
        let b = random_image(33, 7);
        let err = compute_metrics(&a, &b).unwrap_err();
        assert!(matches!(err, CtError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_too_small_for_window_rejected() {
        let a = random_image(5, 8);
        let err = compute_metrics_with_range(&a, &a, 1.0).unwrap_err();
        assert!(matches!(err, CtError::InvalidConfig(_)));
    }

    #[test]
    fn test_zero_data_range_rejected() {
        let a = random_image(16, 9);
        let err = compute_metrics_with_range(&a, &a, 0.0).unwrap_err();
        assert!(matches!(err, CtError::InvalidConfig(_)));
    }
}
