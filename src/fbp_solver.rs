//
// Image reconstruction via filtered back-projection
//
// Each sinogram column is filtered in the frequency domain (FFT,
// multiply by the chosen ramp-family response, inverse FFT), then
// smeared back across the image plane along its projection direction.
// Summing the smears over all angles and scaling by pi / (2 * angles)
// recovers the image.
//
// The geometry convention matches tomo_scan: detector centre at
// (D-1)/2, image centre at ((N-1)/2, (N-1)/2), linear interpolation on
// the detector axis. The output side is recovered from the detector
// count as N = floor(D / sqrt(2)), the exact inverse of the sizing
// rule in tomo_scan::detector_bins.
//

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;
use rustfft::{num_complex::Complex64, FftPlanner};

use crate::error::{CtError, Result};
use crate::tomo_image::Image;
use crate::tomo_scan::Sinogram;

////////////////////////////////////////////////////////////////////////
// Filter kernels
//

/// The closed set of frequency-domain filters. All are the ramp
/// (|frequency|) with a different high-frequency rolloff.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterKernel {
    /// The exact FBP filter. Sharpest, noisiest.
    Ramp,
    /// Ramp with a sinc rolloff.
    SheppLogan,
    /// Ramp with a cosine rolloff.
    Cosine,
    /// Ramp with a Hamming-window rolloff.
    Hamming,
}

impl FilterKernel {
    pub const ALL: [FilterKernel; 4] = [
        FilterKernel::Ramp,
        FilterKernel::SheppLogan,
        FilterKernel::Cosine,
        FilterKernel::Hamming,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FilterKernel::Ramp => "ramp",
            FilterKernel::SheppLogan => "shepp-logan",
            FilterKernel::Cosine => "cosine",
            FilterKernel::Hamming => "hamming",
        }
    }

    /// The multiplicative response applied to a length-`len` FFT of a
    /// projection. `len` must be even (it's always a power of two in
    /// practice), frequencies in FFT order (DC first, negative
    /// frequencies in the upper half).
    pub fn frequency_response(self, len: usize) -> Vec<f64> {
        let mut response = ramp_response(len);
        match self {
            FilterKernel::Ramp => {}
            FilterKernel::SheppLogan => {
                // sinc(f / 2f_nyquist); even in f, so the shifted
                // negative frequencies get the same factor.
                for (i, r) in response.iter_mut().enumerate().skip(1) {
                    let freq = if i <= len / 2 {
                        i as f64 / len as f64
                    } else {
                        (i as f64 - len as f64) / len as f64
                    };
                    let omega = PI * freq;
                    *r *= omega.sin() / omega;
                }
            }
            FilterKernel::Cosine => {
                for (i, r) in response.iter_mut().enumerate() {
                    let shifted = (i + len / 2) % len;
                    *r *= (PI * shifted as f64 / len as f64).sin();
                }
            }
            FilterKernel::Hamming => {
                for (i, r) in response.iter_mut().enumerate() {
                    let shifted = (i + len / 2) % len;
                    *r *= 0.54 - 0.46 * (2.0 * PI * shifted as f64 / (len as f64 - 1.0)).cos();
                }
            }
        }
        response
    }
}

// The ramp (|f|) response, built the classical way: construct the
// band-limited real-space kernel and transform it, rather than writing
// 2|f| directly. This keeps the DC term consistent with the discrete
// kernel and avoids a constant offset in the reconstruction.
fn ramp_response(len: usize) -> Vec<f64> {
    let mut kernel = vec![0.0; len];
    kernel[0] = 0.25;
    let mut k = 1;
    while k <= len / 2 {
        let value = -1.0 / (PI * k as f64).powi(2);
        kernel[k] = value;
        kernel[len - k] = value;
        k += 2;
    }

    let mut buffer: Vec<Complex64> = kernel
        .iter()
        .map(|&re| Complex64::new(re, 0.0))
        .collect();
    FftPlanner::new().plan_fft_forward(len).process(&mut buffer);

    buffer.iter().map(|z| 2.0 * z.re).collect()
}

impl FromStr for FilterKernel {
    type Err = CtError;

    fn from_str(s: &str) -> Result<FilterKernel> {
        FilterKernel::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| {
                CtError::InvalidConfig(format!(
                    "unknown filter '{}' (expected ramp, shepp-logan, cosine or hamming)",
                    s
                ))
            })
    }
}

impl fmt::Display for FilterKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

////////////////////////////////////////////////////////////////////////
// Reconstruction
//

fn check_sinogram(sinogram: &Sinogram) -> Result<usize> {
    if sinogram.angles.is_empty() {
        return Err(CtError::InvalidConfig(
            "reconstruction requires at least one angle".to_string(),
        ));
    }
    if sinogram.data.len() != sinogram.bins * sinogram.angles.len() {
        return Err(CtError::InvalidConfig(format!(
            "sinogram data length {} does not match {} bins x {} angles",
            sinogram.data.len(),
            sinogram.bins,
            sinogram.angles.len()
        )));
    }
    let n = (sinogram.bins as f64 / std::f64::consts::SQRT_2).floor() as usize;
    if n == 0 {
        return Err(CtError::InvalidConfig(format!(
            "detector dimension {} is too small to reconstruct from",
            sinogram.bins
        )));
    }
    Ok(n)
}

// Filter every column in the frequency domain, padded to a power of
// two at least twice the detector length to keep the circular
// convolution from wrapping around.
fn filter_columns(sinogram: &Sinogram, filter: FilterKernel) -> Vec<Vec<f64>> {
    let bins = sinogram.bins;
    let padded = (2 * bins).next_power_of_two().max(64);
    let response = filter.frequency_response(padded);

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(padded);
    let ifft = planner.plan_fft_inverse(padded);

    (0..sinogram.angles.len())
        .into_par_iter()
        .map(|a| {
            let column = sinogram.column(a);
            let mut buffer = vec![Complex64::new(0.0, 0.0); padded];
            for (slot, &p) in buffer.iter_mut().zip(column.iter()) {
                *slot = Complex64::new(p, 0.0);
            }

            fft.process(&mut buffer);
            for (z, &r) in buffer.iter_mut().zip(response.iter()) {
                *z *= r;
            }
            ifft.process(&mut buffer);

            // rustfft leaves the inverse unnormalised.
            buffer[..bins].iter().map(|z| z.re / padded as f64).collect()
        })
        .collect()
}

/// Reconstruct an image from a sinogram by filtered back-projection.
/// The sinogram carries its own angle set; the output is square, with
/// the side inferred from the detector dimension.
pub fn reconstruct(sinogram: &Sinogram, filter: FilterKernel) -> Result<Image> {
    let n = check_sinogram(sinogram)?;
    let filtered = filter_columns(sinogram, filter);

    let c = (n as f64 - 1.0) / 2.0;
    let ct = (sinogram.bins as f64 - 1.0) / 2.0;
    let bins = sinogram.bins as isize;

    // Angles are independent; accumulate per-thread partial images and
    // sum them, so no pixel is written from two threads.
    let accumulated = sinogram
        .angles
        .par_iter()
        .zip(filtered.par_iter())
        .fold(
            || vec![0.0; n * n],
            |mut acc, (&theta_deg, column)| {
                let theta = theta_deg.to_radians();
                let (sin_t, cos_t) = theta.sin_cos();
                for y in 0..n {
                    let dy = y as f64 - c;
                    for x in 0..n {
                        let dx = x as f64 - c;
                        let t = dx * cos_t + dy * sin_t + ct;

                        let t0 = t.floor();
                        let idx = t0 as isize;
                        let fract = t - t0;
                        let mut sample = 0.0;
                        for (weight, bin) in [(1.0 - fract, idx), (fract, idx + 1)] {
                            if 0 <= bin && bin < bins {
                                sample += weight * column[bin as usize];
                            }
                        }
                        acc[y * n + x] += sample;
                    }
                }
                acc
            },
        )
        .reduce(
            || vec![0.0; n * n],
            |mut a, b| {
                for (pa, pb) in a.iter_mut().zip(b.iter()) {
                    *pa += pb;
                }
                a
            },
        );

    let scale = PI / (2.0 * sinogram.angles.len() as f64);
    Ok(Image {
        width: n,
        height: n,
        data: accumulated.into_iter().map(|p| p * scale).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phantom::phantom;
    use crate::tomo_scan::{detector_bins, uniform_angles, Projector, RayProjector};

    #[test]
    fn test_filter_names_round_trip() {
        for filter in FilterKernel::ALL {
            assert_eq!(filter.name().parse::<FilterKernel>().unwrap(), filter);
        }
    }

    #[test]
    fn test_unknown_filter_rejected() {
        let err = "gaussian".parse::<FilterKernel>().unwrap_err();
        assert!(matches!(err, CtError::InvalidConfig(_)));
    }

    #[test]
    fn test_ramp_response_shape() {
        let response = FilterKernel::Ramp.frequency_response(256);
        // Near-zero at DC, increasing towards Nyquist, symmetric in
        // positive and negative frequencies.
        assert!(response[0].abs() < 0.01);
        assert!(response[1] < response[64]);
        assert!(response[64] < response[128]);
        for k in 1..128 {
            assert!((response[k] - response[256 - k]).abs() < 1e-9);
        }
        // The discrete ramp tracks 2|f| closely away from DC.
        assert!((response[64] - 0.5).abs() < 0.01);
        assert!((response[128] - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_apodized_filters_roll_off() {
        let len = 256;
        let ramp = FilterKernel::Ramp.frequency_response(len);
        for filter in [
            FilterKernel::SheppLogan,
            FilterKernel::Cosine,
            FilterKernel::Hamming,
        ] {
            let response = filter.frequency_response(len);
            // Apodization only ever attenuates, and bites hardest at
            // the Nyquist bin.
            for (r, a) in ramp.iter().zip(response.iter()).skip(1) {
                assert!(*a <= *r + 1e-12, "{} exceeds ramp", filter);
            }
            assert!(response[len / 2] < 0.95 * ramp[len / 2]);
        }
    }

    #[test]
    fn test_zero_sinogram_reconstructs_to_zero() {
        let angles = uniform_angles(30);
        let bins = detector_bins(64);
        let sino = Sinogram {
            bins,
            angles: angles.clone(),
            data: vec![0.0; bins * angles.len()],
        };
        for filter in FilterKernel::ALL {
            let img = reconstruct(&sino, filter).unwrap();
            assert_eq!(img.width, 64);
            assert!(img.data.iter().all(|p| p.abs() < 1e-5));
        }
    }

    #[test]
    fn test_output_side_inferred_from_bins() {
        for n in [32, 64, 100, 128] {
            let img = crate::tomo_image::Image::zeros(n, n);
            let sino = RayProjector.project(&img, &uniform_angles(3)).unwrap();
            let recon = reconstruct(&sino, FilterKernel::Ramp).unwrap();
            assert_eq!(recon.width, n);
            assert_eq!(recon.height, n);
        }
    }

    #[test]
    fn test_single_angle_is_a_smear_not_an_error() {
        let img = phantom(32).unwrap();
        let sino = RayProjector.project(&img, &[0.0]).unwrap();
        let recon = reconstruct(&sino, FilterKernel::Ramp).unwrap();
        assert_eq!(recon.width, 32);
        assert!(recon.data.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_dense_reconstruction_close_to_phantom() {
        let img = phantom(64).unwrap();
        let sino = RayProjector.project(&img, &uniform_angles(90)).unwrap();
        let recon = reconstruct(&sino, FilterKernel::Ramp).unwrap();

        let mse = img
            .data
            .iter()
            .zip(recon.data.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            / img.data.len() as f64;
        assert!(mse < 0.01, "mse {}", mse);
    }

    #[test]
    fn test_all_filters_reconstruct_reasonably() {
        let img = phantom(48).unwrap();
        let sino = RayProjector.project(&img, &uniform_angles(60)).unwrap();
        for filter in FilterKernel::ALL {
            let recon = reconstruct(&sino, filter).unwrap();
            let mse = img
                .data
                .iter()
                .zip(recon.data.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                / img.data.len() as f64;
            assert!(mse < 0.02, "{}: mse {}", filter, mse);
        }
    }

    #[test]
    fn test_empty_angle_set_rejected() {
        let sino = Sinogram {
            bins: 16,
            angles: vec![],
            data: vec![],
        };
        let err = reconstruct(&sino, FilterKernel::Ramp).unwrap_err();
        assert!(matches!(err, CtError::InvalidConfig(_)));
    }

    #[test]
    fn test_inconsistent_sinogram_rejected() {
        let sino = Sinogram {
            bins: 16,
            angles: vec![0.0, 90.0],
            data: vec![0.0; 16],
        };
        let err = reconstruct(&sino, FilterKernel::Ramp).unwrap_err();
        assert!(matches!(err, CtError::InvalidConfig(_)));
    }
}
