//
// Phantom generation
//
// The modified Shepp-Logan head phantom: a sum of ten ellipses of
// differing attenuation on a [-1, 1] x [-1, 1] field, rendered at a
// fixed native resolution and resampled to whatever size the caller
// asked for. Deterministic, so every run scans the same object.
//

use crate::error::{CtError, Result};
use crate::tomo_image::Image;

/// Resolution the ellipse table is rasterised at before resampling.
pub const NATIVE_SIZE: usize = 400;

// (additive value, semi-axis a, semi-axis b, centre x, centre y,
// rotation in degrees). Values are the high-contrast variant, so the
// summed image lands in [0, 1].
const ELLIPSES: [(f64, f64, f64, f64, f64, f64); 10] = [
    (1.0, 0.69, 0.92, 0.0, 0.0, 0.0),
    (-0.8, 0.6624, 0.874, 0.0, -0.0184, 0.0),
    (-0.2, 0.11, 0.31, 0.22, 0.0, -18.0),
    (-0.2, 0.16, 0.41, -0.22, 0.0, 18.0),
    (0.1, 0.21, 0.25, 0.0, 0.35, 0.0),
    (0.1, 0.046, 0.046, 0.0, 0.1, 0.0),
    (0.1, 0.046, 0.046, 0.0, -0.1, 0.0),
    (0.1, 0.046, 0.023, -0.08, -0.605, 0.0),
    (0.1, 0.023, 0.023, 0.0, -0.605, 0.0),
    (0.1, 0.023, 0.046, 0.06, -0.605, 0.0),
];

// Rasterise the ellipse table onto an n x n grid, sampling at pixel
// centres.
fn render(n: usize) -> Image {
    let mut img = Image::zeros(n, n);
    let step = 2.0 / n as f64;

    for row in 0..n {
        // Row 0 is the top of the image, y = +1 end of the field.
        let y = 1.0 - (row as f64 + 0.5) * step;
        for col in 0..n {
            let x = (col as f64 + 0.5) * step - 1.0;

            let mut value = 0.0;
            for (v, a, b, x0, y0, phi_deg) in ELLIPSES {
                let phi = phi_deg.to_radians();
                let dx = x - x0;
                let dy = y - y0;
                let u = dx * phi.cos() + dy * phi.sin();
                let w = -dx * phi.sin() + dy * phi.cos();
                if (u / a).powi(2) + (w / b).powi(2) <= 1.0 {
                    value += v;
                }
            }
            img[(col, row)] = value.clamp(0.0, 1.0);
        }
    }

    img
}

/// Produce the reference phantom at `size` x `size`, values in [0, 1].
pub fn phantom(size: usize) -> Result<Image> {
    if size == 0 {
        return Err(CtError::InvalidConfig(
            "phantom size must be positive".to_string(),
        ));
    }

    let native = render(NATIVE_SIZE);
    if size == NATIVE_SIZE {
        Ok(native)
    } else {
        Ok(native.resample(size, size))
    }
}
