//
// Image management
//
// A 2-D grid of f64 attenuation values stored as a flat row-major
// vector, plus the sampling and resampling helpers the projection and
// reconstruction code needs. PNG conversion lives here too, but only
// the CLI layer calls it.
//

use std::ops::{Index, IndexMut};
use std::path::Path;

use image::GrayImage;

#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f64>,
}

impl Index<(usize, usize)> for Image {
    type Output = f64;
    fn index(&self, (x, y): (usize, usize)) -> &f64 {
        &self.data[y * self.width + x]
    }
}

impl IndexMut<(usize, usize)> for Image {
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut f64 {
        &mut self.data[y * self.width + x]
    }
}

impl Image {
    /// An all-zero image.
    pub fn zeros(width: usize, height: usize) -> Image {
        Image {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    pub fn is_square(&self) -> bool {
        self.width == self.height
    }

    /// Sample at a fractional position with bilinear interpolation.
    /// Positions outside the grid read as 0, so rays and rotations can
    /// overshoot the edges freely.
    pub fn bilinear_sample(&self, x: f64, y: f64) -> f64 {
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let xi = x0 as isize;
        let yi = y0 as isize;

        let mut total = 0.0;
        for (dy, wy) in [(0, 1.0 - fy), (1, fy)] {
            for (dx, wx) in [(0, 1.0 - fx), (1, fx)] {
                let px = xi + dx;
                let py = yi + dy;
                if 0 <= px && px < self.width as isize && 0 <= py && py < self.height as isize {
                    total += wx * wy * self[(px as usize, py as usize)];
                }
            }
        }
        total
    }

    /// Bilinearly resample to a new resolution, mapping pixel centres
    /// to pixel centres so the field of view is preserved.
    pub fn resample(&self, new_width: usize, new_height: usize) -> Image {
        let x_scale = self.width as f64 / new_width as f64;
        let y_scale = self.height as f64 / new_height as f64;

        let mut data = Vec::with_capacity(new_width * new_height);
        for y in 0..new_height {
            let src_y = (y as f64 + 0.5) * y_scale - 0.5;
            for x in 0..new_width {
                let src_x = (x as f64 + 0.5) * x_scale - 0.5;
                // Clamp to the grid so border pixels don't fade towards
                // the zero padding.
                let sx = src_x.max(0.0).min(self.width as f64 - 1.0);
                let sy = src_y.max(0.0).min(self.height as f64 - 1.0);
                data.push(self.bilinear_sample(sx, sy));
            }
        }

        Image {
            width: new_width,
            height: new_height,
            data,
        }
    }

    pub fn max_value(&self) -> f64 {
        self.data.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn min_value(&self) -> f64 {
        self.data.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Multiply every pixel by a constant.
    pub fn scale_values(&self, factor: f64) -> Image {
        Image {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|p| p * factor).collect(),
        }
    }

    /// Save as an 8-bit greyscale PNG, mapping [0, 1] to [0, 255] with
    /// clamping. Reconstruction ringing can go slightly negative; it
    /// clips to black.
    pub fn save(&self, path: &Path) -> Result<(), image::ImageError> {
        let data_as_u8: Vec<u8> = self
            .data
            .iter()
            .map(|p| (p * 255.0).clamp(0.0, 255.0) as u8)
            .collect();
        let img = GrayImage::from_vec(self.width as u32, self.height as u32, data_as_u8)
            .ok_or_else(|| {
                image::ImageError::Parameter(image::error::ParameterError::from_kind(
                    image::error::ParameterErrorKind::DimensionMismatch,
                ))
            })?;
        img.save(path)
    }
}
