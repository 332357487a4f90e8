use super::header::ScanHeader;
use super::peaks::BraggPeakSet;
use crate::error::{DriftError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Physical description of the scanned lattice and frame.
///
/// Built once per dataset and refreshed after every stage that changes the
/// frame (detection on a new frame, cropping, resampling).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatticeParameters {
    /// Lattice constant in nm (1.0 when unknown).
    pub a0: f64,
    /// Scan extent `[x, y]` in nm.
    pub size: [f64; 2],
    /// Pixel count `[x, y]`.
    pub pixels: [usize; 2],
    /// Scan extent in lattice constants.
    pub qmag: [f64; 2],
    /// Ratio of the frame to the peak-bounded spectrum extent.
    pub qscale: [f64; 2],
    /// Inter-peak angle; `2π / n` for an n-fold lattice.
    pub angle: f64,
    /// Polar angle of the first Bragg peak; inferred when `None`.
    pub orient: Option<f64>,
    /// Derive the scan size from the peaks and `a0` on refresh.
    pub use_a0: bool,
    pub even_out: bool,
}

impl LatticeParameters {
    /// Parameters from explicit values. `a0 = None` disables the
    /// lattice-constant based refresh.
    pub fn new(a0: Option<f64>, size: [f64; 2], pixels: [usize; 2]) -> Result<Self> {
        if size.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(DriftError::Configuration(format!(
                "scan size must be positive, got {size:?}"
            )));
        }
        if pixels.iter().any(|p| *p == 0) {
            return Err(DriftError::Configuration(format!(
                "pixel count must be positive, got {pixels:?}"
            )));
        }
        let (a0, use_a0) = match a0 {
            Some(a) if a.is_finite() && a > 0.0 => (a, true),
            Some(a) => {
                return Err(DriftError::Configuration(format!(
                    "lattice constant must be positive, got {a}"
                )))
            }
            None => (1.0, false),
        };
        let qmag = [size[0] / a0, size[1] / a0];
        let qscale = [
            pixels[0] as f64 / (2.0 * qmag[0]),
            pixels[1] as f64 / (2.0 * qmag[1]),
        ];
        Ok(Self {
            a0,
            size,
            pixels,
            qmag,
            qscale,
            angle: PI / 2.0,
            orient: None,
            use_a0,
            even_out: false,
        })
    }

    /// Parameters from a parsed instrument header; explicit values win.
    pub fn from_header(
        header: &ScanHeader,
        a0: Option<f64>,
        size: Option<[f64; 2]>,
        pixels: Option<[usize; 2]>,
    ) -> Result<Self> {
        let size = match size {
            Some(s) => s,
            None => header.scan_size()?,
        };
        let pixels = match pixels {
            Some(p) => p,
            None => header.scan_pixels()?,
        };
        Self::new(a0, size, pixels)
    }

    pub fn with_angle(mut self, angle: f64) -> Self {
        self.angle = angle;
        self
    }

    pub fn with_orient(mut self, orient: f64) -> Self {
        self.orient = Some(orient);
        self
    }

    /// Re-derives frame quantities from peaks measured on the current frame.
    ///
    /// With `use_a0`, the scan size follows from the peak radius assuming
    /// square physical pixels; otherwise it scales with the pixel count.
    pub fn refresh(&mut self, peaks: &BraggPeakSet) -> Result<()> {
        let (rows, cols) = peaks.shape();
        let new_pixels = [cols, rows];
        let min_x = peaks.peaks().iter().map(|p| p[0]).fold(f64::INFINITY, f64::min);
        let min_y = peaks.peaks().iter().map(|p| p[1]).fold(f64::INFINITY, f64::min);
        let ext_x = cols as f64 - 2.0 * min_x;
        let ext_y = rows as f64 - 2.0 * min_y;
        if ext_x <= 0.0 || ext_y <= 0.0 {
            return Err(DriftError::DegenerateGeometry(format!(
                "peaks span the whole frame (min x {min_x}, min y {min_y})"
            )));
        }

        if self.use_a0 {
            // |q| / N per axis is the reciprocal lattice vector in cycles per pixel.
            let q = peaks.q_vectors();
            let mut pixel_nm = 0.0;
            for v in &q[..2] {
                let k = ((v[0] / cols as f64).powi(2) + (v[1] / rows as f64).powi(2)).sqrt();
                if k <= f64::EPSILON {
                    return Err(DriftError::DegenerateGeometry(
                        "Bragg peak at the spectrum centre".to_string(),
                    ));
                }
                pixel_nm += 0.5 * self.a0 * k;
            }
            self.size = [pixel_nm * cols as f64, pixel_nm * rows as f64];
        } else {
            self.size = [
                self.size[0] * cols as f64 / self.pixels[0] as f64,
                self.size[1] * rows as f64 / self.pixels[1] as f64,
            ];
        }
        self.pixels = new_pixels;
        self.qmag = [self.size[0] / self.a0, self.size[1] / self.a0];
        self.qscale = [cols as f64 / ext_x, rows as f64 / ext_y];
        debug!(
            "lattice parameters refreshed: size={:?} pixels={:?} qscale={:?}",
            self.size, self.pixels, self.qscale
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::header::HeaderValue;

    #[test]
    fn derived_scales_follow_inputs() {
        let p = LatticeParameters::new(Some(0.4), [20.0, 10.0], [200, 100]).unwrap();
        assert!(p.use_a0);
        assert!((p.qmag[0] - 50.0).abs() < 1e-12);
        assert!((p.qscale[0] - 2.0).abs() < 1e-12);
        assert!((p.qscale[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn missing_lattice_constant_disables_a0_mode() {
        let p = LatticeParameters::new(None, [20.0, 20.0], [64, 64]).unwrap();
        assert!(!p.use_a0);
        assert_eq!(p.a0, 1.0);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(LatticeParameters::new(None, [0.0, 1.0], [64, 64]).is_err());
        assert!(LatticeParameters::new(None, [1.0, 1.0], [0, 64]).is_err());
        assert!(LatticeParameters::new(Some(-1.0), [1.0, 1.0], [8, 8]).is_err());
    }

    #[test]
    fn header_supplies_missing_values() {
        let mut h = ScanHeader::new();
        h.insert("scan_range", HeaderValue::Numbers(vec![12.0, 12.0]));
        h.insert("scan_pixels", HeaderValue::Numbers(vec![128.0, 128.0]));
        let p = LatticeParameters::from_header(&h, None, None, None).unwrap();
        assert_eq!(p.pixels, [128, 128]);
        let err = LatticeParameters::from_header(&ScanHeader::new(), None, None, Some([8, 8]));
        assert!(matches!(err, Err(DriftError::Configuration(_))));
    }

    #[test]
    fn refresh_after_crop_scales_size() {
        let mut p = LatticeParameters::new(None, [20.0, 20.0], [64, 64]).unwrap();
        let peaks = BraggPeakSet::new(
            [[18.0, 18.0], [30.0, 18.0], [30.0, 30.0], [18.0, 30.0]],
            (48, 48),
        );
        p.refresh(&peaks).unwrap();
        assert_eq!(p.pixels, [48, 48]);
        assert!((p.size[0] - 15.0).abs() < 1e-12);
        assert!((p.qscale[0] - 48.0 / 12.0).abs() < 1e-12);
    }

    #[test]
    fn refresh_with_lattice_constant_measures_size() {
        // 8 lattice periods along x and y on a 64 px frame, a0 = 0.5 nm
        let mut p = LatticeParameters::new(Some(0.5), [1.0, 1.0], [64, 64]).unwrap();
        let peaks = BraggPeakSet::new(
            [[24.0, 32.0], [32.0, 24.0], [40.0, 32.0], [32.0, 40.0]],
            (64, 64),
        );
        p.refresh(&peaks).unwrap();
        assert!((p.size[0] - 4.0).abs() < 1e-9);
        assert!((p.size[1] - 4.0).abs() < 1e-9);
    }
}
