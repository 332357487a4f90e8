use serde::{Deserialize, Serialize};

/// Whether the detector receives a real-space layer or a centred magnitude
/// spectrum.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpectrumInput {
    #[default]
    RealSpace,
    Fourier,
}

/// n-fold angular mask removing bands through the spectrum centre.
///
/// Band `i` runs along angle `offset + 2π i / order`; pixels closer than
/// `width` (in rows) to the band's centre line are zeroed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SymmetryMask {
    pub order: usize,
    pub offset: f64,
    pub width: f64,
}

/// Sub-pixel refinement by a 2D Gaussian fit around each integer peak.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubpixelFit {
    /// Half-size of the fitting window in pixels.
    pub half_width: usize,
    pub max_iterations: usize,
}

impl Default for SubpixelFit {
    fn default() -> Self {
        Self {
            half_width: 10,
            max_iterations: 50,
        }
    }
}

/// Bragg peak detection options.
///
/// Built once per calibration and shared read-only by every detection round.
///
/// - `min_dist`: minimum pixel separation of two maxima; also the width of the
///   ignored border.
/// - `threshold_rel`: maxima must exceed this fraction of the masked maximum.
/// - `low_q_mask`: width of the Gaussian DC suppressor as a fraction of the
///   frame size.
/// - `axis_mask`: half-width of the zeroed `qx = 0` / `qy = 0` stripes as a
///   fraction of the frame size.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BraggOptions {
    pub min_dist: usize,
    pub threshold_rel: f64,
    pub low_q_mask: Option<f64>,
    pub axis_mask: Option<f64>,
    pub symmetry_mask: Option<SymmetryMask>,
    pub even_out: bool,
    pub subpixel: Option<SubpixelFit>,
    pub input: SpectrumInput,
}

impl Default for BraggOptions {
    fn default() -> Self {
        Self {
            min_dist: 5,
            threshold_rel: 0.25,
            low_q_mask: None,
            axis_mask: None,
            symmetry_mask: None,
            even_out: false,
            subpixel: None,
            input: SpectrumInput::RealSpace,
        }
    }
}
