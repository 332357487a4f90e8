//! Margin trimming and commensurate resampling.
//!
//! A crop first removes `[left, right, down, up]` pixels from the layer edges
//! (`down` are the first rows). With commensuration enabled it then measures
//! the lattice period from the peak spacing, shrinks each axis to the largest
//! whole number of periods and resamples that centred window back onto the
//! trimmed pixel count with cubic splines, so no partial unit cell is left at
//! the border.
//!
//! [`plan_crop`] measures, [`apply_crop`] replays a plan on any image with the
//! same layer shape.

use crate::angle::compute_dist;
use crate::bragg::{find_bragg_peaks, BraggOptions};
use crate::error::{DriftError, Result};
use crate::image::{Image, LayerProgress};
use crate::interp::{resample, Interpolation};
use crate::lattice::{center_of, BraggPeakSet};
use log::debug;
use ndarray::{s, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// Edge margins in pixels: one value for every edge, or `[left, right, down, up]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Margins {
    Uniform(usize),
    Edges([usize; 4]),
}

impl Default for Margins {
    fn default() -> Self {
        Margins::Uniform(0)
    }
}

impl Margins {
    pub fn edges(&self) -> [usize; 4] {
        match *self {
            Margins::Uniform(m) => [m; 4],
            Margins::Edges(e) => e,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropSpec {
    pub margins: Margins,
    pub commensurate: bool,
    /// Number of half-spacings per period along each axis.
    pub cell_scale: [f64; 2],
}

impl Default for CropSpec {
    fn default() -> Self {
        Self {
            margins: Margins::default(),
            commensurate: false,
            cell_scale: [2.0, 2.0],
        }
    }
}

impl CropSpec {
    pub fn margins(margins: Margins) -> Self {
        Self {
            margins,
            ..Self::default()
        }
    }

    pub fn commensurate(margins: Margins) -> Self {
        Self {
            margins,
            commensurate: true,
            ..Self::default()
        }
    }
}

/// Whole-period window measured on a trimmed layer, in trimmed pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommensurateFrame {
    /// Lattice period `[x, y]`.
    pub period: [f64; 2],
    pub periods: [usize; 2],
    /// Window origin `[x, y]`.
    pub offset: [f64; 2],
    /// Window size `[x, y]`, `period * periods`.
    pub extent: [f64; 2],
}

impl CommensurateFrame {
    /// Period in output pixels once the window is resampled onto `shape`.
    pub fn resampled_period(&self, shape: (usize, usize)) -> [f64; 2] {
        [
            shape.1 as f64 / self.periods[0] as f64,
            shape.0 as f64 / self.periods[1] as f64,
        ]
    }
}

/// Replayable record of one crop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CropPlan {
    pub source_shape: (usize, usize),
    pub edges: [usize; 4],
    pub frame: Option<CommensurateFrame>,
}

impl CropPlan {
    pub fn output_shape(&self) -> (usize, usize) {
        let [left, right, down, up] = self.edges;
        (
            self.source_shape.0 - down - up,
            self.source_shape.1 - left - right,
        )
    }

    /// Re-expresses peaks measured on the source frame in the output frame.
    ///
    /// Frequencies in bins scale with the covered extent: the trimmed size,
    /// or the commensurate window when one was resampled.
    pub fn map_peaks(&self, peaks: &BraggPeakSet) -> BraggPeakSet {
        let peaks = if peaks.shape() == self.source_shape {
            peaks.clone()
        } else {
            peaks.rescaled_to(self.source_shape)
        };
        let (rows, cols) = self.output_shape();
        let extent = match self.frame {
            Some(f) => f.extent,
            None => [cols as f64, rows as f64],
        };
        let scale = [
            extent[0] / self.source_shape.1 as f64,
            extent[1] / self.source_shape.0 as f64,
        ];
        let c = center_of((rows, cols));
        let mapped = peaks
            .q_vectors()
            .map(|q| [c[0] + q[0] * scale[0], c[1] + q[1] * scale[1]]);
        BraggPeakSet::new(mapped, (rows, cols))
    }
}

#[derive(Clone, Debug)]
pub struct CropResult {
    pub image: Image,
    pub plan: CropPlan,
}

/// Removes the margins `[left, right, down, up]`.
pub fn rough_cut(layer: ArrayView2<'_, f64>, edges: [usize; 4]) -> Result<Array2<f64>> {
    let (rows, cols) = layer.dim();
    let [left, right, down, up] = edges;
    if left + right >= cols || down + up >= rows {
        return Err(DriftError::Configuration(format!(
            "margins {edges:?} leave nothing of a {rows}x{cols} layer"
        )));
    }
    Ok(layer.slice(s![down..rows - up, left..cols - right]).to_owned())
}

/// Largest centred window holding a whole number of lattice periods.
///
/// The periods are `cell_scale[0] * cols / |p0 - p1|` and
/// `cell_scale[1] * rows / |p0 - p3|` with `peaks` expressed in a frame of
/// `shape`.
pub fn commensurate_frame(
    shape: (usize, usize),
    peaks: &BraggPeakSet,
    cell_scale: [f64; 2],
) -> Result<CommensurateFrame> {
    let peaks = if peaks.shape() == shape {
        peaks.clone()
    } else {
        peaks.rescaled_to(shape)
    };
    let p = peaks.peaks();
    let spacing = [compute_dist(p[0], p[1], None), compute_dist(p[0], p[3], None)];
    let lengths = [shape.1 as f64, shape.0 as f64];
    let mut period = [0.0; 2];
    let mut periods = [0usize; 2];
    let mut offset = [0.0; 2];
    let mut extent = [0.0; 2];
    for axis in 0..2 {
        if spacing[axis] <= f64::EPSILON {
            return Err(DriftError::DegenerateGeometry(format!(
                "coincident peaks {:?}",
                p
            )));
        }
        period[axis] = cell_scale[axis] * lengths[axis] / spacing[axis];
        let count = (lengths[axis] / period[axis]).floor();
        if !count.is_finite() || count < 1.0 {
            return Err(DriftError::DegenerateGeometry(format!(
                "period {:.3} px exceeds the {} px frame",
                period[axis], lengths[axis]
            )));
        }
        periods[axis] = count as usize;
        extent[axis] = period[axis] * count;
        offset[axis] = 0.5 * (lengths[axis] - extent[axis]);
    }
    Ok(CommensurateFrame {
        period,
        periods,
        offset,
        extent,
    })
}

/// Measures a crop on `reference` (one layer of the image to crop).
///
/// When commensuration is requested and `peaks` is `None` the peaks are
/// detected on the trimmed reference with `bragg`.
pub fn plan_crop(
    reference: ArrayView2<'_, f64>,
    spec: &CropSpec,
    peaks: Option<&BraggPeakSet>,
    bragg: &BraggOptions,
) -> Result<CropPlan> {
    let edges = spec.margins.edges();
    let trimmed = rough_cut(reference, edges)?;
    let frame = if spec.commensurate {
        let detected;
        let peaks = match peaks {
            Some(p) => p,
            None => {
                detected = find_bragg_peaks(trimmed.view(), bragg)?;
                &detected
            }
        };
        let frame = commensurate_frame(trimmed.dim(), peaks, spec.cell_scale)?;
        debug!(
            "commensurate crop: period={:?} periods={:?} extent={:?}",
            frame.period, frame.periods, frame.extent
        );
        Some(frame)
    } else {
        None
    };
    Ok(CropPlan {
        source_shape: reference.dim(),
        edges,
        frame,
    })
}

/// Applies a plan to one layer.
pub fn crop_layer(layer: ArrayView2<'_, f64>, plan: &CropPlan) -> Result<Array2<f64>> {
    if layer.dim() != plan.source_shape {
        return Err(DriftError::ShapeMismatch {
            expected: plan.source_shape,
            found: layer.dim(),
        });
    }
    let trimmed = rough_cut(layer, plan.edges)?;
    let Some(frame) = plan.frame else {
        return Ok(trimmed);
    };
    let (rows, cols) = trimmed.dim();
    let step = [frame.extent[0] / cols as f64, frame.extent[1] / rows as f64];
    Ok(resample(trimmed.view(), Interpolation::Cubic, (rows, cols), |r, c| {
        (
            frame.offset[0] + c as f64 * step[0],
            frame.offset[1] + r as f64 * step[1],
        )
    }))
}

/// Applies a plan to every layer.
pub fn apply_crop(image: &Image, plan: &CropPlan, progress: &dyn LayerProgress) -> Result<Image> {
    image.map_layers(progress, |layer| crop_layer(layer, plan))
}

/// Plans on the first layer and crops every layer.
pub fn crop(
    image: &Image,
    spec: &CropSpec,
    peaks: Option<&BraggPeakSet>,
    bragg: &BraggOptions,
    progress: &dyn LayerProgress,
) -> Result<CropResult> {
    let plan = match image {
        Image::Single(a) => plan_crop(a.view(), spec, peaks, bragg)?,
        Image::Stack(s) => {
            if s.is_empty() {
                return Err(DriftError::Configuration(
                    "image stack has no layers".to_string(),
                ));
            }
            plan_crop(s.index_axis(ndarray::Axis(0), 0), spec, peaks, bragg)?
        }
    };
    let image = apply_crop(image, &plan, progress)?;
    Ok(CropResult { image, plan })
}
