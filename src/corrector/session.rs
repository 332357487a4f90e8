use super::bundle::DriftParameterBundle;
use super::params::DriftParams;
use super::pipeline::{apply_drift_parameters, find_drift_parameters, Calibration};
use crate::diagnostics::CalibrationReport;
use crate::error::{DriftError, Result};
use crate::image::{Image, LayerProgress};
use crate::lattice::{BraggPeakSet, LatticeParameters};
use ndarray::ArrayView2;

/// Stateful calibrate-once, apply-many session.
///
/// Owns the calibration parameters, the optional physical lattice
/// description, every peak set measured so far and the last bundle. The
/// pure functions in [`super::pipeline`] do the work; the session only
/// threads state between them.
#[derive(Clone, Debug)]
pub struct DriftCorrector {
    params: DriftParams,
    lattice: Option<LatticeParameters>,
    peak_history: Vec<BraggPeakSet>,
    bundle: Option<DriftParameterBundle>,
    report: Option<CalibrationReport>,
}

impl DriftCorrector {
    pub fn new(params: DriftParams) -> Self {
        Self {
            params,
            lattice: None,
            peak_history: Vec::new(),
            bundle: None,
            report: None,
        }
    }

    /// Keeps `lattice` refreshed after every calibration.
    pub fn with_lattice(mut self, lattice: LatticeParameters) -> Self {
        self.lattice = Some(lattice);
        self
    }

    /// Resumes from a stored bundle; replay works without calibrating.
    pub fn with_bundle(mut self, bundle: DriftParameterBundle) -> Self {
        self.bundle = Some(bundle);
        self
    }

    pub fn params(&self) -> &DriftParams {
        &self.params
    }

    pub fn lattice(&self) -> Option<&LatticeParameters> {
        self.lattice.as_ref()
    }

    /// Raw, ideal and output peaks of every calibration, oldest first.
    pub fn peak_history(&self) -> &[BraggPeakSet] {
        &self.peak_history
    }

    pub fn bundle(&self) -> Option<&DriftParameterBundle> {
        self.bundle.as_ref()
    }

    pub fn last_report(&self) -> Option<&CalibrationReport> {
        self.report.as_ref()
    }

    /// Calibrates on `reference` and stores the resulting bundle.
    ///
    /// The session state is only updated when the whole calibration
    /// succeeds.
    pub fn calibrate(&mut self, reference: ArrayView2<'_, f64>) -> Result<Calibration> {
        let calibration = find_drift_parameters(reference, &self.params)?;
        let bundle = &calibration.bundle;
        if let Some(lattice) = &self.lattice {
            let mut lattice = lattice.clone();
            lattice.refresh(bundle.ideal_peaks())?;
            if let Some(out) = bundle.output_peaks() {
                lattice.refresh(out)?;
            }
            self.lattice = Some(lattice);
        }
        self.peak_history.push(bundle.raw_peaks().clone());
        self.peak_history.push(bundle.ideal_peaks().clone());
        if let Some(out) = bundle.output_peaks() {
            self.peak_history.push(out.clone());
        }
        self.bundle = Some(calibration.bundle.clone());
        self.report = Some(calibration.report.clone());
        Ok(calibration)
    }

    /// Replays the stored bundle on a scan or stack.
    pub fn apply(&self, image: &Image, progress: &dyn LayerProgress) -> Result<Image> {
        let bundle = self.bundle.as_ref().ok_or_else(|| {
            DriftError::Configuration("no drift calibration to apply".to_string())
        })?;
        apply_drift_parameters(image, bundle, progress)
    }
}
