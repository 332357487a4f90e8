//! Drift calibration and replay.
//!
//! Overview
//! - [`find_drift_parameters`] runs the full calibration on one reference
//!   layer: optional pre-crop and global shear, Bragg detection, ideal lattice,
//!   phase maps, unwrapping, drift field, correction and optional
//!   commensurate post-crop.
//! - [`apply_drift_parameters`] replays a [`DriftParameterBundle`] on a scan
//!   or a co-registered stack without detecting anything.
//! - [`DriftCorrector`] keeps the state of a calibrate-once, apply-many
//!   session.
//!
//! Modules
//! - [`params`] – the [`DriftParams`] value object.
//! - `bundle` – the replayable record.
//! - `pipeline` – the pure calibration and replay functions.
//! - `session` – the stateful wrapper.

mod bundle;
pub mod params;
mod pipeline;
mod session;

pub use bundle::DriftParameterBundle;
pub use params::DriftParams;
pub use pipeline::{apply_drift_parameters, find_drift_parameters, Calibration};
pub use session::DriftCorrector;
