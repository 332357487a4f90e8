//! Lattice description: the four-peak set, physical lattice parameters and
//! the instrument-header view they can be derived from.

pub mod header;
pub mod params;
pub mod peaks;

pub use header::{HeaderValue, ScanHeader};
pub use params::LatticeParameters;
pub use peaks::{
    center_of, even_out, frequency_scale, sort_by_polar_angle, BraggPeakSet, PEAK_COUNT,
};
