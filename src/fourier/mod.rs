//! Frequency-domain primitives: 2D transforms, spectrum shifting and the
//! Gaussian filters used by peak detection and phase demodulation.
//!
//! Conventions
//! - Arrays are indexed `[row, col]`; `x` runs along columns.
//! - After [`fftshift`], the zero-frequency bin sits at `(rows / 2, cols / 2)`,
//!   which is also the centre used for every peak coordinate in the crate.

mod fft;
mod filters;

pub use fft::{fft2, fft2_real, fftshift, ifft2, ifft2_real, ifftshift, magnitude_spectrum};
pub use filters::{fourier_lowpass, gaussian2d, gaussian_smooth_complex, signed_frequency};
