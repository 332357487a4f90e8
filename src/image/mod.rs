//! Image containers and the per-layer loop shared by the correction stages.
//!
//! A single scan is an [`Array2<f64>`] indexed `[row, col]`; a spectroscopic
//! stack is an [`Array3<f64>`] indexed `[layer, row, col]`. Every layer of a
//! stack has the same shape and receives the same correction.

pub mod io;

use crate::error::{DriftError, Result};
use ndarray::{Array2, Array3, ArrayView2, Axis};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Single scan or co-registered stack of scans.
#[derive(Clone, Debug, PartialEq)]
pub enum Image {
    Single(Array2<f64>),
    Stack(Array3<f64>),
}

impl Image {
    /// Shape `(rows, cols)` of one layer.
    pub fn layer_shape(&self) -> (usize, usize) {
        match self {
            Image::Single(a) => a.dim(),
            Image::Stack(s) => {
                let (_, h, w) = s.dim();
                (h, w)
            }
        }
    }

    pub fn layer_count(&self) -> usize {
        match self {
            Image::Single(_) => 1,
            Image::Stack(s) => s.len_of(Axis(0)),
        }
    }

    /// Applies `f` to every layer and reassembles the result.
    ///
    /// `f` may change the layer shape, but must do so identically for every
    /// layer of a stack.
    pub fn map_layers<F>(&self, progress: &dyn LayerProgress, f: F) -> Result<Image>
    where
        F: Fn(ArrayView2<'_, f64>) -> Result<Array2<f64>> + Sync + Send,
    {
        match self {
            Image::Single(a) => {
                if progress.is_cancelled() {
                    return Err(DriftError::Cancelled {
                        completed: 0,
                        total: 1,
                    });
                }
                let out = f(a.view())?;
                progress.layer_done(0, 1);
                Ok(Image::Single(out))
            }
            Image::Stack(s) => map_stack(s, progress, f).map(Image::Stack),
        }
    }

    pub fn as_single(&self) -> Option<&Array2<f64>> {
        match self {
            Image::Single(a) => Some(a),
            Image::Stack(_) => None,
        }
    }

    pub fn into_single(self) -> Option<Array2<f64>> {
        match self {
            Image::Single(a) => Some(a),
            Image::Stack(_) => None,
        }
    }

    pub fn into_stack(self) -> Option<Array3<f64>> {
        match self {
            Image::Single(_) => None,
            Image::Stack(s) => Some(s),
        }
    }
}

impl From<Array2<f64>> for Image {
    fn from(a: Array2<f64>) -> Self {
        Image::Single(a)
    }
}

impl From<Array3<f64>> for Image {
    fn from(s: Array3<f64>) -> Self {
        Image::Stack(s)
    }
}

/// Progress sink for long per-layer loops.
///
/// Layers may complete out of order when the `parallel` feature is enabled.
pub trait LayerProgress: Sync {
    fn layer_done(&self, _index: usize, _total: usize) {}

    /// Polled before each layer starts.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Progress sink that ignores every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl LayerProgress for NoProgress {}

/// Thread-safe counter with a cancellation flag.
#[derive(Debug, Default)]
pub struct ProgressCounter {
    done: AtomicUsize,
    cancelled: AtomicBool,
    cancel_after: Option<usize>,
}

impl ProgressCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation once `layers` layers have completed.
    pub fn cancel_after(layers: usize) -> Self {
        Self {
            cancel_after: Some(layers),
            ..Self::default()
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn completed(&self) -> usize {
        self.done.load(Ordering::SeqCst)
    }
}

impl LayerProgress for ProgressCounter {
    fn layer_done(&self, _index: usize, _total: usize) {
        let done = self.done.fetch_add(1, Ordering::SeqCst) + 1;
        if self.cancel_after.is_some_and(|limit| done >= limit) {
            self.cancel();
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

fn map_stack<F>(stack: &Array3<f64>, progress: &dyn LayerProgress, f: F) -> Result<Array3<f64>>
where
    F: Fn(ArrayView2<'_, f64>) -> Result<Array2<f64>> + Sync + Send,
{
    let total = stack.len_of(Axis(0));
    if total == 0 {
        return Err(DriftError::Configuration(
            "image stack has no layers".to_string(),
        ));
    }
    let completed = AtomicUsize::new(0);
    let run = |index: usize| -> Result<Array2<f64>> {
        if progress.is_cancelled() {
            return Err(DriftError::Cancelled {
                completed: completed.load(Ordering::SeqCst),
                total,
            });
        }
        let out = f(stack.index_axis(Axis(0), index))?;
        completed.fetch_add(1, Ordering::SeqCst);
        progress.layer_done(index, total);
        Ok(out)
    };

    #[cfg(feature = "parallel")]
    let layers: Result<Vec<Array2<f64>>> = (0..total).into_par_iter().map(run).collect();
    #[cfg(not(feature = "parallel"))]
    let layers: Result<Vec<Array2<f64>>> = (0..total).map(run).collect();
    let layers = layers?;

    let expected = layers[0].dim();
    if let Some(bad) = layers.iter().find(|l| l.dim() != expected) {
        return Err(DriftError::ShapeMismatch {
            expected,
            found: bad.dim(),
        });
    }
    let views: Vec<ArrayView2<'_, f64>> = layers.iter().map(|l| l.view()).collect();
    ndarray::stack(Axis(0), &views)
        .map_err(|e| DriftError::Configuration(format!("failed to stack layers: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn map_layers_keeps_layer_order() {
        let stack = Array3::from_shape_fn((5, 4, 3), |(k, _, _)| k as f64);
        let image = Image::Stack(stack);
        let out = image
            .map_layers(&NoProgress, |layer| Ok(layer.mapv(|v| v * 2.0)))
            .unwrap();
        let out = out.into_stack().unwrap();
        for k in 0..5 {
            assert!(out
                .index_axis(Axis(0), k)
                .iter()
                .all(|&v| (v - 2.0 * k as f64).abs() < 1e-12));
        }
    }

    #[test]
    fn map_layers_reports_progress() {
        let stack = Array3::<f64>::zeros((6, 2, 2));
        let counter = ProgressCounter::new();
        Image::Stack(stack)
            .map_layers(&counter, |layer| Ok(layer.to_owned()))
            .unwrap();
        assert_eq!(counter.completed(), 6);
    }

    #[test]
    fn cancelled_loop_returns_error() {
        let stack = Array3::<f64>::zeros((4, 2, 2));
        let counter = ProgressCounter::new();
        counter.cancel();
        let err = Image::Stack(stack)
            .map_layers(&counter, |layer| Ok(layer.to_owned()))
            .unwrap_err();
        assert!(matches!(err, DriftError::Cancelled { total: 4, .. }));
    }

    #[test]
    fn layer_shape_of_stack() {
        let image = Image::Stack(Array3::<f64>::zeros((3, 7, 9)));
        assert_eq!(image.layer_shape(), (7, 9));
        assert_eq!(image.layer_count(), 3);
    }
}
