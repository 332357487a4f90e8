//! I/O helpers for grayscale scans and JSON.
//!
//! - `load_grayscale`: read a PNG into a `[0, 1]` floating-point layer.
//! - `save_normalized_png`: write a layer to a 16-bit PNG, min/max stretched.
//! - `write_json_file` / `read_json_file`: pretty JSON on disk.
use image::{ImageBuffer, Luma};
use ndarray::Array2;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Load an image from disk as a 16-bit grayscale layer scaled to `[0, 1]`.
pub fn load_grayscale(path: &Path) -> Result<Array2<f64>, String> {
    let img = image::open(path)
        .map_err(|e| format!("Failed to open {}: {e}", path.display()))?
        .into_luma16();
    let width = img.width() as usize;
    let height = img.height() as usize;
    let data: Vec<f64> = img
        .into_raw()
        .into_iter()
        .map(|v| f64::from(v) / f64::from(u16::MAX))
        .collect();
    Array2::from_shape_vec((height, width), data)
        .map_err(|e| format!("Failed to shape {}: {e}", path.display()))
}

/// Save a layer to a 16-bit grayscale PNG, mapping `[min, max]` onto the full range.
pub fn save_normalized_png(layer: &Array2<f64>, path: &Path) -> Result<(), String> {
    ensure_parent_dir(path)?;
    let (height, width) = layer.dim();
    let (lo, hi) = layer
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let span = if hi > lo { hi - lo } else { 1.0 };
    let mut out: ImageBuffer<Luma<u16>, Vec<u16>> =
        ImageBuffer::new(width as u32, height as u32);
    for ((y, x), &v) in layer.indexed_iter() {
        let t = if v.is_finite() { (v - lo) / span } else { 0.0 };
        let px = (t * f64::from(u16::MAX)).round().clamp(0.0, f64::from(u16::MAX));
        out.put_pixel(x as u32, y as u32, Luma([px as u16]));
    }
    out.save(path)
        .map_err(|e| format!("Failed to save {}: {e}", path.display()))
}

/// Serialize a value as pretty JSON to `path`, creating parent directories.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), String> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Failed to serialize JSON for {}: {e}", path.display()))?;
    fs::write(path, json).map_err(|e| format!("Failed to write JSON {}: {e}", path.display()))
}

/// Read a JSON document written by [`write_json_file`].
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, String> {
    let data = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    serde_json::from_str(&data).map_err(|e| format!("Failed to parse {}: {e}", path.display()))
}

fn ensure_parent_dir(path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {}: {e}", parent.display()))?;
        }
    }
    Ok(())
}
