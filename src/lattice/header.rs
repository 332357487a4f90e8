//! Minimal view of an instrument header as parsed by an external reader.

use crate::error::{DriftError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw header value as delivered by a file-format reader.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Number(f64),
    Numbers(Vec<f64>),
    Text(String),
}

/// Key/value header; only scan extent and pixel count are consulted.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanHeader {
    entries: BTreeMap<String, HeaderValue>,
}

impl ScanHeader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: HeaderValue) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.entries.get(key)
    }

    /// Scan extent `[x, y]` in nm.
    ///
    /// Read from the last two values of `scan_range`, or of the
    /// `;`-separated `Grid settings` text.
    pub fn scan_size(&self) -> Result<[f64; 2]> {
        if let Some(v) = self.get("scan_range") {
            return last_pair(v, "scan_range");
        }
        if let Some(HeaderValue::Text(text)) = self.get("Grid settings") {
            let values = text
                .split(';')
                .map(|t| t.trim().parse::<f64>())
                .collect::<std::result::Result<Vec<f64>, _>>()
                .map_err(|e| {
                    DriftError::Configuration(format!("invalid 'Grid settings' entry: {e}"))
                })?;
            return last_pair(&HeaderValue::Numbers(values), "Grid settings");
        }
        Err(DriftError::Configuration(
            "scan size missing from header; supply it explicitly".to_string(),
        ))
    }

    /// Pixel count `[x, y]`.
    ///
    /// Read from the last two values of `scan_pixels`, or from the last
    /// integer of the `Grid dim` text (square grid).
    pub fn scan_pixels(&self) -> Result<[usize; 2]> {
        let pair = if let Some(v) = self.get("scan_pixels") {
            last_pair(v, "scan_pixels")?
        } else if let Some(HeaderValue::Text(text)) = self.get("Grid dim") {
            let n = text
                .split(|c: char| !c.is_ascii_digit())
                .filter(|t| !t.is_empty())
                .last()
                .and_then(|t| t.parse::<f64>().ok())
                .ok_or_else(|| {
                    DriftError::Configuration(format!("invalid 'Grid dim' entry: {text}"))
                })?;
            [n, n]
        } else {
            return Err(DriftError::Configuration(
                "pixel count missing from header; supply it explicitly".to_string(),
            ));
        };
        if pair.iter().any(|v| *v < 1.0 || v.fract() != 0.0) {
            return Err(DriftError::Configuration(format!(
                "pixel count must be positive integers, got {pair:?}"
            )));
        }
        Ok([pair[0] as usize, pair[1] as usize])
    }
}

fn last_pair(value: &HeaderValue, key: &str) -> Result<[f64; 2]> {
    match value {
        HeaderValue::Number(v) => Ok([*v, *v]),
        HeaderValue::Numbers(vs) if vs.len() >= 2 => Ok([vs[vs.len() - 2], vs[vs.len() - 1]]),
        HeaderValue::Numbers(vs) if vs.len() == 1 => Ok([vs[0], vs[0]]),
        HeaderValue::Text(text) => {
            let values: Vec<f64> = text
                .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
                .filter(|t| !t.is_empty())
                .map(|t| t.parse::<f64>())
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| DriftError::Configuration(format!("invalid '{key}' entry: {e}")))?;
            last_pair(&HeaderValue::Numbers(values), key)
        }
        _ => Err(DriftError::Configuration(format!(
            "'{key}' holds no numeric pair"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_last_two_values() {
        let mut h = ScanHeader::new();
        h.insert("scan_range", HeaderValue::Numbers(vec![0.0, 25.0, 30.0]));
        h.insert("scan_pixels", HeaderValue::Numbers(vec![256.0, 512.0]));
        assert_eq!(h.scan_size().unwrap(), [25.0, 30.0]);
        assert_eq!(h.scan_pixels().unwrap(), [256, 512]);
    }

    #[test]
    fn falls_back_to_grid_entries() {
        let mut h = ScanHeader::new();
        h.insert("Grid settings", HeaderValue::Text("1;2;40.5;40.5".into()));
        h.insert("Grid dim", HeaderValue::Text("128 x 128.".into()));
        assert_eq!(h.scan_size().unwrap(), [40.5, 40.5]);
        assert_eq!(h.scan_pixels().unwrap(), [128, 128]);
    }

    #[test]
    fn missing_entries_are_configuration_errors() {
        let h = ScanHeader::new();
        assert!(matches!(h.scan_size(), Err(DriftError::Configuration(_))));
        assert!(matches!(h.scan_pixels(), Err(DriftError::Configuration(_))));
    }

    #[test]
    fn parses_from_json() {
        let h: ScanHeader =
            serde_json::from_str(r#"{"scan_range": [10.0, 10.0], "scan_pixels": "64 64"}"#)
                .unwrap();
        assert_eq!(h.scan_pixels().unwrap(), [64, 64]);
    }
}
