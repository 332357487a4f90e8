use crate::corrector::DriftParams;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Corrected reference layer as a normalised 16-bit PNG.
    pub corrected_png: Option<PathBuf>,
    /// Replayable parameter bundle.
    pub bundle_json: Option<PathBuf>,
    pub report_json: Option<PathBuf>,
    /// Phase maps, drift fields and spectra of the calibration.
    pub debug_dir: Option<PathBuf>,
}

/// Extra layer corrected with the calibration of the reference.
#[derive(Clone, Debug, Deserialize)]
pub struct ReplayConfig {
    pub input_path: PathBuf,
    pub output_png: PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RuntimeConfig {
    pub input_path: PathBuf,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub params: DriftParams,
    /// Bundle written by an earlier run; when set, the input is replayed
    /// with it instead of being calibrated.
    #[serde(default)]
    pub bundle_path: Option<PathBuf>,
    #[serde(default)]
    pub replay: Vec<ReplayConfig>,
}

pub fn load_config(path: &Path) -> Result<RuntimeConfig, String> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
    let config: RuntimeConfig = serde_json::from_str(&contents)
        .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::PhaseMethod;

    #[test]
    fn minimal_config_parses() {
        let cfg: RuntimeConfig = serde_json::from_str(
            r#"{
                "input_path": "scan.png",
                "params": { "method": "convolution", "sigma": 4.0,
                            "post_crop": { "margins": 3, "commensurate": true } },
                "output": { "bundle_json": "out/bundle.json" }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.input_path, PathBuf::from("scan.png"));
        assert_eq!(cfg.params.method, PhaseMethod::Convolution);
        let post = cfg.params.post_crop.unwrap();
        assert!(post.commensurate);
        assert_eq!(post.margins.edges(), [3; 4]);
        assert!(cfg.output.corrected_png.is_none());
        assert!(cfg.replay.is_empty());
        assert!(cfg.bundle_path.is_none());
    }

    #[test]
    fn stored_bundle_and_replay_jobs_parse() {
        let cfg: RuntimeConfig = serde_json::from_str(
            r#"{
                "input_path": "didv_0.png",
                "bundle_path": "out/bundle.json",
                "replay": [{ "input_path": "didv_1.png", "output_png": "out/didv_1.png" }]
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.bundle_path, Some(PathBuf::from("out/bundle.json")));
        assert_eq!(cfg.replay.len(), 1);
        assert_eq!(cfg.params.method, PhaseMethod::LockIn);
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load_config(Path::new("/nonexistent/drift.json")).unwrap_err();
        assert!(err.starts_with("Failed to read config"));
    }
}
