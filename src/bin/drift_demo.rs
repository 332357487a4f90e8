use lattice_drift::config::drift::{self, RuntimeConfig};
use lattice_drift::corrector::{Calibration, DriftCorrector, DriftParameterBundle};
use lattice_drift::fourier::magnitude_spectrum;
use lattice_drift::image::io::{
    load_grayscale, read_json_file, save_normalized_png, write_json_file,
};
use lattice_drift::image::{Image, NoProgress};
use log::{info, warn};
use ndarray::Array2;
use std::env;
use std::path::Path;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn usage() -> String {
    "Usage: drift_demo <config.json>".to_string()
}

fn run() -> Result<(), String> {
    let config_path = env::args().nth(1).ok_or_else(usage)?;
    let config = drift::load_config(Path::new(&config_path))?;

    let reference = load_grayscale(&config.input_path)?;
    if let Some(path) = &config.bundle_path {
        let bundle: DriftParameterBundle = read_json_file(path)?;
        info!("replaying stored bundle {}", path.display());
        let corrector = DriftCorrector::new(config.params.clone()).with_bundle(bundle);
        let corrected = replay_layer(&corrector, reference, &config.input_path)?;
        if let Some(out) = &config.output.corrected_png {
            save_normalized_png(&corrected, out)?;
            info!("corrected layer written to {}", out.display());
        }
        return run_replay_jobs(&corrector, &config);
    }

    let mut corrector = DriftCorrector::new(config.params.clone());
    let calibration = corrector
        .calibrate(reference.view())
        .map_err(|e| format!("Calibration failed: {e}"))?;
    print_summary(&calibration);

    if let Some(path) = &config.output.corrected_png {
        save_normalized_png(&calibration.corrected, path)?;
        info!("corrected layer written to {}", path.display());
    }
    if let Some(path) = &config.output.bundle_json {
        write_json_file(path, &calibration.bundle)?;
        info!("parameter bundle written to {}", path.display());
    }
    if let Some(path) = &config.output.report_json {
        write_json_file(path, &calibration.report)?;
    }

    run_replay_jobs(&corrector, &config)?;

    if let Some(dir) = &config.output.debug_dir {
        save_debug_artifacts(dir, &reference, &calibration, &config);
    }
    Ok(())
}

fn replay_layer(
    corrector: &DriftCorrector,
    layer: Array2<f64>,
    source: &Path,
) -> Result<Array2<f64>, String> {
    corrector
        .apply(&Image::Single(layer), &NoProgress)
        .map_err(|e| format!("Replay on {} failed: {e}", source.display()))?
        .into_single()
        .ok_or_else(|| format!("Replay on {} returned a stack", source.display()))
}

fn run_replay_jobs(corrector: &DriftCorrector, config: &RuntimeConfig) -> Result<(), String> {
    for job in &config.replay {
        let layer = load_grayscale(&job.input_path)?;
        let out = replay_layer(corrector, layer, &job.input_path)?;
        save_normalized_png(&out, &job.output_png)?;
        info!("replayed {} -> {}", job.input_path.display(), job.output_png.display());
    }
    Ok(())
}

fn print_summary(calibration: &Calibration) {
    let report = &calibration.report;
    println!("Drift calibration");
    println!("  input: {}x{}", report.input.cols, report.input.rows);
    println!("  output: {}x{}", report.output.cols, report.output.rows);
    println!(
        "  angle: {:.2} deg  orient: {:.2} deg",
        report.angle.to_degrees(),
        report.orient.to_degrees()
    );
    for (label, peaks) in [("raw", &report.raw_peaks), ("ideal", &report.ideal_peaks)] {
        println!("  {label} q: {:?}", peaks.q_vectors);
    }
    println!(
        "  drift: ux in [{:.3}, {:.3}] uy in [{:.3}, {:.3}] rms={:.3} px",
        report.drift.ux_range[0],
        report.drift.ux_range[1],
        report.drift.uy_range[0],
        report.drift.uy_range[1],
        report.drift.rms
    );
    if let Some(period) = report.period {
        println!("  period: [{:.3}, {:.3}] px", period[0], period[1]);
    }
    let stages: Vec<String> = report
        .timings
        .stages
        .iter()
        .map(|s| format!("{}={:.2}", s.label, s.elapsed_ms))
        .collect();
    println!(
        "  timings (ms): {} total={:.2}",
        stages.join(" "),
        report.timings.total_ms
    );
}

/// Writes intermediate maps; failures are logged and never abort the run.
fn save_debug_artifacts(
    dir: &Path,
    reference: &Array2<f64>,
    calibration: &Calibration,
    config: &RuntimeConfig,
) {
    if let Err(err) = std::fs::create_dir_all(dir) {
        warn!("debug directory {} unavailable: {err}", dir.display());
        return;
    }
    let bundle = &calibration.bundle;
    let field = bundle.field();
    let mut artifacts = vec![
        ("phase_1.png", bundle.phases()[0].clone()),
        ("phase_2.png", bundle.phases()[1].clone()),
        ("drift_ux.png", field.ux.clone()),
        ("drift_uy.png", field.uy.clone()),
        ("spectrum_before.png", magnitude_spectrum(reference.view())),
        (
            "spectrum_after.png",
            magnitude_spectrum(calibration.corrected.view()),
        ),
    ];
    if config.output.corrected_png.is_none() {
        artifacts.push(("corrected.png", calibration.corrected.clone()));
    }
    for (name, layer) in &artifacts {
        let path = dir.join(name);
        if let Err(err) = save_normalized_png(layer, &path) {
            warn!("debug artifact {} skipped: {err}", path.display());
        }
    }
    if let Err(err) = write_json_file(&dir.join("report.json"), &calibration.report) {
        warn!("debug report skipped: {err}");
    }
    info!("debug artifacts written to {}", dir.display());
}
