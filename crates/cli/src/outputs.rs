//! Artifacts written after `run`/`resume`, each with a provenance sidecar.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use geodesics::api::{GeodesicOptimizer, Model};
use serde_json::json;

use crate::provenance::{self, Payload};
use crate::settings::RunSettings;
use crate::{store, tables};

/// Write history/progress tables, the path and a checkpoint under `out`.
///
/// Returns the artifact paths (sidecars not included).
pub fn write_outputs<M: Model>(
    opt: &GeodesicOptimizer<M>,
    settings: &RunSettings,
    out: &Path,
    parquet: bool,
    tag: Option<String>,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;
    let ext = if parquet { "parquet" } else { "csv" };
    let history = opt.history();
    let (jerkiness, jerkiness_error) = match opt.jerkiness() {
        Ok(j) => (Some(j), None),
        Err(err) => {
            tracing::warn!(%err, "jerkiness unavailable for the final path");
            (None, Some(err.to_string()))
        }
    };
    let payload = Payload::new(serde_json::to_value(settings)?)
        .with_tag(tag)
        .with_outcome(json!({
            "state": opt.state().as_str(),
            "iterations": opt.iteration(),
            "final_loss": history.losses.last(),
            "pixel_tol": opt.pixel_tol(),
            "jerkiness": jerkiness,
            "jerkiness_error": jerkiness_error,
        }));

    let mut written = Vec::new();
    let history_path = out.join(format!("history.{ext}"));
    tables::write_table(&mut tables::history_frame(&history)?, &history_path)?;
    written.push(history_path);

    if !history.progress.is_empty() {
        let path = out.join(format!("step_energy.{ext}"));
        tables::write_table(&mut tables::step_energy_frame(&history.progress)?, &path)?;
        written.push(path);
        let path = out.join(format!("deviation.{ext}"));
        tables::write_table(&mut tables::deviation_frame(&history.progress)?, &path)?;
        written.push(path);
    }

    let path = out.join("path.json");
    store::save_path(&path, &opt.path())?;
    written.push(path);
    let path = out.join("checkpoint.json");
    store::save_checkpoint(&path, &opt.checkpoint()?, settings)?;
    written.push(path);

    for artifact in &written {
        provenance::write_sidecar(artifact, &payload)?;
    }
    tracing::info!(out = %out.display(), artifacts = written.len(), "outputs written");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geodesics::api::{GeodesicCfg, Identity, Initializer, ModelError, Tensor};
    use serde_json::Value;
    use tempfile::tempdir;

    fn sidecar(artifact: &Path) -> Value {
        let stem = artifact.file_stem().unwrap().to_string_lossy().into_owned();
        let path = artifact.with_file_name(format!("{stem}.provenance.json"));
        serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
    }

    #[test]
    fn every_artifact_gets_a_sidecar() {
        let settings = RunSettings {
            width: 8,
            features: 4,
            shift: 2,
            n_steps: 4,
            max_iterations: 5,
            store_progress: 2,
            ..RunSettings::default()
        };
        let (a, b) = settings.endpoints().unwrap();
        let mut opt =
            GeodesicOptimizer::new(settings.model(), &a, &b, 4, &settings.cfg()).unwrap();
        opt.run(5).unwrap();
        let dir = tempdir().unwrap();
        let written = write_outputs(&opt, &settings, dir.path(), false, Some("t".into())).unwrap();
        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            [
                "history.csv",
                "step_energy.csv",
                "deviation.csv",
                "path.json",
                "checkpoint.json"
            ]
        );
        for artifact in &written {
            assert!(artifact.exists());
            let doc = sidecar(artifact);
            assert_eq!(doc["tag"], "t");
            assert_eq!(doc["outcome"]["iterations"], 5);
            assert!(doc["outcome"]["jerkiness"].is_array());
        }
    }

    /// Identity forward, failing backward pass.
    struct NoBackward;

    impl Model for NoBackward {
        fn forward(&self, image: &Tensor) -> Result<Tensor, ModelError> {
            Ok(image.clone())
        }
        fn vjp(&self, _image: &Tensor, _cotangent: &Tensor) -> Result<Tensor, ModelError> {
            Err(ModelError::new("no backward pass"))
        }
    }

    #[test]
    fn jerkiness_failure_is_recorded_not_hidden() {
        let a = Tensor::zeros(&[2]);
        let b = Tensor::filled(&[2], 1.0);
        let bent = vec![
            a.clone(),
            Tensor::new(vec![2], vec![1.0, -1.0]).unwrap(),
            b.clone(),
        ];
        let cfg = GeodesicCfg {
            initializer: Initializer::Custom(bent),
            ..GeodesicCfg::default()
        };
        let opt = GeodesicOptimizer::new(NoBackward, &a, &b, 2, &cfg).unwrap();
        assert!(GeodesicOptimizer::new(Identity, &a, &b, 2, &cfg)
            .unwrap()
            .jerkiness()
            .is_ok());

        let dir = tempdir().unwrap();
        let written =
            write_outputs(&opt, &RunSettings::default(), dir.path(), false, None).unwrap();
        let doc = sidecar(&written[0]);
        assert!(doc["outcome"]["jerkiness"].is_null());
        let reason = doc["outcome"]["jerkiness_error"].as_str().unwrap();
        assert!(reason.contains("no backward pass"));
    }
}
