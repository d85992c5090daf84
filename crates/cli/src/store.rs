//! JSON persistence for checkpoints and paths.
//!
//! The library keeps `Checkpoint` free of serialization concerns; this module
//! mirrors it with serde records and converts both ways. A checkpoint file
//! also carries the `RunSettings` that produced it.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use geodesics::api::{Checkpoint, History, LineDeviation, OptimizerState, ProgressRecord, Tensor};
use serde::{Deserialize, Serialize};

use crate::settings::RunSettings;

const FORMAT_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TensorRecord {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

impl From<&Tensor> for TensorRecord {
    fn from(t: &Tensor) -> Self {
        Self {
            shape: t.shape().to_vec(),
            data: t.as_slice().to_vec(),
        }
    }
}

impl TensorRecord {
    fn into_tensor(self) -> Result<Tensor> {
        Ok(Tensor::new(self.shape, self.data)?)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ProgressEntry {
    iteration: usize,
    step_energy: Vec<f64>,
    along: Vec<f64>,
    from: Vec<f64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct HistoryRecord {
    losses: Vec<f64>,
    energies: Vec<f64>,
    gradient_norms: Vec<f64>,
    pixel_change_norms: Vec<f64>,
    learning_rates: Vec<f64>,
    progress: Vec<ProgressEntry>,
}

impl From<&History> for HistoryRecord {
    fn from(h: &History) -> Self {
        Self {
            losses: h.losses.clone(),
            energies: h.energies.clone(),
            gradient_norms: h.gradient_norms.clone(),
            pixel_change_norms: h.pixel_change_norms.clone(),
            learning_rates: h.learning_rates.clone(),
            progress: h
                .progress
                .iter()
                .map(|p| ProgressEntry {
                    iteration: p.iteration,
                    step_energy: p.step_energy.clone(),
                    along: p.deviation.along.clone(),
                    from: p.deviation.from.clone(),
                })
                .collect(),
        }
    }
}

impl From<HistoryRecord> for History {
    fn from(h: HistoryRecord) -> Self {
        Self {
            losses: h.losses,
            energies: h.energies,
            gradient_norms: h.gradient_norms,
            pixel_change_norms: h.pixel_change_norms,
            learning_rates: h.learning_rates,
            progress: h
                .progress
                .into_iter()
                .map(|p| ProgressRecord {
                    iteration: p.iteration,
                    step_energy: p.step_energy,
                    deviation: LineDeviation {
                        along: p.along,
                        from: p.from,
                    },
                })
                .collect(),
        }
    }
}

/// On-disk layout of `checkpoint.json`.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct CheckpointFile {
    format_version: u32,
    settings: RunSettings,
    n_steps: usize,
    image_a: TensorRecord,
    image_b: TensorRecord,
    path: Vec<TensorRecord>,
    iteration: usize,
    state: String,
    history: HistoryRecord,
    pixelfade_loss: f64,
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    Ok(())
}

pub fn save_checkpoint(path: &Path, checkpoint: &Checkpoint, settings: &RunSettings) -> Result<()> {
    let file = CheckpointFile {
        format_version: FORMAT_VERSION,
        settings: settings.clone(),
        n_steps: checkpoint.n_steps,
        image_a: (&checkpoint.image_a).into(),
        image_b: (&checkpoint.image_b).into(),
        path: checkpoint.path.iter().map(TensorRecord::from).collect(),
        iteration: checkpoint.iteration,
        state: checkpoint.state.as_str().to_string(),
        history: (&checkpoint.history).into(),
        pixelfade_loss: checkpoint.pixelfade_loss,
    };
    ensure_parent(path)?;
    fs::write(path, serde_json::to_vec(&file)?)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn load_checkpoint(path: &Path) -> Result<(Checkpoint, RunSettings)> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let file: CheckpointFile = serde_json::from_slice(&bytes)
        .with_context(|| format!("parsing checkpoint {}", path.display()))?;
    if file.format_version != FORMAT_VERSION {
        bail!(
            "checkpoint format {} is not supported (expected {})",
            file.format_version,
            FORMAT_VERSION
        );
    }
    let Some(state) = OptimizerState::parse(&file.state) else {
        bail!("unknown optimizer state {:?}", file.state);
    };
    let checkpoint = Checkpoint {
        n_steps: file.n_steps,
        image_a: file.image_a.into_tensor()?,
        image_b: file.image_b.into_tensor()?,
        path: file
            .path
            .into_iter()
            .map(TensorRecord::into_tensor)
            .collect::<Result<_>>()?,
        iteration: file.iteration,
        state,
        history: file.history.into(),
        pixelfade_loss: file.pixelfade_loss,
    };
    Ok((checkpoint, file.settings))
}

/// Write the frames of a path as `[{shape, data}, ...]`.
pub fn save_path(path: &Path, frames: &[Tensor]) -> Result<()> {
    let records: Vec<TensorRecord> = frames.iter().map(TensorRecord::from).collect();
    ensure_parent(path)?;
    fs::write(path, serde_json::to_vec(&records)?)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geodesics::api::GeodesicOptimizer;
    use tempfile::tempdir;

    fn small_settings() -> RunSettings {
        RunSettings {
            width: 8,
            features: 4,
            shift: 2,
            n_steps: 4,
            max_iterations: 20,
            store_progress: 2,
            ..RunSettings::default()
        }
    }

    #[test]
    fn checkpoint_survives_disk_and_resumes() {
        let settings = small_settings();
        let (a, b) = settings.endpoints().unwrap();
        let mut opt =
            GeodesicOptimizer::new(settings.model(), &a, &b, settings.n_steps, &settings.cfg())
                .unwrap();
        opt.run(5).unwrap();
        let ckpt = opt.checkpoint().unwrap();

        let dir = tempdir().unwrap();
        let file = dir.path().join("nested").join("checkpoint.json");
        save_checkpoint(&file, &ckpt, &settings).unwrap();
        let (loaded, loaded_settings) = load_checkpoint(&file).unwrap();
        assert_eq!(loaded, ckpt);
        assert_eq!(loaded_settings, settings);

        let resumed =
            GeodesicOptimizer::resume(loaded_settings.model(), loaded, &loaded_settings.cfg())
                .unwrap();
        assert_eq!(resumed.iteration(), 5);
        assert_eq!(resumed.path(), opt.path());
        assert_eq!(resumed.history().progress.len(), 3);
    }

    #[test]
    fn rejects_unknown_format_and_state() {
        let settings = small_settings();
        let (a, b) = settings.endpoints().unwrap();
        let opt = GeodesicOptimizer::new(settings.model(), &a, &b, 4, &settings.cfg()).unwrap();
        let dir = tempdir().unwrap();
        let file = dir.path().join("checkpoint.json");
        save_checkpoint(&file, &opt.checkpoint().unwrap(), &settings).unwrap();

        let mut doc: serde_json::Value = serde_json::from_slice(&fs::read(&file).unwrap()).unwrap();
        doc["state"] = "sleeping".into();
        fs::write(&file, serde_json::to_vec(&doc).unwrap()).unwrap();
        assert!(load_checkpoint(&file).is_err());

        doc["state"] = "running".into();
        doc["format_version"] = 99.into();
        fs::write(&file, serde_json::to_vec(&doc).unwrap()).unwrap();
        let err = load_checkpoint(&file).unwrap_err();
        assert!(err.to_string().contains("not supported"));
    }

    #[test]
    fn path_file_lists_frames() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("path.json");
        let frames = vec![Tensor::zeros(&[1, 3]), Tensor::filled(&[1, 3], 1.0)];
        save_path(&file, &frames).unwrap();
        let parsed: Vec<TensorRecord> = serde_json::from_slice(&fs::read(&file).unwrap()).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].shape, vec![1, 3]);
        assert_eq!(parsed[1].data, vec![1.0; 3]);
    }
}
