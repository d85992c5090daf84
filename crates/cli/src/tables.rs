//! Tabular exports of optimization history (CSV or Parquet via polars).

use std::fs::File;
use std::path::Path;

use anyhow::{bail, Context, Result};
use geodesics::api::{History, ProgressRecord};
use polars::prelude::*;

/// One row per completed iteration.
pub fn history_frame(history: &History) -> PolarsResult<DataFrame> {
    let iteration: Vec<u64> = (0..history.len() as u64).collect();
    df!(
        "iteration" => iteration,
        "loss" => &history.losses,
        "energy" => &history.energies,
        "gradient_norm" => &history.gradient_norms,
        "pixel_change_norm" => &history.pixel_change_norms,
        "learning_rate" => &history.learning_rates
    )
}

/// Long format: one row per (stored iteration, transition).
pub fn step_energy_frame(progress: &[ProgressRecord]) -> PolarsResult<DataFrame> {
    let mut iteration = Vec::new();
    let mut transition = Vec::new();
    let mut step_energy = Vec::new();
    for rec in progress {
        for (i, &e) in rec.step_energy.iter().enumerate() {
            iteration.push(rec.iteration as u64);
            transition.push(i as u64);
            step_energy.push(e);
        }
    }
    df!(
        "iteration" => iteration,
        "transition" => transition,
        "step_energy" => step_energy
    )
}

/// Long format: one row per (stored iteration, frame).
pub fn deviation_frame(progress: &[ProgressRecord]) -> PolarsResult<DataFrame> {
    let mut iteration = Vec::new();
    let mut frame = Vec::new();
    let mut along = Vec::new();
    let mut from = Vec::new();
    for rec in progress {
        let dev = &rec.deviation;
        for (k, (&a, &f)) in dev.along.iter().zip(&dev.from).enumerate() {
            iteration.push(rec.iteration as u64);
            frame.push(k as u64);
            along.push(a);
            from.push(f);
        }
    }
    df!(
        "iteration" => iteration,
        "frame" => frame,
        "along" => along,
        "from" => from
    )
}

fn is_parquet(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "parquet")
}

/// Write `df` as CSV, or as Parquet when the file name ends in `.parquet`.
pub fn write_table(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    if is_parquet(path) {
        ParquetWriter::new(&mut file).finish(df)?;
    } else {
        CsvWriter::new(&mut file).include_header(true).finish(df)?;
    }
    Ok(())
}

/// Read a CSV or Parquet table lazily and collect it.
pub fn read_table(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        bail!("no such table: {}", path.display());
    }
    let lf = if is_parquet(path) {
        LazyFrame::scan_parquet(path, ScanArgsParquet::default())?
    } else {
        LazyCsvReader::new(path)
            .with_infer_schema_length(Some(100))
            .finish()?
    };
    Ok(lf.collect()?)
}

/// Last value of a float column, if the column exists and is non-empty.
pub fn last_f64(df: &DataFrame, name: &str) -> Option<f64> {
    let ca = df.column(name).ok()?.f64().ok()?;
    let n = ca.len();
    if n == 0 {
        return None;
    }
    ca.get(n - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geodesics::api::LineDeviation;
    use tempfile::tempdir;

    fn history() -> History {
        History {
            losses: vec![3.0, 2.0, 1.5],
            energies: vec![3.0, 2.0, 1.5],
            gradient_norms: vec![1.0, 0.5, 0.25],
            pixel_change_norms: vec![0.1, 0.05, 0.01],
            learning_rates: vec![1e-3; 3],
            progress: vec![ProgressRecord {
                iteration: 0,
                step_energy: vec![1.0, 2.0],
                deviation: LineDeviation {
                    along: vec![0.0, 0.4, 1.0],
                    from: vec![0.0, 0.3, 0.0],
                },
            }],
        }
    }

    #[test]
    fn frames_have_expected_shapes() {
        let h = history();
        assert_eq!(history_frame(&h).unwrap().shape(), (3, 6));
        assert_eq!(step_energy_frame(&h.progress).unwrap().shape(), (2, 3));
        assert_eq!(deviation_frame(&h.progress).unwrap().shape(), (3, 4));
    }

    #[test]
    fn csv_and_parquet_read_back() {
        let dir = tempdir().unwrap();
        for name in ["history.csv", "history.parquet"] {
            let path = dir.path().join(name);
            let mut df = history_frame(&history()).unwrap();
            write_table(&mut df, &path).unwrap();
            let back = read_table(&path).unwrap();
            assert_eq!(back.height(), 3);
            assert_eq!(last_f64(&back, "loss"), Some(1.5));
            assert_eq!(last_f64(&back, "missing"), None);
        }
    }

    #[test]
    fn missing_table_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(read_table(&dir.path().join("nope.csv")).is_err());
    }
}
