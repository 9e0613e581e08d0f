use crate::{error::Error, evaluation::ThresholdMetrics, nearest_neighbor::Distance};
use ndarray::Array3;
use serde::Serialize;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};
use tracing::info;

/// Everything a downstream plotting or visualization step needs.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct EvaluationReport {
    pub(crate) distance: Distance,
    pub(crate) train_samples: usize,
    pub(crate) val_samples: usize,
    pub(crate) feature_dimension: usize,
    pub(crate) mean_squared_error: Option<f64>,
    pub(crate) thresholds: Vec<ThresholdMetrics>,
}

impl EvaluationReport {
    pub(crate) fn log(&self) {
        info!(
            distance = %self.distance,
            train_samples = self.train_samples,
            val_samples = self.val_samples,
            feature_dimension = self.feature_dimension,
            mse = ?self.mean_squared_error,
            "nearest neighbor evaluation finished"
        );
        for row in &self.thresholds {
            info!(
                threshold = row.agreement.threshold,
                agreement = ?row.agreement.fraction,
                counted = row.agreement.counted,
                relative_rmse = ?row.relative_rmse,
                band_relative_rmse = ?row.band_relative_rmse
            );
        }
    }

    pub(crate) fn write_to<W>(&self, mut writer: W) -> Result<(), Error>
    where
        W: Write,
    {
        serde_json::to_writer_pretty(&mut writer, self).map_err(Error::WriteOutput)?;
        writeln!(writer).map_err(|e| Error::WriteOutput(serde_json::Error::io(e)))
    }

    /// Write to `output`, or to stdout when no path is given.
    pub(crate) fn save(&self, output: Option<&Path>) -> Result<(), Error> {
        match output {
            Some(path) => write_json_file(path, self),
            None => self.write_to(std::io::stdout().lock()),
        }
    }
}

/// Predicted EMG in original units, in ndarray's serde layout.
pub(crate) fn save_predictions(path: &Path, predictions: &Array3<f64>) -> Result<(), Error> {
    write_json_file(path, predictions)
}

fn write_json_file<T>(path: &Path, value: &T) -> Result<(), Error>
where
    T: Serialize,
{
    let file = File::create(path).map_err(|e| Error::CreateOutput(e, path.to_path_buf()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(Error::WriteOutput)?;
    writer
        .flush()
        .map_err(|e| Error::CreateOutput(e, path.to_path_buf()))
}
