use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("degenerate camera geometry at row {index}: scale = {scale}, bbox height = {bbox_height}")]
    InvalidGeometry {
        index: usize,
        scale: f64,
        bbox_height: f64,
    },

    #[error("shape mismatch for {0}: expected {1}, got {2}")]
    ShapeMismatch(&'static str, usize, usize),

    #[error("cannot predict from an empty training set")]
    EmptyTrainingSet,

    #[error("cannot build features from empty {0} split")]
    EmptyDataset(&'static str),

    #[error("got NaN distance to training row {1}")]
    NanDistance(#[source] ordered_float::FloatIsNan, usize),

    #[error("failed to convert value to f64")]
    ConvertToF64,

    #[error("invalid camera setting {0}: {1}")]
    InvalidImageSize(&'static str, f64),

    #[error("unknown distance metric: {0:?}, expected one of l1, l2")]
    ParseDistance(String),

    #[error("failed to reshape {1}")]
    ReshapeArray(#[source] ndarray::ShapeError, &'static str),

    #[error("failed to open dataset: {1:?}")]
    OpenDataset(#[source] std::io::Error, PathBuf),

    #[error("failed to parse dataset: {1:?}")]
    ParseDataset(#[source] serde_json::Error, PathBuf),

    #[error("failed to create output file: {1:?}")]
    CreateOutput(#[source] std::io::Error, PathBuf),

    #[error("failed to serialize output")]
    WriteOutput(#[source] serde_json::Error),
}

/// Check that an axis has the expected length.
pub(crate) fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<(), Error> {
    if expected != actual {
        Err(Error::ShapeMismatch(what, expected, actual))
    } else {
        Ok(())
    }
}
