use crate::{
    error::{check_len, Error},
    pose::constants::{BBOX_PARAMS, CAMERA_PARAMS, POINT_DIMS},
};
use ndarray::{Array3, Array4, Axis};
use serde::Deserialize;
use std::{fs::File, io::BufReader, path::Path};

/// One loader batch, in ndarray's serde layout.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Batch {
    /// `[batch, frames, joints, 3]`
    pub(crate) skeleton: Array4<f64>,
    /// `[batch, frames, 3]`
    pub(crate) bboxes: Array3<f64>,
    /// `[batch, frames, 3]`
    pub(crate) cameras: Array3<f64>,
    /// `[batch, time, muscles]`
    pub(crate) emg: Array3<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Dataset {
    pub(crate) train: Vec<Batch>,
    pub(crate) val: Vec<Batch>,
}

impl Batch {
    #[inline]
    pub(crate) fn samples(&self) -> usize {
        self.skeleton.len_of(Axis(0))
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        let (samples, frames, _, dims) = self.skeleton.dim();
        check_len("skeleton point dimensions", POINT_DIMS, dims)?;

        let (bbox_samples, bbox_frames, bbox_params) = self.bboxes.dim();
        check_len("bounding box samples", samples, bbox_samples)?;
        check_len("bounding box frames", frames, bbox_frames)?;
        check_len("bounding box parameters", BBOX_PARAMS, bbox_params)?;

        let (camera_samples, camera_frames, camera_params) = self.cameras.dim();
        check_len("camera samples", samples, camera_samples)?;
        check_len("camera frames", frames, camera_frames)?;
        check_len("camera parameters", CAMERA_PARAMS, camera_params)?;

        check_len("emg samples", samples, self.emg.len_of(Axis(0)))
    }
}

impl Dataset {
    pub(crate) fn load<P>(path: P) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::OpenDataset(e, path.to_path_buf()))?;
        let dataset: Self = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::ParseDataset(e, path.to_path_buf()))?;
        dataset
            .train
            .iter()
            .chain(dataset.val.iter())
            .try_for_each(Batch::validate)?;
        Ok(dataset)
    }
}
