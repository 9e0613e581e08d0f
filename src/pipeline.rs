use crate::{
    camera::{convert_to_full_image_camera, CameraConfig},
    dataset::Batch,
    error::{check_len, Error},
    features::keypoint_features,
    pose::constants::{BBOX_PARAMS, CAMERA_PARAMS, EMG_SCALE, PIXEL_DIMS, POINT_DIMS},
    projection::{identity_rotations, perspective_projection},
};
use indicatif::ProgressBar;
use ndarray::{concatenate, Array1, Array2, Array3, ArrayView3, Axis};
use tracing::{debug, trace};

/// Stacked features and targets of one dataset split.
#[derive(Debug, Clone)]
pub(crate) struct FeatureSet {
    /// `[samples, frames * joints * 2]`
    pub(crate) features: Array2<f64>,
    /// `[samples, time, muscles]`, divided by `EMG_SCALE`
    pub(crate) targets: Array3<f64>,
}

impl FeatureSet {
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.features.nrows()
    }

    #[inline]
    pub(crate) fn dimension(&self) -> usize {
        self.features.ncols()
    }
}

/// One feature row per sample of `batch`.
pub(crate) fn batch_features(batch: &Batch, camera: &CameraConfig) -> Result<Array2<f64>, Error> {
    let (samples, frames, joints, _) = batch.skeleton.dim();
    let rows = samples * frames;

    let cameras = batch.cameras.as_standard_layout();
    let cameras = cameras
        .view()
        .into_shape((rows, CAMERA_PARAMS))
        .map_err(|e| Error::ReshapeArray(e, "weak perspective cameras"))?;
    let bboxes = batch.bboxes.as_standard_layout();
    let bboxes = bboxes
        .view()
        .into_shape((rows, BBOX_PARAMS))
        .map_err(|e| Error::ReshapeArray(e, "bounding boxes"))?;
    let translation = convert_to_full_image_camera(cameras, bboxes, camera)?;

    let points = batch.skeleton.as_standard_layout();
    let points = points
        .view()
        .into_shape((rows, joints, POINT_DIMS))
        .map_err(|e| Error::ReshapeArray(e, "skeleton"))?;
    let (cx, cy) = camera.principal_point();
    let camera_center = Array2::from_shape_fn((rows, PIXEL_DIMS), |(_, i)| [cx, cy][i]);

    let projection = perspective_projection(
        points,
        identity_rotations(rows).view(),
        translation.view(),
        Array1::from_elem(rows, camera.focal_length).view(),
        camera_center.view(),
    )?;

    let depth = projection.camera_points.index_axis(Axis(2), 2);
    trace!(
        min_depth = depth.fold(f64::INFINITY, |acc, &z| acc.min(z)),
        max_depth = depth.fold(f64::NEG_INFINITY, |acc, &z| acc.max(z))
    );

    let image_points = projection
        .image_points
        .into_shape((samples, frames, joints, PIXEL_DIMS))
        .map_err(|e| Error::ReshapeArray(e, "projected keypoints"))?;
    keypoint_features(image_points.view(), camera)
}

pub(crate) fn batch_targets(batch: &Batch) -> Array3<f64> {
    &batch.emg / EMG_SCALE
}

/// Back to original EMG units.
pub(crate) fn rescale(emg: ArrayView3<f64>) -> Array3<f64> {
    &emg * EMG_SCALE
}

/// Features and targets for every batch of a split, stacked along samples.
pub(crate) fn build_feature_set(
    split: &'static str,
    batches: &[Batch],
    camera: &CameraConfig,
    progress: Option<&ProgressBar>,
) -> Result<FeatureSet, Error> {
    if batches.is_empty() {
        return Err(Error::EmptyDataset(split));
    }

    let mut features: Vec<Array2<f64>> = Vec::with_capacity(batches.len());
    let mut targets: Vec<Array3<f64>> = Vec::with_capacity(batches.len());

    for (i, batch) in batches.iter().enumerate() {
        let rows = batch_features(batch, camera)?;
        let emg = batch_targets(batch);
        debug!(
            split,
            batch = i,
            samples = batch.samples(),
            dimension = rows.ncols()
        );

        if let (Some(first), Some(first_emg)) = (features.first(), targets.first()) {
            check_len("feature dimension", first.ncols(), rows.ncols())?;
            check_len(
                "emg time steps",
                first_emg.len_of(Axis(1)),
                emg.len_of(Axis(1)),
            )?;
            check_len("emg muscles", first_emg.len_of(Axis(2)), emg.len_of(Axis(2)))?;
        }

        features.push(rows);
        targets.push(emg);

        if let Some(progress) = progress {
            progress.inc(1);
        }
    }

    let feature_views = features.iter().map(Array2::view).collect::<Vec<_>>();
    let target_views = targets.iter().map(Array3::view).collect::<Vec<_>>();
    Ok(FeatureSet {
        features: concatenate(Axis(0), &feature_views)
            .map_err(|e| Error::ReshapeArray(e, "feature matrix"))?,
        targets: concatenate(Axis(0), &target_views)
            .map_err(|e| Error::ReshapeArray(e, "target tensor"))?,
    })
}
