use crate::{
    camera::CameraConfig,
    error::{check_len, Error},
    pose::constants::PIXEL_DIMS,
};
use ndarray::{Array2, Array4, ArrayView4, Axis};

/// Divide `[samples, frames, joints, 2]` pixel keypoints by the image size.
///
/// Keypoints outside the frame map outside `[0, 1]` and are kept as is.
pub(crate) fn normalize_keypoints(
    image_points: ArrayView4<f64>,
    config: &CameraConfig,
) -> Result<Array4<f64>, Error> {
    check_len("keypoint dimensions", PIXEL_DIMS, image_points.len_of(Axis(3)))?;
    config.validate()?;

    let mut normalized = image_points.to_owned();
    normalized
        .index_axis_mut(Axis(3), 0)
        .mapv_inplace(|x| x / config.image_width);
    normalized
        .index_axis_mut(Axis(3), 1)
        .mapv_inplace(|y| y / config.image_height);
    Ok(normalized)
}

/// One row per sample, ordered frame, then joint, then coordinate.
pub(crate) fn flatten_features(keypoints: ArrayView4<f64>) -> Result<Array2<f64>, Error> {
    let (samples, frames, joints, dims) = keypoints.dim();
    // logical iteration order is row-major regardless of memory layout
    Array2::from_shape_vec(
        (samples, frames * joints * dims),
        keypoints.iter().copied().collect(),
    )
    .map_err(|e| Error::ReshapeArray(e, "keypoint features"))
}

pub(crate) fn keypoint_features(
    image_points: ArrayView4<f64>,
    config: &CameraConfig,
) -> Result<Array2<f64>, Error> {
    flatten_features(normalize_keypoints(image_points, config)?.view())
}
