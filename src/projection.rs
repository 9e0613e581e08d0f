use crate::{
    error::{check_len, Error},
    pose::constants::{PIXEL_DIMS, POINT_DIMS},
};
use ndarray::{Array3, ArrayView1, ArrayView2, ArrayView3, Axis};

#[derive(Debug, Clone)]
pub(crate) struct Projection {
    /// `[batch, joints, 2]` pixel coordinates.
    pub(crate) image_points: Array3<f64>,
    /// `[batch, joints, 3]` points after rotation and translation, before intrinsics.
    pub(crate) camera_points: Array3<f64>,
}

/// A `[batch, 3, 3]` stack of identity rotations.
pub(crate) fn identity_rotations(batch: usize) -> Array3<f64> {
    let mut rotations = Array3::zeros((batch, POINT_DIMS, POINT_DIMS));
    rotations
        .outer_iter_mut()
        .for_each(|mut rotation| rotation.diag_mut().fill(1.0));
    rotations
}

/// Project `[batch, joints, 3]` points through a pinhole camera.
///
/// Each batch row has its own rotation, translation, focal length and
/// principal point. A point that lands on the `z = 0` plane after the rigid
/// transform divides by zero and projects to infinity or NaN; no error is
/// raised for it.
pub(crate) fn perspective_projection(
    points: ArrayView3<f64>,
    rotation: ArrayView3<f64>,
    translation: ArrayView2<f64>,
    focal_length: ArrayView1<f64>,
    camera_center: ArrayView2<f64>,
) -> Result<Projection, Error> {
    let (batch, joints, dims) = points.dim();
    check_len("point dimensions", POINT_DIMS, dims)?;
    check_len("rotation batch", batch, rotation.len_of(Axis(0)))?;
    check_len("rotation rows", POINT_DIMS, rotation.len_of(Axis(1)))?;
    check_len("rotation columns", POINT_DIMS, rotation.len_of(Axis(2)))?;
    check_len("translation batch", batch, translation.nrows())?;
    check_len("translation dimensions", POINT_DIMS, translation.ncols())?;
    check_len("focal length batch", batch, focal_length.len())?;
    check_len("camera center batch", batch, camera_center.nrows())?;
    check_len("camera center dimensions", PIXEL_DIMS, camera_center.ncols())?;

    let mut image_points = Array3::zeros((batch, joints, PIXEL_DIMS));
    let mut camera_points = Array3::zeros((batch, joints, POINT_DIMS));

    for b in 0..batch {
        let rotated = points
            .index_axis(Axis(0), b)
            .dot(&rotation.index_axis(Axis(0), b).t());
        let transformed = rotated + &translation.row(b);

        let focal = focal_length[b];
        let (cx, cy) = (camera_center[(b, 0)], camera_center[(b, 1)]);
        for (mut pixel, point) in image_points
            .index_axis_mut(Axis(0), b)
            .outer_iter_mut()
            .zip(transformed.outer_iter())
        {
            let z = point[2];
            pixel[0] = focal * point[0] / z + cx;
            pixel[1] = focal * point[1] / z + cy;
        }

        camera_points.index_axis_mut(Axis(0), b).assign(&transformed);
    }

    Ok(Projection {
        image_points,
        camera_points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use ndarray::{array, Array1, Array2};

    fn single_camera(
        translation: [f64; 3],
        focal: f64,
        center: (f64, f64),
    ) -> (Array3<f64>, Array2<f64>, Array1<f64>, Array2<f64>) {
        (
            identity_rotations(1),
            array![[translation[0], translation[1], translation[2]]],
            array![focal],
            array![[center.0, center.1]],
        )
    }

    #[test]
    fn identity_rotation_stack() {
        let rotations = identity_rotations(2);
        assert_eq!(rotations.dim(), (2, 3, 3));
        for rotation in rotations.outer_iter() {
            assert_eq!(rotation, Array2::<f64>::eye(3));
        }
    }

    #[test]
    fn optical_axis_projects_to_principal_point() {
        let points = array![[[0.0, 0.0, 5.0]]];
        let (rotation, translation, focal, center) =
            single_camera([0.0, 0.0, 0.0], 5000.0, (540.0, 960.0));
        let projection = perspective_projection(
            points.view(),
            rotation.view(),
            translation.view(),
            focal.view(),
            center.view(),
        )
        .unwrap();
        assert_approx_eq!(projection.image_points[(0, 0, 0)], 540.0);
        assert_approx_eq!(projection.image_points[(0, 0, 1)], 960.0);
        assert_eq!(projection.camera_points, points);
    }

    #[test]
    fn back_solving_recovers_points_at_shared_depth() {
        let points = array![[[0.1, -0.2, 0.0], [0.3, 0.25, 0.0], [-0.4, 0.05, 0.0]]];
        let depth = 10.0;
        let focal = 5000.0;
        let (rotation, translation, focal_length, center) =
            single_camera([0.0, 0.0, depth], focal, (540.0, 960.0));
        let projection = perspective_projection(
            points.view(),
            rotation.view(),
            translation.view(),
            focal_length.view(),
            center.view(),
        )
        .unwrap();

        for (pixel, point) in projection
            .image_points
            .index_axis(Axis(0), 0)
            .outer_iter()
            .zip(points.index_axis(Axis(0), 0).outer_iter())
        {
            assert_approx_eq!((pixel[0] - 540.0) * depth / focal, point[0]);
            assert_approx_eq!((pixel[1] - 960.0) * depth / focal, point[1]);
        }
    }

    #[test]
    fn rotation_is_applied_before_translation() {
        // 90 degrees about z: (x, y) -> (-y, x)
        let rotation = array![[[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]]];
        let points = array![[[1.0, 0.0, 0.0]]];
        let translation = array![[0.0, 0.0, 2.0]];
        let projection = perspective_projection(
            points.view(),
            rotation.view(),
            translation.view(),
            array![100.0].view(),
            array![[0.0, 0.0]].view(),
        )
        .unwrap();
        assert_approx_eq!(projection.camera_points[(0, 0, 0)], 0.0);
        assert_approx_eq!(projection.camera_points[(0, 0, 1)], 1.0);
        assert_approx_eq!(projection.camera_points[(0, 0, 2)], 2.0);
        assert_approx_eq!(projection.image_points[(0, 0, 0)], 0.0);
        assert_approx_eq!(projection.image_points[(0, 0, 1)], 50.0);
    }

    #[test]
    fn zero_depth_is_not_finite() {
        let points = array![[[1.0, 1.0, 0.0]]];
        let (rotation, translation, focal, center) =
            single_camera([0.0, 0.0, 0.0], 5000.0, (540.0, 960.0));
        let projection = perspective_projection(
            points.view(),
            rotation.view(),
            translation.view(),
            focal.view(),
            center.view(),
        )
        .unwrap();
        assert!(!projection.image_points[(0, 0, 0)].is_finite());
        assert!(!projection.image_points[(0, 0, 1)].is_finite());
    }

    #[test]
    fn batch_mismatch() {
        let points = array![[[0.0, 0.0, 5.0]], [[0.0, 0.0, 5.0]]];
        let (rotation, translation, focal, center) =
            single_camera([0.0, 0.0, 0.0], 5000.0, (540.0, 960.0));
        let result = perspective_projection(
            points.view(),
            rotation.view(),
            translation.view(),
            focal.view(),
            center.view(),
        );
        assert!(matches!(result, Err(Error::ShapeMismatch(_, 2, 1))));
    }
}
