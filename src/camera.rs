use crate::{
    error::{check_len, Error},
    pose::constants::{BBOX_PARAMS, CAMERA_PARAMS},
};
use ndarray::{Array2, ArrayView1, ArrayView2};
use structopt::StructOpt;

/// Scales or bbox heights with a smaller magnitude are treated as degenerate.
const GEOMETRY_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, StructOpt)]
pub(crate) struct CameraConfig {
    /// Focal length of the full image camera, in pixels.
    #[structopt(long, default_value = "5000")]
    pub(crate) focal_length: f64,

    /// Width of the source video frames.
    #[structopt(long, default_value = "1080")]
    pub(crate) image_width: f64,

    /// Height of the source video frames.
    #[structopt(long, default_value = "1920")]
    pub(crate) image_height: f64,

    /// Side length of the square crop the weak perspective camera was estimated in.
    #[structopt(long, default_value = "224")]
    pub(crate) crop_resolution: f64,
}

impl Default for CameraConfig {
    /// The command line defaults.
    fn default() -> Self {
        Self::from_iter(&["emg-knn"])
    }
}

impl CameraConfig {
    pub(crate) fn validate(&self) -> Result<(), Error> {
        [
            ("focal_length", self.focal_length),
            ("image_width", self.image_width),
            ("image_height", self.image_height),
            ("crop_resolution", self.crop_resolution),
        ]
        .iter()
        .try_for_each(|&(name, value)| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(Error::InvalidImageSize(name, value))
            }
        })
    }

    /// The principal point sits at the image center.
    #[inline]
    pub(crate) fn principal_point(&self) -> (f64, f64) {
        (self.image_width / 2.0, self.image_height / 2.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct WeakPerspective {
    pub(crate) scale: f64,
    pub(crate) tx: f64,
    pub(crate) ty: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BoundingBox {
    pub(crate) center_x: f64,
    pub(crate) center_y: f64,
    pub(crate) height: f64,
}

impl WeakPerspective {
    fn from_row(row: ArrayView1<f64>) -> Self {
        Self {
            scale: row[0],
            tx: row[1],
            ty: row[2],
        }
    }

    /// Translation of the same camera expressed in full image coordinates.
    ///
    /// `index` only labels the row in the error returned for a degenerate
    /// scale or bounding box.
    pub(crate) fn full_image_translation(
        self,
        bbox: BoundingBox,
        config: &CameraConfig,
        index: usize,
    ) -> Result<[f64; 3], Error> {
        let Self { scale, tx, ty } = self;
        let degenerate = || Error::InvalidGeometry {
            index,
            scale,
            bbox_height: bbox.height,
        };

        if !(scale.abs() > GEOMETRY_EPSILON && bbox.height.abs() > GEOMETRY_EPSILON) {
            return Err(degenerate());
        }

        let (half_width, half_height) = config.principal_point();
        let crop = config.crop_resolution;
        let r = bbox.height / crop;
        let tz = 2.0 * config.focal_length / (r * crop * scale);
        let cx = 2.0 * (bbox.center_x - half_width) / (scale * bbox.height);
        let cy = 2.0 * (bbox.center_y - half_height) / (scale * bbox.height);

        let translation = [tx + cx, ty + cy, tz];
        if translation.iter().all(|v| v.is_finite()) {
            Ok(translation)
        } else {
            Err(degenerate())
        }
    }
}

impl BoundingBox {
    fn from_row(row: ArrayView1<f64>) -> Self {
        Self {
            center_x: row[0],
            center_y: row[1],
            height: row[2],
        }
    }
}

/// Convert `[N, 3]` weak perspective cameras and their `[N, 3]` bounding boxes
/// into `[N, 3]` full image camera translations.
pub(crate) fn convert_to_full_image_camera(
    cameras: ArrayView2<f64>,
    bboxes: ArrayView2<f64>,
    config: &CameraConfig,
) -> Result<Array2<f64>, Error> {
    check_len("camera parameters", CAMERA_PARAMS, cameras.ncols())?;
    check_len("bounding box parameters", BBOX_PARAMS, bboxes.ncols())?;
    check_len("bounding box rows", cameras.nrows(), bboxes.nrows())?;

    let mut translations = Array2::zeros((cameras.nrows(), 3));
    for (index, ((camera, bbox), mut out)) in cameras
        .outer_iter()
        .zip(bboxes.outer_iter())
        .zip(translations.outer_iter_mut())
        .enumerate()
    {
        let translation = WeakPerspective::from_row(camera).full_image_translation(
            BoundingBox::from_row(bbox),
            config,
            index,
        )?;
        out.assign(&ArrayView1::from(&translation[..]));
    }
    Ok(translations)
}
